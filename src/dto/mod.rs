/// Shared response envelope and timer payloads.
pub mod common;
/// Liar game payloads.
pub mod liar;
/// Mafia game payloads.
pub mod mafia;
/// Marble game payloads.
pub mod marble;
/// Quiz game payloads.
pub mod quiz;
/// Room and presence payloads.
pub mod room;
/// Server-Sent Events wire frame.
pub mod sse;
/// Team management payloads.
pub mod team;
/// Truth game payloads.
pub mod truth;
