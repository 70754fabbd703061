pub mod documentation;
pub mod liar_service;
pub mod mafia_service;
pub mod marble_service;
pub mod quiz_service;
pub mod room_service;
pub mod sse_service;
pub mod team_service;
pub mod truth_service;
