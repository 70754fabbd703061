use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod games;
pub mod health;
pub mod liar;
pub mod mafia;
pub mod marble;
pub mod quiz;
pub mod rooms;
pub mod sse;
pub mod teams;
pub mod truth;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(rooms::router())
        .merge(sse::router())
        .merge(games::router())
        .merge(teams::router())
        .nest("/games/marble", marble::router())
        .nest("/games/mafia", mafia::router())
        .nest("/games/liar", liar::router())
        .nest("/games/quiz", quiz::router())
        .nest("/games/truth", truth::router());

    api_router.merge(docs::router()).with_state(state)
}
