//! Store key layout. Every room-scoped key lives under `room:{roomId}:…`.

pub fn room_info(room_id: &str) -> String {
    format!("room:{room_id}:info")
}

pub fn marble_state(room_id: &str) -> String {
    format!("room:{room_id}:marble:state")
}

pub fn marble_penalties(room_id: &str) -> String {
    format!("room:{room_id}:marble:penalties")
}

pub fn marble_votes(room_id: &str) -> String {
    format!("room:{room_id}:marble:votes")
}

pub fn marble_selected(room_id: &str) -> String {
    format!("room:{room_id}:marble:selected")
}

pub fn marble_vote_done(room_id: &str) -> String {
    format!("room:{room_id}:marble:vote_done")
}

// Historic layout: the mafia state key predates the per-game prefixes.
pub fn mafia_state(room_id: &str) -> String {
    format!("room:{room_id}:state")
}

pub fn mafia_chat(room_id: &str) -> String {
    format!("room:{room_id}:mafia_chat")
}

pub fn liar_state(room_id: &str) -> String {
    format!("room:{room_id}:liar:state")
}

pub fn quiz_state(room_id: &str) -> String {
    format!("room:{room_id}:quiz:state")
}

pub fn truth_state(room_id: &str) -> String {
    format!("room:{room_id}:truth:state")
}
