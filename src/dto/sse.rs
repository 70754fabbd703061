use serde::Serialize;

/// Dispatched payload carried across the event streams: a named text event
/// whose `data` field is JSON.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

impl ServerEvent {
    /// Serialize `payload` into the event's data field.
    pub fn json<T: Serialize>(event: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Handshake frame sent when a stream opens.
    pub fn connect() -> Self {
        Self {
            event: "CONNECT".to_string(),
            data: "\"connected\"".to_string(),
        }
    }
}
