use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Uniform response envelope for command endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl Envelope<()> {
    /// Success without a payload.
    pub fn empty() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Per-second countdown tick streamed to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerTick {
    pub phase: &'static str,
    pub remaining: u64,
}
