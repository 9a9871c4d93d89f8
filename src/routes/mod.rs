use serde::Serialize;

pub mod auth;
pub mod events;
pub mod messages;
pub mod posts;
pub mod profile;
pub mod public;
pub mod store;
pub mod uploads;

/// Envelope for every JSON endpoint.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}
