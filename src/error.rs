//! Error types for the push-codelab library.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors that can occur while driving a push subscription or serving assets.
#[derive(Error, Debug)]
pub enum Error {
    /// The application server key is not valid base64url.
    #[error("Invalid application server key: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The push service refused or failed the subscribe request.
    #[error("Failed to subscribe the user: {0}")]
    SubscriptionRejected(PlatformError),

    /// The push service refused or failed to cancel the subscription.
    #[error("Failed to unsubscribe the user: {0}")]
    UnsubscribeFailed(PlatformError),

    /// The background worker could not be registered.
    #[error("Service worker registration failed: {0}")]
    RegistrationFailed(PlatformError),

    /// The current subscription could not be queried.
    #[error("Failed to query subscription: {0}")]
    Query(PlatformError),

    /// A subscribe or unsubscribe operation is already in flight.
    #[error("A subscription change is already in progress")]
    Busy,

    /// I/O error while reading configuration or binding the server.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Subscription record could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Asset server failed.
    #[error("Server error: {0}")]
    Server(String),
}

/// A specialized `Result` type for push-codelab operations.
pub type Result<T> = std::result::Result<T, Error>;
