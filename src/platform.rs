//! Abstractions over the platform's push capabilities.
//!
//! The controller never talks to a browser directly. It registers a
//! background worker through a [`RegistrationProvider`] and reaches the push
//! service through the returned [`PushManager`] handle.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// The user has not been asked yet.
    #[default]
    Default,
    /// Notifications are allowed.
    Granted,
    /// Notifications are permanently blocked for this origin.
    Denied,
}

/// Encryption keys attached to a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// An active push subscription, as handed out by the push service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub endpoint: String,
    #[serde(rename = "expirationTime")]
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

/// Options for a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Every push message must result in a user-visible notification.
    pub user_visible_only: bool,
    /// Raw application server public key.
    pub application_server_key: Vec<u8>,
}

impl SubscribeOptions {
    /// Creates user-visible subscribe options for the given raw key.
    #[must_use]
    pub const fn user_visible(application_server_key: Vec<u8>) -> Self {
        Self {
            user_visible_only: true,
            application_server_key,
        }
    }
}

/// A failure reported by the platform, shaped like a DOM exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub name: String,
    pub message: String,
}

impl PlatformError {
    /// Creates a platform error from an exception name and message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for PlatformError {}

/// Push subscription service, reached through a worker registration.
#[async_trait]
pub trait PushManager: Send + Sync {
    /// Requests a new subscription (prompting for permission if needed).
    async fn subscribe(
        &self,
        options: &SubscribeOptions,
    ) -> Result<SubscriptionRecord, PlatformError>;

    /// Returns the current subscription, if any.
    async fn get_subscription(&self) -> Result<Option<SubscriptionRecord>, PlatformError>;

    /// Cancels the given subscription. Returns `false` if it was already gone.
    async fn unsubscribe(&self, subscription: &SubscriptionRecord) -> Result<bool, PlatformError>;

    /// Returns the current notification permission.
    async fn permission_state(&self) -> Permission;
}

/// Platform capability that registers background workers.
#[async_trait]
pub trait RegistrationProvider: Send + Sync {
    /// Handle returned by a successful registration.
    type Registration: PushManager;

    /// Whether background workers and push messaging are both available.
    fn is_supported(&self) -> bool;

    /// Registers the worker script at `script_url`.
    async fn register(&self, script_url: &str) -> Result<Self::Registration, PlatformError>;
}
