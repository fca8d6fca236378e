//! In-memory push platform for driving the controller without a browser.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::platform::{
    Permission, PlatformError, PushManager, RegistrationProvider, SubscribeOptions,
    SubscriptionKeys, SubscriptionRecord,
};

const SIM_ENDPOINT: &str = "https://push.example.test/send";

#[derive(Debug, Default)]
struct SimState {
    permission: Permission,
    subscription: Option<SubscriptionRecord>,
    subscribe_error: Option<PlatformError>,
    unsubscribe_error: Option<PlatformError>,
    query_error: Option<PlatformError>,
    last_options: Option<SubscribeOptions>,
    subscribe_calls: usize,
}

/// Simulated push service. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPushManager {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPushManager {
    /// Creates a push service with no subscription and default permission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the notification permission.
    #[must_use]
    pub fn with_permission(self, permission: Permission) -> Self {
        self.set_permission(permission);
        self
    }

    /// Starts out with an existing subscription.
    #[must_use]
    pub fn with_subscription(self, subscription: SubscriptionRecord) -> Self {
        self.lock().subscription = Some(subscription);
        self
    }

    /// Makes every subscribe request fail with `error`.
    #[must_use]
    pub fn rejecting_subscribe(self, error: PlatformError) -> Self {
        self.lock().subscribe_error = Some(error);
        self
    }

    /// Makes every unsubscribe request fail with `error`.
    #[must_use]
    pub fn rejecting_unsubscribe(self, error: PlatformError) -> Self {
        self.lock().unsubscribe_error = Some(error);
        self
    }

    /// Makes every current-subscription query fail with `error`.
    #[must_use]
    pub fn failing_query(self, error: PlatformError) -> Self {
        self.lock().query_error = Some(error);
        self
    }

    /// Changes the notification permission, as a user would in site settings.
    pub fn set_permission(&self, permission: Permission) {
        self.lock().permission = permission;
    }

    /// Returns the active subscription, if any.
    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionRecord> {
        self.lock().subscription.clone()
    }

    /// Returns the options of the most recent subscribe request.
    #[must_use]
    pub fn last_options(&self) -> Option<SubscribeOptions> {
        self.lock().last_options.clone()
    }

    /// Number of subscribe requests received.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }
}

#[async_trait]
impl PushManager for SimulatedPushManager {
    async fn subscribe(
        &self,
        options: &SubscribeOptions,
    ) -> Result<SubscriptionRecord, PlatformError> {
        let mut state = self.lock();
        state.subscribe_calls += 1;
        state.last_options = Some(options.clone());

        if state.permission == Permission::Denied {
            return Err(PlatformError::new(
                "NotAllowedError",
                "Registration failed - permission denied",
            ));
        }
        if let Some(err) = &state.subscribe_error {
            return Err(err.clone());
        }
        if !options.user_visible_only {
            return Err(PlatformError::new(
                "NotAllowedError",
                "Push subscriptions must be user visible",
            ));
        }

        state.permission = Permission::Granted;
        let record = state.subscription.clone().unwrap_or_else(|| SubscriptionRecord {
            endpoint: format!("{SIM_ENDPOINT}/{}", state.subscribe_calls),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: URL_SAFE_NO_PAD.encode(&options.application_server_key),
                auth: format!("sim-auth-{}", state.subscribe_calls),
            },
        });
        state.subscription = Some(record.clone());
        Ok(record)
    }

    async fn get_subscription(&self) -> Result<Option<SubscriptionRecord>, PlatformError> {
        let state = self.lock();
        if let Some(err) = &state.query_error {
            return Err(err.clone());
        }
        Ok(state.subscription.clone())
    }

    async fn unsubscribe(&self, subscription: &SubscriptionRecord) -> Result<bool, PlatformError> {
        let mut state = self.lock();
        if let Some(err) = &state.unsubscribe_error {
            return Err(err.clone());
        }
        match &state.subscription {
            Some(current) if current.endpoint == subscription.endpoint => {
                state.subscription = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn permission_state(&self) -> Permission {
        self.lock().permission
    }
}

/// Simulated registration provider handing out a shared push service.
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    supported: bool,
    registration_error: Option<PlatformError>,
    push: SimulatedPushManager,
}

impl SimulatedPlatform {
    /// Creates a supported platform around the given push service.
    #[must_use]
    pub const fn new(push: SimulatedPushManager) -> Self {
        Self {
            supported: true,
            registration_error: None,
            push,
        }
    }

    /// Creates a platform without worker or push support.
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(SimulatedPushManager::new())
        }
    }

    /// Makes worker registration fail with `error`.
    #[must_use]
    pub fn failing_registration(mut self, error: PlatformError) -> Self {
        self.registration_error = Some(error);
        self
    }

    /// Returns the shared push service.
    #[must_use]
    pub const fn push(&self) -> &SimulatedPushManager {
        &self.push
    }
}

#[async_trait]
impl RegistrationProvider for SimulatedPlatform {
    type Registration = SimulatedPushManager;

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn register(&self, script_url: &str) -> Result<Self::Registration, PlatformError> {
        if let Some(err) = &self.registration_error {
            return Err(err.clone());
        }
        log::debug!("Registered simulated worker {script_url}");
        Ok(self.push.clone())
    }
}
