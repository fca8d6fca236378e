//! Push subscription controller.
//!
//! Keeps a single "is subscribed" flag consistent with the push service and
//! mirrors it into the push button and the subscription debug panel.
//!
//! Ordering on every path: the flag only changes after the platform call has
//! resolved, and the button is only re-enabled after the flag has changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::key::decode_application_key;
use crate::platform::{
    Permission, PushManager, RegistrationProvider, SubscribeOptions, SubscriptionRecord,
};
use crate::view::{
    LABEL_BLOCKED, LABEL_DISABLE, LABEL_ENABLE, LABEL_NOT_SUPPORTED, LABEL_UNAVAILABLE, PushView,
};

/// Script registered as the background worker.
pub const SERVICE_WORKER_SCRIPT: &str = "sw.js";

/// Where the controller is in the subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// The platform has no worker or push support.
    Unsupported,
    /// Worker registration failed.
    Unavailable,
    /// Notification permission is denied.
    Blocked,
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

/// Outcome of [`SubscriptionController::start`].
pub enum Startup<M: PushManager, V: PushView> {
    /// Registration succeeded and the UI reflects the current subscription.
    Ready(SubscriptionController<M, V>),
    /// Push is not supported; the button has been disabled.
    Unsupported,
    /// Registration failed; the button shows that push is unavailable.
    Unavailable(Error),
}

impl<M: PushManager, V: PushView> Startup<M, V> {
    /// Returns the terminal or initial state reached at startup.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        match self {
            Self::Ready(controller) => controller.state(),
            Self::Unsupported => ControllerState::Unsupported,
            Self::Unavailable(_) => ControllerState::Unavailable,
        }
    }
}

#[derive(Debug)]
struct Inner {
    is_subscribed: bool,
    state: ControllerState,
}

/// Clears the in-flight flag when a subscription change finishes.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the subscription state for one page.
pub struct SubscriptionController<M: PushManager, V: PushView> {
    registration: M,
    view: V,
    application_server_key: String,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
}

impl<M: PushManager, V: PushView> SubscriptionController<M, V> {
    /// Runs the startup sequence: support check, worker registration and
    /// [`initialize`](Self::initialize).
    ///
    /// Unsupported platforms and failed registrations leave the button
    /// disabled with an explanatory label instead of an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial subscription query fails.
    pub async fn start<P>(
        provider: &P,
        view: V,
        application_server_key: impl Into<String>,
    ) -> Result<Startup<M, V>>
    where
        P: RegistrationProvider<Registration = M>,
    {
        if !provider.is_supported() {
            log::warn!("Push messaging is not supported");
            view.set_button(LABEL_NOT_SUPPORTED, true);
            return Ok(Startup::Unsupported);
        }
        log::info!("Service worker and push are supported");

        match provider.register(SERVICE_WORKER_SCRIPT).await {
            Ok(registration) => {
                log::info!("Service worker is registered");
                let controller =
                    Self::initialize(registration, view, application_server_key).await?;
                Ok(Startup::Ready(controller))
            }
            Err(e) => {
                let err = Error::RegistrationFailed(e);
                log::error!("{err}");
                view.set_button(LABEL_UNAVAILABLE, true);
                view.hide_subscription();
                Ok(Startup::Unavailable(err))
            }
        }
    }

    /// Takes ownership of the registration handle, reads the current
    /// subscription and brings the button up to date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if the push service cannot report the current
    /// subscription.
    pub async fn initialize(
        registration: M,
        view: V,
        application_server_key: impl Into<String>,
    ) -> Result<Self> {
        let current = registration.get_subscription().await.map_err(Error::Query)?;
        let is_subscribed = current.is_some();
        if is_subscribed {
            log::info!("User IS subscribed");
        } else {
            log::info!("User is NOT subscribed");
        }

        let controller = Self {
            registration,
            view,
            application_server_key: application_server_key.into(),
            inner: Mutex::new(Inner {
                is_subscribed,
                state: ControllerState::Unsubscribed,
            }),
            in_flight: AtomicBool::new(false),
        };
        controller.refresh_button_state().await?;
        Ok(controller)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ControllerState) {
        self.lock().state = state;
    }

    /// Whether the user currently holds a push subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.lock().is_subscribed
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    fn begin(&self) -> Result<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(InFlightGuard(&self.in_flight))
    }

    /// Handles a click on the push button.
    ///
    /// The button is disabled as soon as the click is accepted and stays
    /// disabled until the resulting subscribe or unsubscribe has settled. A
    /// click while another change is in flight leaves the view untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a subscription change is already in flight,
    /// otherwise propagates errors from [`subscribe`](Self::subscribe) or
    /// [`unsubscribe`](Self::unsubscribe).
    pub async fn on_button_activated(&self) -> Result<()> {
        let guard = self.begin()?;
        self.view.set_button_disabled(true);
        if self.is_subscribed() {
            self.unsubscribe_with(guard).await
        } else {
            self.subscribe_with(guard).await
        }
    }

    /// Subscribes the user with the application server key.
    ///
    /// A rejected subscription is logged and the UI reverts; it is not
    /// returned as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another subscription change is in flight and
    /// [`Error::Decode`] if the application server key is malformed.
    pub async fn subscribe(&self) -> Result<()> {
        let guard = self.begin()?;
        self.subscribe_with(guard).await
    }

    async fn subscribe_with(&self, _guard: InFlightGuard<'_>) -> Result<()> {
        let key = match decode_application_key(&self.application_server_key) {
            Ok(key) => key,
            Err(e) => {
                log::error!("{e}");
                self.refresh_button_state().await?;
                return Err(e);
            }
        };

        self.set_state(ControllerState::Subscribing);
        match self
            .registration
            .subscribe(&SubscribeOptions::user_visible(key))
            .await
        {
            Ok(subscription) => {
                log::info!("User is subscribed.");
                self.publish_subscription(Some(&subscription))?;
                self.lock().is_subscribed = true;
            }
            Err(e) => {
                log::error!("{}", Error::SubscriptionRejected(e));
            }
        }

        self.refresh_button_state().await
    }

    /// Cancels the current subscription.
    ///
    /// A subscription that has already disappeared counts as success. A
    /// failed cancellation is logged and the UI reverts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another subscription change is in flight.
    pub async fn unsubscribe(&self) -> Result<()> {
        let guard = self.begin()?;
        self.unsubscribe_with(guard).await
    }

    async fn unsubscribe_with(&self, _guard: InFlightGuard<'_>) -> Result<()> {
        self.set_state(ControllerState::Unsubscribing);

        let result = match self.registration.get_subscription().await {
            Ok(Some(subscription)) => self.registration.unsubscribe(&subscription).await,
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };

        match result {
            Ok(removed) => {
                if !removed {
                    log::info!("No active subscription to remove");
                }
                log::info!("User is unsubscribed.");
                self.publish_subscription(None)?;
                self.lock().is_subscribed = false;
            }
            Err(e) => {
                log::error!("{}", Error::UnsubscribeFailed(e));
            }
        }

        self.refresh_button_state().await
    }

    /// Shows the subscription in the debug panel, or hides the panel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the subscription cannot be serialized.
    pub fn publish_subscription(&self, subscription: Option<&SubscriptionRecord>) -> Result<()> {
        // TODO: forward the record to an application server once one exists.
        match subscription {
            Some(subscription) => {
                let json = serde_json::to_string(subscription)?;
                self.view.show_subscription(&json);
            }
            None => self.view.hide_subscription(),
        }
        Ok(())
    }

    /// Brings the button label and enabled state in line with the current
    /// permission and subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] only if clearing the panel fails.
    pub async fn refresh_button_state(&self) -> Result<()> {
        if self.registration.permission_state().await == Permission::Denied {
            self.set_state(ControllerState::Blocked);
            self.view.set_button(LABEL_BLOCKED, true);
            return self.publish_subscription(None);
        }

        let label = {
            let mut inner = self.lock();
            if inner.is_subscribed {
                inner.state = ControllerState::Subscribed;
                LABEL_DISABLE
            } else {
                inner.state = ControllerState::Unsubscribed;
                LABEL_ENABLE
            }
        };
        self.view.set_button(label, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll, Waker};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::key::DEFAULT_APPLICATION_SERVER_KEY;
    use crate::platform::{PlatformError, SubscriptionKeys};
    use crate::sim::{SimulatedPlatform, SimulatedPushManager};
    use crate::view::{MemoryView, ViewSnapshot};

    type TestController = SubscriptionController<SimulatedPushManager, Arc<MemoryView>>;

    fn record() -> SubscriptionRecord {
        SubscriptionRecord {
            endpoint: "https://push.example.test/send/existing".to_string(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: "BNcRdreALRFX".to_string(),
                auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            },
        }
    }

    async fn controller(push: SimulatedPushManager) -> (TestController, Arc<MemoryView>) {
        let view = Arc::new(MemoryView::new());
        let controller =
            SubscriptionController::initialize(push, Arc::clone(&view), DEFAULT_APPLICATION_SERVER_KEY)
                .await
                .unwrap();
        (controller, view)
    }

    // =========================================================================
    // Startup
    // =========================================================================

    #[tokio::test]
    async fn startup_without_subscription_shows_enable() {
        let (controller, view) = controller(SimulatedPushManager::new()).await;
        assert!(!controller.is_subscribed());
        assert_eq!(controller.state(), ControllerState::Unsubscribed);
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_ENABLE);
        assert!(!snap.button.disabled);
        assert!(!snap.panel.visible);
    }

    #[tokio::test]
    async fn startup_with_subscription_shows_disable() {
        let push = SimulatedPushManager::new()
            .with_permission(Permission::Granted)
            .with_subscription(record());
        let (controller, view) = controller(push).await;
        assert!(controller.is_subscribed());
        assert_eq!(view.snapshot().button.label, LABEL_DISABLE);
    }

    #[tokio::test]
    async fn start_on_unsupported_platform() {
        let view = Arc::new(MemoryView::new());
        let startup = SubscriptionController::start(
            &SimulatedPlatform::unsupported(),
            Arc::clone(&view),
            DEFAULT_APPLICATION_SERVER_KEY,
        )
        .await
        .unwrap();
        assert_eq!(startup.state(), ControllerState::Unsupported);
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_NOT_SUPPORTED);
        assert!(snap.button.disabled);
    }

    #[tokio::test]
    async fn start_with_failed_registration_is_visible() {
        let view = Arc::new(MemoryView::new());
        let platform = SimulatedPlatform::new(SimulatedPushManager::new())
            .failing_registration(PlatformError::new("SecurityError", "insecure origin"));
        let startup = SubscriptionController::start(&platform, Arc::clone(&view), "")
            .await
            .unwrap();
        assert!(matches!(
            startup,
            Startup::Unavailable(Error::RegistrationFailed(_))
        ));
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_UNAVAILABLE);
        assert!(snap.button.disabled);
    }

    #[tokio::test]
    async fn initialize_reports_failed_query() {
        let push = SimulatedPushManager::new()
            .failing_query(PlatformError::new("InvalidStateError", "no active worker"));
        let result = SubscriptionController::initialize(
            push,
            Arc::new(MemoryView::new()),
            DEFAULT_APPLICATION_SERVER_KEY,
        )
        .await;
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn start_propagates_failed_query() {
        let push = SimulatedPushManager::new()
            .failing_query(PlatformError::new("InvalidStateError", "no active worker"));
        let platform = SimulatedPlatform::new(push);
        let result = SubscriptionController::start(
            &platform,
            Arc::new(MemoryView::new()),
            DEFAULT_APPLICATION_SERVER_KEY,
        )
        .await;
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn start_registers_and_initializes() {
        let view = Arc::new(MemoryView::new());
        let platform = SimulatedPlatform::new(SimulatedPushManager::new());
        let startup =
            SubscriptionController::start(&platform, Arc::clone(&view), DEFAULT_APPLICATION_SERVER_KEY)
                .await
                .unwrap();
        assert_eq!(startup.state(), ControllerState::Unsubscribed);
        assert_eq!(view.snapshot().button.label, LABEL_ENABLE);
    }

    // =========================================================================
    // Button state
    // =========================================================================

    #[tokio::test]
    async fn denied_permission_blocks_regardless_of_subscription() {
        for subscribed in [false, true] {
            let mut push = SimulatedPushManager::new();
            if subscribed {
                push = push.with_subscription(record());
            }
            let (controller, view) = controller(push.clone()).await;
            view.show_subscription("{}");

            push.set_permission(Permission::Denied);
            controller.refresh_button_state().await.unwrap();

            let snap = view.snapshot();
            assert_eq!(snap.button.label, LABEL_BLOCKED);
            assert!(snap.button.disabled);
            assert!(!snap.panel.visible);
            assert_eq!(controller.state(), ControllerState::Blocked);
        }
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let (controller, view) = controller(SimulatedPushManager::new()).await;
        controller.refresh_button_state().await.unwrap();
        let first = view.snapshot();
        controller.refresh_button_state().await.unwrap();
        assert_eq!(view.snapshot(), first);
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    #[tokio::test]
    async fn subscribe_success_shows_subscription() {
        let push = SimulatedPushManager::new();
        let (controller, view) = controller(push.clone()).await;

        controller.on_button_activated().await.unwrap();

        assert!(controller.is_subscribed());
        assert_eq!(controller.state(), ControllerState::Subscribed);
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_DISABLE);
        assert!(!snap.button.disabled);
        assert!(snap.panel.visible);
        let expected = serde_json::to_string(&push.subscription().unwrap()).unwrap();
        assert_eq!(snap.panel.json, expected);
    }

    #[tokio::test]
    async fn subscribe_sends_user_visible_decoded_key() {
        let push = SimulatedPushManager::new();
        let (controller, _view) = controller(push.clone()).await;
        controller.subscribe().await.unwrap();

        let options = push.last_options().unwrap();
        assert!(options.user_visible_only);
        assert_eq!(
            options.application_server_key,
            decode_application_key(DEFAULT_APPLICATION_SERVER_KEY).unwrap()
        );
    }

    #[tokio::test]
    async fn subscribe_rejection_reverts_ui() {
        let push = SimulatedPushManager::new()
            .rejecting_subscribe(PlatformError::new("AbortError", "push service unreachable"));
        let (controller, view) = controller(push).await;

        controller.on_button_activated().await.unwrap();

        assert!(!controller.is_subscribed());
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_ENABLE);
        assert!(!snap.button.disabled);
        assert!(!snap.panel.visible);
    }

    #[tokio::test]
    async fn permission_denied_at_prompt_blocks() {
        let push = SimulatedPushManager::new();
        let (controller, view) = controller(push.clone()).await;
        push.set_permission(Permission::Denied);

        controller.on_button_activated().await.unwrap();

        assert!(!controller.is_subscribed());
        assert_eq!(view.snapshot().button.label, LABEL_BLOCKED);
        assert_eq!(controller.state(), ControllerState::Blocked);
    }

    #[tokio::test]
    async fn malformed_key_fails_subscribe_and_restores_button() {
        let push = SimulatedPushManager::new();
        let view = Arc::new(MemoryView::new());
        let controller = SubscriptionController::initialize(push.clone(), Arc::clone(&view), "%%%")
            .await
            .unwrap();

        let err = controller.on_button_activated().await.unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(push.subscribe_calls(), 0);
        assert!(!view.snapshot().button.disabled);
    }

    /// Push service whose subscribe call waits until released.
    struct GatedPush {
        inner: SimulatedPushManager,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl PushManager for GatedPush {
        async fn subscribe(
            &self,
            options: &SubscribeOptions,
        ) -> std::result::Result<SubscriptionRecord, PlatformError> {
            self.gate.notified().await;
            self.inner.subscribe(options).await
        }

        async fn get_subscription(
            &self,
        ) -> std::result::Result<Option<SubscriptionRecord>, PlatformError> {
            self.inner.get_subscription().await
        }

        async fn unsubscribe(
            &self,
            subscription: &SubscriptionRecord,
        ) -> std::result::Result<bool, PlatformError> {
            self.inner.unsubscribe(subscription).await
        }

        async fn permission_state(&self) -> Permission {
            self.inner.permission_state().await
        }
    }

    #[tokio::test]
    async fn concurrent_subscribe_is_refused() {
        let inner = SimulatedPushManager::new();
        let gate = Arc::new(Notify::new());
        let view = Arc::new(MemoryView::new());
        let push = GatedPush {
            inner: inner.clone(),
            gate: Arc::clone(&gate),
        };
        let controller = SubscriptionController::initialize(push, Arc::clone(&view), DEFAULT_APPLICATION_SERVER_KEY)
            .await
            .unwrap();

        let (first, second) = tokio::join!(controller.on_button_activated(), async {
            while controller.state() != ControllerState::Subscribing {
                tokio::task::yield_now().await;
            }
            assert!(view.snapshot().button.disabled);
            let result = controller.subscribe().await;
            gate.notify_one();
            result
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy)));
        assert_eq!(inner.subscribe_calls(), 1);
        assert!(controller.is_subscribed());
        assert!(!view.snapshot().button.disabled);
    }

    /// View that runs a callback the first time the button is re-enabled,
    /// while the operation that re-enabled it is still finishing.
    #[derive(Default)]
    struct ReentrantView {
        inner: MemoryView,
        on_enable: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl ReentrantView {
        fn snapshot(&self) -> ViewSnapshot {
            self.inner.snapshot()
        }
    }

    impl PushView for ReentrantView {
        fn set_button(&self, label: &str, disabled: bool) {
            self.inner.set_button(label, disabled);
            if !disabled {
                let hook = self.on_enable.lock().unwrap().take();
                if let Some(hook) = hook {
                    hook();
                }
            }
        }

        fn set_button_disabled(&self, disabled: bool) {
            self.inner.set_button_disabled(disabled);
        }

        fn show_subscription(&self, json: &str) {
            self.inner.show_subscription(json);
        }

        fn hide_subscription(&self) {
            self.inner.hide_subscription();
        }
    }

    #[tokio::test]
    async fn click_during_settling_keeps_button_enabled() {
        let view = Arc::new(ReentrantView::default());
        let controller = Arc::new(
            SubscriptionController::initialize(
                SimulatedPushManager::new(),
                Arc::clone(&view),
                DEFAULT_APPLICATION_SERVER_KEY,
            )
            .await
            .unwrap(),
        );

        let second: Arc<Mutex<Option<Poll<Result<()>>>>> = Arc::default();
        let weak = Arc::downgrade(&controller);
        let second_result = Arc::clone(&second);
        *view.on_enable.lock().unwrap() = Some(Box::new(move || {
            let controller = weak.upgrade().unwrap();
            let mut click = pin!(controller.on_button_activated());
            let poll = click.as_mut().poll(&mut Context::from_waker(Waker::noop()));
            *second_result.lock().unwrap() = Some(poll);
        }));

        controller.on_button_activated().await.unwrap();

        assert!(matches!(
            second.lock().unwrap().take(),
            Some(Poll::Ready(Err(Error::Busy)))
        ));
        assert!(controller.is_subscribed());
        assert_eq!(controller.state(), ControllerState::Subscribed);
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_DISABLE);
        assert!(!snap.button.disabled);
    }

    // =========================================================================
    // Unsubscribe
    // =========================================================================

    #[tokio::test]
    async fn unsubscribe_returns_to_enable() {
        let push = SimulatedPushManager::new().with_subscription(record());
        let (controller, view) = controller(push.clone()).await;

        controller.on_button_activated().await.unwrap();

        assert!(!controller.is_subscribed());
        assert!(push.subscription().is_none());
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_ENABLE);
        assert!(!snap.button.disabled);
        assert!(!snap.panel.visible);
    }

    #[tokio::test]
    async fn unsubscribe_when_subscription_already_gone() {
        let push = SimulatedPushManager::new().with_subscription(record());
        let (controller, view) = controller(push.clone()).await;
        view.show_subscription("{}");
        // Expired or removed elsewhere
        assert!(push.unsubscribe(&record()).await.unwrap());

        controller.on_button_activated().await.unwrap();

        assert!(!controller.is_subscribed());
        let snap = view.snapshot();
        assert_eq!(snap.button.label, LABEL_ENABLE);
        assert!(!snap.button.disabled);
        assert!(!snap.panel.visible);
    }

    #[tokio::test]
    async fn unsubscribe_failure_keeps_subscription() {
        let push = SimulatedPushManager::new()
            .with_subscription(record())
            .rejecting_unsubscribe(PlatformError::new("NetworkError", "offline"));
        let (controller, view) = controller(push.clone()).await;

        controller.unsubscribe().await.unwrap();

        assert!(controller.is_subscribed());
        assert!(push.subscription().is_some());
        assert_eq!(view.snapshot().button.label, LABEL_DISABLE);
        assert!(!view.snapshot().button.disabled);
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_round_trip() {
        let push = SimulatedPushManager::new();
        let (controller, view) = controller(push).await;

        controller.on_button_activated().await.unwrap();
        assert_eq!(view.snapshot().button.label, LABEL_DISABLE);
        controller.on_button_activated().await.unwrap();
        assert_eq!(view.snapshot().button.label, LABEL_ENABLE);
        assert_eq!(controller.state(), ControllerState::Unsubscribed);
    }
}
