//! Output sinks for the push button and the subscription debug panel.

use std::sync::{Arc, Mutex};

/// Button label while the user can subscribe.
pub const LABEL_ENABLE: &str = "Enable Push Messaging";
/// Button label while the user can unsubscribe.
pub const LABEL_DISABLE: &str = "Disable Push Messaging";
/// Button label once notifications are blocked.
pub const LABEL_BLOCKED: &str = "Push Messaging Blocked.";
/// Button label when the platform lacks push support.
pub const LABEL_NOT_SUPPORTED: &str = "Push Not Supported";
/// Button label when the worker could not be registered.
pub const LABEL_UNAVAILABLE: &str = "Push Unavailable";

/// Something that can display the push button and the subscription panel.
///
/// Implementations are pure output sinks; the controller never reads back.
pub trait PushView: Send + Sync {
    /// Sets the button label and whether it is disabled.
    fn set_button(&self, label: &str, disabled: bool);

    /// Only changes the disabled flag, keeping the current label.
    fn set_button_disabled(&self, disabled: bool);

    /// Shows the debug panel with the serialized subscription.
    fn show_subscription(&self, json: &str);

    /// Hides the debug panel.
    fn hide_subscription(&self);
}

impl<T: PushView + ?Sized> PushView for Arc<T> {
    fn set_button(&self, label: &str, disabled: bool) {
        (**self).set_button(label, disabled);
    }

    fn set_button_disabled(&self, disabled: bool) {
        (**self).set_button_disabled(disabled);
    }

    fn show_subscription(&self, json: &str) {
        (**self).show_subscription(json);
    }

    fn hide_subscription(&self) {
        (**self).hide_subscription();
    }
}

/// Current state of the push button.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub label: String,
    pub disabled: bool,
}

/// Current state of the subscription debug panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelState {
    pub json: String,
    pub visible: bool,
}

/// Snapshot of everything a [`MemoryView`] displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub button: ButtonState,
    pub panel: PanelState,
}

/// In-memory view that records what would be displayed.
#[derive(Debug, Default)]
pub struct MemoryView {
    state: Mutex<ViewSnapshot>,
}

impl MemoryView {
    /// Creates an empty view (blank, enabled button, hidden panel).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current display state.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut ViewSnapshot)) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state);
    }
}

impl PushView for MemoryView {
    fn set_button(&self, label: &str, disabled: bool) {
        self.update(|s| {
            s.button.label = label.to_string();
            s.button.disabled = disabled;
        });
    }

    fn set_button_disabled(&self, disabled: bool) {
        self.update(|s| s.button.disabled = disabled);
    }

    fn show_subscription(&self, json: &str) {
        self.update(|s| {
            s.panel.json = json.to_string();
            s.panel.visible = true;
        });
    }

    fn hide_subscription(&self) {
        self.update(|s| s.panel.visible = false);
    }
}
