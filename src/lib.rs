//! push-codelab - Subscribe a web page to push notifications.
//!
//! The library models the browser side of a push subscription: a
//! [`SubscriptionController`] keeps the page's "is subscribed" state in sync
//! with the push service and drives a button and a debug panel through a
//! [`PushView`]. Platform capabilities are reached through the
//! [`RegistrationProvider`] and [`PushManager`] traits.
//!
//! The `server` feature adds a static asset server for the page itself.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use push_codelab::{
//!     DEFAULT_APPLICATION_SERVER_KEY, MemoryView, SimulatedPlatform, SimulatedPushManager,
//!     Startup, SubscriptionController,
//! };
//!
//! # async fn example() -> push_codelab::Result<()> {
//! let platform = SimulatedPlatform::new(SimulatedPushManager::new());
//! let view = Arc::new(MemoryView::new());
//!
//! let startup =
//!     SubscriptionController::start(&platform, Arc::clone(&view), DEFAULT_APPLICATION_SERVER_KEY)
//!         .await?;
//! if let Startup::Ready(controller) = startup {
//!     controller.on_button_activated().await?;
//!     println!("{}", view.snapshot().button.label);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod controller;
pub mod error;
pub mod key;
pub mod platform;
#[cfg(feature = "server")]
pub mod server;
pub mod sim;
pub mod view;

// Re-export main types for convenience
pub use config::{AppConfig, PushConfig, ServerConfig};
pub use controller::{ControllerState, Startup, SubscriptionController};
pub use error::{Error, Result};
pub use key::{DEFAULT_APPLICATION_SERVER_KEY, decode_application_key, padding_len};
pub use platform::{
    Permission, PlatformError, PushManager, RegistrationProvider, SubscribeOptions,
    SubscriptionKeys, SubscriptionRecord,
};
pub use sim::{SimulatedPlatform, SimulatedPushManager};
pub use view::{MemoryView, PushView, ViewSnapshot};
