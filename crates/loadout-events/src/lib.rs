//! Loadout Events - Event bus for the loadout module manager.
//!
//! This crate provides:
//! - Event types for profile switches and module lifecycle
//! - Broadcast-based event bus for async subscribers
//!
//! # Example
//!
//! ```rust
//! use loadout_events::{EventBus, EventMetadata, LoadoutEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(LoadoutEvent::ModuleUnloaded {
//!     metadata: EventMetadata::new("loader"),
//!     module_id: "git".to_string(),
//!     clean: true,
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "module_unloaded");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, LoadoutEvent, ModuleLoadStatus};
