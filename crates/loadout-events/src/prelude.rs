//! Prelude module - commonly used types for convenient import.
//!
//! Use `use loadout_events::prelude::*;` to import all essential types.

pub use crate::{EventBus, EventMetadata, EventReceiver, LoadoutEvent, ModuleLoadStatus};
