//! Prelude module - commonly used test utilities.

pub use crate::{
    ConcurrencyGauge, ContextLog, ContextRecord, Journal, JournalEntry, ModuleScript,
    RegistryBuilder, ScriptedModule, TestHost, config_from_toml, init_test_logging, module_id,
};
