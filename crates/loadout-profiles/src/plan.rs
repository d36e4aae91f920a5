//! Switch planning.

use std::collections::BTreeSet;

use loadout_modules::ModuleId;

/// Diff between the loaded module set and a target profile's set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchPlan {
    /// Loaded but not required by the target.
    pub to_unload: BTreeSet<ModuleId>,
    /// Required by the target but not loaded.
    pub to_load: BTreeSet<ModuleId>,
    /// Loaded and still required.
    pub to_keep: BTreeSet<ModuleId>,
}

impl SwitchPlan {
    /// Compute the plan for moving from `current` to `target`.
    #[must_use]
    pub fn compute(current: &BTreeSet<ModuleId>, target: &BTreeSet<ModuleId>) -> Self {
        Self {
            to_unload: current.difference(target).cloned().collect(),
            to_load: target.difference(current).cloned().collect(),
            to_keep: current.intersection(target).cloned().collect(),
        }
    }

    /// Whether nothing would change.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_unload.is_empty() && self.to_load.is_empty()
    }
}
