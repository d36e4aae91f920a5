//! Dependency resolution.
//!
//! Kahn's algorithm over a subset of the registry. Among modules that are
//! ready at the same time, lower priority loads first and ties fall back to
//! the module ID, so identical input always yields identical output.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::warn;

use crate::ModuleId;
use crate::error::{ModuleError, ModuleResult};
use crate::registry::ModuleRegistry;

/// Order `ids` so every module comes after the dependencies it shares with
/// the set.
///
/// Dependencies outside `ids` are ignored.
///
/// # Errors
///
/// Returns [`ModuleError::NotFound`] if an ID is not registered, or
/// [`ModuleError::CircularDependency`] naming every module that could not be
/// ordered.
pub fn topological_order(
    registry: &ModuleRegistry,
    ids: &BTreeSet<ModuleId>,
) -> ModuleResult<Vec<ModuleId>> {
    let mut in_degree: BTreeMap<&ModuleId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&ModuleId, Vec<&ModuleId>> = BTreeMap::new();
    let mut priorities: BTreeMap<&ModuleId, i32> = BTreeMap::new();

    for id in ids {
        let descriptor = registry.require(id)?;
        priorities.insert(id, descriptor.priority);
        let degree = in_degree.entry(id).or_insert(0);
        for dep in &descriptor.dependencies {
            if let Some(dep) = ids.get(dep) {
                *degree = degree.saturating_add(1);
                dependents.entry(dep).or_default().push(id);
            }
        }
    }

    let priority_of = |id: &ModuleId| priorities.get(id).copied().unwrap_or_default();

    let mut ready: BinaryHeap<Reverse<(i32, &ModuleId)>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse((priority_of(*id), *id)))
        .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id.clone());
        for dependent in dependents.get(id).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(Reverse((priority_of(*dependent), *dependent)));
                }
            }
        }
    }

    if order.len() < ids.len() {
        let placed: BTreeSet<&ModuleId> = order.iter().collect();
        let modules: Vec<ModuleId> = ids
            .iter()
            .filter(|id| !placed.contains(id))
            .cloned()
            .collect();
        warn!(modules = ?modules, "Circular dependency detected");
        return Err(ModuleError::CircularDependency { modules });
    }

    Ok(order)
}

/// Order `ids` so every module comes before the dependencies it shares with
/// the set. Used for unloading.
///
/// # Errors
///
/// Same as [`topological_order`].
pub fn unload_order(
    registry: &ModuleRegistry,
    ids: &BTreeSet<ModuleId>,
) -> ModuleResult<Vec<ModuleId>> {
    let mut order = topological_order(registry, ids)?;
    order.reverse();
    Ok(order)
}

/// `roots` plus every module they transitively depend on.
///
/// # Errors
///
/// Returns [`ModuleError::NotFound`] for an unregistered root and
/// [`ModuleError::UnknownDependency`] for an unregistered dependency.
pub fn dependency_closure(
    registry: &ModuleRegistry,
    roots: &BTreeSet<ModuleId>,
) -> ModuleResult<BTreeSet<ModuleId>> {
    let mut closure = BTreeSet::new();
    let mut stack: Vec<ModuleId> = Vec::new();

    for root in roots {
        registry.require(root)?;
        stack.push(root.clone());
    }

    while let Some(id) = stack.pop() {
        if closure.contains(&id) {
            continue;
        }
        let descriptor = registry.require(&id)?;
        for dep in &descriptor.dependencies {
            if !registry.contains(dep) {
                return Err(ModuleError::UnknownDependency {
                    module_id: id.clone(),
                    dependency: dep.clone(),
                });
            }
            if !closure.contains(dep) {
                stack.push(dep.clone());
            }
        }
        closure.insert(id);
    }

    Ok(closure)
}
