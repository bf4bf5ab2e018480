//! # Order Resolver
//!
//! Computes load order, with one algorithm per tier.
//!
//! ## Core
//! Depth-first topological sort over required and contract edges, with
//! three-colour marking. Optional dependencies do not constrain order. Roots
//! are visited by descending priority, then declaration order, so independent
//! subgraphs keep a stable order. Reaching a node that is still being visited
//! is a cycle, and no partial order is returned.
//!
//! ## User
//! Units named in the activation list come first, in list order. All other
//! units follow by descending priority, ties kept in declaration order.

use crate::capability::CapabilityIndex;
use crate::error::OrchestratorError;
use crate::model::{DependencyKind, UnitDescriptor};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::debug;

type UnitMap = IndexMap<String, UnitDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Unit names sorted by descending priority, stable on declaration order.
fn by_priority<'a>(units: impl Iterator<Item = &'a UnitDescriptor>) -> Vec<&'a UnitDescriptor> {
    let mut units: Vec<&UnitDescriptor> = units.collect();
    units.sort_by(|a, b| b.priority.cmp(&a.priority));
    units
}

/// Ordering edges of `unit`: the core units it must load after.
fn ordering_edges<'a>(
    unit: &'a UnitDescriptor,
    core: &UnitMap,
    index: &'a CapabilityIndex,
) -> Vec<&'a str> {
    let mut edges = Vec::new();
    for dep in unit.dependencies.iter().filter(|d| d.is_ordering()) {
        match dep.kind {
            DependencyKind::Required => {
                if core.contains_key(&dep.name) {
                    edges.push(dep.name.as_str());
                }
            }
            DependencyKind::Contract => {
                for provider in index.providers(&dep.name) {
                    if provider.unit != unit.name && core.contains_key(&provider.unit) {
                        edges.push(provider.unit.as_str());
                    }
                }
            }
            DependencyKind::Optional => {}
        }
    }
    edges
}

struct TopoSort<'a> {
    core: &'a UnitMap,
    index: &'a CapabilityIndex,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> TopoSort<'a> {
    fn visit(&mut self, name: &'a str) -> Result<(), OrchestratorError> {
        match self.marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<String> =
                    self.stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(name.to_string());
                return Err(OrchestratorError::Cycle {
                    unit: name.to_string(),
                    path,
                });
            }
            None => {}
        }

        let Some(unit) = self.core.get(name) else {
            return Ok(());
        };

        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        for dep in ordering_edges(unit, self.core, self.index) {
            self.visit(dep)?;
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Visited);
        self.order.push(name.to_string());
        Ok(())
    }
}

/// Resolves the core load order; every unit comes after all of its required
/// and contract dependencies.
pub fn resolve_core_order(
    core: &UnitMap,
    index: &CapabilityIndex,
) -> Result<Vec<String>, OrchestratorError> {
    let mut sort = TopoSort {
        core,
        index,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::with_capacity(core.len()),
    };

    for unit in by_priority(core.values()) {
        sort.visit(unit.name.as_str())?;
    }

    Ok(sort.order)
}

/// Resolves the user load order from the activation list and priorities.
pub fn resolve_user_order(user: &UnitMap, activation_list: &[String]) -> Vec<String> {
    let mut order = Vec::with_capacity(user.len());
    let mut placed: HashSet<&str> = HashSet::new();

    for name in activation_list {
        if !user.contains_key(name) {
            debug!(unit = %name, "Listed user unit not discovered, ignoring");
            continue;
        }
        if placed.insert(name.as_str()) {
            order.push(name.clone());
        }
    }

    let remaining = user.values().filter(|u| !placed.contains(u.name.as_str()));
    order.extend(by_priority(remaining).into_iter().map(|u| u.name.clone()));
    order
}
