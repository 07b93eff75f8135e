#![forbid(unsafe_code)]

use crate::registry::ModuleRegistry;
use crate::staging::StagingBuffer;

/// One pre-merge instance group of the destination stack: every row that
/// shares `(operation, multi_priority)`, with the `multi_name` of the row
/// that wins the group (highest `num`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationInstance {
    pub operation: String,
    pub multi_priority: i64,
    pub multi_name: String,
    pub entry_nums: Vec<i64>,
}

/// Moves every destination row listed in `entry_nums` from
/// `old_multi_priority` to `new_multi_priority`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityRewrite {
    pub operation: String,
    pub entry_nums: Vec<i64>,
    pub old_multi_priority: i64,
    pub new_multi_priority: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub rewrites: Vec<PriorityRewrite>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }
}

/// Reconciles a staged set against the destination's existing instances.
///
/// Per destination group of a module that is about to be pasted: a staged
/// entry with the same `(operation, multi_name)` replaces the group in
/// place, so the group adopts the staged priority and the staged entry is
/// consumed; a group without a counterpart survives and is renumbered one
/// past the staged maximum. Groups of modules absent from the staged set and
/// groups of single-instance modules are left alone.
///
/// `destination` must hold the pre-merge groups in ascending
/// `(operation, multi_priority)` order, and the staged priorities must be
/// compacted already; the resulting priorities are then dense per module.
pub fn plan_merge(
    staging: &StagingBuffer,
    destination: &[DestinationInstance],
    registry: &dyn ModuleRegistry,
) -> MergePlan {
    let mut consumed = vec![false; staging.len()];
    let mut rewrites = Vec::new();
    let mut current_operation: Option<&str> = None;
    let mut next_priority = 0i64;

    for group in destination {
        if !registry.supports_multi_instance(&group.operation) {
            continue;
        }
        let Some(staged_max) = max_staged_priority(staging, &group.operation) else {
            continue;
        };
        if current_operation != Some(group.operation.as_str()) {
            current_operation = Some(group.operation.as_str());
            next_priority = staged_max;
        }

        let matched = staging
            .entries()
            .iter()
            .enumerate()
            .find(|(index, entry)| {
                !consumed[*index]
                    && entry.operation == group.operation
                    && entry.multi_name == group.multi_name
            })
            .map(|(index, entry)| (index, entry.multi_priority));

        let new_priority = match matched {
            Some((index, staged_priority)) => {
                consumed[index] = true;
                staged_priority
            }
            None => {
                // A miss advances the base before later groups of the same
                // module are seen, so consecutive misses drift upward from
                // the staged maximum. The result stays dense; continuity
                // with the pre-merge values is not kept.
                next_priority += 1;
                next_priority
            }
        };

        if new_priority != group.multi_priority {
            rewrites.push(PriorityRewrite {
                operation: group.operation.clone(),
                entry_nums: group.entry_nums.clone(),
                old_multi_priority: group.multi_priority,
                new_multi_priority: new_priority,
            });
        }
    }

    MergePlan { rewrites }
}

fn max_staged_priority(staging: &StagingBuffer, operation: &str) -> Option<i64> {
    staging
        .entries()
        .iter()
        .filter(|entry| entry.operation == operation)
        .map(|entry| entry.multi_priority)
        .max()
}
