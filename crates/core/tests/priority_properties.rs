//! Property tests for the instance renumbering and merge planning rules:
//! compaction always leaves a module's priorities dense and in the original
//! order, running it twice changes nothing, and a planned merge keeps every
//! destination instance under a distinct priority while the combined set
//! stays gap-free.

use fstop_core::{
    DestinationInstance, ModuleRegistry, StagedEntry, StagingBuffer, StaticModuleRegistry,
    plan_merge,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn test_registry() -> StaticModuleRegistry {
    let mut registry = StaticModuleRegistry::new();
    registry.register_multi("clarity", "Clarity");
    registry.register_multi("grain", "Grain");
    registry.register_multi("vignette", "Vignette");
    registry.register_single("basecurve", "Base curve");
    registry
}

fn operation() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["clarity", "grain", "vignette"])
}

fn instance_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["", "0", "soft", "strong", "edge"])
}

fn staged_entry() -> impl Strategy<Value = StagedEntry> {
    (operation(), 0i64..6, instance_name()).prop_map(|(operation, multi_priority, multi_name)| {
        StagedEntry {
            origin_num: 0,
            operation: operation.to_string(),
            module_version: 1,
            op_params: None,
            enabled: true,
            blendop_params: None,
            blendop_version: 1,
            multi_priority,
            multi_name: multi_name.to_string(),
        }
    })
}

fn staged_entries() -> impl Strategy<Value = Vec<StagedEntry>> {
    prop::collection::vec(staged_entry(), 0..12)
}

fn destination_groups() -> impl Strategy<Value = Vec<DestinationInstance>> {
    prop::collection::btree_map(
        operation().prop_map(str::to_string),
        (1usize..4, prop::collection::vec(instance_name(), 3)),
        0..3,
    )
    .prop_map(|modules| {
        let mut groups = Vec::new();
        let mut next_num = 0i64;
        for (operation, (count, names)) in modules {
            for priority in 0..count {
                groups.push(DestinationInstance {
                    operation: operation.clone(),
                    multi_priority: priority as i64,
                    multi_name: names[priority % names.len()].to_string(),
                    entry_nums: vec![next_num],
                });
                next_num += 1;
            }
        }
        groups
    })
}

proptest! {
    #[test]
    fn compaction_yields_dense_priorities_per_module(entries in staged_entries()) {
        let registry = test_registry();
        let mut buffer = StagingBuffer::new();
        for entry in entries {
            buffer.push(entry);
        }
        let before: Vec<StagedEntry> = buffer.entries().to_vec();

        buffer.compact_multi_priorities(&registry);

        let operations: BTreeSet<String> = before
            .iter()
            .map(|entry| entry.operation.clone())
            .collect();
        for operation in &operations {
            let mut indexes: Vec<usize> = (0..before.len())
                .filter(|&index| before[index].operation == *operation)
                .collect();
            // Stable by insertion order, so ties keep their relative order.
            indexes.sort_by_key(|&index| before[index].multi_priority);
            let assigned: Vec<i64> = indexes
                .iter()
                .map(|&index| buffer.entries()[index].multi_priority)
                .collect();
            let expected: Vec<i64> = (0..assigned.len() as i64).collect();
            prop_assert_eq!(assigned, expected);
        }
    }

    #[test]
    fn compaction_is_idempotent(entries in staged_entries()) {
        let registry = test_registry();
        let mut buffer = StagingBuffer::new();
        for entry in entries {
            buffer.push(entry);
        }

        buffer.compact_multi_priorities(&registry);
        let once = buffer.clone();
        let rewrites = buffer.compact_multi_priorities(&registry);

        prop_assert_eq!(rewrites, 0);
        prop_assert_eq!(buffer.entries(), once.entries());
    }

    #[test]
    fn merge_planning_keeps_instances_dense_and_distinct(
        entries in staged_entries(),
        destination in destination_groups(),
    ) {
        let registry = test_registry();
        let mut staging = StagingBuffer::new();
        for entry in entries {
            staging.push(entry);
        }
        staging.compact_multi_priorities(&registry);

        let plan = plan_merge(&staging, &destination, &registry);

        let staged_operations: BTreeSet<&str> = staging
            .entries()
            .iter()
            .map(|entry| entry.operation.as_str())
            .collect();
        for rewrite in &plan.rewrites {
            prop_assert!(staged_operations.contains(rewrite.operation.as_str()));
        }

        for operation in &staged_operations {
            let staged_priorities: BTreeSet<i64> = staging
                .entries()
                .iter()
                .filter(|entry| entry.operation == *operation)
                .map(|entry| entry.multi_priority)
                .collect();
            let staged_max = staged_priorities.iter().copied().max().unwrap_or(0);

            let mut survivors: Vec<(String, i64)> = Vec::new();
            for group in destination.iter().filter(|group| group.operation == *operation) {
                let assigned = plan
                    .rewrites
                    .iter()
                    .find(|rewrite| {
                        rewrite.operation == group.operation
                            && rewrite.old_multi_priority == group.multi_priority
                    })
                    .map(|rewrite| rewrite.new_multi_priority)
                    .unwrap_or(group.multi_priority);
                survivors.push((group.multi_name.clone(), assigned));
            }

            // Every destination instance survives under its own priority.
            let distinct: BTreeSet<i64> = survivors.iter().map(|&(_, priority)| priority).collect();
            prop_assert_eq!(distinct.len(), survivors.len());

            // Instances without a same-named staged counterpart are pushed
            // past the staged range; the union stays gap-free.
            let staged_names: Vec<&str> = staging
                .entries()
                .iter()
                .filter(|entry| entry.operation == *operation)
                .map(|entry| entry.multi_name.as_str())
                .collect();
            for (multi_name, assigned) in &survivors {
                if !staged_names.contains(&multi_name.as_str()) {
                    prop_assert!(*assigned > staged_max);
                }
            }

            let mut combined = staged_priorities;
            combined.extend(survivors.iter().map(|&(_, priority)| priority));
            let expected: BTreeSet<i64> = (0..combined.len() as i64).collect();
            prop_assert_eq!(combined, expected);
        }
    }
}
