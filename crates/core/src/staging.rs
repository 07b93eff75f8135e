#![forbid(unsafe_code)]

use crate::entry::StagedEntry;
use crate::registry::ModuleRegistry;

/// Transient holding area for the entries being transplanted by one copy
/// operation. Entries keep their insertion order; commit assigns stack
/// positions from that order.
#[derive(Clone, Debug, Default)]
pub struct StagingBuffer {
    entries: Vec<StagedEntry>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: StagedEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Renumbers `multi_priority` so every multi-capable module holds a
    /// gap-free `0..k` run, in the order of the original priorities. A
    /// caller that copies only some instances of a module would otherwise
    /// leave holes behind.
    ///
    /// Single-instance modules are never renumbered. Entries with equal
    /// priorities keep their insertion order. Returns the number of entries
    /// whose priority changed; an already-dense buffer is left untouched.
    pub fn compact_multi_priorities(&mut self, registry: &dyn ModuleRegistry) -> usize {
        let mut order: Vec<usize> = (0..self.entries.len())
            .filter(|&index| registry.supports_multi_instance(&self.entries[index].operation))
            .collect();
        order.sort_by(|&a, &b| {
            let left = &self.entries[a];
            let right = &self.entries[b];
            left.operation
                .cmp(&right.operation)
                .then(left.multi_priority.cmp(&right.multi_priority))
        });

        let mut changes: Vec<(usize, i64)> = Vec::new();
        let mut current_operation: Option<&str> = None;
        let mut next_priority = 0i64;
        for &index in &order {
            let entry = &self.entries[index];
            if current_operation != Some(entry.operation.as_str()) {
                current_operation = Some(entry.operation.as_str());
                next_priority = 0;
            }
            if entry.multi_priority != next_priority {
                changes.push((index, next_priority));
            }
            next_priority += 1;
        }

        let changed = changes.len();
        for (index, priority) in changes {
            self.entries[index].multi_priority = priority;
        }
        changed
    }
}
