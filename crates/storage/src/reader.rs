#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError};
use fstop_core::{ImageId, ModuleRegistry, display_label};

/// One line of the history view: the winning edit of one module instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryItem {
    pub num: i64,
    pub operation: String,
    pub name: String,
    pub multi_name: String,
}

impl SqliteStore {
    /// The currently applied instances, newest first, one item per
    /// `(operation, multi_priority)` pair. With `only_enabled` the disabled
    /// instances are dropped and the on/off marker is left off the name.
    pub fn history_items(
        &self,
        image: ImageId,
        only_enabled: bool,
        registry: &dyn ModuleRegistry,
    ) -> Result<Vec<HistoryItem>, StoreError> {
        let mut items = Vec::new();
        for entry in self.history_active_entries(image)? {
            if only_enabled && !entry.enabled {
                continue;
            }
            let name = display_label(
                &registry.localized_name(&entry.operation),
                &entry.multi_name,
                entry.enabled,
                !only_enabled,
            );
            items.push(HistoryItem {
                num: entry.num,
                operation: entry.operation,
                name,
                multi_name: entry.multi_name,
            });
        }
        Ok(items)
    }

    /// Every entry of the stack as text, newest first, one line per row.
    pub fn history_items_as_string(
        &self,
        image: ImageId,
        registry: &dyn ModuleRegistry,
    ) -> Result<String, StoreError> {
        let lines: Vec<String> = self
            .history_entries(image)?
            .iter()
            .rev()
            .map(|entry| {
                display_label(
                    &registry.localized_name(&entry.operation),
                    &entry.multi_name,
                    entry.enabled,
                    true,
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
