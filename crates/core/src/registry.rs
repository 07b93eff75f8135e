#![forbid(unsafe_code)]

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub supports_multi_instance: bool,
    pub localized_name: String,
}

/// Module metadata consulted when renumbering instances and when rendering
/// history items. Modules the registry does not know are treated as
/// multi-capable and keep their raw operation name.
pub trait ModuleRegistry {
    fn lookup(&self, operation: &str) -> Option<ModuleInfo>;

    fn supports_multi_instance(&self, operation: &str) -> bool {
        self.lookup(operation)
            .is_none_or(|info| info.supports_multi_instance)
    }

    fn localized_name(&self, operation: &str) -> String {
        match self.lookup(operation) {
            Some(info) => info.localized_name,
            None => operation.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticModuleRegistry {
    modules: BTreeMap<String, ModuleInfo>,
}

impl StaticModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: impl Into<String>, info: ModuleInfo) {
        self.modules.insert(operation.into(), info);
    }

    pub fn register_multi(&mut self, operation: &str, localized_name: &str) {
        self.register(
            operation,
            ModuleInfo {
                supports_multi_instance: true,
                localized_name: localized_name.to_string(),
            },
        );
    }

    pub fn register_single(&mut self, operation: &str, localized_name: &str) {
        self.register(
            operation,
            ModuleInfo {
                supports_multi_instance: false,
                localized_name: localized_name.to_string(),
            },
        );
    }
}

impl ModuleRegistry for StaticModuleRegistry {
    fn lookup(&self, operation: &str) -> Option<ModuleInfo> {
        self.modules.get(operation).cloned()
    }
}
