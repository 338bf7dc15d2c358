//! In-memory record of descriptors read during this process.

use super::descriptor::PackageDescriptor;
use std::collections::HashMap;

/// Descriptors keyed by `<name>-<version>`. Later writes to a key win.
#[derive(Debug, Clone, Default)]
pub struct InstallRegistry {
    entries: HashMap<String, PackageDescriptor>,
}

impl InstallRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `descriptor` under its key, returning the entry it replaced.
    pub fn register(&mut self, descriptor: PackageDescriptor) -> Option<PackageDescriptor> {
        self.entries.insert(descriptor.key(), descriptor)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PackageDescriptor> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageDescriptor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
