use std::collections::HashMap;
use std::sync::Arc;

use crate::Translator;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),
}

/// Vendor name -> provider table.
///
/// Filled once at startup and shared read-only afterwards. Registering a
/// name twice keeps the last provider.
#[derive(Default)]
pub struct VendorRegistry {
    vendors: HashMap<String, Arc<dyn Translator>>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the provider previously registered under the same name
    pub fn register(&mut self, vendor: Arc<dyn Translator>) -> Option<Arc<dyn Translator>> {
        let name = vendor.name().to_string();
        let previous = self.vendors.insert(name.clone(), vendor);
        if previous.is_some() {
            tracing::warn!(vendor = %name, "vendor registered twice, keeping the latest");
        } else {
            tracing::debug!(vendor = %name, "vendor registered");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Translator>, RegistryError> {
        self.vendors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownVendor(name.to_string()))
    }

    /// Vendor names in alphabetical order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vendors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn vendors(&self) -> impl Iterator<Item = &Arc<dyn Translator>> {
        self.vendors.values()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}
