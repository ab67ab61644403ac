use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::{Result, StacksError};

use super::drivers::{DemoDriver, NoIlsDriver, SampleDriver};
use super::IlsDriver;

/// Builds a driver from the catalog settings.
pub type DriverConstructor =
    Arc<dyn Fn(&CatalogConfig) -> Result<Box<dyn IlsDriver>> + Send + Sync>;

/// Maps driver identifiers to constructors. Identifiers are case-insensitive.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the drivers shipped with Stacks.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(NoIlsDriver::NAME, |config| {
            Ok(Box::new(NoIlsDriver::new(&config.no_ils)) as Box<dyn IlsDriver>)
        });
        registry.register(DemoDriver::NAME, |_| {
            Ok(Box::new(DemoDriver::new()) as Box<dyn IlsDriver>)
        });
        registry.register(SampleDriver::NAME, |_| {
            Ok(Box::new(SampleDriver::new()) as Box<dyn IlsDriver>)
        });
        registry
    }

    /// Register (or replace) a driver constructor.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&CatalogConfig) -> Result<Box<dyn IlsDriver>> + Send + Sync + 'static,
    {
        debug!(driver = %name, "registering ILS driver");
        self.constructors
            .insert(name.to_ascii_lowercase(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the named driver. Unknown identifiers are configuration errors.
    pub fn instantiate(&self, name: &str, config: &CatalogConfig) -> Result<Box<dyn IlsDriver>> {
        let constructor = self
            .constructors
            .get(&name.trim().to_ascii_lowercase())
            .ok_or_else(|| StacksError::Config(format!("unknown ILS driver: {name}")))?;
        constructor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_drivers_registered() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["demo", "noils", "sample"]);
        assert!(registry.contains("Demo"));
    }

    #[test]
    fn instantiate_is_case_insensitive() {
        let registry = DriverRegistry::with_builtin();
        let driver = registry
            .instantiate("SAMPLE", &CatalogConfig::default())
            .unwrap();
        assert_eq!(driver.name(), "sample");
    }

    #[test]
    fn unknown_driver_is_config_error() {
        let registry = DriverRegistry::with_builtin();
        let err = registry
            .instantiate("voyager", &CatalogConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StacksError::Config(_)));
        assert!(err.to_string().contains("voyager"));
    }

    #[test]
    fn register_plugin_driver() {
        let mut registry = DriverRegistry::new();
        registry.register("offline", |config| {
            Ok(Box::new(NoIlsDriver::new(&config.no_ils)) as Box<dyn IlsDriver>)
        });
        assert!(registry.contains("offline"));
        assert!(!registry.contains("demo"));
        let driver = registry
            .instantiate("offline", &CatalogConfig::default())
            .unwrap();
        assert_eq!(driver.name(), "noils");
    }
}
