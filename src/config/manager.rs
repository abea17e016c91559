use super::{optimizer::OptimizerConfig, requirements::GraphRequirements, traits::ConfigSection};
use crate::error::{EvoGraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub optimizer: OptimizerConfig,
    pub requirements: GraphRequirements,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        self.requirements.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EvoGraphError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| EvoGraphError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap() = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.config.read().unwrap();
        let toml_str = toml::to_string_pretty(&*config)
            .map_err(|e| EvoGraphError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| EvoGraphError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap();
        f(&mut config);
        config.validate()?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_rejects_invalid_state() {
        let manager = ConfigManager::new();
        let result = manager.update(|config| {
            config.optimizer.pop_size = 0;
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let manager = ConfigManager::new();
        manager
            .update(|config| {
                config.optimizer.pop_size = 42;
                config.requirements.primary_operations = vec!["scale".to_string()];
                config.requirements.secondary_operations = vec!["model".to_string()];
            })
            .unwrap();
        let text = toml::to_string_pretty(&manager.get()).unwrap();
        let reloaded: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(reloaded.optimizer.pop_size, 42);
    }
}
