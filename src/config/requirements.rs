use super::traits::ConfigSection;
use crate::error::EvoGraphError;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Structural requirements for candidate graphs: which operations may occupy
/// primary (leaf) and secondary positions, and the arity/depth envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRequirements {
    pub primary_operations: Vec<String>,
    pub secondary_operations: Vec<String>,
    /// Maximum number of parents a secondary node may consume.
    pub max_arity: usize,
    /// Hard depth ceiling, in nodes along the longest root-to-leaf path.
    pub max_depth: usize,
    /// Depth budget for randomized initial growth.
    pub start_depth: usize,
}

impl Default for GraphRequirements {
    fn default() -> Self {
        Self {
            primary_operations: Vec::new(),
            secondary_operations: Vec::new(),
            max_arity: 3,
            max_depth: 5,
            start_depth: 3,
        }
    }
}

impl GraphRequirements {
    pub fn new(
        primary_operations: Vec<String>,
        secondary_operations: Vec<String>,
    ) -> Self {
        Self {
            primary_operations,
            secondary_operations,
            ..Self::default()
        }
    }

    pub fn is_primary_operation(&self, name: &str) -> bool {
        self.primary_operations.iter().any(|op| op == name)
    }

    pub fn is_secondary_operation(&self, name: &str) -> bool {
        self.secondary_operations.iter().any(|op| op == name)
    }
}

impl ConfigSection for GraphRequirements {
    fn section_name() -> &'static str {
        "requirements"
    }

    fn validate(&self) -> Result<()> {
        if self.primary_operations.is_empty() {
            return Err(EvoGraphError::Configuration(
                "at least one primary operation is required".to_string(),
            ));
        }
        if self.secondary_operations.is_empty() {
            return Err(EvoGraphError::Configuration(
                "at least one secondary operation is required".to_string(),
            ));
        }
        if self.max_arity == 0 {
            return Err(EvoGraphError::Configuration(
                "max_arity must be positive".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(EvoGraphError::Configuration(
                "max_depth must be positive".to_string(),
            ));
        }
        if self.start_depth > self.max_depth {
            return Err(EvoGraphError::Configuration(format!(
                "start_depth {} exceeds max_depth {}",
                self.start_depth, self.max_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GraphRequirements {
        GraphRequirements::new(
            vec!["scale".to_string()],
            vec!["model".to_string()],
        )
    }

    #[test]
    fn test_valid_requirements_pass() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_primary_set_rejected() {
        let mut req = valid();
        req.primary_operations.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_contradictory_depths_rejected() {
        let mut req = valid();
        req.start_depth = 9;
        req.max_depth = 4;
        assert!(req.validate().is_err());
    }
}
