pub mod traits;
pub mod optimizer;
pub mod requirements;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use optimizer::OptimizerConfig;
pub use requirements::GraphRequirements;
pub use traits::ConfigSection;
