pub mod models;
pub mod sources;

pub use models::{
    ApiLimits, Config, CreditSettings, DispatchSettings, InferenceSettings, RetentionConfig,
    ServerConfig, StorageProvider, StorageSettings,
};
pub use sources::{load, load_from_sources};

impl Config {
    /// Load from file + environment (convenience used by the server).
    pub fn load() -> Result<Self, config::ConfigError> {
        sources::load()
    }
}
