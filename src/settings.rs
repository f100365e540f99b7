use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub pool_size: u32,
    pub log_level: String,
}

impl Settings {
    /// Defaults, then `movie-records.toml` if present, then the environment
    /// (`DATABASE_URL`, `POOL_SIZE`, `LOG_LEVEL`). A `.env` file is loaded
    /// into the environment first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .set_default("pool_size", 4)?
            .set_default("log_level", "info")?
            .add_source(File::with_name("movie-records").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
