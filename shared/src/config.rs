use std::path::PathBuf;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: String,
    pub db_name: String,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_DB_NAME: &str = "app-db";

    pub fn new(data_dir: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            db_name: db_name.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("CARBON_KV_DATA_DIR").ok(),
            std::env::var("CARBON_KV_DB_NAME").ok(),
        )
    }

    /// Apply defaults to unset or blank settings
    fn resolve(data_dir: Option<String>, db_name: Option<String>) -> Self {
        let data_dir = non_blank(data_dir).unwrap_or_else(|| {
            warn!(
                "CARBON_KV_DATA_DIR not set, using default '{}'",
                Self::DEFAULT_DATA_DIR
            );
            Self::DEFAULT_DATA_DIR.to_string()
        });
        let db_name = non_blank(db_name).unwrap_or_else(|| {
            warn!(
                "CARBON_KV_DB_NAME not set, using default '{}'",
                Self::DEFAULT_DB_NAME
            );
            Self::DEFAULT_DB_NAME.to_string()
        });

        Self { data_dir, db_name }
    }

    /// On-disk location of the database: `<data_dir>/<db_name>`
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.db_name)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DATA_DIR, Self::DEFAULT_DB_NAME)
    }
}
