use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Password of the bootstrap administrator; no account is created without it.
    pub admin_pass: Option<String>,
    pub admin_email: String,
    pub storage_root: PathBuf,
    pub search_url: Option<String>,
    pub search_key: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} is not valid: {1}")]
    Invalid(&'static str, String),
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(optional)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", port))?,
            None => 8000,
        };

        Ok(Config {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| String::from("0.0.0.0")),
            port,
            admin_pass: lookup("INIT_PASS"),
            admin_email: lookup("ADMIN_EMAIL").unwrap_or_else(|| String::from("admin@localhost")),
            storage_root: lookup("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("storage")),
            search_url: lookup("SEARCH_URL"),
            search_key: lookup("SEARCH_KEY"),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/fleet")]).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.admin_email, "admin@localhost");
        assert_eq!(config.storage_root, PathBuf::from("storage"));
        assert!(config.admin_pass.is_none());
        assert!(config.search_url.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn port_must_be_numeric() {
        let result = config(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]);
        assert!(matches!(result, Err(ConfigError::Invalid("PORT", _))));
    }
}
