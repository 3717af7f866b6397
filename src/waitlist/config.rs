use std::{net::SocketAddr, path::PathBuf};

pub const ENV_BIND: &str = "OOR3D_BIND";
pub const ENV_DATA_FILE: &str = "OOR3D_DATA_FILE";
pub const ENV_ADMIN_TOKEN: &str = "OOR3D_ADMIN_TOKEN";
pub const ENV_EXPOSE_DUPLICATES: &str = "OOR3D_EXPOSE_DUPLICATES";
pub const ENV_ALLOWED_ORIGIN: &str = "OOR3D_ALLOWED_ORIGIN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr { var: &'static str, value: String },
    #[error("{var} must be true/false/1/0, got {value}")]
    InvalidFlag { var: &'static str, value: String },
}

/// Waitlist server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// JSON snapshot location; `None` keeps signups in memory only.
    pub data_file: Option<PathBuf>,
    /// When set, list/count/lookup require `Authorization: Bearer <token>`.
    pub admin_token: Option<String>,
    /// Tell submitters whether they were already registered.
    pub expose_duplicates: bool,
    /// CORS origin of the landing page; any origin when `None`.
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_file: None,
            admin_token: None,
            expose_duplicates: false,
            allowed_origin: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_BIND) {
            config.bind_addr = value.parse().map_err(|_| ConfigError::InvalidAddr {
                var: ENV_BIND,
                value,
            })?;
        }
        config.data_file = get(ENV_DATA_FILE).map(PathBuf::from);
        config.admin_token = get(ENV_ADMIN_TOKEN);
        if let Some(value) = get(ENV_EXPOSE_DUPLICATES) {
            config.expose_duplicates = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        var: ENV_EXPOSE_DUPLICATES,
                        value,
                    });
                }
            };
        }
        config.allowed_origin = get(ENV_ALLOWED_ORIGIN);
        Ok(config)
    }
}
