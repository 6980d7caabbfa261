//! Server configuration resolved from the environment at startup.
//!
//! | Variable                    | Default          |
//! |-----------------------------|------------------|
//! | `ACERVO_ADDR`               | `0.0.0.0:4000`   |
//! | `ACERVO_CONVOCATORIAS_ADDR` | `0.0.0.0:3000`   |
//! | `ACERVO_DATA_DIR`           | `data`           |
//! | `ACERVO_UPLOADS_DIR`        | `uploads`        |
//! | `ACERVO_CONVOCATORIAS_DIR`  | `convocatorias`  |
//! | `CORS_ORIGIN`               | any origin       |
//! | `CONVOCATORIAS_PASSWORD`    | unset, uploads refused |

use acervo_core::config::{dir_from_env_value, secret_from_env_value};
use acervo_core::constants::{DEFAULT_CONVOCATORIAS_DIR, DEFAULT_DATA_DIR, DEFAULT_UPLOADS_DIR};
use acervo_core::CoreConfig;

pub const DEFAULT_ADDR: &str = "0.0.0.0:4000";
pub const DEFAULT_CONVOCATORIAS_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub convocatorias_addr: String,
    /// `None` allows any origin
    pub cors_origin: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("ACERVO_ADDR").ok(),
            std::env::var("ACERVO_CONVOCATORIAS_ADDR").ok(),
            std::env::var("CORS_ORIGIN").ok(),
        )
    }

    fn from_values(
        addr: Option<String>,
        convocatorias_addr: Option<String>,
        cors_origin: Option<String>,
    ) -> Self {
        let non_blank = |v: Option<String>| {
            v.map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            addr: non_blank(addr).unwrap_or_else(|| DEFAULT_ADDR.into()),
            convocatorias_addr: non_blank(convocatorias_addr)
                .unwrap_or_else(|| DEFAULT_CONVOCATORIAS_ADDR.into()),
            cors_origin: non_blank(cors_origin).filter(|o| o != "*"),
        }
    }
}

/// Builds the core configuration from the environment.
pub fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let cfg = CoreConfig::new(
        dir_from_env_value(std::env::var("ACERVO_DATA_DIR").ok(), DEFAULT_DATA_DIR),
        dir_from_env_value(std::env::var("ACERVO_UPLOADS_DIR").ok(), DEFAULT_UPLOADS_DIR),
        dir_from_env_value(
            std::env::var("ACERVO_CONVOCATORIAS_DIR").ok(),
            DEFAULT_CONVOCATORIAS_DIR,
        ),
        secret_from_env_value(std::env::var("CONVOCATORIAS_PASSWORD").ok()),
    )?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_and_blank_values() {
        let cfg = ServerConfig::from_values(None, Some(" ".into()), None);
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.convocatorias_addr, DEFAULT_CONVOCATORIAS_ADDR);
        assert_eq!(cfg.cors_origin, None);
    }

    #[test]
    fn wildcard_origin_means_any() {
        let cfg = ServerConfig::from_values(None, None, Some("*".into()));
        assert_eq!(cfg.cors_origin, None);

        let cfg = ServerConfig::from_values(None, None, Some("https://acervo.example".into()));
        assert_eq!(cfg.cors_origin.as_deref(), Some("https://acervo.example"));
    }
}
