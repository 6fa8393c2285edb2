use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use aidmap_crypto::FieldCipher;

const DEFAULT_ORIGIN: &str = "http://localhost:5173";

/// Server settings, read from the environment (and `.env` if present).
pub struct Config {
    pub db_path: PathBuf,
    pub cipher: FieldCipher,
    pub allowed_origins: Vec<String>,
    pub addr: SocketAddr,
    /// Off unless `AIDMAP_EXPIRY_SWEEP_SECS` is set above zero.
    pub expiry_sweep: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let key = lookup("AIDMAP_ENCRYPTION_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("AIDMAP_ENCRYPTION_KEY is not set")?;
        let cipher = FieldCipher::from_hex(&key).context("AIDMAP_ENCRYPTION_KEY is invalid")?;

        let host = var("AIDMAP_HOST", "0.0.0.0");
        let port: u16 = var("AIDMAP_PORT", "3001")
            .parse()
            .context("AIDMAP_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("AIDMAP_HOST must be an IP address")?;

        let sweep_secs: u64 = var("AIDMAP_EXPIRY_SWEEP_SECS", "0")
            .parse()
            .context("AIDMAP_EXPIRY_SWEEP_SECS must be a number of seconds")?;

        Ok(Self {
            db_path: var("AIDMAP_DB_PATH", "aidmap.db").into(),
            cipher,
            allowed_origins: parse_origins(&var("AIDMAP_ALLOWED_ORIGINS", DEFAULT_ORIGIN)),
            addr,
            expiry_sweep: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_key() {
        let config = config(&[("AIDMAP_ENCRYPTION_KEY", KEY)]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_path, PathBuf::from("aidmap.db"));
        assert_eq!(config.allowed_origins, vec![DEFAULT_ORIGIN]);
        assert_eq!(config.expiry_sweep, None);
    }

    #[test]
    fn missing_or_short_key_is_fatal() {
        assert!(config(&[]).is_err());
        assert!(config(&[("AIDMAP_ENCRYPTION_KEY", "")]).is_err());
        assert!(config(&[("AIDMAP_ENCRYPTION_KEY", "abcd")]).is_err());
    }

    #[test]
    fn origins_and_sweep_are_configurable() {
        let config = config(&[
            ("AIDMAP_ENCRYPTION_KEY", KEY),
            ("AIDMAP_ALLOWED_ORIGINS", "https://ajuda.example/, http://localhost:5173 ,"),
            ("AIDMAP_EXPIRY_SWEEP_SECS", "900"),
            ("AIDMAP_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://ajuda.example", "http://localhost:5173"]
        );
        assert_eq!(config.expiry_sweep, Some(Duration::from_secs(900)));
        assert_eq!(config.addr.port(), 8080);
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(config(&[("AIDMAP_ENCRYPTION_KEY", KEY), ("AIDMAP_PORT", "http")]).is_err());
    }
}
