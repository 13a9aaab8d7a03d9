use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub currency: String,
    pub session_expiry_minutes: i64,
    pub store_ttl_secs: u64,
    pub redis_url: Option<String>,
    pub base_url: String,
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Load from environment or use defaults
        let session_expiry_minutes: i64 = std::env::var("SESSION_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "360".to_string())
            .parse()?;

        // Stored sessions must outlive the protocol-level expiry so a
        // just-expired session still reads back with a proper error.
        let default_ttl = (session_expiry_minutes as u64) * 60 + 3600;
        let store_ttl_secs: u64 = std::env::var("STORE_TTL_SECS")
            .map(|v| v.parse())
            .unwrap_or(Ok(default_ttl))?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            session_expiry_minutes,
            store_ttl_secs: store_ttl_secs.max((session_expiry_minutes as u64) * 60),
            redis_url: std::env::var("REDIS_URL").ok(),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_store_ttl_beyond_session_expiry() {
        let config = Config::load().unwrap();
        assert!(config.store_ttl_secs >= (config.session_expiry_minutes as u64) * 60);
    }
}
