// ⚙️ Configuration - explicit values injected into every component
//
// Loaded once at startup. Every required variable is checked up front and all
// missing ones are reported together, so a gap never surfaces mid-request.

use anyhow::{anyhow, Context, Result};
use std::env;

pub const DEFAULT_PAYMENT_API_URL: &str = "https://api.paymongo.com/v1";
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryBackend {
    /// Remote headless CMS over REST
    Http,

    /// Process-local store (development, tests)
    Memory,
}

impl RepositoryBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "http" | "remote" => Ok(Self::Http),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(anyhow!("SHELF_REPOSITORY_BACKEND must be one of: http, memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BffConfig {
    pub host: String,
    pub port: u16,
    pub repository_backend: RepositoryBackend,
    /// Base URL of the record repository, without the `/api` suffix
    pub repository_url: String,
    /// Bearer credential attached to every repository call
    pub repository_token: String,
    pub payment_api_url: String,
    pub payment_secret_key: String,
    pub public_site_url: String,
    /// When set, caller tokens are signature-checked instead of trusted
    pub jwt_secret: Option<String>,
    /// Upper bound on in-flight lookups while resolving one name list
    pub resolve_concurrency: usize,
    /// Body cap for item creation, which carries the image files
    pub max_upload_bytes: usize,
}

impl BffConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let repository_backend = match get("SHELF_REPOSITORY_BACKEND") {
            Some(raw) => RepositoryBackend::parse(&raw)?,
            None => RepositoryBackend::Http,
        };

        let mut missing = Vec::new();
        let mut required = |key: &'static str, needed: bool| match get(key) {
            Some(value) => value,
            None => {
                if needed {
                    missing.push(key);
                }
                String::new()
            }
        };

        let remote = repository_backend == RepositoryBackend::Http;
        let repository_url = required("SHELF_REPOSITORY_URL", remote);
        let repository_token = required("SHELF_REPOSITORY_TOKEN", remote);
        let payment_secret_key = required("SHELF_PAYMENT_SECRET_KEY", true);
        let public_site_url = required("SHELF_PUBLIC_SITE_URL", true);

        if !missing.is_empty() {
            return Err(anyhow!(
                "missing required configuration: {}",
                missing.join(", ")
            ));
        }

        let port = get("SHELF_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("SHELF_PORT must be a valid u16")?;

        let resolve_concurrency = match get("SHELF_RESOLVE_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .context("SHELF_RESOLVE_CONCURRENCY must be a positive integer")?,
            None => DEFAULT_RESOLVE_CONCURRENCY,
        };
        if resolve_concurrency == 0 {
            return Err(anyhow!("SHELF_RESOLVE_CONCURRENCY must be at least 1"));
        }

        let max_upload_bytes = match get("SHELF_MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .context("SHELF_MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            host: get("SHELF_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            repository_backend,
            repository_url: repository_url.trim_end_matches('/').to_string(),
            repository_token,
            payment_api_url: get("SHELF_PAYMENT_API_URL")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            payment_secret_key,
            public_site_url: public_site_url.trim_end_matches('/').to_string(),
            jwt_secret: get("SHELF_JWT_SECRET"),
            resolve_concurrency,
            max_upload_bytes,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_success_url(&self) -> String {
        format!("{}/premium/success", self.public_site_url)
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/premium/cancelled", self.public_site_url)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_full_config_loads() {
        let config = BffConfig::from_lookup(lookup(&[
            ("SHELF_REPOSITORY_URL", "http://cms.local:1337/"),
            ("SHELF_REPOSITORY_TOKEN", "svc-token"),
            ("SHELF_PAYMENT_SECRET_KEY", "sk_test"),
            ("SHELF_PUBLIC_SITE_URL", "https://shelfie.example/"),
            ("SHELF_PORT", "8081"),
        ]))
        .unwrap();

        assert_eq!(config.repository_backend, RepositoryBackend::Http);
        assert_eq!(config.repository_url, "http://cms.local:1337");
        assert_eq!(config.port, 8081);
        assert_eq!(config.payment_api_url, DEFAULT_PAYMENT_API_URL);
        assert_eq!(config.resolve_concurrency, DEFAULT_RESOLVE_CONCURRENCY);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(
            config.checkout_success_url(),
            "https://shelfie.example/premium/success"
        );
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let err = BffConfig::from_lookup(lookup(&[("SHELF_REPOSITORY_URL", "http://x")]))
            .unwrap_err()
            .to_string();

        assert!(err.contains("SHELF_REPOSITORY_TOKEN"));
        assert!(err.contains("SHELF_PAYMENT_SECRET_KEY"));
        assert!(err.contains("SHELF_PUBLIC_SITE_URL"));
        assert!(!err.contains("SHELF_REPOSITORY_URL,"));
    }

    #[test]
    fn test_memory_backend_skips_repository_credentials() {
        let config = BffConfig::from_lookup(lookup(&[
            ("SHELF_REPOSITORY_BACKEND", "memory"),
            ("SHELF_PAYMENT_SECRET_KEY", "sk_test"),
            ("SHELF_PUBLIC_SITE_URL", "http://localhost:3000"),
        ]))
        .unwrap();

        assert_eq!(config.repository_backend, RepositoryBackend::Memory);
        assert!(config.repository_url.is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = BffConfig::from_lookup(lookup(&[
            ("SHELF_REPOSITORY_BACKEND", "memory"),
            ("SHELF_PAYMENT_SECRET_KEY", "sk_test"),
            ("SHELF_PUBLIC_SITE_URL", "http://localhost:3000"),
            ("SHELF_RESOLVE_CONCURRENCY", "0"),
        ]));

        assert!(result.is_err());
    }

    #[test]
    fn test_upload_limit_override() {
        let base = [
            ("SHELF_REPOSITORY_BACKEND", "memory"),
            ("SHELF_PAYMENT_SECRET_KEY", "sk_test"),
            ("SHELF_PUBLIC_SITE_URL", "http://localhost:3000"),
        ];

        let mut pairs = base.to_vec();
        pairs.push(("SHELF_MAX_UPLOAD_BYTES", "1048576"));
        let config = BffConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_upload_bytes, 1_048_576);

        let mut pairs = base.to_vec();
        pairs.push(("SHELF_MAX_UPLOAD_BYTES", "lots"));
        assert!(BffConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = BffConfig::from_lookup(lookup(&[("SHELF_REPOSITORY_BACKEND", "sqlite")]));
        assert!(result.is_err());
    }
}
