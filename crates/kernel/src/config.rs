//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, bail};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Only required by commands that query.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Per-request query deadline in milliseconds (default: 10000).
    pub query_timeout_ms: u64,

    /// Page size used when a request names none (default: 20).
    pub default_per_page: u32,

    /// Largest page size a request may ask for (default: 100).
    pub max_per_page: u32,

    /// Base URL of the filing image server used to build report PDF links.
    pub pdf_base_url: String,

    /// Earliest `report_year` exposed by itemized schedules (default: 2011).
    pub itemized_start_year: i32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = var("DATABASE_URL").filter(|v| !v.is_empty());

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let query_timeout_ms = var("QUERY_TIMEOUT_MS")
            .unwrap_or_else(|| "10000".to_string())
            .parse()
            .context("QUERY_TIMEOUT_MS must be a valid u64")?;

        let default_per_page: u32 = var("DEFAULT_PER_PAGE")
            .unwrap_or_else(|| "20".to_string())
            .parse()
            .context("DEFAULT_PER_PAGE must be a valid u32")?;

        let max_per_page: u32 = var("MAX_PER_PAGE")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .context("MAX_PER_PAGE must be a valid u32")?;

        let pdf_base_url = var("PDF_BASE_URL")
            .unwrap_or_else(|| "https://docquery.fec.gov/pdf".to_string())
            .trim_end_matches('/')
            .to_string();

        let itemized_start_year = var("ITEMIZED_START_YEAR")
            .unwrap_or_else(|| "2011".to_string())
            .parse()
            .context("ITEMIZED_START_YEAR must be a valid year")?;

        if default_per_page == 0 || default_per_page > max_per_page {
            bail!(
                "DEFAULT_PER_PAGE ({default_per_page}) must be between 1 and MAX_PER_PAGE ({max_per_page})"
            );
        }

        Ok(Self {
            database_url,
            database_max_connections,
            query_timeout_ms,
            default_per_page,
            max_per_page,
            pdf_base_url,
            itemized_start_year,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.query_timeout_ms, 10_000);
        assert_eq!(config.default_per_page, 20);
        assert_eq!(config.max_per_page, 100);
        assert_eq!(config.itemized_start_year, 2011);
    }

    #[test]
    fn overrides_and_trailing_slash() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/cfdm"),
            ("QUERY_TIMEOUT_MS", "250"),
            ("PDF_BASE_URL", "http://images.example.org/pdf/"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/cfdm")
        );
        assert_eq!(config.query_timeout_ms, 250);
        assert_eq!(config.pdf_base_url, "http://images.example.org/pdf");
    }

    #[test]
    fn rejects_default_above_max() {
        let err = load(&[("DEFAULT_PER_PAGE", "50"), ("MAX_PER_PAGE", "10")]).unwrap_err();
        assert!(err.to_string().contains("DEFAULT_PER_PAGE"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert!(load(&[("MAX_PER_PAGE", "many")]).is_err());
    }
}
