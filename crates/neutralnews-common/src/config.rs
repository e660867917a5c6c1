use std::env;

use tracing::info;

/// Process configuration, assembled once at startup from the environment.
///
/// Mirrors the `Config::*_from_env()` family used elsewhere in this
/// workspace: required variables panic with a descriptive message,
/// optional ones fall back to a sane default.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the neutralization LLM. Required.
    pub llm_api_key: String,
    /// Model name passed to the LLM provider.
    pub llm_model: String,
    /// Path to an optional outlet registry override file.
    pub outlet_list: Option<String>,
    /// Advisory deployment region, used only for log tagging.
    pub deploy_region: String,
    /// Postgres connection string for the article store.
    pub database_url: String,
    /// Retention window in days for the sweeper.
    pub retention_days: i64,
    /// Port the health probe listens on.
    pub health_port: u16,
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            llm_api_key: required_env("LLM_API_KEY"),
            llm_model: optional_env("LLM_MODEL", "gpt-4o-mini"),
            outlet_list: env::var("OUTLET_LIST").ok(),
            deploy_region: optional_env("DEPLOY_REGION", "unspecified"),
            database_url: required_env("DATABASE_URL"),
            retention_days: env::var("RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        }
    }

    /// Log configuration without leaking secret values, only their lengths.
    pub fn log_redacted(&self) {
        info!(
            llm_api_key_len = self.llm_api_key.len(),
            llm_model = %self.llm_model,
            outlet_list = ?self.outlet_list,
            deploy_region = %self.deploy_region,
            database_url_len = self.database_url.len(),
            retention_days = self.retention_days,
            health_port = self.health_port,
            "configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_env_falls_back_to_default() {
        assert_eq!(optional_env("NEUTRALNEWS_DOES_NOT_EXIST", "fallback"), "fallback");
    }
}
