use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::sink::sheet::ServiceAccountKey;
use crate::submission::pipeline::SuccessPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub journal_path: PathBuf,
    pub database_path: PathBuf,
    pub sheet: Option<SheetConfig>,
    pub sink_timeout: Duration,
    pub success_policy: SuccessPolicy,
    pub cors_origins: Vec<String>,
    pub max_body_size: usize,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub range: String,
    pub key: ServiceAccountKey,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host: IpAddr = env_or("FORMSINK_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FORMSINK_HOST: {e}"))?;

        let port: u16 = env_or("FORMSINK_PORT", "5000")
            .parse()
            .map_err(|e| format!("Invalid FORMSINK_PORT: {e}"))?;

        let journal_path = PathBuf::from(env_or("FORMSINK_JOURNAL_PATH", "responses.json"));
        let database_path = PathBuf::from(env_or("FORMSINK_DATABASE_PATH", "responses.db"));

        let sheet = match std::env::var("FORMSINK_SHEET_ID").ok() {
            Some(spreadsheet_id) => Some(SheetConfig {
                spreadsheet_id,
                range: env_or("FORMSINK_SHEET_RANGE", "Sheet1!A:Z"),
                key: load_service_account_key()?,
            }),
            None => None,
        };

        let sink_timeout_secs: u64 = env_or("FORMSINK_SINK_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid FORMSINK_SINK_TIMEOUT_SECS: {e}"))?;

        let success_policy = match env_or("FORMSINK_SUCCESS_POLICY", "any").as_str() {
            "any" => SuccessPolicy::Any,
            name @ ("journal" | "sqlite" | "sheet") => SuccessPolicy::Sink(name.to_string()),
            other => {
                return Err(format!(
                    "Invalid FORMSINK_SUCCESS_POLICY '{other}': expected any, journal, sqlite or sheet"
                ));
            }
        };

        let cors_origins: Vec<String> = env_or("FORMSINK_CORS_ORIGINS", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .collect();

        let max_body_size: usize = env_or("FORMSINK_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid FORMSINK_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("FORMSINK_LOG_LEVEL", "info");

        Ok(Config {
            host,
            port,
            journal_path,
            database_path,
            sheet,
            sink_timeout: Duration::from_secs(sink_timeout_secs),
            success_policy,
            cors_origins,
            max_body_size,
            log_level,
        })
    }
}

/// Resolve the service-account credential: a JSON key file takes precedence,
/// otherwise the email/private-key pair of environment variables. Called only
/// when the sheet sink is configured, in which case credentials are required.
fn load_service_account_key() -> Result<ServiceAccountKey, String> {
    if let Ok(path) = std::env::var("FORMSINK_CREDENTIALS_FILE") {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read credentials file {path}: {e}"))?;
        return serde_json::from_str(&raw)
            .map_err(|e| format!("Invalid credentials file {path}: {e}"));
    }

    match (
        std::env::var("FORMSINK_SERVICE_ACCOUNT_EMAIL").ok(),
        std::env::var("FORMSINK_SERVICE_ACCOUNT_KEY").ok(),
    ) {
        (Some(client_email), Some(private_key)) => Ok(ServiceAccountKey {
            client_email,
            // Keys passed through the environment carry literal "\n"
            private_key: private_key.replace("\\n", "\n"),
        }),
        _ => Err(
            "FORMSINK_SHEET_ID is set but no credentials were provided: set \
             FORMSINK_CREDENTIALS_FILE or both FORMSINK_SERVICE_ACCOUNT_EMAIL \
             and FORMSINK_SERVICE_ACCOUNT_KEY"
                .to_string(),
        ),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
