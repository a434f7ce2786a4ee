use std::{env, fmt, str::FromStr};

use tutorcall_core::session::DEFAULT_RETENTION_DAYS;

/// Where sessions are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dynamodb" => Ok(StorageBackend::DynamoDb),
            "memory" | "inmemory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {other}")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::DynamoDb => f.write_str("dynamodb"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table name (default: "tutorcall")
    pub table_name: String,
    /// Storage backend (default: dynamodb)
    pub storage_backend: StorageBackend,
    /// Days before stored items expire (default: 90)
    pub retention_days: i64,
    /// AWS region for DynamoDB and the transcription endpoint (default: "us-east-1")
    pub aws_region: String,
    /// Endpoint override, e.g. a local DynamoDB
    pub aws_endpoint_url: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "tutorcall")
    /// - `STORAGE_BACKEND` - `dynamodb` or `memory` (default: "dynamodb")
    /// - `RETENTION_DAYS` - Item retention in days (default: 90)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `AWS_ENDPOINT_URL` - Optional endpoint override
    /// - `LOG_FORMAT` - `json` for JSON log lines (default: text)
    ///
    /// Presigning credentials are not read here. The AWS SDK provider chain
    /// resolves them per request, `AWS_ACCESS_KEY_ID` included.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            table_name: non_empty("DYNAMODB_TABLE_NAME").unwrap_or_else(|| "tutorcall".to_string()),
            storage_backend: non_empty("STORAGE_BACKEND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(StorageBackend::DynamoDb),
            retention_days: non_empty("RETENTION_DAYS")
                .and_then(|v| v.parse().ok())
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            aws_region: non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_endpoint_url: non_empty("AWS_ENDPOINT_URL"),
            log_format: match non_empty("LOG_FORMAT") {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }
}
