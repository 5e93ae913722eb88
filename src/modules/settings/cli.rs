// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use clap::{builder::ValueParser, Parser};
use std::{collections::HashSet, path::PathBuf, sync::LazyLock};

use crate::{
    modules::error::{code::ErrorCode, MailStashResult},
    raise_error,
};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailstash",
    about = "Aggregates remote IMAP and Microsoft Graph mailboxes into a single indexed, searchable local store.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailstash log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level")]
    pub mailstash_log_level: String,

    /// Enable ANSI formatted logs
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub mailstash_ansi_logs: bool,

    /// Write logs to rolling files instead of stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub mailstash_log_to_file: bool,

    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of server log files"
    )]
    pub mailstash_max_server_log_files: usize,

    /// HTTP port (default: 8630)
    #[clap(long, default_value = "8630", env, help = "Set the HTTP port")]
    pub mailstash_http_port: i32,

    /// The IP address the HTTP server binds to, in IPv4 format.
    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IP address the HTTP server binds to, in IPv4 format (e.g., 192.168.1.1)",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub mailstash_bind_ip: Option<String>,

    /// Public URL of the web client, used for CORS and OAuth2 redirects
    #[clap(
        long,
        default_value = "http://localhost:5173",
        env,
        help = "Set the public URL of the web client"
    )]
    pub mailstash_client_url: String,

    /// CORS allowed origins (comma-separated)
    #[clap(
        long,
        default_value = "http://localhost:5173, *",
        env,
        help = "Set the allowed CORS origins (comma-separated list)",
        value_parser = ValueParser::new(|s: &str| -> Result<HashSet<String>, String> {
            let set: HashSet<String> = s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            Ok(set)
        })
    )]
    pub mailstash_cors_origins: HashSet<String>,

    #[clap(
        long,
        default_value = "86400",
        env,
        help = "Set the CORS max age in seconds"
    )]
    pub mailstash_cors_max_age: i32,

    #[clap(
        long,
        env,
        help = "Set the data directory for mailstash databases and blobs",
        value_parser = ValueParser::new(|s: &str| {
            let path = PathBuf::from(s);
            if !path.is_absolute() {
                return Err("Path must be an absolute directory path".to_string());
            }
            if !path.exists() {
                return Err(format!("Path {:?} does not exist", path));
            }
            if !path.is_dir() {
                return Err(format!("Path {:?} is not a directory", path));
            }
            Ok(s.to_string())
        })
    )]
    pub mailstash_root_dir: String,

    #[clap(
        long,
        env,
        default_value = "134217728",
        help = "Set the cache size for the metadata database in bytes"
    )]
    pub mailstash_meta_cache_size: Option<usize>,

    #[clap(
        long,
        env,
        default_value = "67108864",
        help = "Set the cache size for the task queue database in bytes"
    )]
    pub mailstash_task_queue_cache_size: Option<usize>,

    #[clap(
        long,
        env,
        default_value = "1073741824",
        help = "Set the cache size for the mail mirror database in bytes"
    )]
    pub mailstash_mirror_cache_size: Option<usize>,

    /// Master secret for the credential vault. Must be at least 32 characters.
    #[clap(
        long,
        default_value = "change-this-default-encryption-key!",
        env,
        help = "Set the credential vault master key (at least 32 characters). ⚠️ Change this default in production!"
    )]
    pub mailstash_encryption_key: String,

    /// Secret used to sign API access tokens (HS256)
    #[clap(
        long,
        default_value = "change-this-default-jwt-secret-too!",
        env,
        help = "Set the JWT signing secret. ⚠️ Change this default in production!"
    )]
    pub mailstash_jwt_secret: String,

    #[clap(
        long,
        default_value = "900",
        env,
        help = "Access token lifetime in seconds",
        value_parser = clap::value_parser!(u64).range(60..)
    )]
    pub mailstash_jwt_expiry_secs: u64,

    #[clap(
        long,
        default_value = "30",
        env,
        help = "Refresh token lifetime in days",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub mailstash_refresh_token_ttl_days: u32,

    /// Microsoft application (client) id for Graph mailboxes
    #[clap(long, env, help = "Set the Microsoft OAuth2 client id")]
    pub mailstash_ms_client_id: Option<String>,

    /// Microsoft application client secret
    #[clap(long, env, help = "Set the Microsoft OAuth2 client secret")]
    pub mailstash_ms_client_secret: Option<String>,

    /// Directory holding additional trusted CA certificates (*.crt), loaded once
    #[clap(
        long,
        env,
        help = "Set a directory of extra trusted CA certificates (*.crt) for IMAP TLS"
    )]
    pub mailstash_certs_dir: Option<PathBuf>,

    /// Verify upstream TLS certificates (disable only for test servers)
    #[clap(
        long,
        default_value = "true",
        env,
        help = "Verify upstream TLS certificates. Disabling this is unsafe outside test environments."
    )]
    pub mailstash_tls_reject_unauthorized: bool,

    #[clap(
        long,
        default_value = "300",
        env,
        help = "Interval in seconds between incremental sync scheduler ticks",
        value_parser = clap::value_parser!(u64).range(30..)
    )]
    pub mailstash_sync_tick_secs: u64,
}

impl Settings {
    /// Startup validation for settings whose failure must be fatal.
    pub fn validate(&self) -> MailStashResult<()> {
        if self.mailstash_encryption_key.len() < 32 {
            return Err(raise_error!(
                "MAILSTASH_ENCRYPTION_KEY must be at least 32 characters".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        if self.mailstash_jwt_secret.len() < 16 {
            return Err(raise_error!(
                "MAILSTASH_JWT_SECRET must be at least 16 characters".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        if self.mailstash_ms_client_id.is_some() != self.mailstash_ms_client_secret.is_some() {
            return Err(raise_error!(
                "MAILSTASH_MS_CLIENT_ID and MAILSTASH_MS_CLIENT_SECRET must be set together".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            mailstash_log_level: "info".to_string(),
            mailstash_ansi_logs: false,
            mailstash_log_to_file: false,
            mailstash_max_server_log_files: 5,
            mailstash_http_port: 8630,
            mailstash_bind_ip: Default::default(),
            mailstash_client_url: "http://localhost:5173".to_string(),
            mailstash_cors_origins: Default::default(),
            mailstash_cors_max_age: 86400,
            mailstash_root_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            mailstash_meta_cache_size: None,
            mailstash_task_queue_cache_size: None,
            mailstash_mirror_cache_size: None,
            mailstash_encryption_key: "x".repeat(32),
            mailstash_jwt_secret: "test-jwt-secret-test-jwt-secret".into(),
            mailstash_jwt_expiry_secs: 900,
            mailstash_refresh_token_ttl_days: 30,
            mailstash_ms_client_id: None,
            mailstash_ms_client_secret: None,
            mailstash_certs_dir: None,
            mailstash_tls_reject_unauthorized: true,
            mailstash_sync_tick_secs: 300,
        }
    }
}
