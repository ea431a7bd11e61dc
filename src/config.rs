use std::fmt::Write as _;

use clap::{Args, Parser};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::redmine::{ApiKeys, ClientType};

#[derive(Clone, Debug, Parser)]
#[command(name = "support-desk")]
pub struct Config {
    #[arg(long, env = "SUPPORT_PORT", default_value_t = 7410)]
    pub port: u16,

    #[arg(long, env = "SUPPORT_DB_URL", default_value = "sqlite://./support.db")]
    pub db_url: String,

    #[arg(long, env = "SUPPORT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long = "max-request-body-bytes",
        env = "SUPPORT_MAX_REQUEST_BODY_BYTES",
        default_value_t = 12 * 1024 * 1024
    )]
    pub max_request_body_bytes: usize,

    #[command(flatten)]
    pub redmine: RedmineConfig,
}

#[derive(Clone, Debug, Args)]
pub struct RedmineConfig {
    #[arg(long = "redmine-base-url", env = "REDMINE_BASE_URL")]
    pub base_url: String,

    #[arg(
        long = "redmine-registered-user-api-key",
        env = "REDMINE_REGISTERED_USER_API_KEY",
        hide_env_values = true
    )]
    pub registered_user_api_key: String,

    #[arg(
        long = "redmine-unregistered-user-api-key",
        env = "REDMINE_UNREGISTERED_USER_API_KEY",
        hide_env_values = true
    )]
    pub unregistered_user_api_key: String,

    #[arg(
        long = "redmine-system-api-key",
        env = "REDMINE_SYSTEM_API_KEY",
        hide_env_values = true
    )]
    pub system_api_key: Option<String>,

    #[arg(long = "redmine-project-id", env = "REDMINE_PROJECT_ID")]
    pub project_id: i64,

    #[arg(long = "redmine-tracker-id", env = "REDMINE_TRACKER_ID")]
    pub tracker_id: i64,

    #[arg(
        long = "redmine-create-status-id",
        env = "REDMINE_CREATE_STATUS_ID",
        default_value_t = 1
    )]
    pub create_status_id: i64,

    #[arg(
        long = "redmine-create-status-name",
        env = "REDMINE_CREATE_STATUS_NAME",
        default_value = "New"
    )]
    pub create_status_name: String,

    #[arg(
        long = "redmine-resolve-status-id",
        env = "REDMINE_RESOLVE_STATUS_ID",
        default_value_t = 3
    )]
    pub resolve_status_id: i64,

    #[arg(
        long = "redmine-resolve-status-name",
        env = "REDMINE_RESOLVE_STATUS_NAME",
        default_value = "Resolved"
    )]
    pub resolve_status_name: String,
}

impl RedmineConfig {
    /// Binds each configured key to the classification named by its setting.
    pub fn api_keys(&self) -> ApiKeys {
        let mut keys = ApiKeys::builder()
            .bind(ClientType::EndUser, &self.unregistered_user_api_key)
            .bind(ClientType::Registered, &self.registered_user_api_key);

        if let Some(system_key) = self.system_api_key() {
            keys = keys.bind(ClientType::System, system_key);
        }

        keys.build()
    }

    /// The system key, unless unset or blank.
    pub fn system_api_key(&self) -> Option<&str> {
        self.system_api_key
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Config {
    pub fn from_env() -> Self {
        let config = <Self as Parser>::parse();
        config.validate();
        config
    }

    pub fn log_startup_warnings(&self) {
        let redmine = &self.redmine;

        if redmine.registered_user_api_key == redmine.unregistered_user_api_key {
            warn!(
                "REDMINE_REGISTERED_USER_API_KEY and REDMINE_UNREGISTERED_USER_API_KEY are \
                 identical, registered and end-user requests will act as the same redmine user"
            );
        }

        if redmine.system_api_key().is_none() {
            warn!("REDMINE_SYSTEM_API_KEY is unset, requests from SYSTEM clients will be rejected");
        }

        // Fingerprints let operators confirm which key is bound to which classification.
        for (client_type, key) in redmine.api_keys().iter() {
            info!(
                client_type = client_type.as_str(),
                fingerprint = %key_fingerprint(key),
                "redmine api key bound"
            );
        }
    }

    fn validate(&self) {
        assert_non_empty("REDMINE_BASE_URL", &self.redmine.base_url);
        assert!(
            self.redmine.base_url.starts_with("http://")
                || self.redmine.base_url.starts_with("https://"),
            "REDMINE_BASE_URL must be an http(s) URL"
        );
        assert_non_empty(
            "REDMINE_REGISTERED_USER_API_KEY",
            &self.redmine.registered_user_api_key,
        );
        assert_non_empty(
            "REDMINE_UNREGISTERED_USER_API_KEY",
            &self.redmine.unregistered_user_api_key,
        );
        assert_non_empty(
            "REDMINE_CREATE_STATUS_NAME",
            &self.redmine.create_status_name,
        );
        assert_non_empty(
            "REDMINE_RESOLVE_STATUS_NAME",
            &self.redmine.resolve_status_name,
        );
        assert!(
            self.redmine.create_status_name != self.redmine.resolve_status_name,
            "REDMINE_CREATE_STATUS_NAME and REDMINE_RESOLVE_STATUS_NAME must differ"
        );
        assert_positive("REDMINE_PROJECT_ID", self.redmine.project_id);
        assert_positive("REDMINE_TRACKER_ID", self.redmine.tracker_id);
        assert_positive("REDMINE_CREATE_STATUS_ID", self.redmine.create_status_id);
        assert_positive("REDMINE_RESOLVE_STATUS_ID", self.redmine.resolve_status_id);
        assert!(
            self.max_request_body_bytes > 0,
            "SUPPORT_MAX_REQUEST_BODY_BYTES must be greater than 0"
        );
    }
}

pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut encoded = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        let _ = write!(&mut encoded, "{byte:02x}");
    }
    encoded
}

fn assert_non_empty(key: &'static str, value: &str) {
    assert!(!value.trim().is_empty(), "{key} must not be empty");
}

fn assert_positive(key: &'static str, value: i64) {
    assert!(value > 0, "{key} must be greater than 0");
}
