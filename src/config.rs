use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Storage configuration
    pub upload_dir: String,
    pub max_upload_size: usize,
    pub image_download_timeout_secs: u64,

    // Content settings
    pub max_comment_length: usize,
    pub max_message_length: usize,
    pub max_bio_length: usize,
    pub chat_history_limit: i64,
    pub notification_preview_length: usize,
    pub tagging_suggestion_limit: i64,

    // Rate limiting
    pub rate_limit_requests: u32,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            environment: "development".to_string(),
            log_level: "pixelgram=debug,tower_http=debug".to_string(),
            log_format: "text".to_string(),

            database_url: "sqlite://pixelgram.db?mode=rwc".to_string(),
            database_max_connections: 10,

            jwt_secret: "pixelgram-development-secret".to_string(),
            jwt_expiry_hours: 24,

            upload_dir: "uploads".to_string(),
            max_upload_size: 10 * 1024 * 1024,
            image_download_timeout_secs: 5,

            max_comment_length: 2200,
            max_message_length: 5000,
            max_bio_length: 150,
            chat_history_limit: 100,
            notification_preview_length: 50,
            tagging_suggestion_limit: 10,

            rate_limit_requests: 100,

            cors_allowed_origins: "*".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),

            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,
            image_download_timeout_secs: env::var("IMAGE_DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "2200".to_string())
                .parse()?,
            max_message_length: env::var("MAX_MESSAGE_LENGTH")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            max_bio_length: env::var("MAX_BIO_LENGTH")
                .unwrap_or_else(|_| "150".to_string())
                .parse()?,
            chat_history_limit: env::var("CHAT_HISTORY_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            notification_preview_length: env::var("NOTIFICATION_PREVIEW_LENGTH")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            tagging_suggestion_limit: env::var("TAGGING_SUGGESTION_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_development() {
        let config = Config::default();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.jwt_expiry_hours, 24);
        assert_eq!(config.chat_history_limit, 100);
        assert_eq!(config.notification_preview_length, 50);
    }

    #[test]
    fn test_server_addr() {
        let config = Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 9000,
            ..Config::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
    }
}
