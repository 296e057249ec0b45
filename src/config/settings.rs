use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub anthropic: AnthropicConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub static_dir: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| {
                AppError::Configuration("SERVER_PORT must be a valid port number".to_string())
            })?;

        // CORS origins
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let static_dir = env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string());

        // Upstream API config
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AppError::Configuration("ANTHROPIC_API_KEY must be set".to_string()))?;

        let anthropic_base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(AppSettings {
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
                static_dir,
            },
            anthropic: AnthropicConfig {
                api_key: anthropic_api_key,
                base_url: anthropic_base_url,
            },
        })
    }
}
