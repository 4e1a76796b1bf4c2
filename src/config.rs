use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dgis: PlatformConfig,
    pub flamp: PlatformConfig,
    pub gateway: GatewayConfig,
    pub encryption: EncryptionConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Base address of one external review-aggregator microservice.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Ceiling for every upstream call, in seconds. Expired calls are
    /// abandoned and reported as a timeout; they are never retried here.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte AES-256-GCM key for credential encryption.
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the upstream proxy endpoints
    pub proxy_per_second: u32,
    /// Burst size for the upstream proxy endpoints
    pub proxy_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            dgis: PlatformConfig {
                base_url: env::var("DGIS_SERVICE_ADDRESS")
                    .map_err(|_| ConfigError::MissingEnv("DGIS_SERVICE_ADDRESS".to_string()))?,
            },
            flamp: PlatformConfig {
                base_url: env::var("FLAMP_SERVICE_ADDRESS")
                    .map_err(|_| ConfigError::MissingEnv("FLAMP_SERVICE_ADDRESS".to_string()))?,
            },
            gateway: GatewayConfig {
                timeout_seconds: env::var("GATEWAY_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            encryption: EncryptionConfig {
                key: env::var("ENCRYPTION_KEY")
                    .map_err(|_| ConfigError::MissingEnv("ENCRYPTION_KEY".to_string()))?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            rate_limit: RateLimitConfig {
                proxy_per_second: env::var("RATE_LIMIT_PROXY_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                proxy_burst: env::var("RATE_LIMIT_PROXY_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            dgis: PlatformConfig {
                base_url: "http://localhost:8001".to_string(),
            },
            flamp: PlatformConfig {
                base_url: "http://localhost:8002".to_string(),
            },
            gateway: GatewayConfig {
                timeout_seconds: 30,
            },
            encryption: EncryptionConfig { key: String::new() },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                proxy_per_second: 10,
                proxy_burst: 50,
            },
        }
    }
}
