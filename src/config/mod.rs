use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-Id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub tenancy: TenancyConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stage" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Request header carrying the tenant id
    pub header_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, read from DATABASE_URL
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub migrate_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Vite dev server that non-API requests are proxied to in development
    pub dev_server_url: String,
    /// Frontend project root, used to spawn the dev server
    pub project_dir: String,
    /// Built SPA served in staging and production
    pub static_dir: String,
    pub spawn_dev_server: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env::var("APP_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Environment::Development);

        Self::for_environment(environment).with_env_overrides()
    }

    /// Preset defaults for an environment, without env overrides
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    fn with_env_overrides(mut self) -> Self {
        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_HEADER_NAME") {
            if !v.trim().is_empty() {
                self.tenancy.header_name = v.trim().to_string();
            }
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_MIGRATE_ON_STARTUP") {
            self.database.migrate_on_startup = v.parse().unwrap_or(self.database.migrate_on_startup);
        }

        // API overrides
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Frontend overrides
        if let Ok(v) = env::var("FRONTEND_DEV_SERVER_URL") {
            self.frontend.dev_server_url = v;
        }
        if let Ok(v) = env::var("FRONTEND_DIR") {
            self.frontend.project_dir = v;
        }
        if let Ok(v) = env::var("FRONTEND_STATIC_DIR") {
            self.frontend.static_dir = v;
        }
        if let Ok(v) = env::var("FRONTEND_SPAWN_DEV_SERVER") {
            self.frontend.spawn_dev_server = v.parse().unwrap_or(self.frontend.spawn_dev_server);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            tenancy: TenancyConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                migrate_on_startup: true,
            },
            api: ApiConfig {
                port: 5000,
                request_timeout_secs: 60,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            frontend: FrontendConfig {
                dev_server_url: "http://localhost:5173/".to_string(),
                project_dir: "frontend".to_string(),
                static_dir: "frontend/dist".to_string(),
                spawn_dev_server: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            tenancy: TenancyConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                migrate_on_startup: true,
            },
            api: ApiConfig {
                port: 8080,
                request_timeout_secs: 30,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            frontend: FrontendConfig {
                dev_server_url: "http://localhost:5173/".to_string(),
                project_dir: "frontend".to_string(),
                static_dir: "wwwroot".to_string(),
                spawn_dev_server: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            tenancy: TenancyConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                migrate_on_startup: true,
            },
            api: ApiConfig {
                port: 8080,
                request_timeout_secs: 15,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            frontend: FrontendConfig {
                dev_server_url: "http://localhost:5173/".to_string(),
                project_dir: "frontend".to_string(),
                static_dir: "wwwroot".to_string(),
                spawn_dev_server: false,
            },
        }
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_TENANT_HEADER.to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
