use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration.
///
/// Built once in `main` from environment presets plus per-field overrides and
/// passed by reference (`Arc`) into the router state. Nothing in the request
/// path mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Request header carrying the tenant identifier (canonical UUID).
    pub tenant_header: String,
    /// When enabled, flagged global admins may reach admin routes without a
    /// tenant header. Deployment config, never request data.
    pub admin_bypass: bool,
    /// Token introspection endpoint of the external identity provider.
    pub introspection_url: String,
    pub introspection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Run against the in-memory store instead of Postgres (local/dev only).
    pub in_memory: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, specific env vars override
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("SERVER_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }

        if let Ok(v) = env::var("SECURITY_TENANT_HEADER") {
            self.security.tenant_header = v.to_ascii_lowercase();
        }
        if let Ok(v) = env::var("SECURITY_ADMIN_BYPASS") {
            self.security.admin_bypass = v.parse().unwrap_or(self.security.admin_bypass);
        }
        if let Ok(v) = env::var("SECURITY_INTROSPECTION_URL") {
            self.security.introspection_url = v;
        }
        if let Ok(v) = env::var("SECURITY_INTROSPECTION_TIMEOUT_SECS") {
            self.security.introspection_timeout_secs =
                v.parse().unwrap_or(self.security.introspection_timeout_secs);
        }

        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_IN_MEMORY") {
            self.store.in_memory = v.parse().unwrap_or(self.store.in_memory);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
                enable_cors: true,
            },
            security: SecurityConfig {
                tenant_header: "x-cliente-id".to_string(),
                admin_bypass: true,
                introspection_url: "http://localhost:9000/oauth/introspect".to_string(),
                introspection_timeout_secs: 5,
            },
            store: StoreConfig {
                database_url: None,
                max_connections: 10,
                in_memory: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
                enable_cors: true,
            },
            security: SecurityConfig {
                tenant_header: "x-cliente-id".to_string(),
                admin_bypass: false,
                introspection_url: "https://id.staging.example.com/oauth/introspect".to_string(),
                introspection_timeout_secs: 5,
            },
            store: StoreConfig {
                database_url: None,
                max_connections: 20,
                in_memory: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
                enable_cors: true,
            },
            security: SecurityConfig {
                tenant_header: "x-cliente-id".to_string(),
                admin_bypass: false,
                introspection_url: "https://id.example.com/oauth/introspect".to_string(),
                introspection_timeout_secs: 3,
            },
            store: StoreConfig {
                database_url: None,
                max_connections: 50,
                in_memory: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.security.admin_bypass);
        assert!(config.store.in_memory);
        assert_eq!(config.security.tenant_header, "x-cliente-id");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.admin_bypass);
        assert!(!config.store.in_memory);
        assert_eq!(config.store.max_connections, 50);
    }
}
