use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Paths reachable without credentials when none are configured.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 4] = [
    "/api/v1/status/",
    "/api/v1/unauthorized/",
    "/api/v1/forbidden/",
    "/api/v1/auth_session/login/",
];

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Which authenticator guards the `/api/v1` scope.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    Auth,
    BasicAuth,
    SessionAuth,
    SessionExpAuth,
    SessionDbAuth,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub auth_type: AuthType,
    /// Cookie carrying the session id for the `/api/v1` scope.
    pub session_name: String,
    /// Session lifetime in seconds; zero or negative never expires.
    pub session_duration: i64,
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_any_origin: bool,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

fn with_defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("environment", environment)?
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5000)?
        .set_default("server.workers", num_cpus::get() as i64)?
        .set_default("database.url", "sqlite://sessionauth.db")?
        .set_default("database.max_connections", 5)?
        .set_default("auth.auth_type", "session_auth")?
        .set_default("auth.session_name", "_my_session_id")?
        .set_default("auth.session_duration", 0)?
        .set_default("auth.excluded_paths", DEFAULT_EXCLUDED_PATHS.to_vec())?
        .set_default("cors.enabled", true)?
        .set_default("cors.allow_any_origin", true)?
        .set_default("cors.max_age", 3600)
}

/// `APP_`-prefixed variables; `APP_AUTH__EXCLUDED_PATHS` takes a comma-separated list.
fn environment() -> Environment {
    Environment::with_prefix("app")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("auth.excluded_paths")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = with_defaults("development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))

            // E.g., `APP_AUTH__AUTH_TYPE=session_db_auth` sets `Settings.auth.auth_type`
            .add_source(environment())
            .build()?;

        s.try_deserialize::<Self>()?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Message("server.workers must be at least 1".into()));
        }
        Ok(self)
    }

    /// Defaults only, with an in-memory database. Environment variables are
    /// ignored so tests stay independent of the shell they run in.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        with_defaults("test")?
            .set_override("server.workers", 1)?
            .set_override("database.url", "sqlite::memory:")?
            .set_override("database.max_connections", 1)?
            .build()?
            .try_deserialize()
    }

    /// Test settings with a different authenticator.
    pub fn new_for_test_with_auth(auth_type: AuthType, session_duration: i64) -> Result<Self, ConfigError> {
        let mut settings = Self::new_for_test()?;
        settings.auth.auth_type = auth_type;
        settings.auth.session_duration = session_duration;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.database.max_connections, 1);
        assert_eq!(settings.auth.auth_type, AuthType::SessionAuth);
        assert_eq!(settings.auth.session_name, "_my_session_id");
        assert_eq!(settings.auth.session_duration, 0);
        assert_eq!(settings.auth.excluded_paths.len(), DEFAULT_EXCLUDED_PATHS.len());
        assert!(settings.cors.enabled);
    }

    #[test]
    fn test_file_override() {
        let overrides = r#"
            [server]
            port = 9000

            [auth]
            auth_type = "session_db_auth"
            session_duration = 60
            excluded_paths = ["/api/v1/status/", "/api/v1/stat*"]
        "#;

        let settings = with_defaults("test")
            .unwrap()
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()
            .expect("Failed to build config")
            .try_deserialize::<Settings>()
            .expect("Failed to deserialize settings");

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.auth.auth_type, AuthType::SessionDbAuth);
        assert_eq!(settings.auth.session_duration, 60);
        assert_eq!(settings.auth.excluded_paths, vec!["/api/v1/status/", "/api/v1/stat*"]);
    }

    #[test]
    fn test_invalid_port() {
        let result = with_defaults("test")
            .unwrap()
            .add_source(File::from_str("[server]\nport = \"invalid\"", FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize::<Settings>());

        assert!(result.is_err(), "Expected error for invalid port");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let settings = with_defaults("test")
            .unwrap()
            .add_source(File::from_str("[server]\nworkers = 0", FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert!(settings.validated().is_err());
        assert!(Settings::new_for_test().unwrap().validated().is_ok());
    }

    #[test]
    fn test_excluded_paths_from_environment() {
        let vars = config::Map::from([
            ("APP_AUTH__EXCLUDED_PATHS".to_string(), "/api/v1/status/,/api/v1/stat*".to_string()),
            ("APP_AUTH__AUTH_TYPE".to_string(), "basic_auth".to_string()),
            ("APP_SERVER__PORT".to_string(), "8080".to_string()),
        ]);

        let settings = with_defaults("test")
            .unwrap()
            .add_source(environment().source(Some(vars)))
            .build()
            .expect("Failed to build config")
            .try_deserialize::<Settings>()
            .expect("Failed to deserialize settings");

        assert_eq!(settings.auth.excluded_paths, vec!["/api/v1/status/", "/api/v1/stat*"]);
        assert_eq!(settings.auth.auth_type, AuthType::BasicAuth);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.auth.session_name, "_my_session_id");
    }

    #[test]
    fn test_unknown_auth_type_rejected() {
        let result = with_defaults("test")
            .unwrap()
            .add_source(File::from_str("[auth]\nauth_type = \"kerberos\"", FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize::<Settings>());

        assert!(result.is_err());
    }
}
