//! Application configuration loaded from environment variables.
//!
//! The Firebase backend is optional. With no API key and no project ID the
//! session manager starts in disabled mode and refuses every operation.

use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase Web API key (public, identifies the project to Auth)
    pub firebase_api_key: Option<String>,
    /// Firebase / GCP project ID (Firestore database owner)
    pub firebase_project_id: Option<String>,
    /// Auth emulator host, e.g. "localhost:9099"
    pub auth_emulator_host: Option<String>,
    /// Where the signed-in session is persisted between runs
    pub session_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `FIREBASE_API_KEY` and `FIREBASE_PROJECT_ID` must be set together.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let firebase_api_key = non_empty_var("FIREBASE_API_KEY");
        let firebase_project_id = non_empty_var("FIREBASE_PROJECT_ID");

        match (&firebase_api_key, &firebase_project_id) {
            (Some(_), None) => return Err(ConfigError::Missing("FIREBASE_PROJECT_ID")),
            (None, Some(_)) => return Err(ConfigError::Missing("FIREBASE_API_KEY")),
            _ => {}
        }

        Ok(Self {
            firebase_api_key,
            firebase_project_id,
            auth_emulator_host: non_empty_var("FIREBASE_AUTH_EMULATOR_HOST"),
            session_file: non_empty_var("SESSION_FILE").map(PathBuf::from),
        })
    }

    /// Whether a Firebase backend is configured.
    pub fn is_backend_configured(&self) -> bool {
        self.firebase_api_key.is_some() && self.firebase_project_id.is_some()
    }

    /// Config for tests: emulator-backed project, no persisted session.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: Some("test-api-key".to_string()),
            firebase_project_id: Some("test-project".to_string()),
            auth_emulator_host: Some("localhost:9099".to_string()),
            session_file: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "FIREBASE_API_KEY",
            "FIREBASE_PROJECT_ID",
            "FIREBASE_AUTH_EMULATOR_HOST",
            "SESSION_FILE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("FIREBASE_API_KEY", "key");
        env::set_var("FIREBASE_PROJECT_ID", "odyssey-dev");
        env::set_var("SESSION_FILE", "/tmp/odyssey-session.json");

        let config = Config::from_env().expect("Config should load");

        assert!(config.is_backend_configured());
        assert_eq!(config.firebase_project_id.as_deref(), Some("odyssey-dev"));
        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/odyssey-session.json"))
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unconfigured_backend_is_not_an_error() {
        clear_env();

        let config = Config::from_env().expect("Config should load");

        assert!(!config.is_backend_configured());
        assert!(config.session_file.is_none());
    }

    #[test]
    #[serial]
    fn test_half_configured_backend_is_rejected() {
        clear_env();
        env::set_var("FIREBASE_API_KEY", "key");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FIREBASE_PROJECT_ID")));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_values_count_as_unset() {
        clear_env();
        env::set_var("FIREBASE_API_KEY", "   ");
        env::set_var("FIREBASE_PROJECT_ID", "");

        let config = Config::from_env().expect("Config should load");
        assert!(!config.is_backend_configured());
        clear_env();
    }
}
