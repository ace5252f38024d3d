use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConvoError, Result};

/// Environment variable overriding `backend.url`.
pub const SUPABASE_URL_ENV: &str = "CONVO_SUPABASE_URL";
/// Environment variable overriding `backend.anon_key`.
pub const SUPABASE_ANON_KEY_ENV: &str = "CONVO_SUPABASE_ANON_KEY";
/// Environment variable overriding `analysis.api_key`.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration for the Convo client.
///
/// Loaded from `~/.convo/config.toml` by default. Each section corresponds
/// to one external collaborator or to the recording session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

impl ConvoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConvoConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConvoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply credential overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(SUPABASE_URL_ENV) {
            self.backend.url = url;
        }
        if let Some(key) = non_empty(SUPABASE_ANON_KEY_ENV) {
            self.backend.anon_key = key;
        }
        if let Some(key) = non_empty(GEMINI_API_KEY_ENV) {
            self.analysis.api_key = Some(key);
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Hosted backend (auth + document storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key sent as the `apikey` header.
    pub anon_key: String,
    /// Timeout applied to every backend HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Whether both the URL and the anon key are present.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

/// Key-point extraction via the generative-language API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// API key. When absent the extractor returns no key points.
    pub api_key: Option<String>,
    /// Model name passed to `generateContent`.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Maximum number of key points kept per response.
    pub max_key_points: usize,
    /// Maximum characters per key point (including the ellipsis).
    pub max_point_chars: usize,
    /// Timeout for a single analysis call.
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_key_points: 3,
            max_point_chars: 100,
            timeout_secs: 30,
        }
    }
}

/// Recording session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on the persistence step of a save.
    pub save_timeout_secs: u64,
    /// Value stored in `Response.participants` when no recipient is selected.
    pub everyone_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_timeout_secs: 60,
            everyone_label: "everyone".to_string(),
        }
    }
}

/// Sign-in / sign-up form rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Minimum password length accepted by the forms.
    pub min_password_len: usize,
    /// Redirect target embedded in password-reset emails.
    pub reset_redirect_url: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_len: 6,
            reset_redirect_url: None,
        }
    }
}

/// Summary export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Command that receives the summary on stdin, e.g. `["wl-copy"]`.
    /// When empty a platform default is probed.
    pub clipboard_command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ConvoConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.backend.url.is_empty());
        assert!(!config.backend.is_configured());
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert!(config.analysis.api_key.is_none());
        assert_eq!(config.analysis.model, "gemini-pro");
        assert_eq!(config.analysis.max_key_points, 3);
        assert_eq!(config.analysis.max_point_chars, 100);
        assert_eq!(config.session.save_timeout_secs, 60);
        assert_eq!(config.session.everyone_label, "everyone");
        assert_eq!(config.auth.min_password_len, 6);
        assert!(config.share.clipboard_command.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
url = "https://demo.supabase.co"
anon_key = "anon"
request_timeout_secs = 10

[analysis]
api_key = "secret"
model = "gemini-1.5-flash"
timeout_secs = 5

[share]
clipboard_command = ["xclip", "-selection", "clipboard"]
"#;
        let file = create_temp_config(content);
        let config = ConvoConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(config.backend.is_configured());
        assert_eq!(config.backend.request_timeout_secs, 10);
        assert_eq!(config.analysis.api_key.as_deref(), Some("secret"));
        assert_eq!(config.analysis.model, "gemini-1.5-flash");
        assert_eq!(config.analysis.timeout_secs, 5);
        // untouched fields keep defaults
        assert_eq!(config.analysis.max_key_points, 3);
        assert_eq!(
            config.share.clipboard_command,
            vec!["xclip", "-selection", "clipboard"]
        );
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ConvoConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.session.save_timeout_secs, 60);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(ConvoConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConvoConfig::load_or_default(Path::new("/nonexistent/convo/config.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConvoConfig::default();
        config.backend.url = "https://demo.supabase.co".to_string();
        config.save(&path).unwrap();

        let reloaded = ConvoConfig::load(&path).unwrap();
        assert_eq!(reloaded.backend.url, "https://demo.supabase.co");
        assert_eq!(reloaded.analysis.model, config.analysis.model);
    }

    #[test]
    fn test_apply_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (SUPABASE_URL_ENV, "https://env.supabase.co"),
            (SUPABASE_ANON_KEY_ENV, "env-anon"),
            (GEMINI_API_KEY_ENV, "env-gemini"),
        ]);
        let mut config = ConvoConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "https://env.supabase.co");
        assert_eq!(config.backend.anon_key, "env-anon");
        assert_eq!(config.analysis.api_key.as_deref(), Some("env-gemini"));
    }

    #[test]
    fn test_apply_overrides_ignores_blank_values() {
        let mut config = ConvoConfig::default();
        config.analysis.api_key = Some("from-file".to_string());
        config.apply_overrides(|k| {
            if k == GEMINI_API_KEY_ENV {
                Some("  ".to_string())
            } else {
                None
            }
        });
        assert_eq!(config.analysis.api_key.as_deref(), Some("from-file"));
    }
}
