//! CLI argument definitions for the Convo terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CONVO_CONFIG";

/// Convo - record multi-party conversations and summarize them by topic.
#[derive(Parser, Debug)]
#[command(name = "convo", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Keep everything in memory even when a backend is configured.
    #[arg(long = "offline")]
    pub offline: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONVO_CONFIG env var > ~/.convo/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = lookup(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path(lookup)
    }

    /// Resolve the tracing filter directive used when `RUST_LOG` is unset.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let home_var = if cfg!(target_os = "windows") {
        "USERPROFILE"
    } else {
        "HOME"
    };
    match lookup(home_var) {
        Some(home) => PathBuf::from(home).join(".convo").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["convo"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_parse_flags() {
        let cli = args(&["--config", "/tmp/c.toml", "-l", "debug", "--offline", "-y"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.offline);
        assert!(cli.assume_yes);
    }

    #[test]
    fn test_config_path_priority() {
        let env = |key: &str| match key {
            CONFIG_ENV => Some("/etc/convo.toml".to_string()),
            "HOME" | "USERPROFILE" => Some("/home/alice".to_string()),
            _ => None,
        };
        let flag = args(&["-c", "/tmp/flag.toml"]);
        assert_eq!(flag.resolve_config_path_with(env), PathBuf::from("/tmp/flag.toml"));

        let plain = args(&[]);
        assert_eq!(plain.resolve_config_path_with(env), PathBuf::from("/etc/convo.toml"));

        let home_only = |key: &str| match key {
            "HOME" | "USERPROFILE" => Some("/home/alice".to_string()),
            _ => None,
        };
        assert_eq!(
            plain.resolve_config_path_with(home_only),
            PathBuf::from("/home/alice").join(".convo").join("config.toml")
        );
        assert_eq!(plain.resolve_config_path_with(|_| None), PathBuf::from("config.toml"));
    }

    #[test]
    fn test_log_level_priority() {
        assert_eq!(args(&["-l", "trace"]).resolve_log_level("info"), "trace");
        assert_eq!(args(&[]).resolve_log_level("warn"), "warn");
    }
}
