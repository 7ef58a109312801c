// Local configuration for the version-control client.
//
// Global config: `~/.tfvc/config.toml`
// Per-workspace state: `<configuration_dir>/workspaces/<key>/`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tfvc_common::types::Workspace;

/// Root directory for client global state: `~/.tfvc/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tfvc"))
}

/// Path to the global config file: `~/.tfvc/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Directory holding one workspace's queued edits and local tables.
///
/// Keyed by a digest of the security token so renames of the workspace do
/// not orphan its state.
pub fn workspace_dir(configuration_dir: &Path, workspace: &Workspace) -> PathBuf {
    let key = match &workspace.security_token {
        Some(token) => token.to_lowercase(),
        None => format!("{};{}", workspace.name, workspace.owner).to_lowercase(),
    };
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    configuration_dir.join("workspaces").join(hex)
}

// ── Client config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Root for per-workspace state (defaults to `~/.tfvc`).
    pub configuration_dir: Option<PathBuf>,
    /// Machine name used to decide whether a workspace lives here.
    pub computer_name: Option<String>,
    /// On-disk workspace-info cache consulted on runtime cache misses.
    pub workspace_cache: Option<PathBuf>,
    pub local: LocalConfig,
    pub log: LogConfig,
}

impl ClientConfig {
    /// Load from `~/.tfvc/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn resolved_configuration_dir(&self) -> PathBuf {
        self.configuration_dir
            .clone()
            .or_else(global_dir)
            .unwrap_or_else(|| PathBuf::from(".tfvc"))
    }

    pub fn resolved_computer_name(&self) -> String {
        self.computer_name
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Local-workspace behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    /// Install the local-workspace strategy (answer from local tables).
    pub enabled: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Default `tracing` filter, e.g. `tfvc_client=debug`.
    pub filter: Option<String>,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tfvc_common::types::WorkspaceLocation;

    #[test]
    fn defaults_enable_local_strategy() {
        let config = ClientConfig::default();
        assert!(config.local.enabled);
        assert!(config.configuration_dir.is_none());
    }

    #[test]
    fn roundtrip_through_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let config = ClientConfig {
            configuration_dir: Some(tmp.path().join("state")),
            computer_name: Some("BUILD01".into()),
            workspace_cache: None,
            local: LocalConfig { enabled: false },
            log: LogConfig {
                filter: Some("tfvc_client=debug".into()),
            },
        };
        config.save_to(&path).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "computer_name = \"dev-box\"\n").unwrap();
        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.resolved_computer_name(), "dev-box");
        assert!(config.local.enabled);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "local = 3").unwrap();
        assert!(matches!(
            ClientConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn workspace_dir_is_stable_and_case_insensitive() {
        let root = Path::new("/cfg");
        let mut ws = Workspace::new("WS", "alice", "box", WorkspaceLocation::Server);
        ws.security_token = Some("Token;WS;alice".into());
        let first = workspace_dir(root, &ws);
        ws.security_token = Some("token;ws;ALICE".into());
        assert_eq!(workspace_dir(root, &ws), first);
        assert!(first.starts_with("/cfg/workspaces"));
        assert_eq!(first.file_name().unwrap().len(), 16);
    }
}
