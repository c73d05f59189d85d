//! Configuration loading (.env + ~/.shipyardctl/config)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ShipyardError};

pub const DEFAULT_CLUSTER_TARGET: &str = "https://shipyard.apigee.com";
pub const DEFAULT_SSO_TARGET: &str = "https://login.apigee.com";
pub const DEFAULT_MGMT_TARGET: &str = "https://api.enterprise.apigee.com";

const DEFAULT_CONTEXT: &str = "default";

/// Load .env from the working directory if one exists
pub fn load_env() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env: {}", e),
    }
}

/// Config file location
///
/// Order: explicit `--config`, then `SHIPYARDCTL_CONFIG`, then `~/.shipyardctl/config`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("SHIPYARDCTL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".shipyardctl").join("config"))
        .ok_or_else(|| ShipyardError::Config("could not determine home directory".into()))
}

// ============ Config File Types ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub current_context: String,
    pub contexts: Vec<Context>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub name: String,
    pub cluster_info: ClusterInfo,
    #[serde(default)]
    pub user_info: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterInfo {
    pub cluster: String,
    pub sso: String,
    pub mgmt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            cluster: DEFAULT_CLUSTER_TARGET.into(),
            sso: DEFAULT_SSO_TARGET.into(),
            mgmt: DEFAULT_MGMT_TARGET.into(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            current_context: DEFAULT_CONTEXT.into(),
            contexts: vec![Context {
                name: DEFAULT_CONTEXT.into(),
                cluster_info: ClusterInfo::default(),
                user_info: UserInfo::default(),
            }],
        }
    }
}

impl ConfigFile {
    /// Read the config file, falling back to defaults when it does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        config.check(path)?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but an unknown current context only warns
    ///
    /// Targets then resolve to their defaults, and [`set_token`](Self::set_token)
    /// creates the missing context.
    pub fn load_lenient(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        if let Err(e) = config.check(path) {
            tracing::warn!("{}, using default targets", e);
        }
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ConfigFile = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn check(&self, path: &Path) -> Result<()> {
        if self.current().is_none() {
            return Err(ShipyardError::Config(format!(
                "current context '{}' not found in {:?}",
                self.current_context, path
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn current(&self) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == self.current_context)
    }

    /// Store credentials on the current context, creating it if needed
    pub fn set_token(&mut self, username: &str, token: &str) {
        let name = self.current_context.clone();
        if !self.contexts.iter().any(|c| c.name == name) {
            self.contexts.push(Context {
                name: name.clone(),
                cluster_info: ClusterInfo::default(),
                user_info: UserInfo::default(),
            });
        }

        if let Some(context) = self.contexts.iter_mut().find(|c| c.name == name) {
            context.user_info = UserInfo {
                username: username.into(),
                token: token.into(),
            };
        }
    }
}

// ============ Resolved Settings ============

/// Targets and credentials for one invocation, after env overrides
#[derive(Debug, Clone)]
pub struct Settings {
    pub cluster_target: String,
    pub sso_target: String,
    pub mgmt_target: String,
    pub token: Option<String>,
    pub public_key: Option<String>,
    pub config_path: PathBuf,
}

impl Settings {
    /// `lenient` tolerates a config whose current context is missing
    pub fn load(explicit: Option<&Path>, lenient: bool) -> Result<Self> {
        let config_path = config_path(explicit)?;
        let file = if lenient {
            ConfigFile::load_lenient(&config_path)?
        } else {
            ConfigFile::load(&config_path)?
        };
        Ok(Self::resolve(&file, config_path, |key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        }))
    }

    /// Environment variables win over the config file's current context
    pub fn resolve<F>(file: &ConfigFile, config_path: PathBuf, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let context = file.current();
        let from_file = |pick: fn(&Context) -> &String| {
            context.map(pick).filter(|v| !v.is_empty()).cloned()
        };

        Self {
            cluster_target: env("CLUSTER_TARGET")
                .or_else(|| from_file(|c| &c.cluster_info.cluster))
                .unwrap_or_else(|| DEFAULT_CLUSTER_TARGET.into()),
            sso_target: env("SSO_TARGET")
                .or_else(|| from_file(|c| &c.cluster_info.sso))
                .unwrap_or_else(|| DEFAULT_SSO_TARGET.into()),
            mgmt_target: env("MGMT_API_TARGET")
                .or_else(|| from_file(|c| &c.cluster_info.mgmt))
                .unwrap_or_else(|| DEFAULT_MGMT_TARGET.into()),
            token: env("APIGEE_TOKEN").or_else(|| from_file(|c| &c.user_info.token)),
            public_key: env("PUBLIC_KEY"),
            config_path,
        }
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ShipyardError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load(&dir.path().join("config")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(
            config.current().unwrap().cluster_info.cluster,
            DEFAULT_CLUSTER_TARGET
        );
    }

    #[test]
    fn token_survives_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config");

        let mut config = ConfigFile::default();
        config.set_token("admin@acme.com", "abc123");
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        let user = &loaded.current().unwrap().user_info;
        assert_eq!(user.username, "admin@acme.com");
        assert_eq!(user.token, "abc123");
    }

    #[test]
    fn set_token_creates_missing_current_context() {
        let mut config = ConfigFile {
            current_context: "prod".into(),
            contexts: vec![],
        };
        config.set_token("me", "tok");
        let context = config.current().unwrap();
        assert_eq!(context.name, "prod");
        assert_eq!(context.cluster_info.sso, DEFAULT_SSO_TARGET);
        assert_eq!(context.user_info.token, "tok");
    }

    #[test]
    fn unknown_current_context_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "currentContext: nope\ncontexts: []\n").unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(ShipyardError::Config(_))
        ));
    }

    #[test]
    fn lenient_load_repairs_unknown_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "currentContext: nope\ncontexts: []\n").unwrap();

        let mut config = ConfigFile::load_lenient(&path).unwrap();
        let settings = Settings::resolve(&config, path.clone(), env_of(&[]));
        assert_eq!(settings.cluster_target, DEFAULT_CLUSTER_TARGET);

        config.set_token("me", "tok");
        config.save(&path).unwrap();
        let repaired = ConfigFile::load(&path).unwrap();
        assert_eq!(repaired.current().unwrap().name, "nope");
        assert_eq!(repaired.current().unwrap().user_info.token, "tok");
    }

    #[test]
    fn lenient_load_still_rejects_broken_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "currentContext: [unclosed\n").unwrap();
        assert!(matches!(
            ConfigFile::load_lenient(&path),
            Err(ShipyardError::Yaml(_))
        ));
    }

    #[test]
    fn env_overrides_config_file() {
        let mut file = ConfigFile::default();
        file.set_token("me", "file-token");

        let settings = Settings::resolve(
            &file,
            PathBuf::from("/tmp/config"),
            env_of(&[
                ("CLUSTER_TARGET", "http://localhost:8080"),
                ("APIGEE_TOKEN", "env-token"),
            ]),
        );
        assert_eq!(settings.cluster_target, "http://localhost:8080");
        assert_eq!(settings.sso_target, DEFAULT_SSO_TARGET);
        assert_eq!(settings.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn empty_file_token_counts_as_missing() {
        let settings = Settings::resolve(
            &ConfigFile::default(),
            PathBuf::from("/tmp/config"),
            env_of(&[]),
        );
        assert!(matches!(
            settings.require_token(),
            Err(ShipyardError::MissingToken)
        ));
    }
}
