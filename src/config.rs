use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::checkout::CommandConfig;
use crate::credentials::ProfileId;
use crate::duration::deserialize_duration_opt;

/// Default time a checkout may take before the exec path gives up.
fn default_checkout_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_exec_command() -> String {
    "credbroker".to_string()
}

/// Credential cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `<tenant>.cache`. Relative paths resolve from the
    /// config file's directory. Defaults to the user cache directory.
    pub dir: Option<PathBuf>,

    /// scrypt work factor (log2 N) for new cache writes. Unset uses
    /// `cache::DEFAULT_WORK_FACTOR`, which keeps a cache hit to milliseconds.
    pub kdf_work_factor: Option<u8>,
}

/// How credentials are checked out from the IAM service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Helper program and leading arguments.
    pub command: CommandConfig,

    /// Upper bound on a single checkout, e.g. "90s" or "5m".
    #[serde(
        default = "default_checkout_timeout",
        deserialize_with = "deserialize_duration_opt"
    )]
    pub timeout: Option<Duration>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            command: CommandConfig::default(),
            timeout: default_checkout_timeout(),
        }
    }
}

/// Kubeconfig generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfigSettings {
    /// Directory for the managed kubeconfig. Defaults to `kube/` next to the
    /// config file.
    pub dir: Option<PathBuf>,

    /// Program kubectl invokes for credentials.
    #[serde(default = "default_exec_command")]
    pub exec_command: String,
}

impl Default for KubeConfigSettings {
    fn default() -> Self {
        Self {
            dir: None,
            exec_command: default_exec_command(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tenant alias; scopes cache files and kubeconfig entry names.
    pub tenant: Option<String>,

    /// Name used for the per-tenant kubeconfig user.
    pub username: Option<String>,

    /// Alias -> `application/environment/profile`.
    pub profile_aliases: BTreeMap<String, String>,

    pub cache: CacheConfig,
    pub checkout: CheckoutConfig,
    pub kube: KubeConfigSettings,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Returns the default config file path: `credbroker/config.toml` under the
/// platform config directory, or `./credbroker.toml` if there is none.
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("credbroker").join("config.toml"),
        None => PathBuf::from("credbroker.toml"),
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub kube_dir: PathBuf,
    pub tenant: Option<String>,
    pub username: Option<String>,
    pub profile_aliases: BTreeMap<String, String>,
    pub cache: CacheConfig,
    pub checkout: CheckoutConfig,
    pub kube: KubeConfigSettings,
}

fn resolve_dir(dir: Option<&Path>, base: &Path, fallback: PathBuf) -> PathBuf {
    match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => base.join(dir),
        None => fallback,
    }
}

impl ResolvedConfig {
    /// Load config, falling back to defaults when the file doesn't exist.
    ///
    /// Relative directories resolve from the config file's parent directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        Ok(Self::from_config(config, config_dir))
    }

    pub fn from_config(config: Config, config_dir: PathBuf) -> Self {
        let default_cache = dirs::cache_dir()
            .map(|dir| dir.join("credbroker"))
            .unwrap_or_else(|| config_dir.join("cache"));

        Self {
            cache_dir: resolve_dir(config.cache.dir.as_deref(), &config_dir, default_cache),
            kube_dir: resolve_dir(config.kube.dir.as_deref(), &config_dir, config_dir.join("kube")),
            config_dir,
            tenant: config.tenant,
            username: config.username,
            profile_aliases: config.profile_aliases,
            cache: config.cache,
            checkout: config.checkout,
            kube: config.kube,
        }
    }

    /// Tenant alias, lowercased. A non-empty `override_tenant` wins.
    pub fn tenant_alias(&self, override_tenant: Option<&str>) -> Result<String> {
        override_tenant
            .or(self.tenant.as_deref())
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().to_lowercase())
            .context("No tenant configured; set `tenant` in the config file or pass --tenant")
    }

    /// Profile aliases.
    ///
    /// With `reverse_keys`, maps lowercased profile path -> alias (the first
    /// alias in sorted order wins when several name the same profile).
    /// Otherwise maps alias -> profile path as written.
    pub fn profile_aliases(&self, reverse_keys: bool) -> HashMap<String, String> {
        if !reverse_keys {
            return self
                .profile_aliases
                .iter()
                .map(|(alias, profile)| (alias.clone(), profile.clone()))
                .collect();
        }

        let mut reversed = HashMap::new();
        for (alias, profile) in &self.profile_aliases {
            let key = ProfileId::parse(profile)
                .map(|id| id.key())
                .unwrap_or_else(|_| profile.to_lowercase());
            reversed.entry(key).or_insert_with(|| alias.clone());
        }
        reversed
    }

    /// Turn an alias or profile path into a profile identity.
    pub fn resolve_profile(&self, reference: &str) -> Result<ProfileId> {
        let path = self
            .profile_aliases
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference);
        ProfileId::parse(path).with_context(|| format!("Unknown profile or alias {reference:?}"))
    }

    pub fn cache_path(&self, tenant: &str) -> PathBuf {
        self.cache_dir.join(format!("{tenant}.cache"))
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.kube_dir.join("config")
    }

    /// Username for kubeconfig user entries: configured, else `$USER`.
    pub fn username(&self) -> Result<String> {
        self.username
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .filter(|u| !u.is_empty())
            .context("No username configured; set `username` in the config file")
    }
}
