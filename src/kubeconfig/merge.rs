use std::path::{Path, PathBuf};

use tracing::info;

use super::{BuiltEntries, KubeConfig};
use crate::atomic;
use crate::error::{Error, Result};

/// Merges one tenant's entries into the managed kubeconfig file.
pub struct KubeConfigMerger {
    path: PathBuf,
}

impl KubeConfigMerger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current file. Absent or blank files are an empty config; a
    /// file that does not parse is an error so it is never silently replaced.
    pub fn load(&self) -> Result<KubeConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(KubeConfig::default()),
            Err(source) => {
                return Err(Error::KubeconfigReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(KubeConfig::default());
        }

        serde_yaml::from_str::<Option<KubeConfig>>(&content)
            .map(Option::unwrap_or_default)
            .map_err(|source| Error::MalformedExistingConfig {
                path: self.path.clone(),
                source,
            })
    }

    /// Replace everything `tenant` owns with `entries` and write the result.
    ///
    /// Removed before appending: clusters and users named `<tenant>-*`, and
    /// contexts named `<tenant>-*` or matching one of the newly assigned
    /// aliases. All other entries are kept as they were.
    ///
    /// When the file also holds a tenant whose alias extends this one (the
    /// exec hook of a user entry names `acme-dev` while merging `acme`),
    /// names under `acme-dev-` stay with that tenant.
    pub fn merge(&self, entries: &BuiltEntries, tenant: &str) -> Result<KubeConfig> {
        let merged = merge_entries(self.load()?, entries, tenant);

        let yaml = serde_yaml::to_string(&merged).map_err(|e| Error::Serialization {
            what: "kubeconfig",
            reason: e.to_string(),
        })?;
        atomic::write_private(&self.path, yaml.as_bytes()).map_err(|source| {
            Error::KubeconfigWriteFailed {
                path: self.path.clone(),
                source,
            }
        })?;

        info!(
            path = %self.path.display(),
            tenant,
            clusters = entries.clusters.len(),
            "Wrote kubeconfig"
        );
        Ok(merged)
    }
}

fn merge_entries(mut existing: KubeConfig, entries: &BuiltEntries, tenant: &str) -> KubeConfig {
    let prefix = format!("{tenant}-");
    // Longer tenant aliases that share our prefix (`acme-dev` vs `acme`)
    // own their own entries.
    let shadowing: Vec<String> = exec_tenants(&existing)
        .into_iter()
        .filter(|other| other != tenant && other.starts_with(&prefix))
        .map(|other| format!("{other}-"))
        .collect();
    let owned = |name: &str| {
        name.starts_with(&prefix) && !shadowing.iter().any(|p| name.starts_with(p.as_str()))
    };

    existing.clusters.retain(|c| !owned(&c.name));
    existing.users.retain(|u| !owned(&u.name));
    existing
        .contexts
        .retain(|c| !owned(&c.name) && !entries.assigned_aliases.contains(&c.name));

    existing.clusters.extend(entries.clusters.iter().cloned());
    existing.contexts.extend(entries.contexts.iter().cloned());
    existing.users.extend(entries.users.iter().cloned());
    existing
}

/// Tenants named by `--tenant` in the exec hooks of existing user entries.
fn exec_tenants(config: &KubeConfig) -> Vec<String> {
    config
        .users
        .iter()
        .filter_map(|user| user.get("user")?.get("exec")?.get("args")?.as_sequence())
        .filter_map(|args| {
            let mut args = args.iter().filter_map(|a| a.as_str());
            args.find(|a| *a == "--tenant")?;
            args.next().map(str::to_string)
        })
        .collect()
}

/// What to tell the user about the config search-path variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvAdvice {
    Included,
    Unset { export: String },
    NotListed { export: String },
}

impl EnvAdvice {
    /// User-facing instructions, if any are needed.
    pub fn message(&self) -> Option<String> {
        match self {
            EnvAdvice::Included => None,
            EnvAdvice::Unset { export } => Some(format!(
                "Please ensure your KUBECONFIG environment variable includes the credbroker managed kubeconfig file.\n{export}"
            )),
            EnvAdvice::NotListed { export } => Some(format!(
                "Please modify your KUBECONFIG environment variable to include the credbroker managed kubeconfig file.\n{export}"
            )),
        }
    }
}

/// Check whether `managed` appears in a `KUBECONFIG`-style path list.
///
/// The variable is only read. Entries are `~`-expanded and compared
/// case-insensitively.
pub fn check_kubeconfig_env(managed: &Path, kubeconfig_env: Option<&str>) -> EnvAdvice {
    let managed = managed.display().to_string();
    let kubeconfig_env = kubeconfig_env.filter(|v| !v.trim().is_empty());

    let Some(value) = kubeconfig_env else {
        return EnvAdvice::Unset {
            export: format!("export KUBECONFIG=~/.kube/config:{managed}"),
        };
    };

    let wanted = managed.to_lowercase();
    let listed = std::env::split_paths(value).any(|entry| {
        let expanded = shellexpand::tilde(&entry.display().to_string()).to_string();
        expanded.to_lowercase() == wanted
    });

    if listed {
        EnvAdvice::Included
    } else {
        EnvAdvice::NotListed {
            export: format!("export KUBECONFIG=\"${{KUBECONFIG}}:{managed}\""),
        }
    }
}
