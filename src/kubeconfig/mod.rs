//! Managed kubeconfig file.
//!
//! Entries named `<tenant>-...` belong to this tool for that tenant and are
//! rebuilt on every `configure-kube`. Everything else in the file belongs to
//! the user or other tooling and is carried through merges untouched.

mod builder;
mod merge;

pub use builder::{build_entries, BuiltEntries, TenantScope};
pub use merge::{check_kubeconfig_env, EnvAdvice, KubeConfigMerger};

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

/// A kubeconfig document.
///
/// Only the three entry lists are interpreted; unknown top-level keys such as
/// `current-context` or `preferences` are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default, deserialize_with = "nullable_list")]
    pub clusters: Vec<NamedEntry>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub contexts: Vec<NamedEntry>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub users: Vec<NamedEntry>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            contexts: Vec::new(),
            users: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

// kubectl writes `users: null` for empty lists.
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<NamedEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<NamedEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One `clusters`/`contexts`/`users` item: a name plus whatever else the
/// entry holds, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEntry {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub body: BTreeMap<String, Value>,
}

impl NamedEntry {
    pub fn new(name: impl Into<String>, key: &str, value: Value) -> Self {
        let mut body = BTreeMap::new();
        body.insert(key.to_string(), value);
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}
