use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_yaml::Value;

use super::NamedEntry;
use crate::checkout::AuthorizedProfile;
use crate::credentials::ProfileId;
use crate::error::{Error, Result};
use crate::exec::{EXEC_API_VERSION, PROFILE_EXTENSION_KEY};

const EXEC_EXTENSION_NAME: &str = "client.authentication.k8s.io/exec";

/// Tenant-wide inputs for building kubeconfig entries.
#[derive(Debug, Clone)]
pub struct TenantScope {
    /// Tenant alias, already lowercased.
    pub tenant: String,
    pub username: String,
    /// Program kubectl runs for credentials.
    pub exec_command: String,
}

impl TenantScope {
    pub fn prefix(&self) -> String {
        format!("{}-", self.tenant)
    }

    pub fn user_name(&self) -> String {
        format!("{}-{}", self.tenant, self.username)
    }
}

/// Entries owned by one tenant, ready to merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltEntries {
    pub clusters: Vec<NamedEntry>,
    pub contexts: Vec<NamedEntry>,
    pub users: Vec<NamedEntry>,
    /// Aliases used as context names in this build.
    pub assigned_aliases: BTreeSet<String>,
}

#[derive(Serialize)]
struct ClusterSpec<'a> {
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: &'a str,
    server: &'a str,
    extensions: Vec<Extension>,
}

#[derive(Serialize)]
struct Extension {
    name: &'static str,
    extension: BTreeMap<&'static str, String>,
}

#[derive(Serialize)]
struct ContextSpec {
    cluster: String,
    user: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecSpec {
    api_version: &'static str,
    command: String,
    args: Vec<String>,
    interactive_mode: &'static str,
    provide_cluster_info: bool,
}

#[derive(Serialize)]
struct UserSpec {
    exec: ExecSpec,
}

/// Profiles sharing one cluster endpoint (same environment and profile name).
struct ClusterGroup<'a> {
    url: &'a str,
    cert: &'a str,
    /// Keyed by lowercased application name.
    members: BTreeMap<String, ProfileId>,
}

fn sanitize(name: &str) -> String {
    name.to_lowercase()
}

fn to_value(what: &'static str, spec: impl Serialize) -> Result<Value> {
    serde_yaml::to_value(spec).map_err(|e| Error::Serialization {
        what,
        reason: e.to_string(),
    })
}

/// Build cluster, context and user entries for `profiles`.
///
/// `aliases` maps lowercased profile paths to their assigned alias. Output is
/// sorted by cluster name so unchanged input yields identical entries.
pub fn build_entries(
    scope: &TenantScope,
    profiles: &[AuthorizedProfile],
    aliases: &HashMap<String, String>,
) -> Result<BuiltEntries> {
    let mut groups: BTreeMap<String, ClusterGroup<'_>> = BTreeMap::new();
    for profile in profiles {
        let env_profile = format!("{}-{}", sanitize(&profile.env), sanitize(&profile.profile));
        groups
            .entry(env_profile)
            .or_insert_with(|| ClusterGroup {
                url: &profile.url,
                cert: &profile.cert,
                members: BTreeMap::new(),
            })
            .members
            .entry(sanitize(&profile.app))
            .or_insert_with(|| profile.id());
    }

    let mut built = BuiltEntries::default();
    if groups.is_empty() {
        return Ok(built);
    }
    let user_name = scope.user_name();
    let mut claimed: HashMap<String, &ProfileId> = HashMap::new();

    for (env_profile, group) in &groups {
        let shared = group.members.len() > 1;
        for (app, id) in &group.members {
            let name = if shared {
                format!("{}{app}-{env_profile}", scope.prefix())
            } else {
                format!("{}{env_profile}", scope.prefix())
            };
            // `aws` sharing `prod-admin` and env `aws-prod` with profile
            // `admin` both compose to `<tenant>-aws-prod-admin`.
            if let Some(first) = claimed.insert(name.clone(), id) {
                return Err(Error::DuplicateClusterName {
                    name,
                    first: first.to_string(),
                    second: id.to_string(),
                });
            }
            let alias = aliases.get(&id.key()).cloned();

            let extension_value = alias.clone().unwrap_or_else(|| id.to_string());
            let cluster = ClusterSpec {
                certificate_authority_data: group.cert,
                server: group.url,
                extensions: vec![Extension {
                    name: EXEC_EXTENSION_NAME,
                    extension: BTreeMap::from([(PROFILE_EXTENSION_KEY, extension_value)]),
                }],
            };
            built
                .clusters
                .push(NamedEntry::new(&name, "cluster", to_value("cluster entry", cluster)?));

            let context = ContextSpec {
                cluster: name.clone(),
                user: user_name.clone(),
            };
            let context_name = match alias {
                Some(alias) => {
                    built.assigned_aliases.insert(alias.clone());
                    alias
                }
                None => name,
            };
            built
                .contexts
                .push(NamedEntry::new(context_name, "context", to_value("context entry", context)?));
        }
    }

    let user = UserSpec {
        exec: ExecSpec {
            api_version: EXEC_API_VERSION,
            command: scope.exec_command.clone(),
            args: vec![
                "kube-exec".to_string(),
                "--tenant".to_string(),
                scope.tenant.clone(),
            ],
            interactive_mode: "Never",
            provide_cluster_info: true,
        },
    };
    built
        .users
        .push(NamedEntry::new(user_name, "user", to_value("user entry", user)?));

    Ok(built)
}
