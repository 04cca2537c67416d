//! Kubernetes client-go exec credential plugin.
//!
//! kubectl runs `credbroker kube-exec` with `KUBERNETES_EXEC_INFO` set and
//! reads a single `ExecCredential` JSON object from stdout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::broker::{CredentialBroker, Resolved};
use crate::credentials::timestamp::format_rfc3339;
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::{Error, Result};

pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Environment variable kubectl uses to pass the exec request.
pub const EXEC_INFO_ENV: &str = "KUBERNETES_EXEC_INFO";

/// Key under the cluster's exec extension naming the profile to check out.
pub const PROFILE_EXTENSION_KEY: &str = "credbroker-profile";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    pub api_version: String,
    pub kind: String,
    pub status: ExecCredentialStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
    pub expiration_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
}

impl ExecCredential {
    /// Build the response for a kube-exec record.
    ///
    /// The record must carry a bearer token, a client certificate/key pair,
    /// or both.
    pub fn from_record(profile: &ProfileId, record: &CredentialRecord) -> Result<Self> {
        let owned = |names: &[&str]| record.field(names).map(str::to_string);
        let status = ExecCredentialStatus {
            expiration_timestamp: format_rfc3339(&record.expiration_time),
            token: owned(&["token"]),
            client_certificate_data: owned(&["clientCertificateData"]),
            client_key_data: owned(&["clientKeyData"]),
        };

        let has_cert_pair = status.client_certificate_data.is_some() && status.client_key_data.is_some();
        if status.token.is_none() && !has_cert_pair {
            return Err(Error::InvalidCredential {
                profile: profile.to_string(),
                reason: "expected a token or clientCertificateData/clientKeyData".to_string(),
            });
        }
        if status.client_certificate_data.is_some() != status.client_key_data.is_some() {
            return Err(Error::InvalidCredential {
                profile: profile.to_string(),
                reason: "client certificate and key must be supplied together".to_string(),
            });
        }

        Ok(Self {
            api_version: EXEC_API_VERSION.to_string(),
            kind: "ExecCredential".to_string(),
            status,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization {
            what: "ExecCredential",
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExecInfo {
    #[serde(default)]
    spec: ExecInfoSpec,
}

#[derive(Debug, Default, Deserialize)]
struct ExecInfoSpec {
    #[serde(default)]
    cluster: Option<ExecInfoCluster>,
}

#[derive(Debug, Deserialize)]
struct ExecInfoCluster {
    #[serde(default)]
    config: Option<Map<String, Value>>,
}

/// Extract the profile reference (alias or profile path) from
/// `KUBERNETES_EXEC_INFO`.
///
/// The value comes from the cluster's `client.authentication.k8s.io/exec`
/// extension, which kubectl forwards because the user entry sets
/// `provideClusterInfo: true`.
pub fn profile_from_exec_info(raw: &str) -> Result<String> {
    let info: ExecInfo =
        serde_json::from_str(raw).map_err(|e| Error::InvalidExecInfo(e.to_string()))?;

    info.spec
        .cluster
        .and_then(|cluster| cluster.config)
        .and_then(|mut config| config.remove(PROFILE_EXTENSION_KEY))
        .and_then(|value| value.as_str().map(str::to_string))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            Error::InvalidExecInfo(format!(
                "cluster config carries no {PROFILE_EXTENSION_KEY:?}; re-run `credbroker configure-kube` or pass --profile"
            ))
        })
}

/// Serves `ExecCredential` responses from the cache, checking out on a miss.
pub struct ExecCredentialAdapter<'a> {
    broker: &'a CredentialBroker,
}

impl<'a> ExecCredentialAdapter<'a> {
    pub fn new(broker: &'a CredentialBroker) -> Self {
        Self { broker }
    }

    /// Runs unattended: never prompts and never asks for a justification.
    pub async fn resolve(&self, profile: &ProfileId) -> Result<Resolved<ExecCredential>> {
        self.broker
            .resolve(profile, Mode::KubeExec, None, |record| {
                ExecCredential::from_record(profile, record)
            })
            .await
    }
}
