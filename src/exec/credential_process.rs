//! AWS CLI `credential_process` output.

use serde::Serialize;

use crate::broker::{CredentialBroker, Resolved};
use crate::credentials::timestamp::format_rfc3339;
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialProcessOutput {
    pub version: u8,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    pub expiration: String,
}

impl CredentialProcessOutput {
    pub fn from_record(profile: &ProfileId, record: &CredentialRecord) -> Result<Self> {
        let required = |names: &[&str]| {
            record
                .field(names)
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidCredential {
                    profile: profile.to_string(),
                    reason: format!("missing {}", names[0]),
                })
        };

        Ok(Self {
            version: 1,
            access_key_id: required(&["AccessKeyId", "accessKeyId", "accessKeyID"])?,
            secret_access_key: required(&["SecretAccessKey", "secretAccessKey"])?,
            session_token: record
                .field(&["SessionToken", "sessionToken"])
                .map(str::to_string),
            expiration: format_rfc3339(&record.expiration_time),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization {
            what: "credential_process output",
            reason: e.to_string(),
        })
    }
}

pub struct CredentialProcessAdapter<'a> {
    broker: &'a CredentialBroker,
}

impl<'a> CredentialProcessAdapter<'a> {
    pub fn new(broker: &'a CredentialBroker) -> Self {
        Self { broker }
    }

    pub async fn resolve(&self, profile: &ProfileId) -> Result<Resolved<CredentialProcessOutput>> {
        self.broker
            .resolve(profile, Mode::AwsCredentialProcess, None, |record| {
                CredentialProcessOutput::from_record(profile, record)
            })
            .await
    }
}
