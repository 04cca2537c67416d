//! IAM client backed by an external helper program.
//!
//! The helper receives the request as arguments and answers with JSON on
//! stdout:
//!
//! ```text
//! <command...> checkout --profile AWS/Prod/Admin --mode kube-exec [--justification TEXT]
//!     -> {"expirationTime": "...", "token": "..."}
//! <command...> profiles --kube
//!     -> [{"app": "...", "env": "...", "profile": "...", "url": "...", "cert": "..."}]
//! ```
//!
//! Unattended modes also get `--non-interactive` and a closed stdin; a helper
//! that would need to ask for a justification or open a console must exit
//! non-zero instead.

use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use super::{AuthorizedProfile, CheckoutRequest, IamClient};
use crate::credentials::CredentialRecord;
use crate::error::{Error, Result};

/// Helper program plus leading arguments, e.g. `["my-iam-helper", "--tenant", "acme"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandConfig(pub Vec<String>);

pub struct CommandIamClient {
    command: CommandConfig,
}

impl CommandIamClient {
    pub fn new(command: CommandConfig) -> Self {
        Self { command }
    }

    fn base(&self, subject: &str) -> Result<Command> {
        let Some((program, args)) = self.command.0.split_first() else {
            return Err(Error::CheckoutFailed {
                profile: subject.to_string(),
                message: "no checkout helper configured; set [checkout].command".to_string(),
            });
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    async fn run_json<T: DeserializeOwned>(&self, mut command: Command, subject: &str) -> Result<T> {
        let failed = |message: String| Error::CheckoutFailed {
            profile: subject.to_string(),
            message,
        };

        let output = command
            .output()
            .await
            .map_err(|e| failed(format!("failed to run checkout helper: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "checkout helper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| failed(format!("checkout helper returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl IamClient for CommandIamClient {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CredentialRecord> {
        let subject = request.profile.to_string();
        let mut command = self.base(&subject)?;
        command
            .arg("checkout")
            .arg("--profile")
            .arg(&subject)
            .arg("--mode")
            .arg(request.mode.as_str());
        if let Some(justification) = &request.justification {
            command.arg("--justification").arg(justification);
        }
        if request.mode.is_unattended() {
            command.arg("--non-interactive");
        } else {
            // Lets the helper ask for approval details at the terminal.
            command.stdin(Stdio::inherit());
        }

        info!(profile = %subject, mode = %request.mode, "Checking out credentials");
        let record: CredentialRecord = self.run_json(command, &subject).await?;
        debug!(profile = %subject, expires = %record.expiration_time, "Checkout complete");
        Ok(record)
    }

    async fn kube_profiles(&self) -> Result<Vec<AuthorizedProfile>> {
        let mut command = self.base("profile listing")?;
        command.arg("profiles").arg("--kube");
        self.run_json(command, "profile listing").await
    }
}
