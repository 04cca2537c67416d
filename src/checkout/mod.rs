//! Checkout collaborator: the remote IAM service that issues credentials.
//!
//! The broker never talks to the IAM API directly. It goes through
//! [`IamClient`], with a concrete [`CommandIamClient`] that delegates to a
//! configured helper program.

mod command;

pub use command::{CommandConfig, CommandIamClient};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::{Error, Result};

/// A request to check out credentials for one profile.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub profile: ProfileId,
    pub mode: Mode,
    pub justification: Option<String>,
    /// Upper bound on how long the IAM side may poll (e.g. for approvals).
    pub timeout: Option<Duration>,
}

impl CheckoutRequest {
    pub fn new(profile: ProfileId, mode: Mode) -> Self {
        Self {
            profile,
            mode,
            justification: None,
            timeout: None,
        }
    }

    pub fn with_justification(mut self, justification: Option<String>) -> Self {
        self.justification = justification;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A Kubernetes profile the user is authorized to check out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedProfile {
    pub app: String,
    pub env: String,
    pub profile: String,
    /// API server URL.
    pub url: String,
    /// Base64 cluster CA bundle.
    pub cert: String,
}

impl AuthorizedProfile {
    pub fn id(&self) -> ProfileId {
        ProfileId::new(&self.app, &self.env, &self.profile)
    }
}

#[async_trait]
pub trait IamClient: Send + Sync {
    /// Check out fresh credentials. Implementations must not prompt when
    /// `request.mode` is unattended.
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CredentialRecord>;

    /// Profiles with a Kubernetes cluster attached.
    async fn kube_profiles(&self) -> Result<Vec<AuthorizedProfile>>;
}

/// Run a checkout under the request's timeout, if it has one.
pub async fn checkout_within(
    client: &dyn IamClient,
    request: &CheckoutRequest,
) -> Result<CredentialRecord> {
    let Some(limit) = request.timeout else {
        return client.checkout(request).await;
    };
    match tokio::time::timeout(limit, client.checkout(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::CheckoutTimedOut {
            profile: request.profile.to_string(),
            timeout: limit,
        }),
    }
}
