#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use credbroker::checkout::{AuthorizedProfile, CheckoutRequest, IamClient};
use credbroker::credentials::CredentialRecord;
use credbroker::{Error, Result};

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn token_record(token: &str, expires: DateTime<Utc>) -> CredentialRecord {
    CredentialRecord::new(expires).with_field("token", token)
}

/// IAM client that hands out a canned record and counts checkouts.
pub struct FakeIamClient {
    record: Option<CredentialRecord>,
    profiles: Vec<AuthorizedProfile>,
    checkouts: AtomicUsize,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeIamClient {
    pub fn issuing(record: CredentialRecord) -> Self {
        Self {
            record: Some(record),
            profiles: Vec::new(),
            checkouts: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every checkout fails.
    pub fn failing() -> Self {
        Self {
            record: None,
            profiles: Vec::new(),
            checkouts: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<AuthorizedProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IamClient for FakeIamClient {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CredentialRecord> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.record.clone().ok_or_else(|| Error::CheckoutFailed {
            profile: request.profile.to_string(),
            message: "access denied".to_string(),
        })
    }

    async fn kube_profiles(&self) -> Result<Vec<AuthorizedProfile>> {
        Ok(self.profiles.clone())
    }
}

pub fn kube_profile(app: &str, env: &str, profile: &str, url: &str) -> AuthorizedProfile {
    AuthorizedProfile {
        app: app.to_string(),
        env: env.to_string(),
        profile: profile.to_string(),
        url: url.to_string(),
        cert: "LS0tLS1CRUdJTg==".to_string(),
    }
}
