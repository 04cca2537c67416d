//! Cache-first credential resolution shared by every output adapter.
//!
//! A cached record is used as long as it is still valid; otherwise the IAM
//! client is asked for a fresh one, which is stored only after the caller's
//! renderer has accepted it. Two processes racing through a miss both check
//! out and the last writer wins; checkouts for the same identity are
//! interchangeable, so no cross-process lock is taken.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{Freshness, SecretCache};
use crate::checkout::{checkout_within, CheckoutRequest, IamClient};
use crate::clock::{Clock, SystemClock};
use crate::credentials::{CredentialRecord, Mode, ProfileId};
use crate::error::{Error, Result};

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Checkout,
}

#[derive(Debug)]
pub struct Resolved<T> {
    pub value: T,
    pub source: Source,
}

pub struct CredentialBroker {
    cache: Arc<dyn SecretCache>,
    client: Arc<dyn IamClient>,
    clock: Arc<dyn Clock>,
    checkout_timeout: Option<Duration>,
}

impl CredentialBroker {
    pub fn new(cache: Arc<dyn SecretCache>, client: Arc<dyn IamClient>) -> Self {
        Self {
            cache,
            client,
            clock: Arc::new(SystemClock),
            checkout_timeout: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// Resolve credentials for `profile` in `mode` and render them.
    ///
    /// `render` runs on the cached record when it is still valid. On a miss
    /// it runs on the freshly checked-out record before that record is
    /// cached, so nothing the renderer rejects ever lands in the cache. A
    /// checked-out record that is already expired is an error and is neither
    /// rendered nor cached.
    pub async fn resolve<T>(
        &self,
        profile: &ProfileId,
        mode: Mode,
        justification: Option<String>,
        render: impl Fn(&CredentialRecord) -> Result<T>,
    ) -> Result<Resolved<T>> {
        match Freshness::judge(self.cache.get(profile, mode)?, self.clock.as_ref()) {
            Freshness::Fresh(record) => {
                debug!(%profile, %mode, expires = %record.expiration_time, "Using cached credential");
                return Ok(Resolved {
                    value: render(&record)?,
                    source: Source::Cache,
                });
            }
            Freshness::Expired(record) => {
                debug!(%profile, %mode, expired = %record.expiration_time, "Cached credential expired");
            }
            Freshness::Missing => {
                debug!(%profile, %mode, "No cached credential");
            }
        }

        let request = CheckoutRequest::new(profile.clone(), mode)
            .with_justification(justification)
            .with_timeout(self.checkout_timeout);
        let record = checkout_within(self.client.as_ref(), &request).await?;
        if !record.is_valid_at(self.clock.as_ref()) {
            return Err(Error::InvalidCredential {
                profile: profile.to_string(),
                reason: format!(
                    "checked out credential already expired at {}",
                    record.expiration_time
                ),
            });
        }
        let value = render(&record)?;
        self.cache.put(profile, mode, &record)?;
        info!(%profile, %mode, expires = %record.expiration_time, "Cached fresh credential");

        Ok(Resolved {
            value,
            source: Source::Checkout,
        })
    }
}
