use std::path::PathBuf;
use std::time::Duration;

/// Errors surfaced by the credential cache, the exec bridge and the
/// kubeconfig merger.
///
/// Cache and file-layer errors are never retried or recovered here; they
/// propagate to the top-level caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong passphrase or corrupt ciphertext. The file is left in place so
    /// the user can re-authenticate or clear it explicitly.
    #[error("credential cache {path:?} could not be decrypted ({reason}); re-enter the passphrase or run `credbroker cache clear`")]
    CacheUnreadable { path: PathBuf, reason: String },

    #[error("credential cache {path:?} has unsupported format tag {found:?}")]
    UnsupportedCacheVersion { path: PathBuf, found: String },

    #[error("failed to read credential cache {path:?}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write credential cache {path:?}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkout of {profile} failed: {message}")]
    CheckoutFailed { profile: String, message: String },

    #[error("checkout of {profile} did not finish within {timeout:?}")]
    CheckoutTimedOut { profile: String, timeout: Duration },

    #[error("failed to read kubeconfig {path:?}")]
    KubeconfigReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write kubeconfig {path:?}; the previous file was left untouched")]
    KubeconfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("existing kubeconfig {path:?} is not valid YAML; fix or move it before re-running")]
    MalformedExistingConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid expiration timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("credential for {profile} is unusable: {reason}")]
    InvalidCredential { profile: String, reason: String },

    #[error("invalid profile {value:?}: expected application/environment/profile")]
    InvalidProfile { value: String },

    #[error("profiles {first} and {second} both map to kubeconfig cluster {name:?}; assign an alias or rename one of them")]
    DuplicateClusterName {
        name: String,
        first: String,
        second: String,
    },

    #[error("invalid KUBERNETES_EXEC_INFO: {0}")]
    InvalidExecInfo(String),

    /// Something needed user input on a path that must never prompt.
    #[error("{0}")]
    InteractionRequired(String),

    #[error("failed to serialize {what}: {reason}")]
    Serialization { what: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
