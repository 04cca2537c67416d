//! Protocol adapters that turn credential records into what downstream tools
//! read on stdout.

mod credential_process;
mod kube;

pub use credential_process::{CredentialProcessAdapter, CredentialProcessOutput};
pub use kube::{
    profile_from_exec_info, ExecCredential, ExecCredentialAdapter, ExecCredentialStatus,
    EXEC_API_VERSION, EXEC_INFO_ENV, PROFILE_EXTENSION_KEY,
};
