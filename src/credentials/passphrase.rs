use secrecy::SecretString;

use crate::error::{Error, Result};

/// Environment variable consulted when no passphrase is passed explicitly.
pub const PASSPHRASE_ENV: &str = "CREDBROKER_PASSPHRASE";

/// Where the cache passphrase comes from.
///
/// The passphrase is never written anywhere; it only lives in memory long
/// enough to derive the cache key.
#[derive(Default)]
pub struct PassphraseSource {
    explicit: Option<SecretString>,
    allow_prompt: bool,
}

impl PassphraseSource {
    pub fn new(explicit: Option<SecretString>) -> Self {
        Self {
            explicit,
            allow_prompt: false,
        }
    }

    /// Permit falling back to a terminal prompt. Only interactive commands
    /// should enable this; exec plugins must fail fast instead.
    pub fn allow_prompt(mut self, allow: bool) -> Self {
        self.allow_prompt = allow;
        self
    }

    pub fn resolve(self) -> Result<SecretString> {
        self.resolve_with_env(std::env::var(PASSPHRASE_ENV).ok())
    }

    fn resolve_with_env(self, env_value: Option<String>) -> Result<SecretString> {
        if let Some(explicit) = self.explicit {
            return Ok(explicit);
        }
        if let Some(value) = env_value.filter(|v| !v.is_empty()) {
            return Ok(SecretString::from(value));
        }
        if self.allow_prompt {
            return prompt();
        }
        Err(Error::InteractionRequired(format!(
            "no cache passphrase available; pass --passphrase or set {PASSPHRASE_ENV}"
        )))
    }
}

#[cfg(feature = "cli")]
fn prompt() -> Result<SecretString> {
    use std::io::IsTerminal;

    if !std::io::stdin().is_terminal() {
        return Err(Error::InteractionRequired(format!(
            "stdin is not a terminal; set {PASSPHRASE_ENV} to unlock the credential cache"
        )));
    }
    dialoguer::Password::new()
        .with_prompt("Credential cache passphrase")
        .interact()
        .map(SecretString::from)
        .map_err(|e| Error::InteractionRequired(format!("passphrase prompt failed: {e}")))
}

#[cfg(not(feature = "cli"))]
fn prompt() -> Result<SecretString> {
    Err(Error::InteractionRequired(format!(
        "built without terminal support; set {PASSPHRASE_ENV}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_explicit_wins_over_env() {
        let source = PassphraseSource::new(Some(SecretString::from("flag")));
        let secret = source.resolve_with_env(Some("env".to_string())).unwrap();
        assert_eq!(secret.expose_secret(), "flag");
    }

    #[test]
    fn test_env_fallback() {
        let secret = PassphraseSource::new(None)
            .resolve_with_env(Some("env".to_string()))
            .unwrap();
        assert_eq!(secret.expose_secret(), "env");
    }

    #[test]
    fn test_no_prompt_fails_fast() {
        let err = PassphraseSource::new(None)
            .resolve_with_env(Some(String::new()))
            .unwrap_err();
        assert!(matches!(err, Error::InteractionRequired(_)));
    }
}
