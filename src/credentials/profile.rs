use std::fmt;

use crate::error::{Error, Result};

/// An authorization profile path: `application/environment/profile`.
///
/// Elements may themselves contain `/`; those are escaped as `\/` in the
/// path form so the three-part split stays unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId {
    pub application: String,
    pub environment: String,
    pub profile: String,
}

impl ProfileId {
    pub fn new(
        application: impl Into<String>,
        environment: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            environment: environment.into(),
            profile: profile.into(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = Vec::with_capacity(3);
        let mut current = String::new();
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'/') => {
                    current.push('/');
                    chars.next();
                }
                '/' => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        parts.push(current);

        match <[String; 3]>::try_from(parts) {
            Ok([application, environment, profile])
                if !application.is_empty() && !environment.is_empty() && !profile.is_empty() =>
            {
                Ok(Self {
                    application,
                    environment,
                    profile,
                })
            }
            _ => Err(Error::InvalidProfile {
                value: value.to_string(),
            }),
        }
    }

    /// Lowercased escaped path. Cache entries and alias lookups key on this.
    pub fn key(&self) -> String {
        self.to_string().to_lowercase()
    }
}

pub fn escape_element(element: &str) -> String {
    element.replace('/', "\\/")
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            escape_element(&self.application),
            escape_element(&self.environment),
            escape_element(&self.profile)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let id = ProfileId::parse("AWS/Prod/Admin").unwrap();
        assert_eq!(id, ProfileId::new("AWS", "Prod", "Admin"));
        assert_eq!(id.key(), "aws/prod/admin");
    }

    #[test]
    fn test_escaped_slash_round_trips() {
        let id = ProfileId::new("GCP", "org/proj", "Viewer");
        assert_eq!(id.to_string(), "GCP/org\\/proj/Viewer");
        assert_eq!(ProfileId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_rejects_wrong_arity_and_empty() {
        for bad in ["AWS/Prod", "a/b/c/d", "AWS//Admin", "", "prod-admin"] {
            assert!(
                matches!(ProfileId::parse(bad), Err(Error::InvalidProfile { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
