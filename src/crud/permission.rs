use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::credential::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

impl FromStr for Action {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Action::Create),
            "READ" => Ok(Action::Read),
            "UPDATE" => Ok(Action::Update),
            "DELETE" => Ok(Action::Delete),
            _ => Err(PermissionParseError(s.to_string())),
        }
    }
}

/// A (securable, action) pair an operation declares it needs.
///
/// Text form is `SECURABLE:ACTION`, e.g. `TASK:READ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionRequirement {
    pub securable: String,
    pub action: Action,
}

impl PermissionRequirement {
    pub fn new(securable: impl Into<String>, action: Action) -> Self {
        Self {
            securable: securable.into(),
            action,
        }
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.securable, self.action)
    }
}

impl FromStr for PermissionRequirement {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (securable, action) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| PermissionParseError(s.to_string()))?;
        let securable = securable.trim();
        if securable.is_empty() {
            return Err(PermissionParseError(s.to_string()));
        }
        Ok(Self::new(securable.to_ascii_uppercase(), action.parse()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid permission '{0}', expected SECURABLE:CREATE|READ|UPDATE|DELETE")]
pub struct PermissionParseError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing permission {requirement}")]
pub struct PermissionDenied {
    pub requirement: PermissionRequirement,
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    Denied(#[from] PermissionDenied),
    /// The checker itself failed; this is not a decision about the caller.
    #[error("Permission backend failure: {0}")]
    Backend(String),
}

/// Decides whether a credential satisfies every declared requirement.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check(
        &self,
        credential: &Credential,
        requirements: &[PermissionRequirement],
    ) -> Result<(), PermissionError>;
}

/// Grant table: grants given to every credential plus per-credential grants.
/// Anything not granted is denied.
#[derive(Debug, Clone, Default)]
pub struct GrantPermissionChecker {
    default_grants: HashSet<PermissionRequirement>,
    user_grants: HashMap<Credential, HashSet<PermissionRequirement>>,
}

impl GrantPermissionChecker {
    pub fn new(default_grants: impl IntoIterator<Item = PermissionRequirement>) -> Self {
        Self {
            default_grants: default_grants.into_iter().collect(),
            user_grants: HashMap::new(),
        }
    }

    /// Build from text grants such as `["TASK:READ", "TASK:CREATE"]`
    pub fn from_grants<S: AsRef<str>>(grants: &[S]) -> Result<Self, PermissionParseError> {
        let parsed = grants
            .iter()
            .map(|g| g.as_ref().parse())
            .collect::<Result<Vec<PermissionRequirement>, _>>()?;
        Ok(Self::new(parsed))
    }

    pub fn grant(mut self, credential: Credential, requirement: PermissionRequirement) -> Self {
        self.user_grants
            .entry(credential)
            .or_default()
            .insert(requirement);
        self
    }

    fn is_granted(&self, credential: &Credential, requirement: &PermissionRequirement) -> bool {
        self.default_grants.contains(requirement)
            || self
                .user_grants
                .get(credential)
                .map_or(false, |grants| grants.contains(requirement))
    }
}

#[async_trait]
impl PermissionChecker for GrantPermissionChecker {
    async fn check(
        &self,
        credential: &Credential,
        requirements: &[PermissionRequirement],
    ) -> Result<(), PermissionError> {
        for requirement in requirements {
            if !self.is_granted(credential, requirement) {
                return Err(PermissionDenied {
                    requirement: requirement.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_form() {
        let req: PermissionRequirement = "task:read".parse().unwrap();
        assert_eq!(req, PermissionRequirement::new("TASK", Action::Read));
        assert_eq!(req.to_string(), "TASK:READ");

        assert!("TASK".parse::<PermissionRequirement>().is_err());
        assert!("TASK:ARCHIVE".parse::<PermissionRequirement>().is_err());
        assert!(":READ".parse::<PermissionRequirement>().is_err());
    }

    #[tokio::test]
    async fn denies_anything_not_granted() {
        let checker = GrantPermissionChecker::from_grants(&["TASK:READ"]).unwrap();
        let credential = Credential::new(1, 1);

        assert!(checker
            .check(&credential, &[PermissionRequirement::new("TASK", Action::Read)])
            .await
            .is_ok());

        let err = checker
            .check(
                &credential,
                &[
                    PermissionRequirement::new("TASK", Action::Read),
                    PermissionRequirement::new("TASK", Action::Delete),
                ],
            )
            .await
            .unwrap_err();
        match err {
            PermissionError::Denied(denied) => {
                assert_eq!(denied.requirement.to_string(), "TASK:DELETE")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn per_user_grants_do_not_leak_to_other_users() {
        let owner = Credential::new(1, 1);
        let other = Credential::new(1, 2);
        let delete = PermissionRequirement::new("TASK", Action::Delete);
        let checker = GrantPermissionChecker::default().grant(owner, delete.clone());

        assert!(checker.check(&owner, &[delete.clone()]).await.is_ok());
        assert!(checker.check(&other, &[delete]).await.is_err());
    }
}
