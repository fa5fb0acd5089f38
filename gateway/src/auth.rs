//! Authentication context for protected routes.

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

/// Identity attached to a request by the auth middleware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// Id of the matched API secret; `None` when authentication is disabled
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// Find the id of the configured secret matching `token`.
///
/// Every secret is compared in constant time and all of them are checked,
/// so timing does not reveal which entry (if any) matched.
pub fn match_api_secret_id(token: &str, secrets: &[AuthApiSecret]) -> Option<String> {
    let mut matched = None;
    for entry in secrets {
        let equal: bool = token.as_bytes().ct_eq(entry.secret.as_bytes()).into();
        if equal && matched.is_none() {
            matched = Some(entry.id.clone());
        }
    }
    matched
}
