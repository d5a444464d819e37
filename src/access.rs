use serde::{Deserialize, Serialize};

use crate::error::{ScholarError, ScholarResult};

/// Signed-in user as reported by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What the runtime is allowed to do right now.
///
/// Extraction only needs a loaded API configuration. Explain, summarize and chat
/// additionally need a signed-in user.
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    user: Option<UserIdentity>,
    network_error: Option<String>,
}

impl AccessContext {
    pub fn new(user: Option<UserIdentity>) -> Self {
        Self {
            user,
            network_error: None,
        }
    }

    /// Record why the backend is unavailable
    pub fn disable_network(&mut self, reason: impl Into<String>) {
        self.network_error = Some(reason.into());
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn require_network(&self) -> ScholarResult<()> {
        match &self.network_error {
            Some(reason) => Err(ScholarError::configuration(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn require_user(&self, action: &str) -> ScholarResult<&UserIdentity> {
        self.require_network()?;
        self.user.as_ref().ok_or_else(|| ScholarError::Unauthenticated {
            action: action.to_string(),
        })
    }
}
