use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;

/// Bearer token authorizing backend requests
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// A user session as known to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub token: SessionToken,
    /// The project the session worked on last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectId>,
}

impl Session {
    pub fn new(token: SessionToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            project: None,
        }
    }
}
