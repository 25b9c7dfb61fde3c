use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::models::{ProjectId, Session, SessionToken};

/// Port for the authenticated user session
#[async_trait]
pub trait SessionTokenProvider: Send + Sync {
    /// The token to authorize the next request with; queried once per request
    async fn session_token_for_request(&self) -> Result<SessionToken>;

    /// The current session, including the project it worked on last
    async fn current_session(&self) -> Result<Session>;
}

/// A session that never changes, e.g. one created from a token on the command line
#[derive(Debug)]
pub struct StaticSession {
    session: Mutex<Session>,
}

impl StaticSession {
    pub fn new(token: SessionToken) -> Self {
        Self {
            session: Mutex::new(Session::new(token)),
        }
    }

    pub fn with_project(token: SessionToken, project: ProjectId) -> Self {
        let mut session = Session::new(token);
        session.project = Some(project);
        Self {
            session: Mutex::new(session),
        }
    }

    /// Record the last used project of this session
    pub fn set_project(&self, project: Option<ProjectId>) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .project = project;
    }
}

#[async_trait]
impl SessionTokenProvider for StaticSession {
    async fn session_token_for_request(&self) -> Result<SessionToken> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone())
    }

    async fn current_session(&self) -> Result<Session> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
