//! Directory Service client
//!
//! The directory is an external collaborator: it returns the set of
//! reachable counterpart users for the current identity. It is fetched once
//! per session and filtered locally; there are no live directory updates.
//!
//! The wire format is owned by the backend and carries two mutually
//! exclusive name fields (`fullname` for job seekers, `companyname` for
//! employers). Classification into the tagged [`Counterpart`] happens
//! exactly once, here.

use crate::model::{Counterpart, UserId};
use crate::session::SessionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while talking to the directory service
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Request could not be performed
    #[error("directory request failed: {0}")]
    Request(String),

    /// Backend answered with a non-success status
    #[error("directory request rejected with status {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("failed to decode directory response: {0}")]
    Decode(String),
}

/// A user record as the backend returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Backend identifier
    #[serde(rename = "_id")]
    pub id: String,

    /// Job seeker display name, absent for employers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,

    /// Employer display name, absent for job seekers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companyname: Option<String>,

    /// Account email
    pub email: String,

    /// Account type tag, `jobseeker` or `employer` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usertype: Option<String>,
}

impl DirectoryUser {
    /// Classify a wire record into a tagged counterpart.
    ///
    /// The `usertype` tag wins when present; otherwise the populated name
    /// field decides. Records with no usable name are rejected.
    pub fn into_counterpart(self) -> Option<Counterpart> {
        let id = UserId::new(self.id);
        match self.usertype.as_deref() {
            Some("employer") => self
                .companyname
                .map(|name| Counterpart::Employer { id, name }),
            Some("jobseeker") => self.fullname.map(|name| Counterpart::JobSeeker { id, name }),
            _ => {
                if let Some(name) = self.fullname {
                    Some(Counterpart::JobSeeker { id, name })
                } else {
                    self.companyname
                        .map(|name| Counterpart::Employer { id, name })
                }
            }
        }
    }
}

/// Trait for directory services
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch all user records known to the backend
    async fn list_users(&self) -> DirectoryResult<Vec<DirectoryUser>>;
}

/// HTTP directory service against the job-board REST API
pub struct HttpDirectoryService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectoryService {
    /// Create a new client against the given API base URL
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> DirectoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DirectoryService for HttpDirectoryService {
    async fn list_users(&self) -> DirectoryResult<Vec<DirectoryUser>> {
        let url = format!("{}/api/users", self.base_url.trim_end_matches('/'));
        debug!(url = %url, "Fetching directory");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        response
            .json::<Vec<DirectoryUser>>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}

/// Type alias for a shared directory service
pub type DirectoryServiceHandle = Arc<dyn DirectoryService>;

/// Fetch the counterpart list for a session.
///
/// Filters out the session's own identity and skips records the directory
/// returns in a shape we cannot classify (logged, not fatal).
pub async fn fetch_counterparts(
    directory: &dyn DirectoryService,
    session: &SessionContext,
) -> DirectoryResult<Vec<Counterpart>> {
    let users = directory.list_users().await?;
    let total = users.len();

    let counterparts: Vec<Counterpart> = users
        .into_iter()
        .filter(|u| u.id != session.user_id.as_str())
        .filter_map(|u| {
            let id = u.id.clone();
            let counterpart = u.into_counterpart();
            if counterpart.is_none() {
                warn!(user_id = %id, "Skipping directory record with no usable name");
            }
            counterpart
        })
        .collect();

    debug!(
        total = total,
        usable = counterparts.len(),
        "Directory fetched"
    );

    Ok(counterparts)
}
