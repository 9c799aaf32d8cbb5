use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::location::LatLng;
use crate::error::ValidationError;

/// Reporter name used when a submission carries no identity.
pub const ANONYMOUS: &str = "Anonymous";

const ID_PREFIX: &str = "r_";
const ID_SUFFIX_LEN: usize = 6;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque unique issue identifier, `r_<unix-millis>_<6 base36 chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Mint a fresh id stamped with `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
            .collect();
        Self(format!("{ID_PREFIX}{}_{suffix}", now.timestamp_millis()))
    }

    /// Wrap an id read back from storage or typed by a user.
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IssueId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("id", s, "must not be empty"));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::new(
                "id",
                s,
                "must not contain whitespace or control characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Lifecycle status of a report. Any status may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    Received,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl IssueStatus {
    /// All statuses in the order the authority selector lists them.
    pub const ALL: [Self; 3] = [Self::Received, Self::InProgress, Self::Resolved];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }
}

impl Default for IssueStatus {
    fn default() -> Self {
        Self::Received
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for IssueStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "received" => Ok(Self::Received),
            "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(ValidationError::new(
                "status",
                s,
                "expected one of Received, In Progress, Resolved",
            )),
        }
    }
}

/// Embedded or referenced image payload (usually a `data:` URL). Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoPayload(String);

impl PhotoPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type when the payload is a `data:` URL.
    #[must_use]
    pub fn mime(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find([';', ','])?;
        Some(&rest[..end])
    }
}

/// What a citizen submits. Turned into an [`IssueRecord`] by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub issue_type: String,
    pub description: Option<String>,
    pub location: LatLng,
    pub photo: Option<PhotoPayload>,
    pub reported_by: Option<String>,
}

impl IssueDraft {
    pub fn new(issue_type: impl Into<String>, location: LatLng) -> Self {
        Self {
            issue_type: issue_type.into(),
            description: None,
            location,
            photo: None,
            reported_by: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_photo(mut self, photo: PhotoPayload) -> Self {
        self.photo = Some(photo);
        self
    }

    #[must_use]
    pub fn reported_by(mut self, who: impl Into<String>) -> Self {
        self.reported_by = Some(who.into());
        self
    }

    /// Check the required fields without building a record.
    ///
    /// Stores call this before any write attempt.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let issue_type = self.issue_type.trim();
        if issue_type.is_empty() {
            return Err(ValidationError::new(
                "type",
                self.issue_type.as_str(),
                "must not be empty",
            ));
        }
        if issue_type.chars().any(char::is_control) {
            return Err(ValidationError::new(
                "type",
                self.issue_type.as_str(),
                "must not contain control characters",
            ));
        }
        self.location.validate()
    }
}

/// One reported road problem. The persisted shape matches the
/// `citizen_reports_v1` JSON layout (`type`, `desc`, `lat`, `lng`,
/// `reportedBy`, `createdAt` in epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: IssueId,
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub location: LatLng,
    #[serde(default)]
    pub photo: Option<PhotoPayload>,
    pub status: IssueStatus,
    #[serde(default = "anonymous")]
    pub reported_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

fn anonymous() -> String {
    ANONYMOUS.to_string()
}

impl IssueRecord {
    /// Validate a draft and build a fully-formed record with status `Received`.
    ///
    /// Required text is trimmed; a blank description is stored as absent and
    /// a blank reporter falls back to [`ANONYMOUS`].
    pub fn from_draft(
        draft: IssueDraft,
        id: IssueId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        draft.validate()?;
        let issue_type = draft.issue_type.trim();

        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let reported_by = draft
            .reported_by
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(anonymous);

        Ok(Self {
            id,
            issue_type: issue_type.to_string(),
            description,
            location: draft.location,
            photo: draft.photo,
            status: IssueStatus::Received,
            reported_by,
            created_at,
        })
    }
}
