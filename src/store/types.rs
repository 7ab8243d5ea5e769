//! Core data types for the CityPulse record store
//!
//! This module defines the records persisted by the store:
//! - `Report`: a citizen-submitted suggestion or feedback item
//! - `Alert`: an authority-broadcast notice
//! - `NewReport` / `NewAlert`: caller-supplied fields for creation
//! - `Collection`: the two persisted lists and their storage keys

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Storage key of the reports collection
pub const REPORTS_KEY: &str = "citypulse_reports";

/// Storage key of the alerts collection
pub const ALERTS_KEY: &str = "citypulse_alerts";

/// Review status of a report
///
/// Any status may follow any other; the store does not enforce a lifecycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    #[default]
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Resolved")]
    Resolved,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "Pending"),
            ReportStatus::InProgress => write!(f, "In Progress"),
            ReportStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();

        match normalized.as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "inprogress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            _ => Err(format!(
                "Invalid status: {}. Use Pending, In Progress, or Resolved",
                s
            )),
        }
    }
}

/// Category of a citizen report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Suggestion,
    Feedback,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Suggestion => write!(f, "Suggestion"),
            ReportKind::Feedback => write!(f, "Feedback"),
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "suggestion" => Ok(ReportKind::Suggestion),
            "feedback" => Ok(ReportKind::Feedback),
            _ => Err(format!("Invalid report type: {}. Use Suggestion or Feedback", s)),
        }
    }
}

/// Audience of an alert. Only city-wide alerts exist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Audience {
    #[default]
    All,
}

/// A citizen-submitted report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Store-assigned identifier
    pub id: String,
    /// Submitting user (opaque, not verified)
    pub user_id: String,
    /// Report category
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Store-assigned creation time, never mutated
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
}

/// An authority-broadcast alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub audience: Audience,
}

/// Caller-supplied fields of a new report
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: String,
    pub kind: ReportKind,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    /// Initial status; `Pending` when not given
    pub status: Option<ReportStatus>,
}

impl NewReport {
    /// Create the fields of a new report
    pub fn new(
        user_id: impl Into<String>,
        kind: ReportKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            title: title.into(),
            description: description.into(),
            location: None,
            status: None,
        }
    }

    /// Builder method: set location
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method: override the initial status
    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn into_report(self, id: String, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            location: self.location,
            created_at,
            status: self.status.unwrap_or_default(),
        }
    }
}

/// Caller-supplied fields of a new alert
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub author_id: String,
    pub title: String,
    pub message: String,
}

impl NewAlert {
    pub fn new(
        author_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            title: title.into(),
            message: message.into(),
        }
    }

    pub(crate) fn into_alert(self, id: String, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id,
            title: self.title,
            message: self.message,
            created_at,
            author_id: self.author_id,
            audience: Audience::All,
        }
    }
}

/// Result of a status update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The report was found and rewritten with the new status
    Updated(Report),
    /// No report has the given id; nothing was written
    NotFound,
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated(_))
    }
}

/// The persisted collections
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Reports,
    Alerts,
}

impl Collection {
    /// Get all collections for iteration
    pub fn all() -> &'static [Collection] {
        &[Collection::Reports, Collection::Alerts]
    }

    /// Backend key the collection is stored under
    pub fn storage_key(&self) -> &'static str {
        match self {
            Collection::Reports => REPORTS_KEY,
            Collection::Alerts => ALERTS_KEY,
        }
    }

    /// Map a backend key back to its collection, if it is one
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            REPORTS_KEY => Some(Collection::Reports),
            ALERTS_KEY => Some(Collection::Alerts),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Reports => "reports",
            Collection::Alerts => "alerts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 3339 in UTC with exactly three fractional digits
fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Generate a record id: `<unix millis>-<6 hex chars>`
pub fn generate_id(created_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", created_at.timestamp_millis(), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ReportStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");

        let status: ReportStatus = serde_json::from_str("\"Resolved\"").unwrap();
        assert_eq!(status, ReportStatus::Resolved);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("pending".parse::<ReportStatus>(), Ok(ReportStatus::Pending));
        assert_eq!(
            "In Progress".parse::<ReportStatus>(),
            Ok(ReportStatus::InProgress)
        );
        assert_eq!(
            "in_progress".parse::<ReportStatus>(),
            Ok(ReportStatus::InProgress)
        );
        assert!("closed".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("FEEDBACK".parse::<ReportKind>(), Ok(ReportKind::Feedback));
        assert!("complaint".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_report_json_layout() {
        let created_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let report = NewReport::new("u1", ReportKind::Suggestion, "Bench", "Add a bench")
            .into_report("1700000000123-abcdef".to_string(), created_at);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["type"], "Suggestion");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["createdAt"], "2023-11-14T22:13:20.123Z");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_created_at_keeps_millis_on_whole_seconds() {
        let created_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let report = NewReport::new("u1", ReportKind::Feedback, "Noise", "Late night works")
            .into_report("1700000000000-abcdef".to_string(), created_at);
        let alert = NewAlert::new("a1", "Parade", "Main St closed")
            .into_alert("1700000000000-123456".to_string(), created_at);

        let report_json = serde_json::to_value(&report).unwrap();
        let alert_json = serde_json::to_value(&alert).unwrap();
        assert_eq!(report_json["createdAt"], "2023-11-14T22:13:20.000Z");
        assert_eq!(alert_json["createdAt"], "2023-11-14T22:13:20.000Z");

        let back: Report = serde_json::from_value(report_json).unwrap();
        assert_eq!(back.created_at, created_at);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(ReportStatus::default(), ReportStatus::Pending);
    }

    #[test]
    fn test_alert_audience_is_all() {
        let alert = NewAlert::new("a1", "Water outage", "Ward 4, 10:00-14:00")
            .into_alert("1-000000".to_string(), Utc::now());
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["audience"], "All");
        assert_eq!(json["authorId"], "a1");
    }

    #[test]
    fn test_collection_keys() {
        for collection in Collection::all() {
            let key = collection.storage_key();
            assert_eq!(Collection::from_storage_key(key), Some(*collection));
        }
        assert_eq!(Collection::from_storage_key("citypulse_user"), None);
    }

    #[test]
    fn test_generate_id_format() {
        let created_at = DateTime::from_timestamp_millis(42).unwrap();
        let id = generate_id(created_at);
        let (millis, suffix) = id.split_once('-').unwrap();
        assert_eq!(millis, "42");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
