use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// ChecklistStatus
// ---------------------------------------------------------------------------

/// Workflow state of a checklist.
///
/// ```text
/// pending → draft → pending_qs_review → under_review → approved
///                 → submitted         ↗              → rejected
///                                                    → revision_requested
/// ```
///
/// Review actions are accepted from any state that is not final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecklistStatus {
    Pending,
    Draft,
    Submitted,
    PendingQsReview,
    UnderReview,
    Approved,
    Rejected,
    RevisionRequested,
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::PendingQsReview => "pending_qs_review",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RevisionRequested => "revision_requested",
        }
    }

    /// Approved and rejected reports take no further review actions.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Status an RM may set through a checklist update. Anything outside
    /// the short whitelist keeps the stored status.
    pub fn from_rm_update(requested: Option<&str>, current: Self) -> Self {
        let requested = requested.unwrap_or_default().trim().to_ascii_lowercase();
        match requested.as_str() {
            "draft" => Self::Draft,
            "pending_qs_review" | "pendingqsreview" => Self::PendingQsReview,
            _ => current,
        }
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus the mixed spellings found in older
/// rows (`UnderReview`, `InReview`, `PendingQSReview`, `Completed`, ...).
impl FromStr for ChecklistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "pending" => Ok(Self::Pending),
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "pendingqsreview" => Ok(Self::PendingQsReview),
            "underreview" | "inreview" => Ok(Self::UnderReview),
            "approved" | "completed" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "revisionrequested" => Ok(Self::RevisionRequested),
            _ => Err(format!("unknown checklist status: {s}")),
        }
    }
}

impl Serialize for ChecklistStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChecklistStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
