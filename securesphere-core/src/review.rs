//! Review workflow states and transitions
//!
//! Statuses are stored as lowercase snake_case text columns, so each enum
//! round-trips through `as_str` / `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error for a status string that matches no variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Review state of a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    NeedsRevision,
    Rejected,
}

text_enum!(ReviewStatus, "review status", {
    Pending => "pending",
    Approved => "approved",
    NeedsRevision => "needs_revision",
    Rejected => "rejected",
});

/// What a lead decides about a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    NeedsRevision,
    Reject,
}

text_enum!(ReviewAction, "review action", {
    Approve => "approve",
    NeedsRevision => "needs_revision",
    Reject => "reject",
});

/// Review flags carried by a response row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewFlags {
    pub is_reviewed: bool,
    pub is_approved: bool,
    pub needs_client_response: bool,
    pub status: ReviewStatus,
}

impl ReviewFlags {
    /// Flags of a fresh or re-answered response.
    pub const fn pending() -> Self {
        Self {
            is_reviewed: false,
            is_approved: false,
            needs_client_response: false,
            status: ReviewStatus::Pending,
        }
    }

    /// Approved answers are frozen against later section saves.
    pub fn is_frozen(&self) -> bool {
        self.status == ReviewStatus::Approved
    }
}

impl Default for ReviewFlags {
    fn default() -> Self {
        Self::pending()
    }
}

impl ReviewAction {
    pub fn flags(self) -> ReviewFlags {
        match self {
            Self::Approve => ReviewFlags {
                is_reviewed: true,
                is_approved: true,
                needs_client_response: false,
                status: ReviewStatus::Approved,
            },
            Self::NeedsRevision => ReviewFlags {
                is_reviewed: true,
                is_approved: false,
                needs_client_response: true,
                status: ReviewStatus::NeedsRevision,
            },
            Self::Reject => ReviewFlags {
                is_reviewed: false,
                is_approved: false,
                needs_client_response: true,
                status: ReviewStatus::Rejected,
            },
        }
    }

    /// Status given to the lead comment recorded with this action
    pub fn comment_status(self) -> CommentStatus {
        match self {
            Self::Approve => CommentStatus::Approved,
            Self::NeedsRevision => CommentStatus::NeedsRevision,
            Self::Reject => CommentStatus::Rejected,
        }
    }

    /// Reject always leaves a comment behind, even without text.
    pub fn requires_comment(self) -> bool {
        matches!(self, Self::Reject)
    }
}

/// Default comment text when a response is rejected without a reason
pub const DEFAULT_REJECT_REASON: &str = "No specific reason provided.";

/// Assessment progress of one client's product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    InProgress,
    QuestionsDone,
    UnderReview,
    ReviewDone,
    Completed,
    NeedsClientResponse,
}

text_enum!(AssessmentStatus, "assessment status", {
    InProgress => "in_progress",
    QuestionsDone => "questions_done",
    UnderReview => "under_review",
    ReviewDone => "review_done",
    Completed => "completed",
    NeedsClientResponse => "needs_client_response",
});

/// Counts the assessment status is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    pub total: usize,
    pub answered: usize,
    pub reviewed: usize,
    pub approved: usize,
    pub needs_client_response: usize,
}

impl ProgressCounts {
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.answered as f64 / self.total as f64 * 100.0
        }
    }
}

impl AssessmentStatus {
    pub fn derive(c: ProgressCounts) -> Self {
        if c.answered == 0 {
            Self::InProgress
        } else if c.needs_client_response > 0 {
            Self::NeedsClientResponse
        } else if c.answered == c.total && c.reviewed == 0 {
            Self::QuestionsDone
        } else if c.reviewed > 0 && c.reviewed < c.answered {
            Self::UnderReview
        } else if c.reviewed == c.answered && c.answered == c.total {
            if c.approved == c.answered {
                Self::Completed
            } else {
                Self::ReviewDone
            }
        } else {
            Self::InProgress
        }
    }
}

/// Status of a lead comment or reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    NeedsRevision,
    Rejected,
    ClientReply,
    LeadReply,
}

text_enum!(CommentStatus, "comment status", {
    Pending => "pending",
    Approved => "approved",
    NeedsRevision => "needs_revision",
    Rejected => "rejected",
    ClientReply => "client_reply",
    LeadReply => "lead_reply",
});

impl CommentStatus {
    /// Statuses that show up in comment inboxes
    pub const OPEN: [CommentStatus; 5] = [
        Self::Pending,
        Self::NeedsRevision,
        Self::Rejected,
        Self::ClientReply,
        Self::LeadReply,
    ];

    pub fn is_open(self) -> bool {
        self != Self::Approved
    }

    /// Text values of [`Self::OPEN`] for binding into SQL `ANY($n)`
    pub fn open_strs() -> Vec<&'static str> {
        Self::OPEN.iter().map(|s| s.as_str()).collect()
    }
}

/// Lifecycle of a rejected-question entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedStatus {
    Pending,
    Resolved,
    Cancelled,
}

text_enum!(RejectedStatus, "rejected question status", {
    Pending => "pending",
    Resolved => "resolved",
    Cancelled => "cancelled",
});
