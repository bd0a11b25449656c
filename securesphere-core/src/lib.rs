//! securesphere-core: questionnaire catalog and maturity rules
//!
//! Everything here is synchronous and free of database access. The server
//! crate loads rows, converts them into [`scoring::AnswerRecord`]s and asks
//! this crate for scores, heatmaps and workflow states.

pub mod access;
pub mod config;
pub mod error;
pub mod heatmap;
pub mod maturity;
pub mod questionnaire;
pub mod review;
pub mod scoring;

pub use access::{can_access_client, ClientScope, Principal, Role};
pub use config::{BootstrapAdmin, SphereConfig};
pub use error::{Result, SphereError};
pub use heatmap::{question_cells, ring_heatmap, ring_segments, QuestionCell, RingHeatmap, RingSegments};
pub use maturity::{maturity_band, MaturityLevel};
pub use questionnaire::{AnswerOption, Question, Questionnaire, Section};
pub use review::{
    AssessmentStatus, CommentStatus, ProgressCounts, RejectedStatus, ReviewAction, ReviewFlags,
    ReviewStatus, DEFAULT_REJECT_REASON,
};
pub use scoring::{
    dimension_rollup, maturity_report, overall_from_snapshots, points_report, section_snapshots,
    sub_dimension_scores, AnswerRecord, GroupScore, MaturityReport, PointsReport, SectionPoints,
    SectionSnapshot,
};
