//! Core engine for anonymous diary matching.
//! This crate is the single source of truth for matching and lifecycle
//! invariants; transports sit on top of it.

pub mod config;
pub mod db;
pub mod extract;
pub mod logging;
pub mod matching;
pub mod model;
pub mod repo;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use extract::{ExtractionError, KeywordExtractor};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use matching::{plan_rooms, ClusterStrategy, GreedySeedStrategy, RoomPlan};
pub use model::diary::{DiaryEntry, DiaryId};
pub use model::keyword::Keyword;
pub use model::notification::{Notification, NotificationKind};
pub use model::room::{ChatRoom, EmpathyWord, RoomId};
pub use model::ValidationError;
pub use repo::{RepoError, RepoResult};
pub use scheduler::{
    JobId, ManualCleanupReport, ManualMatchingReport, Scheduler, SchedulerError, SchedulerStatus,
};
pub use service::diary_service::{empathy_digest, DiaryService};
pub use service::lifecycle_service::{CleanupReport, LifecycleService};
pub use service::matching_service::{MatchingOutcome, MatchingService, RoomSummary};
pub use service::message_service::{MessageError, MessageService};
pub use service::room_factory::{RoomCreation, RoomFactory};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
