//! Per-table query functions.
//!
//! Each repository is a zero-sized struct whose associated functions take a
//! [`sqlx::PgExecutor`], so the same query runs against the pool or inside
//! a transaction (`&mut *tx`).

pub mod branch_repo;
pub mod change_repo;
pub mod commit_metadata_repo;
pub mod commit_repo;
pub mod history_repo;
pub mod repository_repo;
pub mod segment_repo;
pub mod video_repo;

pub use branch_repo::BranchRepo;
pub use change_repo::ChangeRepo;
pub use commit_metadata_repo::CommitMetadataRepo;
pub use commit_repo::CommitRepo;
pub use history_repo::HistoryRepo;
pub use repository_repo::RepositoryRepo;
pub use segment_repo::SegmentRepo;
pub use video_repo::VideoRepo;
