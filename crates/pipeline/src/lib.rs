//! Services that sit between the HTTP layer and storage.
//!
//! - [`queue::ChangeQueue`]: per-video serialization of timeline mutations.
//! - [`timeline::TimelineService`]: apply and revert changes.
//! - [`commits::CommitService`]: the commit chain with a cache-aside read path.
//! - [`correlator`]: bus handlers that fold render results back into commits.

pub mod commits;
pub mod correlator;
pub mod queue;
pub mod timeline;

pub use commits::CommitService;
pub use correlator::{MetadataResultHandler, RenderResultHandler};
pub use queue::{ChangeQueue, QueueConfig, QueueError};
pub use timeline::{AppliedChange, RevertedChange, TimelineService};
