//! Database row structs.
//!
//! Each submodule holds `FromRow` structs matching the table layout and the
//! conversions into the domain types of `vidgit_core`. Time positions are
//! stored as integer milliseconds in `*_ms` columns.

pub mod commit;
pub mod repository;
pub mod timeline;
