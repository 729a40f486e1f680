//! HTTP handlers, one module per resource.

pub mod change;
pub mod commit;
pub mod event;
pub mod metadata;
pub mod repository;
pub mod video;
