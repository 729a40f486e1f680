//! Domain model and pure algorithms for vidgit.
//!
//! Nothing in this crate performs I/O. The timeline model, the change
//! processor and the history chain arena are plain data plus functions so
//! that every storage backend and service layer shares one definition of
//! what a valid edit is.

pub mod change;
pub mod commit;
pub mod error;
pub mod history;
pub mod processor;
pub mod repository;
pub mod timecode;
pub mod timeline;
pub mod types;
