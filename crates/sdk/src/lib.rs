//! ctxperms SDK - Boundary Type Definitions
//!
//! This crate contains the plain data types exchanged between the
//! permission engine and its collaborators (storage backends, host
//! adapters). It carries no engine logic, so backends can depend on it
//! without pulling in the resolution engine.
//!
//! # Modules
//!
//! - [`holder_id`] - User/group identity
//! - [`stored`] - Persisted-state layout
//! - [`subject`] - `(collection, identifier)` references used by hosts

pub mod holder_id;
pub mod stored;
pub mod subject;

pub use holder_id::HolderId;
pub use stored::{StoredContext, StoredHolder, StoredNode};
pub use subject::{collections, SubjectReference};
