//! ctxperms - Core Logic
//!
//! Context-scoped permission engine: holders (users and groups) carry
//! permission, inheritance and meta nodes, each valid in a set of
//! contexts. Queries resolve against in-memory state; persistence and
//! refresh run in the background.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK crate for convenience:
//! - [`sdk`] - Holder ids, stored layout and subject references
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ctxperms_core::{CoreConfig, ImmutableContextSet, MemoryStorage, NodeScope, PermissionEngine, Tristate};
//!
//! let engine = PermissionEngine::with_storage(CoreConfig::default(), Arc::new(MemoryStorage::new()))?;
//! let user = engine.load_user(uuid)?;
//! let nether = ImmutableContextSet::singleton("world", "nether")?;
//!
//! engine
//!     .subject_data(user.clone(), NodeScope::Enduring)
//!     .set_permission(&nether, "essentials.fly", Tristate::True)?;
//! assert_eq!(engine.check_permission(&user, &nether, "essentials.fly"), Tristate::True);
//! ```

pub use ctxperms_sdk as sdk;

pub mod buffer;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod holder;
pub mod logging;
pub mod meta;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod subject;
pub mod tristate;

// Re-export commonly used items
pub use buffer::UpdateBuffer;
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use context::{ContextSet, ImmutableContextSet, MutableContextSet};
pub use engine::PermissionEngine;
pub use error::{NodeError, NodeResult, StorageError, StorageResult};
pub use events::{ListenerKey, RefreshListeners};
pub use holder::{MutateResult, NodeScope, PermissionHolder, PermissionMap, ScopeSet};
pub use meta::{MetaAccumulator, OptionMap};
pub use node::{ChatMetaType, Node, NodeBuilder, NodeKind, NodeSlot};
pub use registry::{GroupManager, GroupRegistry, UserManager};
pub use scheduler::{Scheduler, SchedulerGateway, Task, TimerKey};
pub use storage::{MemoryStorage, StorageGateway};
pub use subject::SubjectData;
pub use tristate::Tristate;
