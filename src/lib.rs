//! Cross-crate trait implementor registry for rustdoc viewers.
//!
//! Independently built documentation fragments are merged into one
//! [`GlobalRegistry`] per session, and handed to a viewer consumer through a
//! [`ConsumerGate`] whether the consumer attaches before or after the data
//! arrives.

pub mod cli;
pub mod config;
pub mod error;
pub mod fragment;
pub mod gate;
pub mod registry;
pub mod session;
pub mod tracing;
pub mod types;

pub use error::FragmentError;
pub use fragment::Fragment;
pub use gate::{ConsumerGate, ConsumerHandle, Dispatch, Generation, Snapshot};
pub use registry::{GlobalRegistry, TraitIndex};
pub use session::{
    ImplementorSession, attach_consumer, current_registry, register_implementors,
    restart_session, with_session,
};
pub use types::{ImplementorRecord, InvalidModuleName, ModuleMapping, ModuleName};
