//! Sealpost relay service.
//!
//! A private-message relay behind a CGI-style transport: clients bootstrap
//! an identity and receive a compiled per-identity client artifact, then
//! exchange short messages through a store-and-forward queue. Every
//! operation rides a two-layer sealed envelope and a replay-detecting
//! session authenticator.
//!
//! # Components
//!
//! - [`Dispatcher`]: the whole request state machine, one call per request.
//! - [`IdentityRegistry`] / [`MessageQueue`]: the two persistent stores.
//! - [`ArtifactGenerator`]: seam for client artifact production;
//!   [`CompilerGenerator`] is the template-and-compiler implementation.
//! - [`StoreLock`]: seam for request serialization; [`MutexLock`] for
//!   in-process use.
//! - [`ServiceConfig`]: every tunable, no globals.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codegen;
mod config;
mod dispatcher;
mod identity;
mod lock;
mod matcher;
mod message;
mod queue;
mod registry;

pub use codegen::{
    ArtifactGenerator, ArtifactRequest, ClientValues, CodegenError, CompilerGenerator,
    ascii6_encode, derive_client_values,
};
pub use config::{MAX_CLIENTS, RetentionPolicy, ServiceConfig};
pub use dispatcher::Dispatcher;
pub use identity::IdentityRecord;
pub use lock::{LockError, MutexLock, StoreLock};
pub use matcher::glob_match;
pub use message::MessageRecord;
pub use queue::{MessageQueue, QueueError};
pub use registry::{IdentityRegistry, RegistryError};
