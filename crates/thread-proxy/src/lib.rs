//! Cooperative thread suspension and safepoint coordination for
//! managed-code runtimes.
//!
//! `thread-proxy` lets one thread (typically a garbage collector) bring
//! every *mutator* thread to a well-defined halt and release it later,
//! without taking a lock on every interpreter step.
//!
//! # Model
//!
//! - Each mutator owns a [`ThreadProxy`] holding a packed status word
//!   ([`RequestFlags`] + [`ExecutionState`]), a suspend counter and a
//!   condition variable.
//! - Controllers raise requests with [`ThreadProxy::request_suspend`],
//!   [`ThreadProxy::request_safepoint`] or
//!   [`ThreadProxy::request_runtime_termination`].
//! - The mutator calls [`ThreadProxy::poll_safepoint`] at safepoint-eligible
//!   points. With nothing pending this is a single atomic load.
//! - A running mutator holds the shared side of a [`MutatorLock`]; a
//!   collector can take the exclusive side to know that nobody is
//!   running ([`StopTheWorld`]).
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use thread_proxy::{
//!     new_mutator_lock, ExecutionState, NoopHooks, SuspensionConfig, ThreadProxy,
//! };
//!
//! let lock = Arc::new(new_mutator_lock());
//! let proxy: Arc<ThreadProxy> = Arc::new(ThreadProxy::new(
//!     Arc::clone(&lock),
//!     Arc::new(NoopHooks),
//!     SuspensionConfig::default(),
//! ));
//!
//! let mutator = {
//!     let proxy = Arc::clone(&proxy);
//!     thread::spawn(move || {
//!         proxy.update_status(ExecutionState::Running);
//!         for _ in 0..1_000 {
//!             // ... interpret some bytecode ...
//!             proxy.poll_safepoint();
//!         }
//!         proxy.update_status(ExecutionState::Finished);
//!     })
//! };
//!
//! proxy.request_suspend(false);
//! // ... inspect the heap once the thread has parked ...
//! proxy.request_resume(false);
//!
//! mutator.join().unwrap();
//! assert!(!proxy.is_alive());
//! ```
//!
//! # Failure model
//!
//! Protocol violations (a user suspend count underflow, a corrupted status
//! word, a status store that cannot make progress) are fatal: see
//! [`ProtocolViolation`]. Resuming a thread that is not suspended, or
//! user-suspending one that already is, are silent no-ops.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod config;
mod error;
mod flags;
mod hooks;
mod metrics;
mod mutator_lock;
mod proxy;
mod state;
mod status;
mod tracing;
mod world;

/// Lock-order validation for the suspend and mutator locks.
///
/// Public for runtimes that layer their own locks on top.
pub mod sync;

/// The `store_status` retry loop as a pure state machine.
pub mod transition;

pub use backend::{HybridBackend, SuspensionBackend, ThreadHolder};
pub use config::{SuspensionConfig, DEFAULT_MAX_STATUS_RETRIES, DEFAULT_SUSPENSION_WAIT_TIMEOUT};
pub use error::{protocol_violation, ProtocolViolation};
pub use flags::RequestFlags;
pub use hooks::{NoopHooks, RuntimeHooks};
pub use metrics::{SuspensionMetrics, ThreadMetrics};
pub use mutator_lock::{new_mutator_lock, MutatorLock};
pub use proxy::ThreadProxy;
pub use state::ExecutionState;
pub use status::{Status, StatusWord};
pub use crate::tracing::SuspensionId;
pub use world::{stop_the_world, StopTheWorld};

#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_util;
