//! Zone-scoped authorization.
//!
//! Core principle: **capability and zone membership are independent axes,
//! and both must hold.** A capability says what a user can ever do
//! (`lead.assign`); membership says which zones they may touch. The
//! [`Engine`] composes the two, in a fixed order, into a [`Decision`]
//! that callers forward to the audit sink on deny.
//!
//! Every check re-reads the directory — there is no cache — so revoking a
//! membership or grant takes effect on the very next call.

mod capability;
mod context;
mod engine;
mod error;
mod resolver;

pub use capability::{capability_code, CapabilityRegistry, CORE_USER_READ};
pub use context::PermissionContext;
pub use engine::{Decision, DenyReason, Engine};
pub use error::{Error, Result};
pub use resolver::CapabilityResolver;
