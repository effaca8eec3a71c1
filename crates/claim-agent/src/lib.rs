//! An out-of-the-box claim agent that wires the providers and the claim
//! folders together.
//!
//! The crate includes a CLI tool that reports on one case from the
//! terminal. It can also be used as a library to run claim sessions from
//! your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;

pub use session::{DEFAULT_SYSTEM_PROMPT, Session, SessionBuilder};

/// Re-exports of [`claim_agent_core`] crate.
pub mod core {
    pub use claim_agent_core::*;
}
