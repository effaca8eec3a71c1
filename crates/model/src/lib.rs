//! Provider-neutral protocol between the claim agent and AI services.
//!
//! This crate establishes the contracts the agent relies on when it
//! talks to a chat model, a speech-to-text service or an image
//! generator, so that the core never depends on a concrete vendor.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Retries,
//! timeouts and caching are the caller's business.

#![deny(missing_docs)]

mod error;
mod media;
mod provider;
mod request;
mod response;

pub use error::*;
pub use media::*;
pub use provider::*;
pub use request::*;
pub use response::*;
