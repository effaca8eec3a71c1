//! Core logic of the claim agent: the tool-calling loop, the tools it
//! drives, retries and configuration.
//!
//! The agent fetches a pending case from an inbox, resolves the interview
//! transcript of the case, generates a sketch of the accident and saves a
//! markdown report, in whatever order the model decides, while the
//! controller enforces the few rules that must not depend on the model.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod case_store;
mod config;
pub mod conversation;
mod fs;
mod media_client;
mod model_client;
mod report;
mod retry;
mod sketch;
pub mod tool;
mod transcriber;

pub use agent::{
    Agent, AgentBuilder, AgentStage, CancelHandle, FinalAnswer,
    OrchestrationError, SessionFailure,
};
pub use case_store::{CaseRecord, CaseStore};
pub use config::{ClaimConfig, ClaimConfigBuilder, LoopPolicy};
pub use conversation::TranscriptSource;
pub use media_client::{ImageClient, TranscriptionClient};
pub use report::ReportPersister;
pub use retry::{ProviderFailure, RetryPolicy};
pub use sketch::{Sketch, SketchFormat, SketchGenerator};
pub use transcriber::{InterviewTranscriber, Transcript};
