//! # crew-core
//!
//! Core types for crew, an orchestrator that drives a fixed roster of
//! role-specialised agents through repeated development iterations.
//!
//! ## Core Paradigm
//!
//! - An iteration IS one pass through the phase pipeline
//! - A stage IS a fan-out of agent invocations joined before the next stage
//! - Every pass leaves exactly one immutable iteration record
//! - Run state belongs to the run controller alone

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::{CrewConfig, RunConfig, RunSettings, RuntimeKind};
pub use error::{CrewError, Result};
pub use types::*;
