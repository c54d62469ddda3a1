//! # crew-agent
//!
//! Agents and execution runtimes for crew.
//!
//! An [`Agent`] is one concrete type: an immutable [`AgentProfile`] (role,
//! instructions, allowed operations), mutable permission and reasoning
//! settings, and a private [`ContextWindow`]. Role differences live entirely
//! in the profile; polymorphism exists only at the [`ExecutionRuntime`]
//! boundary, which turns a prompt into a stream of [`RuntimeEvent`]s.
//!
//! ## Memory
//!
//! Each agent keeps a full, append-only record of what it was asked and what
//! it answered. Entries are capped at capture time; only the most recent few
//! are replayed into the next prompt.

mod agent;
mod auth;
mod circuit_breaker;
mod context;
mod profile;
pub mod roles;
pub mod runtime;

pub use agent::Agent;
pub use auth::{get_auth_token, Credential, AUTH_ENV_VARS};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use context::{ContextWindow, MemoryEntry, Origin, MEMORY_ENTRY_CAP, REPLAY_WINDOW};
pub use profile::AgentProfile;
pub use roles::{Role, Roster};
pub use runtime::{
    AnthropicRuntime, ClaudeCliRuntime, EventStream, ExecutionRuntime, InvocationRequest,
    MockRuntime, RuntimeEvent,
};
