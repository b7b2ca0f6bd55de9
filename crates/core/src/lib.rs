//! # FoodClaw Core
//!
//! Domain types, traits, and error definitions shared by every FoodClaw crate.
//! Nothing here talks to the network: the provider, memory store, and tool
//! seams are traits, and their AWS-backed implementations live in their own
//! crates.
//!
//! All crates depend inward on core, so tests can swap any external service
//! for a stub without touching the runtime.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::{ConversationEvent, MemoryRecord, MemoryStore, RecordQuery};
pub use message::{Conversation, ConversationTurn, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
