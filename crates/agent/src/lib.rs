//! The FoodClaw agent: one request in, one response out.
//!
//! Each invocation wraps the model call in a hook lifecycle:
//!
//! 1. **Validate** the `{prompt, actor_id}` payload
//! 2. **Before hooks**: recall the actor's food preferences into the system prompt
//! 3. **Agent loop**: call the model, run `search_food` when asked, loop until text
//! 4. **After hooks**: save the prompt/response turn to memory
//!
//! Hook failures are logged and published, never returned; only the model
//! call can fail a validated request.

pub mod hooks;
pub mod invocation;
pub mod loop_runner;
pub mod memory_hook;
pub mod prompt;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use hooks::{AgentHook, HookPhase, HookRegistry};
pub use invocation::{InvocationRequest, ValidatedInvocation};
pub use loop_runner::{AgentLoop, MAX_ITERATIONS_MESSAGE};
pub use memory_hook::{format_preferences, PreferenceMemoryHook, PREFERENCES_HEADING};
pub use prompt::system_prompt;
pub use runtime::{AgentRuntime, InvocationOutcome, RuntimeSettings};
