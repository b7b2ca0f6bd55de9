//! Model providers for FoodClaw.
//!
//! All providers implement the `foodclaw_core::Provider` trait. The runtime
//! uses a [`FallbackProvider`] over a [`BedrockProvider`], built by
//! [`build_from_config`].

pub mod bedrock;
pub mod fallback;
pub mod router;

pub use bedrock::BedrockProvider;
pub use fallback::FallbackProvider;
pub use router::{build_from_config, chain_for};
