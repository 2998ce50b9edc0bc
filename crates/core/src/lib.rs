//! # rolerag Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! role-aware HR assistant. This crate has no framework dependencies; it
//! defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: embedding vectors and chat completions
//! - [`Directory`]: the role/menu store, section links, and employees
//!
//! Implementations live in their own crates, so the ranking engine and the
//! chat pipeline can be tested against injected fixtures.

pub mod directory;
pub mod error;
pub mod message;
pub mod provider;
pub mod role;

// Re-export key types at crate root for ergonomics
pub use directory::{Directory, EmployeeStatus, SectionLink, SectionNode};
pub use error::{Error, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse};
pub use role::{RoleId, RoleSet};
