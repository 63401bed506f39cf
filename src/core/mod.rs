//! Core domain models.
//!
//! Chunks, file identities and conversation turns. These are pure data
//! types with no I/O dependencies.

pub mod chunk;
pub mod identity;
pub mod turn;

pub use chunk::{Chunk, estimate_tokens};
pub use identity::FileIdentity;
pub use turn::{Role, Turn};
