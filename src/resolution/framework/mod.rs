//! The actor framework resolvers are built on: requests, responses,
//! producers, mailboxes and the shared resolver protocol.

pub mod actor;
pub mod producer;
pub mod request;
pub mod resolver;
pub mod response;

use crate::error::ResolutionError;

/// Result type for resolver message handling.
pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;
