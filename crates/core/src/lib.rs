//! QReward Core - Shared error and identifier types

mod error;
mod types;

pub use error::*;
pub use types::*;
