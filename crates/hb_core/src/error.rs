//! Engine-level error taxonomy.
//!
//! Three failure classes reach callers:
//! - `Contract`: malformed inputs caught before any possession runs.
//!   Halts the affected game only.
//! - `Rules`: a rule snapshot rejection, carrying the rollback/halt split
//!   decided by the config layer.
//! - `Internal`: an unexpected mid-game failure. The round runner catches
//!   it, logs it and skips the game; sibling games proceed. A game that
//!   hits this never returns a partial result.

use thiserror::Error;

use crate::config::RuleRejection;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("contract violation: {0}")]
    Contract(String),

    #[error(transparent)]
    Rules(#[from] RuleRejection),

    #[error("internal error at possession {possession}: {message}")]
    Internal { possession: u32, message: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
