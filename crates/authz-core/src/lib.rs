//! Authorization Core
//!
//! Types shared by every layer of the authorization-decision core.
//!
//! This crate provides:
//! - The request snapshot handed to policy evaluation (`PolicyInput`)
//! - The verdict produced by evaluation (`PolicyOutput`, `Denial`) and the
//!   merge rule used to combine verdicts of several policy scripts
//! - Error types and result handling
//! - The evaluation `Context` carrying cancellation and deadlines

pub mod context;
pub mod error;
pub mod types;

pub use context::Context;
pub use error::{Error, Phase, Result};
pub use types::{Denial, PolicyInput, PolicyOutput, RequestHttp, RequestSession};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::Context;
    pub use crate::error::{Error, Phase, Result};
    pub use crate::types::{Denial, PolicyInput, PolicyOutput, RequestHttp, RequestSession};
}
