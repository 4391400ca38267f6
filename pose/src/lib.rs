//! Proof-of-service for the LMNode layer.
//!
//! Masternodes high in the ranking challenge others at their announced
//! address. Answers and relayed results move each record's PoSe ban score,
//! which the registry turns into a ban once it reaches the maximum.

pub mod constants;
pub mod error;
pub mod verifier;

pub use error::{PoseError, PoseRejectReason, PoseRejection};
pub use verifier::PoseVerifier;
