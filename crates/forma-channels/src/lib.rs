//! # forma-channels
//!
//! The webhook channel (inbound events, outbound sends) and HTTP clients
//! for external action collaborators.

pub mod program;
pub mod webhook;
