//! Core RPS types, issuer configuration and errors.
//!
//! This module provides the strongly typed model of the Publica RPS
//! document and the configuration every client is built from.

mod builder;
mod config;
mod error;
mod types;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use types::*;
