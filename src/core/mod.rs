//! Core types and functionality for Beacon
//!
//! This module forms the foundation of Beacon's type system, providing the
//! error taxonomy shared by the identifier parser, the dependency contract,
//! and the transport collaborator.
//!
//! # Error Management
//!
//! Beacon uses strongly-typed errors so callers can react precisely:
//! - [`BeaconError::MalformedIdentifier`] / [`BeaconError::InvalidFilter`] are
//!   surfaced by the parser before any dependency instance exists and are
//!   never retried
//! - [`BeaconError::Stopped`] is the cancellation signal, a normal
//!   termination for a polling loop rather than a failure
//! - [`BeaconError::Transport`] wraps a collaborator failure with the
//!   dependency's canonical string form for context; retry/backoff policy
//!   belongs to the caller
//!
//! A not-found result on get/exists-style queries is *not* an error: it is a
//! successful fetch returning an absent value.

pub mod error;

pub use error::{BeaconError, Result};
