//! Reconciliation use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into resolve, verify and cascade steps.
//! - Keep the CLI decoupled from storage details.

pub mod batch;
pub mod cascade;
pub mod resolver;
pub mod verifier;
