//! Rendix settlement synchronization library.
//!
//! This library provides the core components for synchronizing settlement
//! and chargeback records from a payment clearinghouse into per-region local
//! collection ledgers.

pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod persistence;
