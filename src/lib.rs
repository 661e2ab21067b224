//! proof_ledger - a tamper-evident, append-only proof-of-work ledger
//!
//! - [`blockchain`] - blocks, mining, the ledger and its validation
//! - [`api`] - REST API over a shared ledger handle
//! - [`config`] - Configuration management

#![forbid(unsafe_code)]

pub mod api;
pub mod blockchain;
pub mod config;
