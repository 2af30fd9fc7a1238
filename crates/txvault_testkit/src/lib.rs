//! # TxVault Testkit
//!
//! Test utilities for TxVault:
//! - [`fixtures`] - temp-dir backed stores and fully wired backup sites
//! - [`faults`] - a fault-injecting [`txvault_storage::StorageEngine`]
//!   wrapper for retry and atomicity testing
//! - [`corruption`] - byte-level file damage helpers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corruption;
pub mod faults;
pub mod fixtures;
