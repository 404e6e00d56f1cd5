//! Custom Resource Definitions
//!
//! - StoragePool: capacity and accessibility of one backing datastore

pub mod storage_pool;

pub use storage_pool::*;
