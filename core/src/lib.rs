//! # relay-rpc-core
//!
//! This crate provides the core utilities for [`relay-rpc`](https://docs.rs/relay-rpc) and
//! [`relay-rpc-config-center`](https://docs.rs/relay-rpc-config-center).
//! It includes the target URL, reserved keys, configuration, error types, the runtime
//! abstraction and lifecycle primitives shared by the other crates in the workspace.

mod config;
pub use config::*;
pub mod constant;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod runtime;
pub mod url;
pub use crate::url::Url;
