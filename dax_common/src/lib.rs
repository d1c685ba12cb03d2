//! DAX Common Library
//!
//! Shared types for the DAX dual-axis stepper controller workspace.
//!
//! # Module Structure
//!
//! - [`config`] - TOML configuration loading and rig/safety config structs
//! - [`consts`] - System-wide numeric limits and defaults
//! - [`encoder`] - Magnetic-encoder register map and motion patterns
//! - [`error`] - Error taxonomy shared by the HAI and the engines
//! - [`hal`] - Hardware Abstraction Interface capability traits
//! - [`motor`] - Stepper-driver command set, register map and status flags
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use dax_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod encoder;
pub mod error;
pub mod hal;
pub mod motor;
pub mod prelude;
