//! Core types for Stride.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod guest;
pub mod id;

pub use email::{Email, EmailError};
pub use guest::{GuestToken, GuestTokenError};
pub use id::*;
