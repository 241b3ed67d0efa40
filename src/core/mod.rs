//! Core reusable components for alignment operations.
//!
//! This module contains components that are agnostic to the reference structure
//! and can be reused by any pipeline that needs to finish an alignment.

pub mod alignment;
pub mod utils;
