//! Utility functions and types for the CLI

pub mod display;
pub mod reader;
