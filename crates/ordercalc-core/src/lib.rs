//! # OrderCalc Core
//!
//! Shared data model, error taxonomy and run control for the order
//! requirements calculator.

pub mod control;
pub mod error;
pub mod models;

pub use control::*;
pub use error::*;
pub use models::*;
