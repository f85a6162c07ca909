//! Utility helpers shared across modules.

pub mod time;
