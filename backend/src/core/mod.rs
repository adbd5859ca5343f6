//! Core infrastructure: epoch clock

pub mod time;
