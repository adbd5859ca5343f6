//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the planner MUST go through this module, and
//! every stochastic operation takes its generator as an explicit argument.

mod xorshift;

pub use xorshift::RngManager;
