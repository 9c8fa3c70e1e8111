//! Test utilities for the sift crates.
//!
//! - [`data_gen`]: seeded synthetic corpora and posting tuples.
//!
//! Generators are deterministic for a given seed, so a failing randomized test can
//! be replayed exactly.

pub mod data_gen;
