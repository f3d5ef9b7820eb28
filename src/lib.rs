#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate alloc;

/// An insert-once map over the chained hash table.
///
/// This module provides a `HashMap` that wraps the `HashTable`, owns the
/// hasher builder and adds key-based insert and lookup.
pub mod hash_map;

pub mod hash_table;

/// Seeded generation of benchmark keys, values and sampling draws.
pub mod rng;

pub mod bench;

pub mod error;

pub use bench::BenchConfig;
pub use bench::PrefetchMode;
pub use bench::Report;
pub use bench::SumMode;
pub use bench::Workload;
pub use error::Error;
pub use error::Result;
pub use hash_map::HashMap;
pub use hash_table::HashTable;
pub use rng::KeyGenerator;
