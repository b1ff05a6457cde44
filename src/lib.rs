//! A thread-safe multimap with caller-supplied value equality.
//!
//! ---
//!
//! [`SyncMultimap`] groups values under keys, keeping the values of a key
//! in insertion order and free of duplicates:
//!  - `a -> 1, 2`
//!  - `b -> 3`
//!
//! What counts as a duplicate is decided by a predicate given at construction
//! rather than by [`PartialEq`], so values without a natural equality can be
//! stored too. A key disappears as soon as its last value is removed.
//!
//! ---
//!
//! The whole table sits behind one reader/writer lock. Lookups run
//! concurrently with each other; mutations are exclusive. Every method takes
//! `&self`, so a map is shared between threads by reference or through an
//! [`Arc`](std::sync::Arc) without any outer lock.
//!
//! ---
//!
//! Maps round-trip through JSON as an object of arrays:
//!
//! ```
//! use sync_multimap::SyncMultimap;
//!
//! let map: SyncMultimap<String, u32> =
//!     SyncMultimap::from_json(br#"{"a":[1,2],"b":[3]}"#, |a, b| a == b)?;
//! map.add("b".to_owned(), 4);
//!
//! let copy: SyncMultimap<String, u32> = SyncMultimap::from_json(&map.encode()?, |a, b| a == b)?;
//! assert!(copy.equal(&map));
//! # Ok::<(), sync_multimap::Error>(())
//! ```

mod error;
mod json;

/// Thread-safe multimap keyed by hash with per-key ordered, distinct values.
pub mod map;

#[cfg(feature = "rayon")]
mod rayon;

pub use error::{Error, Result};
pub use map::{equal, Equals, SyncMultimap};
