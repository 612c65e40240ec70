//! Utility types and functions shared across the urlmap crates.
//!
//! This module provides:
//! - [`MultiValueDict`]: A dictionary that can hold multiple values per key,
//!   used as the backing store for the reverse-name index.
//! - [`text`]: Small string helpers (identifier checks, slash escaping).

mod multi_value_dict;
pub mod text;

pub use multi_value_dict::MultiValueDict;
