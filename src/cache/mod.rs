//! In-memory verdict cache and license key hashing.

pub mod verdict;
