//! # Record Stream Testkit
//!
//! Testing utilities for record stream ingestion.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Record files with independently computed hashes
//! - **Generators**: Proptest strategies for record files in both digest eras
//! - **Fixtures**: A scratch input directory, a SQLite store, and chained files
//!
//! ## Golden Vectors
//!
//! ```rust
//! use recordstream_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use recordstream_testkit::generators::{record_file_from_params, RecordFileParams};
//!
//! proptest! {
//!     #[test]
//!     fn hash_is_deterministic(params: RecordFileParams) {
//!         let a = record_file_from_params(&params);
//!         let b = record_file_from_params(&params);
//!         prop_assert_eq!(a.file_hash(), b.file_hash());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use recordstream_testkit::fixtures::{chained_files, TestFixture};
//! use recordstream_core::FileHash;
//!
//! let fixture = TestFixture::new().unwrap();
//! for (name, file) in chained_files(2, 2, 1, FileHash::ZERO) {
//!     fixture.write(&name, &file).unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{chained_files, file_name, record_pair, TestFixture};
pub use generators::{record_file_from_params, RecordFileParams};
pub use vectors::{all_vectors, file_from_vector, verify_all_vectors, GoldenVector};
