//! Persistence and content hashing for ASG arenas.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`header`]: key/value stream header (schema name, versions)
//! - [`binary`]: node records, string-table section, filter stream
//! - [`hash`]: blake3 structural hashes and the caller-owned hash cache
//! - [`similarity`]: pairwise node similarity

pub mod binary;
pub mod error;
pub mod hash;
pub mod header;
pub mod similarity;

// Re-export key types for ergonomic use.
pub use binary::{
    load, load_file, load_filter, load_into_table, load_with_config, read_file_header, read_header, save,
    save_file, save_filter, MAX_NODE_ID,
};
pub use error::StorageError;
pub use hash::{cycle_sentinel, graph_hash, hash_roots, structural_hash, structural_hash_cached, HashCache, HashConfig};
pub use header::{Header, BINARY_VERSION};
pub use similarity::{levenshtein, similarity, string_similarity, SimilarityConfig};
