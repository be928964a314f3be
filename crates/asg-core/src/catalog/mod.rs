//! Bundled node-kind catalogues.
//!
//! Each catalogue module exposes `kind`, `attr` and `edge` constant modules
//! plus a shared [`Schema`] instance. They cover a representative slice of a
//! real language front-end and are what the engine's own tests and the `asg`
//! binary run against.

use std::sync::Arc;

use crate::schema::Schema;

pub mod java;
pub mod python;

/// Looks up a bundled catalogue by its schema name.
pub fn by_name(name: &str) -> Option<Arc<Schema>> {
    match name {
        python::NAME => Some(python::schema()),
        java::NAME => Some(java::schema()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("python").unwrap().name(), "python");
        assert_eq!(by_name("java").unwrap().name(), "java");
        assert!(by_name("cobol").is_none());
    }
}
