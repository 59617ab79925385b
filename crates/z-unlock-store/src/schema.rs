//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Purchase records, keyed by `purchase_id` (ULID).
    pub const PURCHASES: &str = "purchases";

    /// Index: purchases by user, keyed by `user_id || purchase_id`.
    /// Value is empty (index only).
    pub const PURCHASES_BY_USER: &str = "purchases_by_user";

    /// Index: checkout session id to `purchase_id`.
    pub const PURCHASES_BY_SESSION: &str = "purchases_by_session";

    /// Generation journal for idempotent consumption, keyed by `generation_id`.
    pub const GENERATIONS: &str = "generations";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PURCHASES,
        cf::PURCHASES_BY_USER,
        cf::PURCHASES_BY_SESSION,
        cf::GENERATIONS,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_families_are_unique() {
        let mut names = all_column_families();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
