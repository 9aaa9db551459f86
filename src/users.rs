//! uid -> user name resolution
//!
//! Wraps the passwd lookup behind a small cache. Lookups happen only at
//! report time, after the walk, so a plain `HashMap` is enough. Unknown
//! uids render as the numeric uid, matching what `ls -l` does for
//! orphaned files.

use nix::unistd::{Uid, User};
use std::collections::HashMap;

/// Cached uid -> name table.
#[derive(Debug, Default)]
pub struct UserTable {
    cache: HashMap<u32, String>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a uid to a user name, falling back to the numeric uid.
    pub fn name(&mut self, uid: u32) -> &str {
        self.cache.entry(uid).or_insert_with(|| {
            match User::from_uid(Uid::from_raw(uid)) {
                Ok(Some(user)) => user.name,
                _ => uid.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_root() {
        let mut table = UserTable::new();
        assert_eq!(table.name(0), "root");
    }

    #[test]
    fn unknown_uid_falls_back_to_number() {
        let mut table = UserTable::new();
        // Nobody allocates uids this high on a test box.
        assert_eq!(table.name(4_000_000_000), "4000000000");
    }

    #[test]
    fn lookups_are_cached() {
        let mut table = UserTable::new();
        let first = table.name(0).to_string();
        let second = table.name(0).to_string();
        assert_eq!(first, second);
        assert_eq!(table.cache.len(), 1);
    }
}
