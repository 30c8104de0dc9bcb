//! Key namespacing.
//!
//! Lock markers and tag versions live in the same key space as cache
//! entries and are told apart only by prefix.

/// Prefix for lock markers.
pub const LOCK_PREFIX: &str = "l_";

/// Prefix for tag version entries.
pub const TAG_PREFIX: &str = "t_";

/// Store key of the lock marker guarding `key`.
pub fn lock_key(key: &str) -> String {
    format!("{}{}", LOCK_PREFIX, key)
}

/// Store key holding the current version of tag `name`.
pub fn tag_key(name: &str) -> String {
    format!("{}{}", TAG_PREFIX, name)
}

/// Whether a cache key collides with the lock or tag namespace.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(LOCK_PREFIX) || key.starts_with(TAG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(lock_key("page:1"), "l_page:1");
        assert_eq!(tag_key("users"), "t_users");
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("l_page"));
        assert!(is_reserved("t_users"));
        assert!(!is_reserved("page:1"));
        assert!(!is_reserved("lt_page"));
        assert!(!is_reserved(""));
    }
}
