//! Utility functions for getting hashes
use std::hash::{DefaultHasher, Hash, Hasher};

pub(crate) fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

/// Short hexadecimal hash, used to build variable ids which can't collide with reaction ids
pub(crate) fn hash_as_hex_string<T: Hash>(t: &T) -> String {
    format!("{:x}", calculate_hash(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_process() {
        assert_eq!(hash_as_hex_string(&"PGI"), hash_as_hex_string(&"PGI"));
        assert_ne!(hash_as_hex_string(&"PGI"), hash_as_hex_string(&"PFK"));
    }
}
