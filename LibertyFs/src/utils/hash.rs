//! Hashing utilities

/// Jenkins one-at-a-time hash over lowercased ASCII (GXT text keys)
pub fn jenkins_one_at_a_time(s: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in s.bytes() {
        hash = hash.wrapping_add(u32::from(byte.to_ascii_lowercase()));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// FNV-1a 64-bit hash, rendered as 16 hex digits.
///
/// Used to name on-disk cache files; stable across runs and platforms.
pub fn hash_path(s: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jenkins_hash() {
        assert_eq!(jenkins_one_at_a_time(""), 0);
        // Case-insensitive
        assert_eq!(jenkins_one_at_a_time("HELLO"), jenkins_one_at_a_time("hello"));
        assert_ne!(jenkins_one_at_a_time("a"), jenkins_one_at_a_time("b"));
    }

    #[test]
    fn test_hash_path_stable() {
        assert_eq!(hash_path(""), "cbf29ce484222325");
        assert_eq!(hash_path("a"), "af63dc4c8601ec8c");
        assert_eq!(hash_path("x").len(), 16);
    }
}
