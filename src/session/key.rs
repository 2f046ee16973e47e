//! Session token generation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated tokens, in hex characters.
pub const KEY_LEN: usize = 32;

pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// SHA-256 over the current time interleaved with random words.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashKeyGenerator;

impl KeyGenerator for HashKeyGenerator {
    fn generate(&self) -> String {
        generate_key()
    }
}

pub fn generate_key() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs().to_le_bytes();
    let nanos = (now.as_nanos() as u64).to_le_bytes();

    let mut rng = rand::thread_rng();
    let first = rng.gen::<u64>().to_le_bytes();
    let second = rng.gen::<u64>().to_le_bytes();

    let mut hasher = Sha256::new();
    for i in 0..8 {
        hasher.update([secs[i], first[i]]);
    }
    for i in 0..8 {
        hasher.update([nanos[i], second[i]]);
    }

    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_hex_and_unique() {
        let keys: HashSet<String> = (0..100).map(|_| generate_key()).collect();
        assert_eq!(keys.len(), 100);
        for key in &keys {
            assert_eq!(key.len(), KEY_LEN);
            assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
        }
    }
}
