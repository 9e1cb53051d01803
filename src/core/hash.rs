//! Model-id hashing strategies (specification §9 design notes: "a stable
//! hash (CRC32 suffices for testing; a 64-bit mixing hash is appropriate
//! for production)").

use crate::core::ids::ModelId;
use serde::Serialize;

/// Computes a likely-unique [`ModelId`] from a model snapshot.
pub trait ModelHasher<M>: Send + Sync {
    /// Hash the given model.
    fn hash(&self, model: &M) -> ModelId;
}

/// Test-grade hasher using the IEEE-802.3 CRC32 polynomial over the model's
/// canonical JSON encoding.
#[derive(Default)]
pub struct Crc32ModelHasher;

impl<M: Serialize> ModelHasher<M> for Crc32ModelHasher {
    fn hash(&self, model: &M) -> ModelId {
        let bytes = serde_json::to_vec(model).expect("model must be serializable");
        ModelId(crc32fast::hash(&bytes) as u64)
    }
}

/// Production-grade hasher using BLAKE3, truncated to 64 bits, over the
/// model's canonical JSON encoding.
#[derive(Default)]
pub struct Blake3ModelHasher;

impl<M: Serialize> ModelHasher<M> for Blake3ModelHasher {
    fn hash(&self, model: &M) -> ModelId {
        let bytes = serde_json::to_vec(model).expect("model must be serializable");
        let digest = blake3::hash(&bytes);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest.as_bytes()[..8]);
        ModelId(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_hash_matches_ieee_reference() {
        // IEEE-802.3 reference vector: CRC32("123456789") == 0xCBF43926.
        let hasher = crc32fast::Hasher::new();
        let mut h = hasher;
        h.update(b"123456789");
        assert_eq!(h.finalize(), 0xCBF4_3926);
    }

    #[test]
    fn crc32_model_hasher_is_deterministic() {
        let hasher = Crc32ModelHasher;
        let model = vec![1, 2, 3];
        assert_eq!(hasher.hash(&model), hasher.hash(&model));
    }

    #[test]
    fn blake3_model_hasher_is_deterministic_and_differs_by_input() {
        let hasher = Blake3ModelHasher;
        let a = hasher.hash(&"alpha".to_string());
        let b = hasher.hash(&"beta".to_string());
        assert_eq!(a, hasher.hash(&"alpha".to_string()));
        assert_ne!(a, b);
    }
}
