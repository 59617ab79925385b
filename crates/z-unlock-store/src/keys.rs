//! Key encoding utilities for `RocksDB`.

use z_unlock_core::{GenerationId, PurchaseId, UserId};

/// Create a purchase key from a purchase ID.
#[must_use]
pub fn purchase_key(purchase_id: &PurchaseId) -> Vec<u8> {
    purchase_id.to_bytes().to_vec()
}

/// Create a user-purchase index key.
///
/// Format: `user_id (16 bytes) || purchase_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a user's purchases iterate oldest first.
#[must_use]
pub fn user_purchase_key(user_id: &UserId, purchase_id: &PurchaseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&purchase_id.to_bytes());
    key
}

/// Create a prefix for iterating all purchases of a user.
#[must_use]
pub fn user_purchases_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the purchase ID from a user-purchase index key.
///
/// Returns `None` if the key is not exactly 32 bytes.
#[must_use]
pub fn purchase_id_from_user_key(key: &[u8]) -> Option<PurchaseId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    (key.len() == 32).then(|| PurchaseId::from_bytes(bytes))
}

/// Create a checkout-session index key.
#[must_use]
pub fn session_key(session_id: &str) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

/// Create a generation journal key.
#[must_use]
pub fn generation_key(generation_id: &GenerationId) -> Vec<u8> {
    generation_id.as_str().as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_purchase_key_format() {
        let user_id = UserId::generate();
        let purchase_id = PurchaseId::generate();
        let key = user_purchase_key(&user_id, &purchase_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], purchase_id.to_bytes());
        assert!(key.starts_with(&user_purchases_prefix(&user_id)));
    }

    #[test]
    fn extract_purchase_id() {
        let user_id = UserId::generate();
        let purchase_id = PurchaseId::generate();
        let key = user_purchase_key(&user_id, &purchase_id);

        assert_eq!(purchase_id_from_user_key(&key), Some(purchase_id));
        assert_eq!(purchase_id_from_user_key(&key[..20]), None);
    }
}
