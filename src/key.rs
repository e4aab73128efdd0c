//! Deterministic composite keys addressing records in the state store.
//!
//! A key is a category tag plus identifying parts, joined with a U+0000
//! separator so that categories form disjoint, prefix-scannable
//! namespaces and no part can forge a separator-free collision.

use sha2::{Digest, Sha256};

/// Separator between the category tag and each key part
pub const KEY_SEPARATOR: char = '\u{0}';

/// Record categories stored by the contract
pub const TICKET: &str = "ticket";
pub const OWNER_TOKENS: &str = "owner_tokens";
pub const BALANCE: &str = "balance";
pub const ORDER: &str = "order";
pub const REFUND: &str = "refund";
pub const CREDIT: &str = "credit";
pub const PAYMENT: &str = "payment";
pub const ORG_ADMINS: &str = "org_admins";
pub const REPLAY: &str = "replay";
pub const CONTRACT_INFO: &str = "contract_info";

/// Build a composite key from a category tag and identifying parts
pub fn composite_key(category: &str, parts: &[&str]) -> String {
    let mut key = String::with_capacity(
        category.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>() + 1,
    );
    key.push_str(category);
    for part in parts {
        key.push(KEY_SEPARATOR);
        key.push_str(part);
    }
    key
}

/// Prefix covering every key in a category, for range queries
pub fn category_prefix(category: &str) -> String {
    let mut prefix = String::with_capacity(category.len() + 1);
    prefix.push_str(category);
    prefix.push(KEY_SEPARATOR);
    prefix
}

/// Key of a token record
pub fn ticket_key(token_id: &str) -> String {
    composite_key(TICKET, &[token_id])
}

/// Key of an owner's token-id list
pub fn owner_tokens_key(owner: &str) -> String {
    composite_key(OWNER_TOKENS, &[owner])
}

/// Key of a per-(owner, token) balance shard
pub fn balance_key(owner: &str, token_id: &str) -> String {
    composite_key(BALANCE, &[owner, token_id])
}

/// Key of an order record
pub fn order_key(order_id: &str) -> String {
    composite_key(ORDER, &[order_id])
}

/// Key of a refund record
pub fn refund_key(refund_id: &str) -> String {
    composite_key(REFUND, &[refund_id])
}

/// Key of a merchant credit record
pub fn credit_key(merchant_id: &str) -> String {
    composite_key(CREDIT, &[merchant_id])
}

/// Key of a payment flow record
pub fn payment_key(transaction_id: &str) -> String {
    composite_key(PAYMENT, &[transaction_id])
}

/// Derive a ticket id from seed slices.
///
/// Domain-separated SHA-256 over the seeds, rendered as hex. The same
/// seeds always derive the same id, which lets an off-chain caller
/// precompute the id a `CreateTicketId` call will return.
pub fn derive_ticket_id(seeds: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"SFT_Ticket");
    for seed in seeds {
        hasher.update(seed);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_is_deterministic() {
        let a = composite_key(TICKET, &["t1"]);
        let b = composite_key(TICKET, &["t1"]);
        assert_eq!(a, b);
        assert_eq!(a, format!("ticket\u{0}t1"));
    }

    #[test]
    fn test_parts_cannot_collide_across_positions() {
        // ("a", ["b", "c"]) and ("a", ["bc"]) must address different records
        let two_parts = composite_key("a", &["b", "c"]);
        let one_part = composite_key("a", &["bc"]);
        assert_ne!(two_parts, one_part);
    }

    #[test]
    fn test_category_prefix_covers_category_only() {
        let key = composite_key(BALANCE, &["alice", "t1"]);
        assert!(key.starts_with(&category_prefix(BALANCE)));
        assert!(!key.starts_with(&category_prefix(TICKET)));
    }

    #[test]
    fn test_derive_ticket_id() {
        let id = derive_ticket_id(&[b"alice", b"scenic-1", b"2024-01-01T00:00:00Z"]);
        // Deterministic and hex-rendered
        assert_eq!(
            id,
            derive_ticket_id(&[b"alice", b"scenic-1", b"2024-01-01T00:00:00Z"])
        );
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        // Different seeds derive different ids
        let other = derive_ticket_id(&[b"bob", b"scenic-1", b"2024-01-01T00:00:00Z"]);
        assert_ne!(id, other);
    }
}
