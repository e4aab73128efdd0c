//! Idempotency guard for externally-identified business events.
//!
//! The off-chain order/payment system delivers at-least-once; a marker
//! record under a namespaced key turns redelivery into an explicit
//! rejection instead of a double-applied mutation.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::key::{composite_key, REPLAY};
use crate::store::{read_json, write_json, StateStore};

/// Business domains whose external ids are guarded independently.
///
/// Namespacing keeps an `orderId` of "1" and a `tradeNo` of "1" from
/// colliding in the marker keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDomain {
    /// Order settlements and refunds (`orderId…`)
    Order,
    /// Credit transfers (`tradeNo…`)
    Trade,
    /// Payment flows (`transaction…`)
    Transaction,
}

impl ReplayDomain {
    fn namespace(&self) -> &'static str {
        match self {
            ReplayDomain::Order => "order",
            ReplayDomain::Trade => "trade",
            ReplayDomain::Transaction => "transaction",
        }
    }

    /// Field name of the external id, used in rejection messages
    fn id_label(&self) -> &'static str {
        match self {
            ReplayDomain::Order => "orderId",
            ReplayDomain::Trade => "tradeNo",
            ReplayDomain::Transaction => "transactionId",
        }
    }

    /// Verb used in rejection messages; orders and payments are stored,
    /// trade numbers are used
    fn verb(&self) -> &'static str {
        match self {
            ReplayDomain::Trade => "used",
            ReplayDomain::Order | ReplayDomain::Transaction => "stored",
        }
    }

    fn key(&self, id: &str) -> String {
        composite_key(REPLAY, &[self.namespace(), id])
    }
}

/// Marker record whose existence means the id has been processed
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplayMarker {
    processed_at: String,
}

/// Fail when the external id has already been processed in this domain
pub fn ensure_unused<S: StateStore + ?Sized>(
    store: &S,
    domain: ReplayDomain,
    id: &str,
) -> Result<(), ContractError> {
    let marker: Option<ReplayMarker> = read_json(store, &domain.key(id))?;
    if marker.is_some() {
        return Err(ContractError::AlreadyExists(format!(
            "The {} {} has already been {}",
            domain.id_label(),
            id,
            domain.verb()
        )));
    }
    Ok(())
}

/// Record the external id as processed.
///
/// Called after the guarded mutation has been staged; `processed_at` is
/// the call's audit timestamp, kept for operator forensics only.
pub fn mark_used<S: StateStore + ?Sized>(
    store: &S,
    domain: ReplayDomain,
    id: &str,
    processed_at: &str,
) -> Result<(), ContractError> {
    debug!("marking {} {} as processed", domain.id_label(), id);
    write_json(
        store,
        &domain.key(id),
        &ReplayMarker {
            processed_at: processed_at.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_unused_id_passes() {
        let store = MemoryStore::new();
        assert!(ensure_unused(&store, ReplayDomain::Order, "o1").is_ok());
    }

    #[test]
    fn test_marked_id_rejects_regardless_of_payload() {
        let store = MemoryStore::new();
        mark_used(&store, ReplayDomain::Order, "o1", "2024-05-01T10:00:00Z").unwrap();

        let err = ensure_unused(&store, ReplayDomain::Order, "o1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The orderId o1 has already been stored"
        );
        assert_eq!(err.code(), 3002);
    }

    #[test]
    fn test_trade_uses_used_wording() {
        let store = MemoryStore::new();
        mark_used(&store, ReplayDomain::Trade, "tr9", "2024-05-01T10:00:00Z").unwrap();
        let err = ensure_unused(&store, ReplayDomain::Trade, "tr9").unwrap_err();
        assert_eq!(err.to_string(), "The tradeNo tr9 has already been used");
    }

    #[test]
    fn test_domains_do_not_collide() {
        let store = MemoryStore::new();
        mark_used(&store, ReplayDomain::Order, "1", "2024-05-01T10:00:00Z").unwrap();

        assert!(ensure_unused(&store, ReplayDomain::Trade, "1").is_ok());
        assert!(ensure_unused(&store, ReplayDomain::Transaction, "1").is_ok());
        assert!(ensure_unused(&store, ReplayDomain::Order, "1").is_err());
    }
}
