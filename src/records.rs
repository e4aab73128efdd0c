//! Record types persisted by the contract.
//!
//! All records serialize as JSON documents. Quantities that a pre-credit
//! ratio can scale are `Decimal`; float arithmetic is not used anywhere
//! in the crate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ContractError;

/// Slot zone fixed at mint time
pub const BASIC_INFORMATION: &str = "BasicInformation";

/// Slot zone mutated by narrow-scope update operations
pub const ADDITIONAL_INFORMATION: &str = "AdditionalInformation";

/// A splittable, ownable ticket token.
///
/// `slot` is a JSON object with two zones: `BasicInformation`, fixed at
/// mint, and `AdditionalInformation`, independently schema-checked per
/// update call. Invariant: `balance <= total_balance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketToken {
    /// Unique identifier of this token
    pub token_id: String,

    /// Identity that owns this token
    pub owner: String,

    /// Structured, schema-governed metadata
    pub slot: Value,

    /// Quantity currently held on this record
    pub balance: Decimal,

    /// Quantity ever minted onto this record
    pub total_balance: Decimal,

    /// Pre-credit bookkeeping figure: the part of `balance` already
    /// backed by settled principal
    pub available_total_num: Decimal,

    /// Arbitrary token-level metadata (token URI and the like)
    pub metadata: Value,
}

impl TicketToken {
    pub fn new(
        token_id: String,
        owner: String,
        slot: Value,
        balance: Decimal,
        metadata: Value,
    ) -> Self {
        Self {
            token_id,
            owner,
            slot,
            balance,
            total_balance: balance,
            available_total_num: balance,
            metadata,
        }
    }

    /// Mutable view of the `AdditionalInformation` zone.
    ///
    /// Fails when the stored slot is not the object shape mint validated,
    /// which would mean the record was corrupted outside this contract.
    pub fn additional_information_mut(&mut self) -> Result<&mut Map<String, Value>, ContractError> {
        self.slot
            .get_mut(ADDITIONAL_INFORMATION)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                ContractError::Serialization(
                    "slot does not contain an AdditionalInformation object".to_string(),
                )
            })
    }

    /// Read-only view of the `AdditionalInformation` zone
    pub fn additional_information(&self) -> Result<&Map<String, Value>, ContractError> {
        self.slot
            .get(ADDITIONAL_INFORMATION)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ContractError::Serialization(
                    "slot does not contain an AdditionalInformation object".to_string(),
                )
            })
    }
}

/// Per-(owner, token) balance shard, a secondary index enabling holder
/// queries without scanning full token records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceShard {
    pub owner: String,
    pub token_id: String,
    pub balance: Decimal,
    pub available_total_num: Decimal,
}

/// Per-owner token-id list, a secondary index for portfolio queries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OwnerTokenList {
    pub token_ids: Vec<String>,
}

impl OwnerTokenList {
    /// Add a token id if not already present
    pub fn add(&mut self, token_id: &str) {
        if !self.token_ids.iter().any(|id| id == token_id) {
            self.token_ids.push(token_id.to_string());
        }
    }

    /// Remove a token id if present
    pub fn remove(&mut self, token_id: &str) {
        self.token_ids.retain(|id| id != token_id);
    }
}

/// One seller batch inside an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBatch {
    pub batch_id: String,
    pub token_id: String,
    pub seller_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Fraction of the quantity settled as principal up front;
    /// zero means the batch is not a pre-credit sale
    pub available_ratio: Decimal,
}

/// An off-chain order settled onto the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub buyer_id: String,
    pub order_time: String,
    pub payment_amount: Decimal,
    pub batches: Vec<OrderBatch>,
}

impl OrderRecord {
    /// Locate a batch sub-record by its id
    pub fn batch(&self, batch_id: &str) -> Option<&OrderBatch> {
        self.batches.iter().find(|b| b.batch_id == batch_id)
    }
}

/// One batch line inside a refund
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundBatch {
    pub batch_id: String,
    pub token_id: String,
    pub quantity: Decimal,
}

/// A refund against a previously stored order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundRecord {
    pub refund_id: String,
    pub order_id: String,
    pub refund_time: String,
    pub refund_amount: Decimal,
    pub batches: Vec<RefundBatch>,
}

/// Credit line of a merchant account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditRecord {
    pub merchant_id: String,
    pub owner: String,
    pub credit_limit: Decimal,
    pub pledge_amount: Decimal,
    pub activated: bool,
}

/// An externally-identified payment or repayment flow row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub transaction_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub amount: Decimal,
    pub pay_time: String,
}

/// Contract-level metadata written once at initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractInfo {
    pub name: String,
    pub symbol: String,
    pub token_uri_base: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_new_token_starts_fully_available() {
        let token = TicketToken::new(
            "t1".into(),
            "alice".into(),
            json!({BASIC_INFORMATION: {}, ADDITIONAL_INFORMATION: {}}),
            dec!(100),
            Value::Null,
        );
        assert_eq!(token.balance, dec!(100));
        assert_eq!(token.total_balance, dec!(100));
        assert_eq!(token.available_total_num, dec!(100));
    }

    #[test]
    fn test_additional_information_requires_object_zone() {
        let mut token = TicketToken::new(
            "t1".into(),
            "alice".into(),
            json!({BASIC_INFORMATION: {}}),
            dec!(1),
            Value::Null,
        );
        assert!(token.additional_information_mut().is_err());
    }

    #[test]
    fn test_owner_token_list_dedups() {
        let mut list = OwnerTokenList::default();
        list.add("t1");
        list.add("t1");
        list.add("t2");
        assert_eq!(list.token_ids, vec!["t1".to_string(), "t2".to_string()]);
        list.remove("t1");
        assert_eq!(list.token_ids, vec!["t2".to_string()]);
    }

    #[test]
    fn test_order_batch_lookup() {
        let order = OrderRecord {
            order_id: "o1".into(),
            buyer_id: "buyer".into(),
            order_time: "2024-05-01T10:00:00Z".into(),
            payment_amount: dec!(500),
            batches: vec![OrderBatch {
                batch_id: "b1".into(),
                token_id: "t1".into(),
                seller_id: "seller".into(),
                quantity: dec!(10),
                unit_price: dec!(50),
                available_ratio: dec!(0.5),
            }],
        };
        assert!(order.batch("b1").is_some());
        assert!(order.batch("b2").is_none());
    }
}
