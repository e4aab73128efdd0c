//! Transactional core of a ledger-hosted semi-fungible ticket contract.
//!
//! Splittable, ownable tokens carry structured, schema-governed slot
//! metadata and are mutated through mint, burn, split-transfer,
//! installment-activation, and credit/payment flows. Two pieces carry
//! most of the weight: a generic recursive structural validator that
//! reports the first violation with an exact path, and a
//! balance/ownership ledger that stays consistent under replayed calls
//! from an at-least-once off-chain order system.

pub mod auth;
pub mod contract;
pub mod credit;
pub mod error;
pub mod key;
pub mod ledger;
pub mod records;
pub mod replay;
pub mod schema;
pub mod store;
pub mod templates;

// Re-export the main types for convenience
pub use auth::CallerIdentity;
pub use contract::TicketContract;
pub use error::{ContractError, ErrorEnvelope};
pub use ledger::{ActivationItem, SplitTransfer, TokenLedger};
pub use records::{ContractInfo, CreditRecord, OrderRecord, TicketToken};
pub use replay::ReplayDomain;
pub use schema::{validate, PrimitiveKind, Schema, Violation};
pub use store::{MemoryStore, Overlay, StateStore};
