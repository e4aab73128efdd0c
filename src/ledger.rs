//! Token ledger: balances, ownership, and the split/activation flows.
//!
//! Every operation is a validate-then-mutate sequence over composite
//! keys; any failed check aborts the call with zero partial writes. The
//! ledger holds no state of its own and performs no locking; the host
//! commit protocol serializes conflicting writes.

use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::ContractError;
use crate::key::{balance_key, category_prefix, order_key, owner_tokens_key, ticket_key, TICKET};
use crate::records::{BalanceShard, OrderRecord, OwnerTokenList, TicketToken};
use crate::schema::validate;
use crate::store::{read_json, write_json, Overlay, StateStore};
use crate::templates;

/// One split-transfer between two token records.
///
/// When `available_ratio` is positive the receiver's
/// `available_total_num` grows by `amount * available_ratio` instead of
/// the full amount, modeling partial-principal credit.
/// `expected_available_total_num` is the caller's view of the receiver's
/// resulting figure; the ledger recomputes it independently and rejects
/// the whole transfer on disagreement.
#[derive(Debug, Clone)]
pub struct SplitTransfer {
    pub from_token_id: String,
    pub to_token_id: String,
    pub to_owner: String,
    pub amount: Decimal,
    pub available_ratio: Decimal,
    pub expected_available_total_num: Option<Decimal>,
}

/// One installment-release line of an `ActivateTickets` call
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ActivationItem {
    pub order_id: String,
    pub batch_id: String,
    pub token_id: String,
    pub available_total_num: Decimal,
    pub periods: Vec<u32>,
    pub total_periods: u32,
    pub amount: Decimal,
    pub total_repayment: Decimal,
}

/// Ledger of token records and their secondary indices.
///
/// Holds only a handle to the injected state store, so the same code
/// runs against the host ledger and an in-memory store in tests.
pub struct TokenLedger<'a, S: StateStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: StateStore + ?Sized> TokenLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read a token record, failing NotFound when absent
    pub fn read_token(&self, token_id: &str) -> Result<TicketToken, ContractError> {
        self.try_read_token(token_id)?.ok_or_else(|| {
            ContractError::NotFound(format!(
                "The tokenId {} is invalid. It does not exist",
                token_id
            ))
        })
    }

    /// Read a token record, returning None when absent
    pub fn try_read_token(&self, token_id: &str) -> Result<Option<TicketToken>, ContractError> {
        read_json(self.store, &ticket_key(token_id))
    }

    /// Persist a token record together with its index entries
    pub fn write_token(&self, token: &TicketToken) -> Result<(), ContractError> {
        write_json(self.store, &ticket_key(&token.token_id), token)?;
        write_json(
            self.store,
            &balance_key(&token.owner, &token.token_id),
            &BalanceShard {
                owner: token.owner.clone(),
                token_id: token.token_id.clone(),
                balance: token.balance,
                available_total_num: token.available_total_num,
            },
        )?;
        let owner_key = owner_tokens_key(&token.owner);
        let mut list: OwnerTokenList = read_json(self.store, &owner_key)?.unwrap_or_default();
        list.add(&token.token_id);
        write_json(self.store, &owner_key, &list)
    }

    /// Remove a token record and all of its index entries
    fn delete_token(&self, token: &TicketToken) -> Result<(), ContractError> {
        self.store.delete(&ticket_key(&token.token_id))?;
        self.store
            .delete(&balance_key(&token.owner, &token.token_id))?;
        let owner_key = owner_tokens_key(&token.owner);
        let mut list: OwnerTokenList = read_json(self.store, &owner_key)?.unwrap_or_default();
        list.remove(&token.token_id);
        if list.token_ids.is_empty() {
            self.store.delete(&owner_key)
        } else {
            write_json(self.store, &owner_key, &list)
        }
    }

    /// Create a token record.
    ///
    /// Fails when the id is already minted, when the balance is not
    /// positive (regardless of slot validity), or when the slot does not
    /// match the mint template.
    pub fn mint(
        &self,
        token_id: &str,
        owner: &str,
        slot: Value,
        balance: Decimal,
        metadata: Value,
    ) -> Result<(), ContractError> {
        if self.try_read_token(token_id)?.is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "The tokenId {} has already been minted",
                token_id
            )));
        }
        if balance <= Decimal::ZERO {
            return Err(ContractError::RequiredField(
                "balance should be greater than 0".to_string(),
            ));
        }
        validate(&templates::slot(), &slot, "")?;

        let token = TicketToken::new(
            token_id.to_string(),
            owner.to_string(),
            slot,
            balance,
            metadata,
        );
        info!("minting tokenId {} for {} with balance {}", token_id, owner, balance);
        self.write_token(&token)
    }

    /// Destroy a token outright, or burn part of its balance.
    ///
    /// Without an amount the record and all its index entries are
    /// removed. With an amount the balance is decremented; reaching zero
    /// removes the record the same way the no-amount path does.
    pub fn burn(&self, token_id: &str, amount: Option<Decimal>) -> Result<(), ContractError> {
        let mut token = self.read_token(token_id)?;
        let amount = match amount {
            None => {
                info!("burning tokenId {} entirely", token_id);
                return self.delete_token(&token);
            }
            Some(amount) => amount,
        };
        if amount > token.balance {
            return Err(ContractError::Insufficient(format!(
                "The balance {} of tokenId {} is less than {}",
                token.balance, token_id, amount
            )));
        }
        token.balance -= amount;
        token.available_total_num = token.available_total_num.min(token.balance);
        debug!("burned {} from tokenId {}, balance now {}", amount, token_id, token.balance);
        if token.balance.is_zero() {
            self.delete_token(&token)
        } else {
            self.write_token(&token)
        }
    }

    /// Move `amount` from one token record to another.
    ///
    /// The receiver is created as a clone of the sender's slot and
    /// metadata when absent, and incremented when present. All checks
    /// complete before either record is written.
    pub fn split_transfer(&self, transfer: &SplitTransfer) -> Result<(), ContractError> {
        if transfer.to_token_id == transfer.from_token_id {
            return Err(ContractError::RequiredField(
                "to_token_id should not equal from_token_id".to_string(),
            ));
        }
        let mut sender = self.read_token(&transfer.from_token_id)?;
        if transfer.amount > sender.balance {
            return Err(ContractError::Insufficient(format!(
                "The balance {} of tokenId {} is less than {}",
                sender.balance, transfer.from_token_id, transfer.amount
            )));
        }
        sender.balance -= transfer.amount;
        sender.available_total_num = sender.available_total_num.min(sender.balance);

        let credited = if transfer.available_ratio > Decimal::ZERO {
            transfer.amount * transfer.available_ratio
        } else {
            transfer.amount
        };
        let receiver = match self.try_read_token(&transfer.to_token_id)? {
            Some(mut receiver) => {
                if receiver.owner != transfer.to_owner {
                    return Err(ContractError::Consistency(format!(
                        "The tokenId {} is owned by {}, not {}",
                        transfer.to_token_id, receiver.owner, transfer.to_owner
                    )));
                }
                receiver.balance += transfer.amount;
                receiver.total_balance += transfer.amount;
                receiver.available_total_num += credited;
                receiver
            }
            None => {
                let mut receiver = TicketToken::new(
                    transfer.to_token_id.clone(),
                    transfer.to_owner.clone(),
                    sender.slot.clone(),
                    transfer.amount,
                    sender.metadata.clone(),
                );
                receiver.available_total_num = credited;
                receiver
            }
        };

        if let Some(expected) = transfer.expected_available_total_num {
            if receiver.available_total_num != expected {
                warn!(
                    "split-transfer cross-check failed for tokenId {}: {} != {}",
                    transfer.to_token_id, receiver.available_total_num, expected
                );
                return Err(ContractError::Consistency(format!(
                    "Updated available_total_num {} does not match expected {}",
                    receiver.available_total_num.normalize(),
                    expected.normalize()
                )));
            }
        }

        debug!(
            "split {} from tokenId {} to tokenId {} ({})",
            transfer.amount, transfer.from_token_id, transfer.to_token_id, transfer.to_owner
        );
        self.write_token(&sender)?;
        self.write_token(&receiver)
    }

    /// Release installment periods for a batch of activation items.
    ///
    /// Items are staged on a write overlay and committed together, so a
    /// failing item leaves every token untouched.
    pub fn activate_tickets(&self, items: &[ActivationItem]) -> Result<(), ContractError> {
        let stage = Overlay::new(self.store);
        let staged = TokenLedger::new(&stage);
        for item in items {
            staged.apply_activation(item)?;
        }
        stage.commit()
    }

    fn apply_activation(&self, item: &ActivationItem) -> Result<(), ContractError> {
        if item.batch_id.is_empty() {
            return Err(ContractError::RequiredField(
                "batch_id should not be empty".to_string(),
            ));
        }
        if item.periods.is_empty() {
            return Err(ContractError::RequiredField(
                "periods should not be empty".to_string(),
            ));
        }
        if item.total_periods == 0 {
            return Err(ContractError::RequiredField(
                "total_periods should be greater than 0".to_string(),
            ));
        }

        let order: OrderRecord = read_json(self.store, &order_key(&item.order_id))?
            .ok_or_else(|| {
                ContractError::NotFound(format!("Order with id {} does not exist", item.order_id))
            })?;
        let batch = order.batch(&item.batch_id).ok_or_else(|| {
            ContractError::NotFound(format!(
                "Batch with id {} not found in order {}",
                item.batch_id, item.order_id
            ))
        })?;

        let mut decrement = Decimal::ZERO;
        for period in &item.periods {
            decrement += period_decrement(
                batch.quantity,
                batch.available_ratio,
                *period,
                item.total_periods,
            )?;
        }

        let mut token = self.read_token(&item.token_id)?;
        if decrement > token.balance {
            return Err(ContractError::Insufficient(format!(
                "The balance {} of tokenId {} is less than {}",
                token.balance, item.token_id, decrement
            )));
        }
        let updated = token.balance - decrement;
        if updated != item.available_total_num {
            warn!(
                "activation cross-check failed for tokenId {}: {} != {}",
                item.token_id, updated, item.available_total_num
            );
            return Err(ContractError::Consistency(format!(
                "Updated balance {} does not match available_total_num {}",
                updated.normalize(),
                item.available_total_num.normalize()
            )));
        }

        token.balance = updated;
        token.available_total_num = updated;
        info!(
            "activated periods {:?} of batch {} in order {}: tokenId {} balance now {}",
            item.periods, item.batch_id, item.order_id, item.token_id, updated
        );
        self.write_token(&token)
    }

    /// Token ids held by an owner, from the per-owner index
    pub fn tokens_of(&self, owner: &str) -> Result<Vec<String>, ContractError> {
        let list: Option<OwnerTokenList> = read_json(self.store, &owner_tokens_key(owner))?;
        Ok(list.map(|l| l.token_ids).unwrap_or_default())
    }

    /// Number of token records currently on the ledger
    pub fn total_supply(&self) -> Result<u64, ContractError> {
        let records = self.store.get_by_prefix(&category_prefix(TICKET))?;
        Ok(records.len() as u64)
    }
}

/// Decrement released by one installment period.
///
/// The committed pre-credit principal (`quantity * available_ratio`) is
/// spread evenly over `total_periods`; the final period absorbs the
/// rounding remainder so the periods always sum to the principal
/// exactly.
pub fn period_decrement(
    quantity: Decimal,
    available_ratio: Decimal,
    period: u32,
    total_periods: u32,
) -> Result<Decimal, ContractError> {
    if period == 0 || period > total_periods {
        return Err(ContractError::RequiredField(format!(
            "period {} should be between 1 and {}",
            period, total_periods
        )));
    }
    let principal = quantity * available_ratio;
    let base = (principal / Decimal::from(total_periods)).round_dp(8);
    if period == total_periods {
        Ok(principal - base * Decimal::from(total_periods - 1))
    } else {
        Ok(base)
    }
}
