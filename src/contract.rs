//! Contract entrypoints.
//!
//! Each entrypoint parses its JSON-string arguments, performs org-admin
//! authorization where it mutates state, calls the ledger, and
//! translates any failure into the uniform error envelope. Successful
//! calls return the plain domain value, unwrapped. All mutations run on
//! a write overlay committed only after the whole call has succeeded.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{self, CallerIdentity};
use crate::credit::{
    self, parse_decimal, CreditInfoArgs, PaymentFlowArgs, TransferCreditArgs,
};
use crate::error::{ContractError, ErrorEnvelope};
use crate::key::{composite_key, derive_ticket_id, order_key, refund_key, CONTRACT_INFO};
use crate::ledger::{ActivationItem, SplitTransfer, TokenLedger};
use crate::records::{ContractInfo, OrderRecord, RefundRecord, TicketToken};
use crate::replay::{ensure_unused, mark_used, ReplayDomain};
use crate::schema::validate;
use crate::store::{read_json, write_json, Overlay, StateStore};
use crate::templates;

/// The semi-fungible ticket contract surface
#[derive(Debug, Default)]
pub struct TicketContract;

fn parse_json(field: &str, raw: &str) -> Result<Value, ContractError> {
    serde_json::from_str(raw)
        .map_err(|e| ContractError::Serialization(format!("invalid {} JSON: {}", field, e)))
}

fn non_empty(field: &str, value: &str) -> Result<(), ContractError> {
    if value.is_empty() {
        return Err(ContractError::RequiredField(format!(
            "{} should not be empty",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TimerUpdateItem {
    token_id: String,
    #[serde(rename = "TicketStatus")]
    ticket_status: i64,
}

#[derive(Debug, Deserialize)]
struct DistributionLine {
    from_token_id: String,
    to_token_id: String,
    to_owner: String,
    quantity: Decimal,
    available_ratio: Decimal,
    available_total_num: Decimal,
}

#[derive(Debug, Deserialize)]
struct DistributionPayload {
    distribution_id: String,
    order_id: String,
    lines: Vec<DistributionLine>,
}

impl TicketContract {
    pub fn new() -> Self {
        Self
    }

    fn info_key() -> String {
        composite_key(CONTRACT_INFO, &[])
    }

    fn info<S: StateStore + ?Sized>(&self, store: &S) -> Result<ContractInfo, ContractError> {
        read_json(store, &Self::info_key())?.ok_or(ContractError::NotInitialized)
    }

    /// Run a state-mutating entrypoint: initialization check, org-admin
    /// authorization, body on a write overlay, commit, envelope on any
    /// failure
    fn mutate<S, T, F>(
        &self,
        operation: &str,
        store: &S,
        caller: &CallerIdentity,
        body: F,
    ) -> Result<T, ErrorEnvelope>
    where
        S: StateStore + ?Sized,
        F: FnOnce(&Overlay<'_, S>) -> Result<T, ContractError>,
    {
        let run = || -> Result<T, ContractError> {
            self.info(store)?;
            auth::require_admin(store, caller)?;
            let txn = Overlay::new(store);
            let out = body(&txn)?;
            txn.commit()?;
            Ok(out)
        };
        run().map_err(|e| ErrorEnvelope::wrap(operation, e))
    }

    /// Run a read-only entrypoint: initialization check, body, envelope
    /// on any failure
    fn query<S, T, F>(&self, operation: &str, store: &S, body: F) -> Result<T, ErrorEnvelope>
    where
        S: StateStore + ?Sized,
        F: FnOnce(&S) -> Result<T, ContractError>,
    {
        let run = || -> Result<T, ContractError> {
            self.info(store)?;
            body(store)
        };
        run().map_err(|e| ErrorEnvelope::wrap(operation, e))
    }

    /// Write the contract metadata; every other entrypoint fails with
    /// code 4001 until this has run
    pub fn init<S: StateStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        symbol: &str,
        token_uri_base: &str,
    ) -> Result<bool, ErrorEnvelope> {
        let run = || -> Result<bool, ContractError> {
            if read_json::<ContractInfo, S>(store, &Self::info_key())?.is_some() {
                return Err(ContractError::AlreadyExists(
                    "The contract has already been initialized".to_string(),
                ));
            }
            non_empty("name", name)?;
            non_empty("symbol", symbol)?;
            write_json(
                store,
                &Self::info_key(),
                &ContractInfo {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    token_uri_base: token_uri_base.to_string(),
                },
            )?;
            Ok(true)
        };
        run().map_err(|e| ErrorEnvelope::wrap("Init", e))
    }

    pub fn mint<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        owner: &str,
        slot_json: &str,
        balance: &str,
        metadata_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("Mint", store, caller, |txn| {
            non_empty("tokenId", token_id)?;
            non_empty("owner", owner)?;
            let slot = parse_json("slot", slot_json)?;
            let balance = parse_decimal("balance", balance)?;
            let metadata = if metadata_json.is_empty() {
                Value::Null
            } else {
                parse_json("metadata", metadata_json)?
            };
            TokenLedger::new(txn).mint(token_id, owner, slot, balance, metadata)?;
            Ok(true)
        })
    }

    /// Burn a token outright, or `amount` of its balance when given
    pub fn burn<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        amount: Option<&str>,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("Burn", store, caller, |txn| {
            let amount = match amount {
                Some(raw) => Some(parse_decimal("amount", raw)?),
                None => None,
            };
            TokenLedger::new(txn).burn(token_id, amount)?;
            Ok(true)
        })
    }

    /// Insert or replace one distributor's price entry in the slot's
    /// `PriceInfo` list
    pub fn update_price_info<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        distributor_id: &str,
        price_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("UpdatePriceInfo", store, caller, |txn| {
            non_empty("distributorId", distributor_id)?;
            let price = parse_json("priceInfo", price_json)?;
            validate(&templates::price_detailed_info(), &price, "PriceDetailedInfo")?;

            let ledger = TokenLedger::new(txn);
            let mut token = ledger.read_token(token_id)?;
            let additional = token.additional_information_mut()?;
            let entries = additional
                .get_mut("PriceInfo")
                .and_then(Value::as_array_mut)
                .ok_or_else(|| {
                    ContractError::Serialization(
                        "slot does not contain a PriceInfo array".to_string(),
                    )
                })?;
            let existing = entries.iter().position(|entry| {
                entry.get("distributor_id").and_then(Value::as_str) == Some(distributor_id)
            });
            match existing {
                Some(index) => {
                    entries[index]
                        .as_object_mut()
                        .ok_or_else(|| {
                            ContractError::Serialization(
                                "PriceInfo entry is not an object".to_string(),
                            )
                        })?
                        .insert("PriceDetailedInfo".to_string(), price);
                }
                None => entries.push(serde_json::json!({
                    "distributor_id": distributor_id,
                    "PriceDetailedInfo": price,
                })),
            }
            ledger.write_token(&token)?;
            Ok(true)
        })
    }

    /// Append a gate-check record to the slot's `TicketData` list
    pub fn verify_ticket<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        check_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("VerifyTicket", store, caller, |txn| {
            let check = parse_json("checkData", check_json)?;
            validate(&templates::ticket_check_data(), &check, "TicketData")?;

            let ledger = TokenLedger::new(txn);
            let mut token = ledger.read_token(token_id)?;
            let additional = token.additional_information_mut()?;
            additional
                .get_mut("TicketData")
                .and_then(Value::as_array_mut)
                .ok_or_else(|| {
                    ContractError::Serialization(
                        "slot does not contain a TicketData array".to_string(),
                    )
                })?
                .push(check);
            ledger.write_token(&token)?;
            Ok(true)
        })
    }

    /// Replace the slot's `IssueInfo` sub-object
    pub fn update_issue_tickets<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        issue_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("UpdateIssueTickets", store, caller, |txn| {
            let issue = parse_json("issueTicket", issue_json)?;
            validate(&templates::issue_ticket(), &issue, "IssueInfo")?;

            let ledger = TokenLedger::new(txn);
            let mut token = ledger.read_token(token_id)?;
            token
                .additional_information_mut()?
                .insert("IssueInfo".to_string(), issue);
            ledger.write_token(&token)?;
            Ok(true)
        })
    }

    /// Sweep ticket statuses from the scheduler; returns the number of
    /// tokens updated
    pub fn timer_update_tickets<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        updates_json: &str,
        _timestamp: &str,
    ) -> Result<u64, ErrorEnvelope> {
        self.mutate("TimerUpdateTickets", store, caller, |txn| {
            let updates = parse_json("updates", updates_json)?;
            validate(&templates::timer_update(), &updates, "TimerUpdate")?;
            let items: Vec<TimerUpdateItem> = serde_json::from_value(updates)?;

            let ledger = TokenLedger::new(txn);
            let mut updated = 0u64;
            for item in &items {
                let mut token = ledger.read_token(&item.token_id)?;
                token
                    .additional_information_mut()?
                    .insert("TicketStatus".to_string(), Value::from(item.ticket_status));
                ledger.write_token(&token)?;
                updated += 1;
            }
            Ok(updated)
        })
    }

    /// Replace the whole `AdditionalInformation` zone of a token's slot
    pub fn update_ticket_info<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        token_id: &str,
        additional_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("UpdateTicketInfo", store, caller, |txn| {
            let additional = parse_json("additionalInformation", additional_json)?;
            validate(
                &templates::additional_information(),
                &additional,
                "AdditionalInformation",
            )?;

            let ledger = TokenLedger::new(txn);
            let mut token = ledger.read_token(token_id)?;
            token
                .slot
                .as_object_mut()
                .ok_or_else(|| {
                    ContractError::Serialization("slot is not an object".to_string())
                })?
                .insert(
                    crate::records::ADDITIONAL_INFORMATION.to_string(),
                    additional,
                );
            ledger.write_token(&token)?;
            Ok(true)
        })
    }

    pub fn read_ticket<S: StateStore + ?Sized>(
        &self,
        store: &S,
        token_id: &str,
    ) -> Result<TicketToken, ErrorEnvelope> {
        self.query("ReadTicket", store, |store| {
            TokenLedger::new(store).read_token(token_id)
        })
    }

    /// Derive the deterministic ticket id a mint for these seeds would
    /// use
    pub fn create_ticket_id(
        &self,
        owner: &str,
        scenic_id: &str,
        timestamp: &str,
    ) -> Result<String, ErrorEnvelope> {
        let run = || -> Result<String, ContractError> {
            non_empty("owner", owner)?;
            non_empty("scenicId", scenic_id)?;
            non_empty("timestamp", timestamp)?;
            Ok(derive_ticket_id(&[
                owner.as_bytes(),
                scenic_id.as_bytes(),
                timestamp.as_bytes(),
            ]))
        };
        run().map_err(|e| ErrorEnvelope::wrap("CreateTicketId", e))
    }

    /// Settle an off-chain order onto the ledger, exactly once per
    /// order id
    pub fn store_order<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        order_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("StoreOrder", store, caller, |txn| {
            let payload = parse_json("order", order_json)?;
            validate(&templates::order(), &payload, "Order")?;
            let order: OrderRecord = serde_json::from_value(payload)?;

            ensure_unused(txn, ReplayDomain::Order, &order.order_id)?;
            write_json(txn, &order_key(&order.order_id), &order)?;
            mark_used(txn, ReplayDomain::Order, &order.order_id, timestamp)?;
            Ok(true)
        })
    }

    /// Settle an off-chain refund onto the ledger, exactly once per
    /// refund id
    pub fn store_refund<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        refund_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("StoreRefund", store, caller, |txn| {
            let payload = parse_json("refund", refund_json)?;
            validate(&templates::refund(), &payload, "Refund")?;
            let refund: RefundRecord = serde_json::from_value(payload)?;

            ensure_unused(txn, ReplayDomain::Order, &refund.refund_id)?;
            read_json::<OrderRecord, _>(txn, &order_key(&refund.order_id))?.ok_or_else(|| {
                ContractError::NotFound(format!(
                    "Order with id {} does not exist",
                    refund.order_id
                ))
            })?;
            write_json(txn, &refund_key(&refund.refund_id), &refund)?;
            mark_used(txn, ReplayDomain::Order, &refund.refund_id, timestamp)?;
            Ok(true)
        })
    }

    fn distribute<S: StateStore + ?Sized>(
        &self,
        operation: &'static str,
        store: &S,
        caller: &CallerIdentity,
        distribution_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate(operation, store, caller, |txn| {
            let payload = parse_json("distribution", distribution_json)?;
            validate(&templates::distribution(), &payload, "Distribution")?;
            let distribution: DistributionPayload = serde_json::from_value(payload)?;

            ensure_unused(txn, ReplayDomain::Order, &distribution.distribution_id)?;
            read_json::<OrderRecord, _>(txn, &order_key(&distribution.order_id))?.ok_or_else(
                || {
                    ContractError::NotFound(format!(
                        "Order with id {} does not exist",
                        distribution.order_id
                    ))
                },
            )?;

            let ledger = TokenLedger::new(txn);
            for line in &distribution.lines {
                ledger.split_transfer(&SplitTransfer {
                    from_token_id: line.from_token_id.clone(),
                    to_token_id: line.to_token_id.clone(),
                    to_owner: line.to_owner.clone(),
                    amount: line.quantity,
                    available_ratio: line.available_ratio,
                    expected_available_total_num: Some(line.available_total_num),
                })?;
            }
            mark_used(
                txn,
                ReplayDomain::Order,
                &distribution.distribution_id,
                timestamp,
            )?;
            Ok(true)
        })
    }

    /// Split-transfer ticket quantities down the distribution chain for
    /// a settled order
    pub fn distribution_order<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        distribution_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.distribute("DistributionOrder", store, caller, distribution_json, timestamp)
    }

    /// Split-transfer ticket quantities back up the chain for a refund
    pub fn distribution_refund<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        distribution_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.distribute("DistributionRefund", store, caller, distribution_json, timestamp)
    }

    /// Release installment periods for pre-credit order batches
    pub fn activate_tickets<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        items_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("ActivateTickets", store, caller, |txn| {
            let items: Vec<ActivationItem> = serde_json::from_str(items_json)
                .map_err(|e| {
                    ContractError::Serialization(format!("invalid activation JSON: {}", e))
                })?;
            TokenLedger::new(txn).activate_tickets(&items)?;
            Ok(true)
        })
    }

    pub fn read_order<S: StateStore + ?Sized>(
        &self,
        store: &S,
        order_id: &str,
    ) -> Result<OrderRecord, ErrorEnvelope> {
        self.query("ReadOrder", store, |store| {
            read_json(store, &order_key(order_id))?.ok_or_else(|| {
                ContractError::NotFound(format!("Order with id {} does not exist", order_id))
            })
        })
    }

    /// Register the admin list of an organization.
    ///
    /// A registered organization can only be changed by one of its
    /// current admins; an unregistered one can be claimed freely, which
    /// bootstraps the very first organization after `init`.
    pub fn set_org_admin<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        org_id: &str,
        admins_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        let run = || -> Result<bool, ContractError> {
            self.info(store)?;
            non_empty("orgId", org_id)?;
            let admins: Vec<String> = serde_json::from_str(admins_json)
                .map_err(|e| ContractError::Serialization(format!("invalid admins JSON: {}", e)))?;
            if auth::org_registered(store, org_id)? {
                let current = auth::org_admins(store, org_id)?;
                if !current.iter().any(|admin| admin == &caller.subject_id) {
                    return Err(ContractError::Unauthorized(format!(
                        "The admin {} is not authorized in organization {}",
                        caller.subject_id, org_id
                    )));
                }
            }
            auth::set_org_admins(store, org_id, admins)?;
            Ok(true)
        };
        run().map_err(|e| ErrorEnvelope::wrap("SetOrgAdmin", e))
    }

    pub fn get_org_admins<S: StateStore + ?Sized>(
        &self,
        store: &S,
        org_id: &str,
    ) -> Result<Vec<String>, ErrorEnvelope> {
        self.query("GetOrgAdmins", store, |store| auth::org_admins(store, org_id))
    }

    /// Add, modify, or activate a merchant credit line
    pub fn store_credit_info<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        args_json: &str,
        _timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("StoreCreditInfo", store, caller, |txn| {
            let args: CreditInfoArgs = serde_json::from_str(args_json)
                .map_err(|e| ContractError::Serialization(format!("invalid credit JSON: {}", e)))?;
            credit::store_credit_info(txn, &args)?;
            Ok(true)
        })
    }

    /// Move credit between merchant credit lines, exactly once per
    /// trade number
    pub fn transfer_credit<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        args_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("TransferCredit", store, caller, |txn| {
            let args: TransferCreditArgs = serde_json::from_str(args_json).map_err(|e| {
                ContractError::Serialization(format!("invalid transfer JSON: {}", e))
            })?;
            credit::transfer_credit(txn, caller, &args, timestamp)?;
            Ok(true)
        })
    }

    /// Record a payment flow row, exactly once per transaction id
    pub fn payment_flow<S: StateStore + ?Sized>(
        &self,
        store: &S,
        caller: &CallerIdentity,
        args_json: &str,
        timestamp: &str,
    ) -> Result<bool, ErrorEnvelope> {
        self.mutate("PaymentFlow", store, caller, |txn| {
            let args: PaymentFlowArgs = serde_json::from_str(args_json).map_err(|e| {
                ContractError::Serialization(format!("invalid payment JSON: {}", e))
            })?;
            credit::payment_flow(txn, &args, timestamp)?;
            Ok(true)
        })
    }

    pub fn balance_of_value<S: StateStore + ?Sized>(
        &self,
        store: &S,
        token_id: &str,
    ) -> Result<Decimal, ErrorEnvelope> {
        self.query("BalanceOfValue", store, |store| {
            Ok(TokenLedger::new(store).read_token(token_id)?.balance)
        })
    }

    pub fn owner_of<S: StateStore + ?Sized>(
        &self,
        store: &S,
        token_id: &str,
    ) -> Result<String, ErrorEnvelope> {
        self.query("OwnerOf", store, |store| {
            Ok(TokenLedger::new(store).read_token(token_id)?.owner)
        })
    }

    pub fn slot_of<S: StateStore + ?Sized>(
        &self,
        store: &S,
        token_id: &str,
    ) -> Result<Value, ErrorEnvelope> {
        self.query("SlotOf", store, |store| {
            Ok(TokenLedger::new(store).read_token(token_id)?.slot)
        })
    }

    pub fn name<S: StateStore + ?Sized>(&self, store: &S) -> Result<String, ErrorEnvelope> {
        self.query("Name", store, |store| Ok(self.info(store)?.name))
    }

    pub fn symbol<S: StateStore + ?Sized>(&self, store: &S) -> Result<String, ErrorEnvelope> {
        self.query("Symbol", store, |store| Ok(self.info(store)?.symbol))
    }

    pub fn total_supply<S: StateStore + ?Sized>(&self, store: &S) -> Result<u64, ErrorEnvelope> {
        self.query("TotalSupply", store, |store| {
            TokenLedger::new(store).total_supply()
        })
    }

    /// Token URI: the token's own `token_uri` metadata when present,
    /// otherwise the contract base joined with the token id
    pub fn token_uri<S: StateStore + ?Sized>(
        &self,
        store: &S,
        token_id: &str,
    ) -> Result<String, ErrorEnvelope> {
        self.query("TokenURI", store, |store| {
            let token = TokenLedger::new(store).read_token(token_id)?;
            if let Some(uri) = token.metadata.get("token_uri").and_then(Value::as_str) {
                return Ok(uri.to_string());
            }
            let info = self.info(store)?;
            Ok(format!("{}{}", info.token_uri_base, token_id))
        })
    }
}
