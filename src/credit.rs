//! Credit line and payment flows.
//!
//! Credit records are keyed by merchant id. A `StoreCreditInfo` call
//! does not name its operation; the ledger selects add, modify, or
//! activate from which fields the payload carries and whether the
//! record already exists. Transfers are authorized by record ownership
//! (distinct from org-admin authorization) and guarded against
//! redelivery by `tradeNo`.

use log::{debug, info};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::CallerIdentity;
use crate::error::ContractError;
use crate::key::{credit_key, payment_key};
use crate::records::{CreditRecord, PaymentRecord};
use crate::replay::{ensure_unused, mark_used, ReplayDomain};
use crate::store::{read_json, write_json, StateStore};

/// Arguments of a `StoreCreditInfo` call.
///
/// The off-chain system sends quantities as decimal strings; an empty
/// string counts as absent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditInfoArgs {
    #[serde(rename = "merchantId")]
    pub merchant_id: String,
    #[serde(rename = "ownerId", default)]
    pub owner_id: String,
    #[serde(rename = "creditLimit", default)]
    pub credit_limit: String,
    #[serde(rename = "pledgeAmount", default)]
    pub pledge_amount: String,
}

/// Arguments of a `TransferCredit` call
#[derive(Debug, Clone, Deserialize)]
pub struct TransferCreditArgs {
    pub from: String,
    pub to: String,
    #[serde(rename = "tradeNo")]
    pub trade_no: String,
    pub amount: String,
}

/// Arguments of a `PaymentFlow` call
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFlowArgs {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(rename = "payerId")]
    pub payer_id: String,
    #[serde(rename = "payeeId")]
    pub payee_id: String,
    pub amount: String,
    #[serde(rename = "payTime")]
    pub pay_time: String,
}

/// Parse a decimal string field, rejecting empty and malformed values
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, ContractError> {
    if raw.is_empty() {
        return Err(ContractError::RequiredField(format!(
            "{} should not be empty",
            field
        )));
    }
    raw.parse::<Decimal>().map_err(|_| {
        ContractError::RequiredField(format!("{} should be a number, got {}", field, raw))
    })
}

/// Add, modify, or activate a merchant credit line.
///
/// Absent record: an add, requiring `ownerId` and a non-empty
/// `creditLimit`. Existing record with a non-empty `pledgeAmount`: an
/// activation. Existing record otherwise: a limit modification,
/// requiring a non-empty `creditLimit`.
pub fn store_credit_info<S: StateStore + ?Sized>(
    store: &S,
    args: &CreditInfoArgs,
) -> Result<(), ContractError> {
    if args.merchant_id.is_empty() {
        return Err(ContractError::RequiredField(
            "merchantId should not be empty".to_string(),
        ));
    }
    let key = credit_key(&args.merchant_id);
    let existing: Option<CreditRecord> = read_json(store, &key)?;

    let record = match existing {
        None => {
            if args.owner_id.is_empty() {
                return Err(ContractError::RequiredField(
                    "ownerId should not be empty".to_string(),
                ));
            }
            let credit_limit = parse_decimal("creditLimit", &args.credit_limit)?;
            info!("adding credit record for merchant {}", args.merchant_id);
            CreditRecord {
                merchant_id: args.merchant_id.clone(),
                owner: args.owner_id.clone(),
                credit_limit,
                pledge_amount: Decimal::ZERO,
                activated: false,
            }
        }
        Some(mut record) => {
            if !args.pledge_amount.is_empty() {
                record.pledge_amount = parse_decimal("pledgeAmount", &args.pledge_amount)?;
                record.activated = true;
                info!("activating credit record for merchant {}", args.merchant_id);
            } else {
                record.credit_limit = parse_decimal("creditLimit", &args.credit_limit)?;
                debug!("modifying credit limit for merchant {}", args.merchant_id);
            }
            record
        }
    };
    write_json(store, &key, &record)
}

/// Read a merchant credit record, failing NotFound when absent
pub fn read_credit<S: StateStore + ?Sized>(
    store: &S,
    merchant_id: &str,
) -> Result<CreditRecord, ContractError> {
    read_json(store, &credit_key(merchant_id))?.ok_or_else(|| {
        ContractError::NotFound(format!(
            "The merchant {} does not have a credit record",
            merchant_id
        ))
    })
}

/// Move credit between merchant credit lines.
///
/// The caller's subject id must be the on-ledger owner of the sender's
/// record; `tradeNo` is guarded against redelivery; the receiver record
/// is created when absent.
pub fn transfer_credit<S: StateStore + ?Sized>(
    store: &S,
    caller: &CallerIdentity,
    args: &TransferCreditArgs,
    processed_at: &str,
) -> Result<(), ContractError> {
    if args.trade_no.is_empty() {
        return Err(ContractError::RequiredField(
            "tradeNo should not be empty".to_string(),
        ));
    }
    ensure_unused(store, ReplayDomain::Trade, &args.trade_no)?;

    let mut sender = read_credit(store, &args.from)?;
    if sender.owner != caller.subject_id {
        return Err(ContractError::Unauthorized(format!(
            "The caller {} is not the owner of the credit record {}",
            caller.subject_id, args.from
        )));
    }
    let amount = parse_decimal("amount", &args.amount)?;
    if amount > sender.credit_limit {
        return Err(ContractError::Insufficient(format!(
            "The credit limit {} of merchant {} is less than {}",
            sender.credit_limit, args.from, amount
        )));
    }
    sender.credit_limit -= amount;

    let receiver = match read_json::<CreditRecord, S>(store, &credit_key(&args.to))? {
        Some(mut receiver) => {
            receiver.credit_limit += amount;
            receiver
        }
        None => CreditRecord {
            merchant_id: args.to.clone(),
            owner: args.to.clone(),
            credit_limit: amount,
            pledge_amount: Decimal::ZERO,
            activated: false,
        },
    };

    info!(
        "transferring credit {} from merchant {} to merchant {}",
        amount, args.from, args.to
    );
    write_json(store, &credit_key(&args.from), &sender)?;
    write_json(store, &credit_key(&args.to), &receiver)?;
    mark_used(store, ReplayDomain::Trade, &args.trade_no, processed_at)
}

/// Record an externally-identified payment flow row.
///
/// Guarded against redelivery by the transaction id.
pub fn payment_flow<S: StateStore + ?Sized>(
    store: &S,
    args: &PaymentFlowArgs,
    processed_at: &str,
) -> Result<(), ContractError> {
    if args.transaction_id.is_empty() {
        return Err(ContractError::RequiredField(
            "transactionId should not be empty".to_string(),
        ));
    }
    ensure_unused(store, ReplayDomain::Transaction, &args.transaction_id)?;
    let amount = parse_decimal("amount", &args.amount)?;

    let record = PaymentRecord {
        transaction_id: args.transaction_id.clone(),
        payer_id: args.payer_id.clone(),
        payee_id: args.payee_id.clone(),
        amount,
        pay_time: args.pay_time.clone(),
    };
    debug!("recording payment flow {}", args.transaction_id);
    write_json(store, &payment_key(&args.transaction_id), &record)?;
    mark_used(
        store,
        ReplayDomain::Transaction,
        &args.transaction_id,
        processed_at,
    )
}
