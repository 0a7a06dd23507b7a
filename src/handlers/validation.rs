//! Request validation
//!
//! Structural checks run before anything reaches the ledger. Payload fields
//! are kept as raw JSON so that a wrong type is reported as a field error
//! instead of a deserialization failure. Fields are checked in a fixed order
//! and the first failure is returned.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::domain::{Amount, AmountError, Balance, TransactionMeta, TransactionType, ValidationError};

use super::{CreateTransactionCommand, OpenAccountCommand, TransferCommand};

// =========================================================================
// Payloads
// =========================================================================

/// Body of `POST /transactions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayload {
    #[serde(default, alias = "nom")]
    pub nom_transaction: Option<Value>,
    #[serde(default, alias = "description")]
    pub description_transaction: Option<Value>,
    #[serde(default, alias = "date")]
    pub date_transaction: Option<Value>,
    #[serde(default, alias = "type")]
    pub type_transaction: Option<Value>,
    #[serde(default)]
    pub compte_id: Option<Value>,
    #[serde(default, alias = "montant")]
    pub montant_transaction: Option<Value>,
}

/// Body of `POST /transferts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferPayload {
    #[serde(default)]
    pub compte_id: Option<Value>,
    #[serde(default)]
    pub compte_id_destinataire: Option<Value>,
    #[serde(default, alias = "montant")]
    pub montant_transfert: Option<Value>,
}

/// Body of `POST /comptes`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAccountPayload {
    #[serde(default)]
    pub client_id: Option<Value>,
    #[serde(default)]
    pub nom_compte: Option<Value>,
    #[serde(default)]
    pub description_compte: Option<Value>,
    #[serde(default)]
    pub solde_compte: Option<Value>,
}

// =========================================================================
// Validators
// =========================================================================

/// Validate a deposit/withdrawal request
pub fn validate_transaction(payload: &TransactionPayload) -> Result<CreateTransactionCommand, ValidationError> {
    let name = required_string(payload.nom_transaction.as_ref(), "nom_transaction")?;
    let description = required_string(
        payload.description_transaction.as_ref(),
        "description_transaction",
    )?;
    let date = date(payload.date_transaction.as_ref(), "date_transaction")?;
    let kind = transaction_type(payload.type_transaction.as_ref(), "type_transaction")?;
    let account_id = id(payload.compte_id.as_ref(), "compte_id")?;
    let amount = amount(payload.montant_transaction.as_ref(), "montant_transaction")?;

    Ok(CreateTransactionCommand::new(
        TransactionMeta::new(name, description, date),
        kind,
        account_id,
        amount,
    ))
}

/// Validate a transfer request
pub fn validate_transfer(payload: &TransferPayload) -> Result<TransferCommand, ValidationError> {
    let source = id(payload.compte_id.as_ref(), "compte_id")?;
    let destination = id(
        payload.compte_id_destinataire.as_ref(),
        "compte_id_destinataire",
    )?;
    let amount = amount(payload.montant_transfert.as_ref(), "montant_transfert")?;

    Ok(TransferCommand::new(source, destination, amount))
}

/// Validate an account-opening request. Description and opening balance
/// are optional; the balance defaults to zero.
pub fn validate_open_account(payload: &OpenAccountPayload) -> Result<OpenAccountCommand, ValidationError> {
    let client_id = id(payload.client_id.as_ref(), "client_id")?;
    let name = required_string(payload.nom_compte.as_ref(), "nom_compte")?;
    let description = optional_string(payload.description_compte.as_ref(), "description_compte")?;

    let mut command = OpenAccountCommand::new(client_id, name);
    if let Some(description) = description {
        command = command.with_description(description);
    }
    if present(payload.solde_compte.as_ref()).is_some() {
        let value = decimal(payload.solde_compte.as_ref(), "solde_compte")?;
        let balance = Balance::new(value).map_err(|e| amount_error(e, "solde_compte"))?;
        command = command.with_opening_balance(balance);
    }

    Ok(command)
}

// =========================================================================
// Field rules
// =========================================================================

/// Treat JSON null and blank strings as absent
fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    }
}

fn required_string(value: Option<&Value>, field: &'static str) -> Result<String, ValidationError> {
    optional_string(value, field)?.ok_or(ValidationError::Required(field))
}

fn optional_string(value: Option<&Value>, field: &'static str) -> Result<Option<String>, ValidationError> {
    match present(value) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ValidationError::NotAString(field)),
    }
}

fn date(value: Option<&Value>, field: &'static str) -> Result<NaiveDate, ValidationError> {
    let raw = match present(value) {
        None => return Err(ValidationError::Required(field)),
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(ValidationError::InvalidDate(field)),
    };
    parse_date(raw).ok_or(ValidationError::InvalidDate(field))
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its date
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn transaction_type(value: Option<&Value>, field: &'static str) -> Result<TransactionType, ValidationError> {
    match present(value) {
        None => Err(ValidationError::Required(field)),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidChoice(field)),
        Some(_) => Err(ValidationError::InvalidChoice(field)),
    }
}

fn id(value: Option<&Value>, field: &'static str) -> Result<i64, ValidationError> {
    let parsed = match present(value) {
        None => return Err(ValidationError::Required(field)),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        Some(_) => None,
    };

    match parsed {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::NotAnId(field)),
    }
}

fn decimal(value: Option<&Value>, field: &'static str) -> Result<Decimal, ValidationError> {
    let raw = match present(value) {
        None => return Err(ValidationError::Required(field)),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(ValidationError::NotNumeric(field)),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| {
            if !is_numeric_literal(&raw) {
                return ValidationError::NotNumeric(field);
            }
            // well-formed but out of range for a decimal
            if raw.starts_with('-') {
                ValidationError::Negative(field)
            } else {
                ValidationError::TooLarge(field)
            }
        })
}

/// Digits with an optional sign, fraction and exponent
fn is_numeric_literal(raw: &str) -> bool {
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let sign = |c: char| c == '-' || c == '+';

    let unsigned = raw.strip_prefix(sign).unwrap_or(raw);
    let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let exponent_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(sign).unwrap_or(e);
        !e.is_empty() && digits(e)
    });

    !(int.is_empty() && frac.is_empty()) && digits(int) && digits(frac) && exponent_ok
}

fn amount(value: Option<&Value>, field: &'static str) -> Result<Amount, ValidationError> {
    let value = decimal(value, field)?;
    Amount::new(value).map_err(|e| amount_error(e, field))
}

fn amount_error(error: AmountError, field: &'static str) -> ValidationError {
    match error {
        AmountError::Negative(_) => ValidationError::Negative(field),
        AmountError::TooManyDecimals(_) => ValidationError::TooPrecise(field),
        AmountError::Overflow => ValidationError::TooLarge(field),
        AmountError::ParseError(_) => ValidationError::NotNumeric(field),
    }
}
