//! # Validation Module
//!
//! Input validation for Caja POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI                                                            │
//! │  └── Immediate feedback (empty fields, number inputs)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: caja-pos services                                             │
//! │  └── THIS MODULE: amounts, reasons, names, RUT check digit             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── CHECK constraints (amount > 0, exactly one of ingress/egress)     │
//! │  ├── UNIQUE partial index (one open cash session per branch)           │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## RUT Check Digit (módulo 11)
//! ```text
//!   body    7  6  0  8  6  4  2  8
//!   weight  3  2  7  6  5  4  3  2      (2..=7 repeating from the right)
//!   sum     149           149 % 11 = 6       11 - 6 = 5  →  76.086.428-5
//!   11 → '0'    10 → 'K'
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::{MAX_AMOUNT, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted cash movement reason.
pub const MAX_REASON_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, category, branch, customer).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Returns
/// The trimmed name.
///
/// ## Example
/// ```rust
/// use caja_core::validation::validate_name;
///
/// assert_eq!(validate_name("name", "  Completo italiano ").unwrap(), "Completo italiano");
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(name.to_string())
}

/// Validates an identifier string (UUID v4).
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price. Zero is allowed (courtesy items), anything
/// above `MAX_AMOUNT` is not.
///
/// ## Example
/// ```rust
/// use caja_core::money::Money;
/// use caja_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_pesos(1_990)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_pesos(-1)).is_err());
/// assert!(validate_price(Money::from_pesos(i64::MAX)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.pesos() > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

// =============================================================================
// Till Validators
// =============================================================================

/// Opening float and counted cash may be zero but never negative.
pub fn validate_cash_count(field: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::invalid_amount(field, "must not be negative"));
    }
    if amount.pesos() > MAX_AMOUNT {
        return Err(CoreError::invalid_amount(field, "is too large"));
    }
    Ok(())
}

/// Manual movements must move a positive amount.
pub fn validate_movement_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::invalid_amount("amount", "must be greater than zero"));
    }
    if amount.pesos() > MAX_AMOUNT {
        return Err(CoreError::invalid_amount("amount", "is too large"));
    }
    Ok(())
}

/// Validates a movement reason and returns it trimmed.
///
/// ## User Workflow
/// ```text
/// Cashier takes 5.000 out for change
///      │
///      ▼
/// validate_reason("  cambio  ") → "cambio"
/// validate_reason("   ")        → INVALID_REASON
/// ```
pub fn validate_reason(reason: &str) -> CoreResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(CoreError::InvalidReason("reason is required".to_string()));
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(CoreError::InvalidReason(format!(
            "reason must be at most {} characters",
            MAX_REASON_LEN
        )));
    }

    Ok(reason.to_string())
}

// =============================================================================
// RUT Validators
// =============================================================================

/// Computes the módulo 11 check digit of a RUT body.
pub fn rut_check_digit(body: u32) -> char {
    let mut sum = 0u32;
    let mut weight = 2u32;
    let mut rest = body;

    while rest > 0 {
        sum += (rest % 10) * weight;
        rest /= 10;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        // 1..=9 fits in a single decimal digit
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

/// Parses a RUT in any common spelling into `(body, check_digit)`.
///
/// Accepts `76.086.428-5`, `76086428-5`, `760864285` and a lowercase `k`.
/// The check digit must match the body.
///
/// ## Example
/// ```rust
/// use caja_core::validation::parse_rut;
///
/// assert_eq!(parse_rut("76.086.428-5").unwrap(), (76_086_428, '5'));
/// assert_eq!(parse_rut("66666666-6").unwrap(), (66_666_666, '6'));
/// assert!(parse_rut("76.086.428-4").is_err());
/// ```
pub fn parse_rut(raw: &str) -> ValidationResult<(u32, char)> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "rut".to_string(),
        reason: reason.to_string(),
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() {
        return Err(ValidationError::Required {
            field: "rut".to_string(),
        });
    }
    if !cleaned.is_ascii() {
        return Err(invalid("only digits and K are allowed"));
    }
    if cleaned.len() < 2 || cleaned.len() > 9 {
        return Err(invalid("expected 7 or 8 digits plus check digit"));
    }

    let (body, dv) = cleaned.split_at(cleaned.len() - 1);
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("body must be numeric"));
    }
    let body: u32 = body.parse().map_err(|_| invalid("body must be numeric"))?;
    if body == 0 {
        return Err(invalid("body must be numeric"));
    }

    let dv = dv.chars().next().unwrap_or(' ');
    if !(dv.is_ascii_digit() || dv == 'K') {
        return Err(invalid("check digit must be 0-9 or K"));
    }
    if rut_check_digit(body) != dv {
        return Err(invalid("check digit does not match"));
    }

    Ok((body, dv))
}

// =============================================================================
// Unit Tests
// =============================================================================
