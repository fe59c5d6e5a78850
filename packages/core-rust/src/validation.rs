//! Input validation for operators and tasks.

use crate::error::ValidationError;
use crate::types::{OperatorInfo, Task};

/// Number of bytes in a chain address.
pub const ADDRESS_LEN: usize = 20;

/// Normalizes an address to its canonical form: `0x` + 40 lowercase hex digits.
///
/// Accepts mixed case and a missing or upper-case `0X` prefix.
///
/// # Errors
///
/// Returns [`ValidationError::Address`] if the input is not 20 hex-encoded bytes.
pub fn canonical_address(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let invalid = |reason| ValidationError::Address {
        address: raw.to_string(),
        reason,
    };

    if digits.len() != ADDRESS_LEN * 2 {
        return Err(invalid("expected 40 hex digits"));
    }
    let bytes = hex::decode(digits).map_err(|_| invalid("not hex"))?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Returns `Ok` only if `address` is already canonical.
///
/// # Errors
///
/// Returns [`ValidationError::Address`] for malformed or non-canonical input.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    let canonical = canonical_address(address)?;
    if canonical != address {
        return Err(ValidationError::Address {
            address: address.to_string(),
            reason: "not canonical (expected lowercase 0x-prefixed)",
        });
    }
    Ok(())
}

/// Checks that `endpoint` is non-empty and contains no whitespace.
///
/// # Errors
///
/// Returns [`ValidationError::Endpoint`] otherwise.
pub fn validate_endpoint(address: &str, endpoint: &str) -> Result<(), ValidationError> {
    if endpoint.is_empty() || endpoint.chars().any(char::is_whitespace) {
        return Err(ValidationError::Endpoint {
            address: address.to_string(),
            endpoint: endpoint.to_string(),
        });
    }
    Ok(())
}

/// Validates an operator record before it is persisted.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_operator(info: &OperatorInfo) -> Result<(), ValidationError> {
    validate_address(&info.address)?;
    validate_endpoint(&info.address, &info.endpoint)?;

    if info.last_seen_ms == 0 {
        return Err(ValidationError::MissingTimestamp {
            address: info.address.clone(),
        });
    }

    Ok(())
}

/// Validates a task before it is broadcast.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTaskId`] if the id is blank.
pub fn validate_task(task: &Task) -> Result<(), ValidationError> {
    if task.id.trim().is_empty() {
        return Err(ValidationError::EmptyTaskId);
    }
    Ok(())
}
