//! JSON field helpers for the per-museum mappers.

use serde_json::Value;

use super::{MappingError, RawArtwork};

/// Non-blank string at `pointer`; numbers are rendered as text.
pub(crate) fn text(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn text_or(value: &Value, pointer: &str, default: &str) -> String {
    text(value, pointer).unwrap_or_else(|| default.to_string())
}

pub(crate) fn flag(value: &Value, pointer: &str) -> bool {
    value
        .pointer(pointer)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// The payload's top-level `field` id, which must agree with the identifier
/// it was fetched for.
pub(crate) fn checked_id(raw: &RawArtwork, field: &'static str) -> Result<String, MappingError> {
    let id = text(&raw.payload, &format!("/{}", field)).ok_or(MappingError::MissingField(field))?;
    if id != raw.identifier.native_id {
        return Err(MappingError::InvalidField {
            field,
            message: format!(
                "payload id {} does not match requested {}",
                id, raw.identifier
            ),
        });
    }
    Ok(id)
}
