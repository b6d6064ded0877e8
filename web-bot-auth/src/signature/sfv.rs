//! Structured Field Values (RFC 8941) over the [`sfv`] crate.
//!
//! `Signature-Input` and `Signature` are dictionaries; covered components are
//! string items with parameters. The helpers here map `sfv` errors into
//! [`SignerError::StructuredField`] and serialize a lone inner list, which
//! `sfv` only serializes as a list member.

use sfv::{List, Parser, SerializeValue};
pub use sfv::{BareItem, Dictionary, InnerList, Item, ListEntry, Parameters};

use crate::error::{Result, SignerError};

/// Parses a dictionary field value.
///
/// # Errors
///
/// Returns [`SignerError::StructuredField`] if `input` is not a valid dictionary.
pub fn parse_dictionary(input: &str) -> Result<Dictionary> {
    Parser::parse_dictionary(input.as_bytes())
        .map_err(|e| SignerError::StructuredField(format!("invalid dictionary {input:?}: {e}")))
}

/// Parses an item field value.
///
/// # Errors
///
/// Returns [`SignerError::StructuredField`] if `input` is not a valid item.
pub fn parse_item(input: &str) -> Result<Item> {
    Parser::parse_item(input.as_bytes())
        .map_err(|e| SignerError::StructuredField(format!("invalid item {input:?}: {e}")))
}

/// Serializes an item with its parameters.
///
/// # Errors
///
/// Returns [`SignerError::StructuredField`] for values RFC 8941 cannot carry
/// (non-printable strings, out-of-range integers, invalid keys).
pub fn serialize_item(item: &Item) -> Result<String> {
    item.serialize_value().map_err(|e| SignerError::StructuredField(e.to_owned()))
}

/// Serializes an inner list with its parameters, e.g. `("@authority");created=1`.
///
/// # Errors
///
/// Same as [`serialize_item`].
pub fn serialize_inner_list(list: &InnerList) -> Result<String> {
    let single: List = vec![ListEntry::InnerList(list.clone())];
    single.serialize_value().map_err(|e| SignerError::StructuredField(e.to_owned()))
}

/// Serializes a dictionary.
///
/// # Errors
///
/// Same as [`serialize_item`]; an empty dictionary is also rejected.
pub fn serialize_dictionary(dict: &Dictionary) -> Result<String> {
    dict.serialize_value().map_err(|e| SignerError::StructuredField(e.to_owned()))
}

/// String value of parameter `key`.
#[must_use]
pub fn string_param<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    match params.get(key) {
        Some(BareItem::String(value)) => Some(value),
        _ => None,
    }
}

/// Integer value of parameter `key`.
#[must_use]
pub fn integer_param(params: &Parameters, key: &str) -> Option<i64> {
    match params.get(key) {
        Some(BareItem::Integer(value)) => Some(*value),
        _ => None,
    }
}
