//! Typed oracle replies
//!
//! Each call site gets its own reply type. A missing or malformed envelope
//! rejects the whole reply (surfacing as a parse failure); malformed items
//! inside a valid envelope are skipped with a warning.

use quarry_domain::{ProductBlock, ProductVariant};
use quarry_llm::OracleResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Reply to a block-extraction call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockExtraction {
    /// Blocks in sheet order
    pub blocks: Vec<ProductBlock>,
}

impl OracleResponse for BlockExtraction {
    fn from_json(value: Value) -> Result<Self, String> {
        let blocks = envelope_items(&value, "product_blocks")?;
        Ok(Self {
            blocks: parse_items(blocks, "product block"),
        })
    }
}

/// Reply to a boundary-merge call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReply {
    /// Completed variants
    pub products: Vec<ProductVariant>,
}

impl OracleResponse for MergeReply {
    fn from_json(value: Value) -> Result<Self, String> {
        let products = envelope_items(&value, "products")?;
        Ok(Self {
            products: parse_items(products, "merged product"),
        })
    }
}

/// Reply to a header-location call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderReply {
    /// Context rows above the header, one per line
    pub context_rows: String,
    /// Header rows, one per line
    pub header_rows: String,
}

impl OracleResponse for HeaderReply {
    fn from_json(value: Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "Expected a JSON object".to_string())?;

        if !object.contains_key("header_rows") {
            return Err("Missing 'header_rows'".to_string());
        }

        Ok(Self {
            context_rows: text_field(object.get("context_rows")),
            header_rows: text_field(object.get("header_rows")),
        })
    }
}

/// Get the array under `key` of a JSON object
fn envelope_items<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "Expected a JSON object".to_string())?;
    match object.get(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(format!("Missing '{}' array", key)),
        Some(_) => Err(format!("'{}' is not an array", key)),
    }
}

/// Deserialize each item, skipping the ones that do not fit
fn parse_items<T: DeserializeOwned>(items: &[Value], what: &str) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping {} {}: {}", what, idx, e);
                None
            }
        })
        .collect()
}

/// Read a field that should be text but may arrive as a list of lines
fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
