//! Product blocks, variants and the flattened records persisted per chunk
//!
//! Oracle replies are loosely shaped, so the deserializers here accept the
//! field aliases and value forms the extraction prompts produce (flags as
//! `"Y"`/`"N"`, quantities as numbers, specifications as `"k: v, k: v"`).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A single key/value attribute of a variant (size or specification)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecPair {
    /// Attribute name, empty when the source gave a bare value
    pub key: String,
    /// Attribute value
    pub value: String,
}

impl SpecPair {
    /// Create a new pair
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One purchasable variant of a product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Full description including the inherited block-level description
    #[serde(default)]
    pub full_product_description: String,

    /// Normalized core product name
    #[serde(default)]
    pub core_product_name: String,

    /// Acronym form of the core name, if the sheet uses one
    #[serde(default, deserialize_with = "de_opt_text")]
    pub acronymed_core_product_name: Option<String>,

    /// Size attributes
    #[serde(default, deserialize_with = "de_spec_pairs")]
    pub size: Vec<SpecPair>,

    /// Feature and specification attributes
    #[serde(
        default,
        alias = "feature_or_specifications",
        deserialize_with = "de_spec_pairs"
    )]
    pub specifications: Vec<SpecPair>,

    /// Quantity as written in the sheet
    #[serde(default, deserialize_with = "de_opt_text")]
    pub quantity: Option<String>,

    /// Unit of measure
    #[serde(default, deserialize_with = "de_text")]
    pub unit: String,

    /// Set when the variant lacks its own block-level description because
    /// that description lived in the previous chunk
    #[serde(
        default,
        alias = "is_only_product_specs_entry",
        deserialize_with = "de_flag"
    )]
    pub boundary_only: bool,
}

/// A group of variants sharing a section context and block description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductBlock {
    /// Nearest preceding heading text
    #[serde(default, alias = "section_context_for_this_product_block")]
    pub section_context: String,

    /// Whether the block groups several variants under one description
    #[serde(default, deserialize_with = "de_flag")]
    pub is_group: bool,

    /// Variants in sheet order
    #[serde(default, alias = "list_of_product_variants")]
    pub variants: Vec<ProductVariant>,
}

impl ProductBlock {
    /// Flatten the block into variant-level records
    pub fn into_records(self) -> Vec<ProductRecord> {
        let section_context = self.section_context;
        self.variants
            .into_iter()
            .map(|variant| ProductRecord {
                section_context: section_context.clone(),
                variant,
            })
            .collect()
    }
}

/// Variant-level record as persisted in chunk artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Section context inherited from the owning block
    #[serde(default, alias = "section_context_for_this_product_block")]
    pub section_context: String,

    /// The variant itself
    #[serde(flatten)]
    pub variant: ProductVariant,
}

impl ProductRecord {
    /// Whether this record still needs its block context from a previous chunk
    pub fn is_boundary_only(&self) -> bool {
        self.variant.boundary_only
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Pairs(Vec<SpecPair>),
    Map(BTreeMap<String, Option<Scalar>>),
    Text(String),
}

fn is_placeholder(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "" | "null" | "none" | "n/a" | "na" | "-"
    )
}

fn parse_spec_text(text: &str) -> Vec<SpecPair> {
    if is_placeholder(text) {
        return Vec::new();
    }

    text.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| match piece.split_once(':') {
            Some((key, value)) => SpecPair::new(key.trim(), value.trim()),
            None => SpecPair::new("", piece),
        })
        .collect()
}

fn de_spec_pairs<'de, D>(deserializer: D) -> Result<Vec<SpecPair>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr: Option<SpecRepr> = Option::deserialize(deserializer)?;
    Ok(match repr {
        None => Vec::new(),
        Some(SpecRepr::Pairs(pairs)) => pairs,
        Some(SpecRepr::Map(map)) => map
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| SpecPair::new(key, v.into_text())))
            .collect(),
        Some(SpecRepr::Text(text)) => parse_spec_text(&text),
    })
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(scalar
        .map(Scalar::into_text)
        .filter(|text| !is_placeholder(text)))
}

fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_text(deserializer)?.unwrap_or_default())
}

fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(match scalar {
        None => false,
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Integer(n)) => n != 0,
        Some(Scalar::Float(f)) => f != 0.0,
        Some(Scalar::Text(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "y" | "yes" | "true" | "1"
        ),
    })
}
