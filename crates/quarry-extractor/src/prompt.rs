//! Oracle prompts for block extraction, boundary merging and header location

use quarry_domain::{ContinuationState, ProductRecord, ProductVariant};

/// Label preceding the carried section context in a chunk payload
pub const SECTION_CONTEXT_LABEL: &str = "section_context_from_last_extracted_product_block_in_previous_chunk:";

/// Label preceding the carried open block in a chunk payload
pub const OPEN_BLOCK_LABEL: &str = "last_extracted_product_block_in_previous_chunk:";

/// Label preceding the rendered table in a chunk payload
pub const TABLE_LABEL: &str = "Markdown Table:";

/// Builds the system instructions and user payload for one chunk
pub struct PromptBuilder<'a> {
    table: &'a str,
    continuation: Option<&'a ContinuationState>,
    standalone: bool,
    custom_instructions: Option<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    /// Create a builder for a rendered table
    pub fn new(table: &'a str) -> Self {
        Self {
            table,
            continuation: None,
            standalone: false,
            custom_instructions: None,
        }
    }

    /// Carry state from the previous chunk
    ///
    /// Only applied when the state holds an open block or a section context.
    pub fn with_continuation(mut self, state: &'a ContinuationState) -> Self {
        self.continuation = Some(state);
        self
    }

    /// Extract without continuation, flagging rows that lack their block description
    pub fn standalone(mut self) -> Self {
        self.standalone = true;
        self
    }

    /// Append extra instructions to the system prompt
    pub fn with_custom_instructions(mut self, instructions: Option<&'a str>) -> Self {
        self.custom_instructions = instructions;
        self
    }

    /// System instructions for the call
    pub fn system(&self) -> String {
        let mut system = String::from(EXTRACTION_INSTRUCTIONS);

        if self.standalone {
            system.push_str("\n\n");
            system.push_str(STANDALONE_INSTRUCTIONS);
        } else {
            system.push_str("\n\n");
            system.push_str(CONTINUATION_INSTRUCTIONS);
        }

        system.push_str("\n\n");
        system.push_str(OUTPUT_FORMAT_REMINDER);

        if let Some(extra) = self.custom_instructions.filter(|s| !s.trim().is_empty()) {
            system.push_str("\n\nAdditional instructions:\n");
            system.push_str(extra.trim());
        }

        system
    }

    /// User payload for the call
    pub fn payload(&self) -> String {
        let mut payload = String::new();

        if let Some(state) = self.continuation.filter(|_| !self.standalone) {
            if !state.section_context.is_empty() {
                payload.push_str(SECTION_CONTEXT_LABEL);
                payload.push('\n');
                payload.push_str(&state.section_context);
                payload.push_str("\n\n");
            }
            if let Some(block) = &state.open_block {
                payload.push_str(OPEN_BLOCK_LABEL);
                payload.push('\n');
                payload.push_str(&to_json(block));
                payload.push_str("\n\n");
            }
        }

        payload.push_str(TABLE_LABEL);
        payload.push('\n');
        payload.push_str(self.table);
        payload
    }
}

/// User payload asking the oracle to complete boundary-only records
pub fn merge_payload(tail: &ProductRecord, boundary_only: &[ProductRecord]) -> String {
    let incomplete: Vec<&ProductVariant> = boundary_only.iter().map(|r| &r.variant).collect();
    format!(
        "last_entry_from_previous_chunk:\n{}\n\nincomplete_entries_from_current_chunk:\n{}",
        to_json(tail),
        to_json(&incomplete)
    )
}

/// User payload asking the oracle to find the header and context rows
pub fn header_payload(preview: &str) -> String {
    format!("First rows of the sheet:\n{}", preview)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You extract product line items from one chunk of a bill of quantities (BOQ) rendered as a Markdown table.

How a BOQ is laid out:
- Heading rows introduce sections (for example "B | SUPPLY ITEMS").
- A section holds one or more product blocks.
- A product block is a description row, optionally followed by variant rows that carry only a size, specification, quantity or unit.

Rules:
- Emit one variant per variant row. Combine the block's description with the row's own size, specification and quantity.
- When a description row is followed by variant rows, do not emit the description row on its own.
- When a description row has no variant rows in this chunk, emit it as a single variant.
- Keep blocks and variants in sheet order. Do not drop any block.
- If the header rows are given as Column 1, Column 2, ... infer which columns hold the unit and the quantity (usually the last two).

Variant fields:
- full_product_description: the complete description including the variant-specific part, copied as written.
- core_product_name: the main product name in lowercase, without sizes, specifications or qualifiers such as "full & reduced". Expand unambiguous acronyms.
- acronymed_core_product_name: the acronym form if the sheet uses one, else null.
- size: "key: value" pairs separated by commas, or null.
- feature_or_specifications: "key: value" pairs separated by commas, or null.
- quantity: the quantity as written, or null.
- unit: the unit of measure, or null."#;

const CONTINUATION_INSTRUCTIONS: &str = r#"Continuation from the previous chunk:
- If a section context from the previous chunk is given, it applies to every block until the chunk introduces a new heading.
- If the last product block of the previous chunk is given, treat it as the text immediately above this chunk.
- If the first rows of this chunk continue that block, your first block must be that block re-emitted with all of its earlier variants followed by the new ones, borrowing its description and section context.
- If this chunk does not continue that block, still emit it unchanged as your first block. Otherwise its variants are lost."#;

const STANDALONE_INSTRUCTIONS: &str = r#"This chunk is processed on its own:
- The first rows may be variant rows whose description lies in an earlier chunk.
- Emit each such row as a variant with is_only_product_specs_entry set to "Y" and copy only what the row itself contains.
- Set is_only_product_specs_entry to "N" for every other variant."#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format (a single JSON object, no additional text):
{
  "product_blocks": [
    {
      "section_context_for_this_product_block": "heading rows that apply to this block",
      "is_group": "Y or N",
      "list_of_product_variants": [
        {
          "full_product_description": "...",
          "core_product_name": "...",
          "acronymed_core_product_name": null,
          "size": "key: value, key: value",
          "feature_or_specifications": "key: value",
          "quantity": "...",
          "unit": "..."
        }
      ]
    }
  ]
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

/// System instructions for merging a chunk boundary
pub const MERGE_INSTRUCTIONS: &str = r#"You repair product entries that were split across two chunks of a bill of quantities.

You are given the last entry of the previous chunk and the entries at the start of the current chunk that are missing their product description, because the description lived in the previous chunk.

Rules:
- Complete each incomplete entry by borrowing the description, section context and any other missing fields from the last entry of the previous chunk.
- If the last entry of the previous chunk is itself only a description (no size or quantity of its own), it is absorbed into the completed entries and must not be emitted separately.
- Otherwise emit the last entry of the previous chunk unchanged, first, followed by the completed entries.
- Keep the order of the entries.

Output format (a single JSON object, no additional text):
{
  "products": [
    {
      "full_product_description": "...",
      "core_product_name": "...",
      "acronymed_core_product_name": null,
      "size": "key: value",
      "feature_or_specifications": "key: value",
      "quantity": "...",
      "unit": "..."
    }
  ]
}"#;

/// System instructions for locating the header block of a sheet
pub const HEADER_INSTRUCTIONS: &str = r#"You locate the table header of a bill of quantities sheet.

You are given the first rows of the sheet, one row per line, cells separated by " | ".

Return:
- context_rows: the rows above the header that describe the document (project name, bill title), copied exactly, one per line. Empty string if none.
- header_rows: the header row or rows (for example "Item | Description | Unit | Qty | Rate | Amount"), copied exactly, one per line. Empty string if the sheet has no header.

Output format (a single JSON object, no additional text):
{"context_rows": "...", "header_rows": "..."}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::ProductBlock;

    #[test]
    fn test_first_chunk_payload_has_no_continuation() {
        let state = ContinuationState::empty();
        let payload = PromptBuilder::new("Item | Description\n--- | ---")
            .with_continuation(&state)
            .payload();
        assert!(payload.starts_with(TABLE_LABEL));
        assert!(!payload.contains(OPEN_BLOCK_LABEL));
    }

    #[test]
    fn test_continuation_payload_labels_open_block() {
        let state = ContinuationState::carrying(ProductBlock {
            section_context: "Valves".to_string(),
            is_group: true,
            variants: vec![ProductVariant {
                full_product_description: "Ball valve, 15mm".to_string(),
                ..Default::default()
            }],
        });
        let payload = PromptBuilder::new("table").with_continuation(&state).payload();

        let context_at = payload.find(SECTION_CONTEXT_LABEL).unwrap();
        let block_at = payload.find(OPEN_BLOCK_LABEL).unwrap();
        let table_at = payload.find(TABLE_LABEL).unwrap();
        assert!(context_at < block_at && block_at < table_at);
        assert!(payload.contains("Ball valve, 15mm"));
    }

    #[test]
    fn test_standalone_ignores_continuation_and_asks_for_flags() {
        let state = ContinuationState::closed("Valves");
        let builder = PromptBuilder::new("table")
            .with_continuation(&state)
            .standalone();
        assert!(!builder.payload().contains(SECTION_CONTEXT_LABEL));
        assert!(builder.system().contains("is_only_product_specs_entry"));
    }

    #[test]
    fn test_custom_instructions_appended() {
        let system = PromptBuilder::new("table")
            .with_custom_instructions(Some("Quantities are in metres."))
            .system();
        assert!(system.ends_with("Quantities are in metres."));
        assert!(system.contains("product_blocks"));
    }

    #[test]
    fn test_merge_payload() {
        let tail = ProductRecord {
            section_context: "Pipework".to_string(),
            variant: ProductVariant {
                full_product_description: "uPVC pipe".to_string(),
                ..Default::default()
            },
        };
        let incomplete = vec![ProductRecord {
            variant: ProductVariant {
                full_product_description: "110mm".to_string(),
                boundary_only: true,
                ..Default::default()
            },
            ..Default::default()
        }];
        let payload = merge_payload(&tail, &incomplete);
        assert!(payload.contains("last_entry_from_previous_chunk"));
        assert!(payload.contains("uPVC pipe"));
        assert!(payload.contains("110mm"));
    }
}
