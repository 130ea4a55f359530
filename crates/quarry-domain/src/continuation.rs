//! Continuation state carried from one chunk to the next

use crate::product::ProductBlock;
use serde::{Deserialize, Serialize};

/// The minimal state a chunk hands to its successor
///
/// Passed by value into and out of each chunk step, never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuationState {
    /// Section context of the most recent block
    pub section_context: String,

    /// Trailing block of the previous chunk that may continue into this one
    pub open_block: Option<ProductBlock>,
}

impl ContinuationState {
    /// Empty state used for the first chunk of a sheet
    pub fn empty() -> Self {
        Self::default()
    }

    /// State that carries `block` forward as the open block
    pub fn carrying(block: ProductBlock) -> Self {
        Self {
            section_context: block.section_context.clone(),
            open_block: Some(block),
        }
    }

    /// State with a section context but nothing left open
    pub fn closed(section_context: impl Into<String>) -> Self {
        Self {
            section_context: section_context.into(),
            open_block: None,
        }
    }

    /// Whether a block is still open
    pub fn has_open_block(&self) -> bool {
        self.open_block.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrying_copies_section_context() {
        let block = ProductBlock {
            section_context: "Electrical".to_string(),
            ..Default::default()
        };
        let state = ContinuationState::carrying(block);
        assert_eq!(state.section_context, "Electrical");
        assert!(state.has_open_block());
    }

    #[test]
    fn test_empty_and_closed() {
        assert!(!ContinuationState::empty().has_open_block());
        let closed = ContinuationState::closed("Plumbing");
        assert_eq!(closed.section_context, "Plumbing");
        assert!(!closed.has_open_block());
    }
}
