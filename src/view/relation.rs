use std::sync::Arc;

use super::View;
use crate::config::{Cardinality, MatchStrategy};

/// A parent-child link between two views.
#[derive(Clone, Debug)]
pub struct Relation {
    pub name: String,
    /// Parent record field receiving the matched child rows.
    pub holder: String,
    pub cardinality: Cardinality,
    /// Parent-side join column.
    pub column: String,
    /// Child-side join column.
    pub of_column: String,
    pub include_column: bool,
    pub match_strategy: MatchStrategy,
    pub view: Arc<View>,
    pub(crate) holder_index: usize,
}

impl Relation {
    /// Position of the holder field in the parent's record type.
    pub fn holder_index(&self) -> usize {
        self.holder_index
    }

    pub fn is_parallel(&self) -> bool {
        self.match_strategy == MatchStrategy::ReadAll
    }
}
