// File selection: predicates, search terms and sort order

pub mod custom_selection;
pub mod detection;
pub mod predicate;
pub mod search_term;
pub mod sort;

#[cfg(test)]
mod tests;

pub use custom_selection::{CustomSelection, FileSelection, LogicalOperator};
pub use detection::{DetectionSelections, RecognitionType};
pub use predicate::{Expr, Predicate};
pub use search_term::{Operator, SearchTerm};
pub use sort::{SortTerm, SortTerms};
