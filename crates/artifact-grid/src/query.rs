//! Search-string compilation and autocomplete.
//!
//! This module turns free-text search input into backend queries:
//! - Tokenization with an explicit end-of-input sentinel
//! - A priority-ordered predicate scan (date directives, free text)
//! - Disjunction/conjunction merging into a flat query set
//! - Autocomplete menu selection and completion merge helpers
//! - Snippet extraction for text-completion suggestions

mod autocomplete;
mod compiler;
mod date_range;
mod expression;
mod predicate;
mod snippet;
mod tokenizer;

pub use autocomplete::{complete_search, complete_token, select_menu, AutocompleteMenu};
pub use compiler::{
    predicates_from_tokens, queries_from_predicates, queries_from_search_string, CompiledSearch,
};
pub use date_range::{parse_date_directive, DateCondition, DATE_DIRECTIVES};
pub use expression::{ArtifactQuery, DateRangeQuery};
pub use predicate::{DateRangePredicate, FreeTextPredicate, Predicate, PredicateType};
pub use snippet::{extract_snippet, ELLIPSIS};
pub use tokenizer::{tokenize, Token};
