//! Predicate scan and disjunctive query generation.

use super::expression::ArtifactQuery;
use super::predicate::{Predicate, PREDICATE_PRIORITY};
use super::tokenizer::{tokenize, Token};

/// A search string after tokenizing, scanning and query generation.
#[derive(Debug, Clone)]
pub struct CompiledSearch {
    pub tokens: Vec<Token>,
    pub predicates: Vec<Predicate>,
    pub queries: Vec<ArtifactQuery>,
}

impl CompiledSearch {
    pub fn compile(input: &str) -> Self {
        let tokens = tokenize(input);
        let predicates = predicates_from_tokens(&tokens);
        let queries = queries_from_predicates(&predicates);
        Self {
            tokens,
            predicates,
            queries,
        }
    }

    pub fn free_text_fragments(&self) -> Vec<String> {
        self.predicates
            .iter()
            .filter_map(Predicate::fragment)
            .collect()
    }
}

pub fn queries_from_search_string(input: &str) -> Vec<ArtifactQuery> {
    CompiledSearch::compile(input).queries
}

/// Scans tokens with the priority-ordered predicate list.
///
/// An accepted token advances the cursor and resets priority to the top. A
/// rejection by a matched predicate finalizes it and re-offers the token to a
/// fresh top-priority predicate. Any other rejection falls through to the next
/// predicate type; a token no type accepts is dropped.
pub fn predicates_from_tokens(tokens: &[Token]) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    let mut priority = 0usize;
    let mut current = Predicate::fresh(PREDICATE_PRIORITY[0]);
    let mut cursor = 0usize;

    while let Some(token) = tokens.get(cursor) {
        if current.parse(token, cursor) {
            cursor += 1;
            priority = 0;
            continue;
        }

        if current.is_matched() {
            let finished = std::mem::replace(&mut current, Predicate::fresh(PREDICATE_PRIORITY[0]));
            predicates.push(finished);
            priority = 0;
            continue;
        }

        priority += 1;
        if priority >= PREDICATE_PRIORITY.len() {
            if let Some(word) = token.as_word() {
                tracing::debug!("dropping search token no predicate accepts: {word:?}");
            }
            cursor += 1;
            priority = 0;
        }
        current = Predicate::fresh(PREDICATE_PRIORITY[priority]);
    }

    predicates
}

/// Distributes the conjunction of predicates over their disjunctions.
pub fn queries_from_predicates(predicates: &[Predicate]) -> Vec<ArtifactQuery> {
    let mut accumulated = vec![ArtifactQuery::default()];
    for predicate in predicates {
        let disjuncts = predicate.make_queries();
        if disjuncts.is_empty() {
            continue;
        }
        accumulated = accumulated
            .iter()
            .flat_map(|partial| disjuncts.iter().map(move |disjunct| partial.merge(disjunct)))
            .collect();
    }
    accumulated
}
