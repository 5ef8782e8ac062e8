//! Search predicates produced while scanning tokens.

use std::ops::Range;

use chrono::NaiveDate;

use super::date_range::{parse_date_directive, DateCondition};
use super::expression::ArtifactQuery;
use super::tokenizer::Token;

/// Predicate kinds in scan priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateType {
    DateRange,
    FreeText,
}

pub const PREDICATE_PRIORITY: [PredicateType; 2] =
    [PredicateType::DateRange, PredicateType::FreeText];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    DateRange(DateRangePredicate),
    FreeText(FreeTextPredicate),
}

/// A single `before:`/`after:`/`on:`/`date:` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRangePredicate {
    value: Option<(DateCondition, NaiveDate)>,
    position: Option<usize>,
}

/// A run of plain words, joined by single spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeTextPredicate {
    words: Vec<String>,
    start: Option<usize>,
    terminated: bool,
}

impl Predicate {
    pub fn fresh(kind: PredicateType) -> Self {
        match kind {
            PredicateType::DateRange => Self::DateRange(DateRangePredicate::default()),
            PredicateType::FreeText => Self::FreeText(FreeTextPredicate::default()),
        }
    }

    pub fn kind(&self) -> PredicateType {
        match self {
            Self::DateRange(_) => PredicateType::DateRange,
            Self::FreeText(_) => PredicateType::FreeText,
        }
    }

    /// Offers `token` (at `position` in the token list). Returns true if accepted.
    pub fn parse(&mut self, token: &Token, position: usize) -> bool {
        match self {
            Self::DateRange(predicate) => predicate.parse(token, position),
            Self::FreeText(predicate) => predicate.parse(token, position),
        }
    }

    pub fn is_matched(&self) -> bool {
        match self {
            Self::DateRange(predicate) => predicate.value.is_some(),
            Self::FreeText(predicate) => predicate.terminated && !predicate.words.is_empty(),
        }
    }

    /// The disjunction of queries this predicate stands for.
    pub fn make_queries(&self) -> Vec<ArtifactQuery> {
        match self {
            Self::DateRange(predicate) => match predicate.value {
                Some((condition, date)) => vec![ArtifactQuery {
                    capture_date: Some(condition.range(date)),
                    ..Default::default()
                }],
                None => Vec::new(),
            },
            Self::FreeText(predicate) => {
                if predicate.words.is_empty() {
                    return Vec::new();
                }
                let fragment = predicate.fragment();
                vec![
                    ArtifactQuery {
                        name: Some(fragment.clone()),
                        ..Default::default()
                    },
                    ArtifactQuery {
                        notes: Some(fragment.clone()),
                        ..Default::default()
                    },
                    ArtifactQuery {
                        camera: Some(fragment.clone()),
                        ..Default::default()
                    },
                    ArtifactQuery {
                        session: Some(fragment),
                        ..Default::default()
                    },
                ]
            }
        }
    }

    /// Token indices consumed by this predicate.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            Self::DateRange(predicate) => predicate.position.map(|start| start..start + 1),
            Self::FreeText(predicate) => predicate
                .start
                .map(|start| start..start + predicate.words.len()),
        }
    }

    /// Accumulated free-text fragment, if this is a free-text predicate.
    pub fn fragment(&self) -> Option<String> {
        match self {
            Self::FreeText(predicate) if !predicate.words.is_empty() => {
                Some(predicate.fragment())
            }
            _ => None,
        }
    }
}

impl DateRangePredicate {
    pub fn value(&self) -> Option<(DateCondition, NaiveDate)> {
        self.value
    }

    fn parse(&mut self, token: &Token, position: usize) -> bool {
        if self.value.is_some() {
            return false;
        }
        let Some(word) = token.as_word() else {
            return false;
        };
        match parse_date_directive(word) {
            Some(value) => {
                self.value = Some(value);
                self.position = Some(position);
                true
            }
            None => false,
        }
    }
}

impl FreeTextPredicate {
    pub fn fragment(&self) -> String {
        self.words.join(" ")
    }

    fn parse(&mut self, token: &Token, position: usize) -> bool {
        if self.terminated {
            return false;
        }
        match token {
            Token::Word(word) if !token.is_directive_shaped() => {
                if self.start.is_none() {
                    self.start = Some(position);
                }
                self.words.push(word.clone());
                true
            }
            _ => {
                self.terminated = true;
                false
            }
        }
    }
}
