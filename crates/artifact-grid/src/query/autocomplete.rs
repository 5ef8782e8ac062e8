//! Autocomplete menu selection and completion merge helpers.

use serde::{Deserialize, Serialize};

use super::compiler::CompiledSearch;
use super::tokenizer::{words, Token};

/// Shortest typed prefix that can open a directive menu.
pub const MIN_DIRECTIVE_PREFIX: usize = 3;

/// Directive menu offered for the token being typed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocompleteMenu {
    #[default]
    None,
    Date,
    Platform,
}

const DIRECTIVE_MENUS: [(&str, AutocompleteMenu); 5] = [
    ("before", AutocompleteMenu::Date),
    ("after", AutocompleteMenu::Date),
    ("on", AutocompleteMenu::Date),
    ("date", AutocompleteMenu::Date),
    ("platform", AutocompleteMenu::Platform),
];

/// Picks the menu for the token just before the end sentinel.
pub fn select_menu(tokens: &[Token]) -> AutocompleteMenu {
    let Some(last) = tokens
        .len()
        .checked_sub(2)
        .and_then(|index| tokens.get(index))
        .and_then(Token::as_word)
    else {
        return AutocompleteMenu::None;
    };

    let prefix = last
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if prefix.chars().count() < MIN_DIRECTIVE_PREFIX {
        return AutocompleteMenu::None;
    }

    DIRECTIVE_MENUS
        .iter()
        .find(|(keyword, _)| keyword.starts_with(prefix.as_str()))
        .map(|(_, menu)| *menu)
        .unwrap_or(AutocompleteMenu::None)
}

/// Replaces the trailing partial token of `current` with `next` when `next`
/// extends it; otherwise appends `next`.
pub fn complete_token(current: &str, next: &str) -> String {
    let mut parts = words(current);
    let trailing_partial = !current.ends_with(char::is_whitespace);
    if trailing_partial {
        if let Some(last) = parts.last() {
            if next.starts_with(last.as_str()) {
                parts.pop();
            }
        }
    }
    parts.push(next.to_string());
    parts.join(" ")
}

/// Replaces the last free-text fragment of `current` with `completion` when
/// the completion contains it; otherwise appends `completion`.
pub fn complete_search(current: &str, completion: &str) -> String {
    let compiled = CompiledSearch::compile(current);
    let mut parts = words(current);

    if let Some(last) = compiled.predicates.last() {
        if let (Some(fragment), Some(span)) = (last.fragment(), last.span()) {
            if completion.to_lowercase().contains(&fragment.to_lowercase()) {
                parts.drain(span);
            }
        }
    }

    parts.push(completion.to_string());
    parts.join(" ")
}
