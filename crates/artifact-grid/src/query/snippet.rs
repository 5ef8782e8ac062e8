//! Snippet extraction around a case-insensitive match.
//!
//! Used to turn metadata text into completion suggestions:
//! - Finds the first case-insensitive occurrence of a fragment
//! - Grows a window of the target length around it, symmetrically first
//! - Spills the unused side into the other when the match sits near a boundary
//! - Marks each truncated side with an ellipsis

pub const ELLIPSIS: &str = "...";

/// Extracts a window of `target_len` characters around the first occurrence
/// of `fragment` in `text`. Returns `None` when `fragment` does not occur.
pub fn extract_snippet(text: &str, fragment: &str, target_len: usize) -> Option<String> {
    let haystack = text.chars().collect::<Vec<_>>();
    let needle = fragment.chars().collect::<Vec<_>>();
    let start = find_case_insensitive(&haystack, &needle)?;
    let end = start + needle.len();

    let (from, to) = window_bounds(start, end, haystack.len(), target_len);
    let mut snippet = String::new();
    if from > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.extend(&haystack[from..to]);
    if to < haystack.len() {
        snippet.push_str(ELLIPSIS);
    }
    Some(snippet)
}

fn find_case_insensitive(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&offset| {
        haystack[offset..offset + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| chars_eq_ignore_case(*a, *b))
    })
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Character bounds `[from, to)` of the snippet window.
fn window_bounds(start: usize, end: usize, len: usize, target_len: usize) -> (usize, usize) {
    if len <= target_len {
        return (0, len);
    }
    let match_len = end - start;
    if match_len >= target_len {
        return (start, end);
    }

    let spare = target_len - match_len;
    let mut before = spare / 2;
    let mut after = spare - before;

    let room_before = start;
    let room_after = len - end;
    if before > room_before {
        after += before - room_before;
        before = room_before;
    }
    if after > room_after {
        before = (before + after - room_after).min(room_before);
        after = room_after;
    }

    (start - before, end + after)
}
