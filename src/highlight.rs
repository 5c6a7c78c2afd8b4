use regex::{Regex, RegexBuilder};

/// Builds a case-insensitive matcher for the search query. In whole mode the
/// query matches as one phrase, otherwise each word matches independently,
/// longest first.
pub fn build_highlight_regex(query: &str, whole: bool) -> Option<Regex> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let pattern = if whole {
        regex::escape(query)
    } else {
        let mut words: Vec<String> = Vec::new();
        for word in query.split_whitespace() {
            if !words.iter().any(|seen| seen.eq_ignore_ascii_case(word)) {
                words.push(word.to_string());
            }
        }
        words.sort_by(|a, b| b.len().cmp(&a.len()));
        words
            .iter()
            .map(|word| regex::escape(word))
            .collect::<Vec<_>>()
            .join("|")
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Splits `text` into `(segment, is_match)` runs for rendering.
pub fn split_matches<'a>(regex: &Regex, text: &'a str) -> Vec<(&'a str, bool)> {
    let mut parts = Vec::new();
    let mut last = 0;
    for found in regex.find_iter(text) {
        if found.start() > last {
            parts.push((&text[last..found.start()], false));
        }
        parts.push((found.as_str(), true));
        last = found.end();
    }
    if last < text.len() {
        parts.push((&text[last..], false));
    }
    parts
}
