//! Recognizing the terminal role's acceptance.

/// Markdown and punctuation stripped from the first word of a line.
const DECORATION: &[char] = &['*', '_', '#', '[', ']', ':', '.', '!', '`'];

/// Whether `output` accepts the work: some line's first word, stripped of
/// decoration, equals `marker` (case-insensitive).
///
/// ```
/// use taskloom_flow::is_accepted;
///
/// assert!(is_accepted("Looks good.\n**ACCEPT**", "ACCEPT"));
/// assert!(!is_accepted("I cannot accept this", "ACCEPT"));
/// ```
pub fn is_accepted(output: &str, marker: &str) -> bool {
    let marker = marker.trim();
    if marker.is_empty() {
        return false;
    }
    output.lines().any(|line| {
        line.split_whitespace()
            .next()
            .map(|word| word.trim_matches(DECORATION))
            .is_some_and(|word| word.eq_ignore_ascii_case(marker))
    })
}
