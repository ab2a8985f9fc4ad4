//! Chat text splitting.

/// Maximum number of characters in a single chat segment.
pub const MAX_SEGMENT_CHARS: usize = 256;

/// Split chat text into segments of at most [`MAX_SEGMENT_CHARS`] characters.
///
/// Text is expected in its escaped wire form (quotes doubled). When a split is
/// needed the segment ends after the last newline inside the window; without a
/// newline the cut is moved back one character rather than separating the two
/// quotes of an escaped pair. Concatenating the segments yields the input.
pub fn split_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let end = if chars.len() - pos <= MAX_SEGMENT_CHARS {
            chars.len()
        } else {
            pos + split_point(&chars[pos..pos + MAX_SEGMENT_CHARS])
        };
        segments.push(chars[pos..end].iter().collect());
        pos = end;
    }

    segments
}

/// Length of the next segment taken from a full window.
fn split_point(window: &[char]) -> usize {
    if let Some(newline) = window.iter().rposition(|&c| c == '\n') {
        return newline + 1;
    }

    let trailing_quotes = window.iter().rev().take_while(|&&c| c == '"').count();
    if trailing_quotes % 2 == 1 && trailing_quotes < window.len() {
        window.len() - 1
    } else {
        window.len()
    }
}
