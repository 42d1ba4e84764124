//! Field delimiter detection.

/// Candidate delimiters, in tie-breaking order.
static CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Guess the field delimiter from the first meaningful line of `text`.
///
/// Only characters outside double quotes are counted. Falls back to
/// a comma when no candidate shows up at all.
pub(crate) fn sniff_delimiter(text: &str) -> u8 {
    let line = match first_data_line(text) {
        Some(l) => l,
        None => return b',',
    };

    let mut counts = [0usize; 4];
    let mut quoted = false;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(pos) = CANDIDATES.iter().position(|c| *c == byte) {
            counts[pos] += 1;
        }
    }

    let mut best = 0;
    for idx in 1..CANDIDATES.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    if counts[best] == 0 {
        return b',';
    }

    trace!(
        "delimiter candidates {:?}, picked {:?}",
        counts,
        CANDIDATES[best] as char
    );
    CANDIDATES[best]
}

/// First line that is neither blank nor a comment.
fn first_data_line(text: &str) -> Option<&str> {
    text.lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .find(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_most_frequent() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\tc,d\n"), b'\t');
        assert_eq!(sniff_delimiter("a|b|c\n"), b'|');
        assert_eq!(sniff_delimiter("a,b;c\n"), b',');
    }

    #[test]
    fn ignores_quoted_and_comments() {
        let text = "# generated; do not edit\n\n\"x;y;z\",b,c\n";
        assert_eq!(sniff_delimiter(text), b',');
    }

    #[test]
    fn defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        assert_eq!(sniff_delimiter("/subscriptions/abc\n"), b',');
    }
}
