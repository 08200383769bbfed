//! Handling of the few ANSI styling sequences the VPN CLI emits.
//!
//! The tool only ever uses bold (`ESC[1m`) and reset (`ESC[0m`). Some
//! terminals or log captures drop the escape byte, leaving bare `[1m`/`[0m`,
//! so both spellings are recognized.

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const BARE_BOLD: &str = "[1m";
const BARE_RESET: &str = "[0m";

// Escaped forms first, otherwise removing the bare form would leave a stray ESC.
const SEQUENCES: [&str; 4] = [BOLD, RESET, BARE_BOLD, BARE_RESET];

/// Removes every bold/reset sequence from `text`.
pub fn strip(text: &str) -> String {
    let mut clean = text.to_string();
    for seq in SEQUENCES {
        if clean.contains(seq) {
            clean = clean.replace(seq, "");
        }
    }
    clean
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSegment {
    pub text: String,
    pub bold: bool,
}

/// Splits `text` into plain and bold runs, dropping the escape sequences.
/// Empty runs are not emitted.
pub fn segments(text: &str) -> Vec<StyledSegment> {
    let mut out = Vec::new();
    let mut bold = false;
    let mut rest = text;

    while let Some((pos, seq)) = next_sequence(rest) {
        push_segment(&mut out, &rest[..pos], bold);
        bold = seq == BOLD || seq == BARE_BOLD;
        rest = &rest[pos + seq.len()..];
    }
    push_segment(&mut out, rest, bold);

    out
}

fn next_sequence(text: &str) -> Option<(usize, &'static str)> {
    SEQUENCES
        .iter()
        .filter_map(|seq| text.find(seq).map(|pos| (pos, *seq)))
        .min_by_key(|(pos, _)| *pos)
}

fn push_segment(out: &mut Vec<StyledSegment>, text: &str, bold: bool) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.bold == bold => last.text.push_str(text),
        _ => out.push(StyledSegment {
            text: text.to_string(),
            bold,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_all_runs() {
        let text = "Connected to \x1b[1mFRANKFURT\x1b[0m in \x1b[1mTUN\x1b[0m mode";
        assert_eq!(strip(text), "Connected to FRANKFURT in TUN mode");
    }

    #[test]
    fn strip_handles_bare_sequences() {
        assert_eq!(strip("[1mISO[0m   COUNTRY"), "ISO   COUNTRY");
    }

    #[test]
    fn strip_leaves_plain_text_alone() {
        assert_eq!(strip("VPN is disconnected"), "VPN is disconnected");
    }

    #[test]
    fn segments_track_bold_state() {
        let segs = segments("Connected to \x1b[1mFRANKFURT\x1b[0m in TUN mode");
        assert_eq!(
            segs,
            vec![
                StyledSegment {
                    text: "Connected to ".to_string(),
                    bold: false
                },
                StyledSegment {
                    text: "FRANKFURT".to_string(),
                    bold: true
                },
                StyledSegment {
                    text: " in TUN mode".to_string(),
                    bold: false
                },
            ]
        );
    }

    #[test]
    fn segments_without_sequences_is_one_plain_run() {
        let segs = segments("plain");
        assert_eq!(segs.len(), 1);
        assert!(!segs[0].bold);
    }

    #[test]
    fn segments_merge_adjacent_runs_of_same_style() {
        let segs = segments("\x1b[1mA\x1b[1mB\x1b[0m");
        assert_eq!(
            segs,
            vec![StyledSegment {
                text: "AB".to_string(),
                bold: true
            }]
        );
    }

    #[test]
    fn segments_of_empty_text() {
        assert!(segments("").is_empty());
    }
}
