//! Display sanitizing of raw worker output.
//!
//! Every chunk read from the worker goes through an ordered rule pipeline
//! before it is appended to the run's log:
//!
//! 1. strip ANSI escape sequences
//! 2. normalize apostrophe look-alikes
//! 3. tighten unit marks (`5 ' 10` becomes `5'10`)
//! 4. join adjacent single-character lines
//! 5. join runs of three or more single-character lines
//! 6. keep at most one trailing newline
//! 7. collapse consecutive line breaks
//! 8. encode newlines as the display marker `<br>`
//!
//! Rules 4 and 5 repair workers that emit one character per line and can be
//! switched off independently of the rest. The pipeline is re-applied until
//! its output is stable, so sanitizing already sanitized text is a no-op.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Line-break marker understood by the display layer.
pub const LINE_BREAK: &str = "<br>";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern")
});

static APOSTROPHE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{2032}`\u{2019}]").expect("apostrophe pattern"));

static UNIT_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[ \t]*'[ \t]*").expect("unit mark pattern"));

static BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n|<br>").expect("break pattern"));

static BREAK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\n|<br>){2,}").expect("break run pattern"));

/// Sanitizer for worker output chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSanitizer {
    repair_fragments: bool,
}

impl Default for StreamSanitizer {
    fn default() -> Self {
        Self {
            repair_fragments: true,
        }
    }
}

impl StreamSanitizer {
    /// Create a sanitizer with every rule enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the single-character line repair (rules 4 and 5).
    pub fn with_fragment_repair(mut self, enabled: bool) -> Self {
        self.repair_fragments = enabled;
        self
    }

    /// Sanitize one raw chunk into display-safe text.
    pub fn sanitize(&self, raw: &str) -> String {
        let mut current = self.apply_rules(raw);
        // Every rule only deletes once newlines are encoded, so this settles.
        loop {
            let next = self.apply_rules(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn apply_rules(&self, raw: &str) -> String {
        let text = strip_ansi(raw);
        let text = normalize_apostrophes(&text);
        let text = tighten_unit_marks(&text);
        let text = if self.repair_fragments {
            let dropped = drop_fragment_breaks(&text);
            Cow::Owned(join_fragment_runs(&dropped).into_owned())
        } else {
            text
        };
        let text = trim_trailing_newlines(&text);
        let text = collapse_breaks(&text);
        encode_newlines(&text).into_owned()
    }
}

/// Sanitize one chunk with the default rule set.
pub fn sanitize(raw: &str) -> String {
    StreamSanitizer::default().sanitize(raw)
}

/// Rule 1: remove ANSI escape sequences and any stray ESC left behind.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    let stripped = ANSI_ESCAPE.replace_all(text, "");
    if stripped.contains('\x1B') {
        Cow::Owned(stripped.replace('\x1B', ""))
    } else {
        stripped
    }
}

/// Rule 2: map prime, grave accent and typographic apostrophe to `'`.
pub fn normalize_apostrophes(text: &str) -> Cow<'_, str> {
    APOSTROPHE_LIKE.replace_all(text, "'")
}

/// Rule 3: remove spacing around an apostrophe that follows a digit.
pub fn tighten_unit_marks(text: &str) -> Cow<'_, str> {
    UNIT_MARK.replace_all(text, "${1}'")
}

/// Rule 4: remove the break between two single-character segments.
///
/// The break after the last fragment is kept, so a one-character line
/// followed by ordinary text (`Y` then `Continuing`) stays on its own line.
pub fn drop_fragment_breaks(text: &str) -> Cow<'_, str> {
    let segments = split_segments(text);
    let joined: Vec<bool> = segments
        .iter()
        .zip(segments.iter().skip(1))
        .map(|((segment, brk), (next, _))| {
            brk.is_some() && tight_fragment(segment).is_some() && tight_fragment(next).is_some()
        })
        .collect();
    if !joined.contains(&true) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for (i, (segment, brk)) in segments.iter().enumerate() {
        if joined.get(i).copied().unwrap_or(false) {
            out.push_str(segment.trim_end_matches(is_hspace));
            continue;
        }
        out.push_str(segment);
        if let Some(brk) = brk {
            out.push_str(brk);
        }
    }
    Cow::Owned(out)
}

/// Rule 5: join three or more consecutive single-character segments.
///
/// Segments may carry surrounding spaces; the break after the run is kept.
pub fn join_fragment_runs(text: &str) -> Cow<'_, str> {
    let segments = split_segments(text);
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut i = 0;

    while i < segments.len() {
        let run_len = segments[i..]
            .iter()
            .take_while(|(segment, _)| loose_fragment(segment).is_some())
            .count();

        if run_len >= 3 {
            let run = &segments[i..i + run_len];
            out.extend(run.iter().filter_map(|(segment, _)| loose_fragment(segment)));
            if let Some(brk) = run[run_len - 1].1 {
                out.push_str(brk);
            }
            changed = true;
            i += run_len;
        } else {
            for (segment, brk) in &segments[i..i + run_len.max(1)] {
                out.push_str(segment);
                if let Some(brk) = brk {
                    out.push_str(brk);
                }
            }
            i += run_len.max(1);
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// Rule 6: keep at most one trailing newline.
pub fn trim_trailing_newlines(text: &str) -> Cow<'_, str> {
    if text.ends_with("\n\n") {
        Cow::Owned(format!("{}\n", text.trim_end_matches('\n')))
    } else {
        Cow::Borrowed(text)
    }
}

/// Rule 7: collapse consecutive breaks into the first one.
pub fn collapse_breaks(text: &str) -> Cow<'_, str> {
    BREAK_RUN.replace_all(text, |caps: &Captures| {
        if caps[0].starts_with('\n') {
            "\n"
        } else {
            LINE_BREAK
        }
    })
}

/// Rule 8: encode newlines as the display marker.
pub fn encode_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        Cow::Owned(text.replace('\n', LINE_BREAK))
    } else {
        Cow::Borrowed(text)
    }
}

/// Split text at breaks, pairing each segment with the break that ends it.
fn split_segments(text: &str) -> Vec<(&str, Option<&str>)> {
    let mut segments = Vec::new();
    let mut start = 0;
    for brk in BREAK.find_iter(text) {
        segments.push((&text[start..brk.start()], Some(brk.as_str())));
        start = brk.end();
    }
    segments.push((&text[start..], None));
    segments
}

/// A segment that is one alphanumeric character, optionally followed by spaces.
fn tight_fragment(segment: &str) -> Option<char> {
    single_alphanumeric(segment.trim_end_matches(is_hspace))
}

/// A segment that is one alphanumeric character with any surrounding spaces.
fn loose_fragment(segment: &str) -> Option<char> {
    single_alphanumeric(segment.trim_matches(is_hspace))
}

fn single_alphanumeric(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c),
        _ => None,
    }
}

fn is_hspace(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messy_inputs() -> Vec<&'static str> {
        vec![
            "",
            "step1\n",
            "\x1b[1;31mError\x1b[0m: 5 \u{2032} 3\n\n\n",
            "H\ne\nl\nl\no\n",
            " a\n b\n c\nrest\n",
            "foo<br><br>bar",
            "x<br><br>y",
            "\x1B\x1B[0m[31m",
            "5\n '",
            "It`s 6 \u{2019} 2\" tall\n",
            "\n\n\n",
            "a\n\nb\n\n",
            "Y\nContinuing\n",
            "q<br>",
            "line one\r\nline two\n",
            "\t\x1b]0;title\x07tab\n",
        ]
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m"), "ok");
        assert_eq!(strip_ansi("\x1bMreverse"), "reverse");
        // Removing the inner sequence must not leave a new one behind.
        assert_eq!(strip_ansi("\x1B\x1B[0m[31m"), "[31m");
    }

    #[test]
    fn test_normalize_apostrophes() {
        assert_eq!(normalize_apostrophes("it\u{2019}s `x` 5\u{2032}"), "it's 'x' 5'");
    }

    #[test]
    fn test_tighten_unit_marks() {
        assert_eq!(tighten_unit_marks("5 ' 10\""), "5'10\"");
        assert_eq!(tighten_unit_marks("5'10\""), "5'10\"");
        assert_eq!(tighten_unit_marks("it's"), "it's");
    }

    #[test]
    fn test_drop_fragment_breaks() {
        assert_eq!(drop_fragment_breaks("O \nK\n"), "OK\n");
        assert_eq!(drop_fragment_breaks("x<br>y"), "xy");
        assert_eq!(drop_fragment_breaks("a\nb"), "ab");
        // A lone fragment keeps its break.
        assert_eq!(drop_fragment_breaks("H\n"), "H\n");
        assert_eq!(drop_fragment_breaks("x<br>yz"), "x<br>yz");
        assert!(matches!(drop_fragment_breaks("step1\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_join_fragment_runs() {
        assert_eq!(join_fragment_runs(" a\n b\n c\nrest"), "abc\nrest");
        assert_eq!(join_fragment_runs("a<br>b<br>c"), "abc");
        // Two fragments are not a run.
        assert_eq!(join_fragment_runs(" a\n b\nrest"), " a\n b\nrest");
    }

    #[test]
    fn test_trim_trailing_newlines() {
        assert_eq!(trim_trailing_newlines("done\n\n\n"), "done\n");
        assert_eq!(trim_trailing_newlines("done\n"), "done\n");
        assert_eq!(trim_trailing_newlines("done"), "done");
    }

    #[test]
    fn test_collapse_breaks() {
        assert_eq!(collapse_breaks("a\n\n\nb"), "a\nb");
        assert_eq!(collapse_breaks("foo<br><br>bar"), "foo<br>bar");
        assert_eq!(collapse_breaks("foo<br>\nbar"), "foo<br>bar");
    }

    #[test]
    fn test_sanitize_line() {
        assert_eq!(sanitize("step1\n"), "step1<br>");
        assert_eq!(
            sanitize("\x1b[1;31mError\x1b[0m: 5 \u{2032} 3\n\n\n"),
            "Error: 5'3<br>"
        );
        assert_eq!(sanitize("foo<br><br>bar\n"), "foo<br>bar<br>");
    }

    #[test]
    fn test_single_character_line_stays_separate() {
        assert_eq!(sanitize("Y\n"), "Y<br>");
        let log = sanitize("Y\n") + &sanitize("Continuing\n");
        assert_eq!(log, "Y<br>Continuing<br>");
    }

    #[test]
    fn test_character_burst_is_rejoined() {
        assert_eq!(sanitize("H\ne\nl\nl\no\n"), "Hello<br>");
        assert_eq!(sanitize("O\nK\n"), "OK<br>");
        assert_eq!(sanitize("O<br>K<br>done\n"), "OK<br>done<br>");
    }

    #[test]
    fn test_leading_space_fragments_are_joined() {
        assert_eq!(sanitize(" a\n b\n c\nrest\n"), "abc<br>rest<br>");
    }

    #[test]
    fn test_fragment_repair_can_be_disabled() {
        let sanitizer = StreamSanitizer::new().with_fragment_repair(false);
        assert_eq!(sanitizer.sanitize("O\nK\n"), "O<br>K<br>");
        assert_eq!(sanitizer.sanitize("\x1b[0mok\n\n"), "ok<br>");
    }

    #[test]
    fn test_output_has_no_escape_sequences() {
        for input in messy_inputs() {
            let output = sanitize(input);
            assert!(!ANSI_ESCAPE.is_match(&output), "escape left in {:?}", output);
            assert!(!output.contains('\x1B'), "ESC left in {:?}", output);
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in messy_inputs() {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_no_consecutive_breaks() {
        for input in messy_inputs() {
            let output = sanitize(input);
            assert!(!output.contains("<br><br>"), "double break in {:?}", output);
            assert!(!output.contains('\n'), "raw newline in {:?}", output);
        }
    }

    #[test]
    fn test_accumulated_log_is_stable() {
        let log: String = ["step1\n", "step2\n", "\x1b[33mwarn\x1b[0m\n"]
            .iter()
            .map(|chunk| sanitize(chunk))
            .collect();
        assert_eq!(log, "step1<br>step2<br>warn<br>");
        assert_eq!(sanitize(&log), log);
    }

    #[test]
    fn test_accumulated_log_with_short_answers_is_stable() {
        let log: String = ["Y\n", "Continuing\n", "5\n", "done\n"]
            .iter()
            .map(|chunk| sanitize(chunk))
            .collect();
        assert_eq!(log, "Y<br>Continuing<br>5<br>done<br>");
        assert_eq!(sanitize(&log), log);
    }
}
