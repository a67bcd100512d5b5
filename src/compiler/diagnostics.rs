//! Extract the useful part of a TeX engine log.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum error lines kept from the engine output.
const MAX_ERROR_LINES: usize = 12;

/// Lines of output kept when no error lines are recognized.
const TAIL_LINES: usize = 20;

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII classes only: regex is built without its unicode tables
    // `! message`, `l.<n> context`, or file-line-error style `file.tex:12: message`
    RE.get_or_init(|| {
        Regex::new(r"^(?:! .*|l\.[0-9]+.*|[^ \t:]+\.(?:tex|sty|cls|bib):[0-9]+: .*)$").unwrap()
    })
}

/// Summarize engine output for display.
///
/// Returns the recognized TeX error lines (deduplicated, in order), or
/// the tail of the output when none are found.
pub fn summarize(output: &str) -> String {
    let re = error_line_regex();
    let mut lines: Vec<&str> = Vec::new();
    for line in output.lines().map(str::trim_end) {
        if re.is_match(line) && !lines.contains(&line) {
            lines.push(line);
            if lines.len() == MAX_ERROR_LINES {
                break;
            }
        }
    }

    if !lines.is_empty() {
        return lines.join("\n");
    }

    let all: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(TAIL_LINES)..].join("\n")
}
