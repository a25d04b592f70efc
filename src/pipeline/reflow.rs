//! List reflow: deterministic repair of line-broken list items.
//!
//! ## Why is reflow necessary?
//!
//! PDF text extraction emits one line per visual row. A list item whose
//! content wraps across rows therefore arrives split:
//!
//! ```text
//! 1. We propose a novel attention
//! mechanism for long documents
//! 2. Our method outperforms ...
//! ```
//!
//! Downstream prompts ask the model about "the following paper", and broken
//! items read as unrelated fragments. This pass merges each item's wrapped
//! continuation lines back onto the item's line, so every bullet or numbered
//! entry is one logical line.
//!
//! ## Algorithm
//!
//! A single left-to-right scan with a two-line lookahead window — O(n) in
//! total input length, no backtracking. When a (trimmed) line matches the
//! list-item-start pattern, every immediately following line that does *not*
//! match is trimmed and appended with a single space, until the next match
//! or end of input. Lines outside that greedy-append context pass through
//! trimmed, one per output line. The result is newline-joined and trimmed at
//! both ends, so the output never carries a trailing blank line.
//!
//! Whitespace-only lines are deliberately ordinary non-matching lines: a
//! stray blank line inside an open item is merged into the item rather than
//! treated as a separator. That matches how extractors drop blank rows in
//! the middle of wrapped bullets.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern marking the start of a list item:
/// digits followed by any run of separators (`1.`, `2)`, `3 -`, also a bare
/// `4`), or a run of bullet glyphs (`*`, `•`, `●`, `○`, `-`).
static RE_LIST_ITEM_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[\s)*.•●-]*|[*•●-]+|○+)").unwrap());

/// Whether a (trimmed) line opens a list item.
fn is_list_item_start(line: &str) -> bool {
    RE_LIST_ITEM_START.is_match(line)
}

/// Merge wrapped list-item continuation lines into single logical lines.
///
/// Every output line is either one fully merged list item or one untouched
/// (trimmed) non-list line. Running `reflow` on its own output is a no-op:
/// after one pass no item-start line is followed by an unmerged
/// continuation, so the scan has reached its fixed point.
pub fn reflow(raw_text: &str) -> String {
    let lines: Vec<&str> = raw_text.split('\n').collect();
    let mut combined: Vec<String> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let mut line = lines[i].trim().to_string();
        if is_list_item_start(&line) {
            // Greedily absorb continuation lines until the next item starts.
            while i + 1 < lines.len() && !is_list_item_start(lines[i + 1].trim()) {
                let continuation = lines[i + 1].trim();
                if !continuation.is_empty() {
                    line.push(' ');
                    line.push_str(continuation);
                }
                i += 1;
            }
        }
        combined.push(line);
        i += 1;
    }

    combined.join("\n").trim().to_string()
}
