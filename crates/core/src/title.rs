//! Search-title sanitization and fuzzy title matching.
//!
//! Remote search APIs and filenames disagree on punctuation, brackets, and
//! unicode forms; both sides are reduced to a plain lowercase form before
//! comparing.

use unicode_normalization::UnicodeNormalization;

/// Default match threshold (percent) for deciding a candidate title is "the
/// same series" as the search term.
pub const DEFAULT_MATCH_THRESHOLD: u32 = 90;

/// Reduce a title to a plain searchable form: bracketed groups removed, NFKD
/// normalized with combining marks dropped, punctuation collapsed to spaces,
/// lowercased. `literal` skips everything except whitespace trimming.
pub fn sanitize_title(title: &str, literal: bool) -> String {
    if literal {
        return title.trim().to_string();
    }

    let stripped = strip_bracketed(title);

    let mut out = String::with_capacity(stripped.len());
    for c in stripped.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }

    // collapse runs of whitespace
    let mut collapsed = String::with_capacity(out.len());
    let mut last_space = true;
    for c in out.chars() {
        if c.is_whitespace() {
            if !last_space {
                collapsed.push(' ');
            }
            last_space = true;
        } else {
            collapsed.push(c);
            last_space = false;
        }
    }
    collapsed.trim_end().to_string()
}

/// Whether two titles refer to the same series, as a percentage threshold on
/// Jaro-Winkler similarity of the sanitized forms.
pub fn titles_match(search_title: &str, candidate_title: &str, threshold: u32) -> bool {
    let a = sanitize_title(search_title, false);
    let b = sanitize_title(candidate_title, false);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    let score = (strsim::jaro_winkler(&a, &b) * 100.0).round() as u32;
    score >= threshold
}

/// Remove `(...)`, `[...]` and `{...}` groups (scanlation tags, year markers).
/// Unbalanced closers are kept as-is.
fn strip_bracketed(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth: u32 = 0;
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth > 0 {
                    depth -= 1;
                } else {
                    out.push(c);
                }
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_combining_mark(c: char) -> bool {
    // Combining diacritical marks blocks; enough for NFKD leftovers.
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{20D0}'..='\u{20FF}')
}
