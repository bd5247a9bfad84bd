//! Issue-number normalization.
//!
//! Remote services and filenames carry chapter numbers as strings ("007",
//! "7.50", "12.5a"); the host wants one canonical display form plus a
//! sortable numeric value.

/// A parsed issue (chapter) number: numeric part plus any trailing suffix
/// ("12.5a" -> 12.5 + "a").
#[derive(Debug, Clone, PartialEq)]
pub struct IssueNumber {
    original: String,
    value: Option<f64>,
    suffix: String,
}

impl IssueNumber {
    pub fn parse(raw: &str) -> Self {
        let original = raw.trim().to_string();
        let mut rest = original.as_str();

        let negative = rest.starts_with('-');
        if negative {
            rest = &rest[1..];
        }

        let mut digits = String::new();
        let mut seen_dot = false;
        let mut idx = 0;
        for (i, c) in rest.char_indices() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                digits.push(c);
            } else {
                break;
            }
            idx = i + c.len_utf8();
        }
        let mut suffix = rest[idx..].to_string();

        // half-issue marker: "7½" or bare "½"
        let mut half = false;
        if suffix.starts_with('½') {
            half = true;
            suffix = suffix['½'.len_utf8()..].to_string();
        }

        let mut value = match digits.trim_end_matches('.').parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) if half => Some(0.0),
            Err(_) => None,
        };
        if half {
            value = value.map(|v| v + 0.5);
        }
        if negative {
            value = value.map(|v| -v);
        }

        Self {
            original,
            value,
            suffix: suffix.trim().to_string(),
        }
    }

    /// Canonical display form: leading zeros dropped, trailing fraction zeros
    /// dropped, suffix reattached. Non-numeric input passes through as-is.
    pub fn as_string(&self) -> String {
        match self.value {
            None => self.original.clone(),
            Some(v) => {
                // f64 display already drops trailing zeros ("7.5", "7")
                let mut s = format!("{}", v);
                if s == "-0" {
                    s = "0".to_string();
                }
                s.push_str(&self.suffix);
                s
            }
        }
    }

    /// Sortable numeric value, if the input had a numeric part.
    pub fn as_float(&self) -> Option<f64> {
        self.value
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

/// One-step canonicalization, for mapping code.
pub fn canonical_issue_number(raw: &str) -> String {
    IssueNumber::parse(raw).as_string()
}
