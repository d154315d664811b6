//! Field grammar validators for event submissions.
//!
//! Every validator is a total predicate: any input, including a value of the
//! wrong type, yields `true` or `false`. Nothing here panics, allocates
//! shared state or logs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::submission::FieldValue;

/// Dates must fall strictly after this year.
pub const MIN_EXCLUSIVE_YEAR: u32 = 2025;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$").expect("date regex")
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9](:[0-5][0-9])?$").expect("time regex")
});

// Either a single-character local part, or one that starts and ends with an
// alphanumeric. The domain must end in a letters-only label of two or more.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9][a-zA-Z0-9._+-]*[a-zA-Z0-9]|[a-zA-Z0-9])@[a-zA-Z0-9][a-zA-Z0-9.-]*\.[a-zA-Z]{2,}$",
    )
    .expect("email regex")
});

const URL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Maximum lengths (in characters) of the free-text fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLimits {
    pub name: usize,
    pub description: usize,
    pub organization: usize,
    pub location: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            name: 500,
            description: 500,
            organization: 250,
            location: 250,
        }
    }
}

/// Gregorian leap year rule.
pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`; 0 for an out-of-range month.
pub fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// `YYYY-MM-DD`, year after 2025, day within the month's length.
pub fn valid_date(s: &str) -> bool {
    if !DATE_RE.is_match(s) {
        return false;
    }
    let mut parts = s.split('-').map(|p| p.parse::<u32>());
    let (Some(Ok(year)), Some(Ok(month)), Some(Ok(day))) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if year <= MIN_EXCLUSIVE_YEAR {
        return false;
    }
    day <= days_in_month(year, month)
}

/// Strict 24-hour `HH:MM` or `HH:MM:SS`.
pub fn valid_time(s: &str) -> bool {
    TIME_RE.is_match(s)
}

/// Only a native boolean is accepted; `0`, `1`, `"true"` and friends are not.
pub fn valid_boolean(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Bool(_))
}

/// A non-negative number, or text that spells one.
///
/// Booleans are never integers here. Text is accepted when it is all ASCII
/// digits, or when it parses (after trimming) as a finite float with no
/// fractional part.
pub fn valid_integer(value: &FieldValue) -> bool {
    match value {
        FieldValue::Int(n) => *n >= 0,
        FieldValue::Float(f) => f.is_finite() && *f >= 0.0,
        FieldValue::Text(s) => {
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                return true;
            }
            match s.trim().parse::<f64>() {
                Ok(f) => f.is_finite() && f.fract() == 0.0 && f >= 0.0,
                Err(_) => false,
            }
        }
        _ => false,
    }
}

/// An absolute `http`, `https` or `ftp` URL with a dotted host name.
pub fn valid_url(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(s) => valid_url_str(s),
        _ => false,
    }
}

fn valid_url_str(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };
    if !is_scheme(scheme)
        || !URL_SCHEMES
            .iter()
            .any(|allowed| scheme.eq_ignore_ascii_case(allowed))
    {
        return false;
    }
    // The authority only exists after "//" and runs to the path, query or fragment.
    let Some(after_slashes) = rest.strip_prefix("//") else {
        return false;
    };
    let netloc = after_slashes
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    if netloc.trim_matches('.').is_empty() {
        return false;
    }

    let (host, port) = match netloc.split_once(':') {
        Some((host, port)) => {
            if port.contains(':') {
                return false;
            }
            (host, port)
        }
        None => (netloc, ""),
    };
    // An empty port ("host:") counts as no port.
    if !port.is_empty() && !valid_port(port) {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| valid_host_label(label))
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

fn valid_port(port: &str) -> bool {
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    // Digit strings too long for u32 are far above the port range.
    matches!(port.parse::<u32>(), Ok(n) if n > 0 && n <= 65535)
}

fn valid_host_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// At least one non-whitespace character, and at most `max_chars` characters.
///
/// The minimum is checked on the trimmed text, the maximum on the text as
/// given (surrounding whitespace counts toward the limit).
pub fn valid_bounded_string(s: &str, max_chars: usize) -> bool {
    if s.trim().is_empty() {
        return false;
    }
    s.chars().count() <= max_chars
}

/// A plain `local@domain` address; case-insensitive.
pub fn valid_email(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(s) if !s.is_empty() => valid_email_str(s),
        _ => false,
    }
}

fn valid_email_str(email: &str) -> bool {
    if !EMAIL_RE.is_match(email) {
        return false;
    }
    if email.contains("..") {
        return false;
    }
    if email.starts_with('.') || email.ends_with('.') {
        return false;
    }
    if email.contains("@.") || email.contains(".@") {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if domain.starts_with(['-', '.']) || domain.ends_with(['-', '.']) {
        return false;
    }
    // No hyphen next to a dot, e.g. "example-.com".
    if domain.contains(".-") || domain.contains("-.") {
        return false;
    }
    !domain.contains('_')
}
