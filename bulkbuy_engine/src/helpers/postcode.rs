//! Postal-area prefix handling for the geocoder fallback path.

use regex::Regex;

/// Extracts the outward (area) prefix of a postcode: the leading letters and first
/// digit group, uppercased. Returns `None` when the input has no usable prefix.
///
/// Examples: `"SE15 4QL"` → `"SE15"`, `"10437"` → `"10"`, `"ec1a1bb"` → `"EC1"`.
pub fn outward_prefix(postcode: &str) -> Option<String> {
    let re = Regex::new(r"^\s*(?P<alpha>[A-Za-z]{0,2})(?P<digits>\d{1,2})").expect("static regex");
    let caps = re.captures(postcode.trim())?;
    let alpha = caps.name("alpha").map(|m| m.as_str().to_ascii_uppercase()).unwrap_or_default();
    let digits = caps.name("digits").map(|m| m.as_str()).unwrap_or_default();
    if alpha.is_empty() && digits.is_empty() {
        None
    } else {
        Some(format!("{alpha}{digits}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uk_style() {
        assert_eq!(outward_prefix("SE15 4QL").as_deref(), Some("SE15"));
        assert_eq!(outward_prefix("ec1a 1bb").as_deref(), Some("EC1"));
    }

    #[test]
    fn numeric_style() {
        assert_eq!(outward_prefix("10437").as_deref(), Some("10"));
        assert_eq!(outward_prefix(" 80331 ").as_deref(), Some("80"));
    }

    #[test]
    fn garbage() {
        assert_eq!(outward_prefix(""), None);
        assert_eq!(outward_prefix("???"), None);
    }
}
