// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone canonicalization and lookup variants.
//!
//! Canonical form is digits only. Lookups also try the number with and
//! without the Brazilian country code (55) so stored formatting
//! differences do not block a match.

/// Brazilian country code prefix.
const COUNTRY_CODE: &str = "55";

/// Strip a remote address or formatted number down to digits.
///
/// `"5511 99999-0000"` and `"5511999990000@s.whatsapp.net"` both yield
/// `"5511999990000"`.
pub fn canonical_phone(raw: &str) -> String {
    let local_part = raw.split('@').next().unwrap_or(raw);
    local_part.chars().filter(char::is_ascii_digit).collect()
}

/// Lookup variants for a canonical phone: the number itself, plus the
/// country-code added or stripped form.
///
/// A national number with DDD is 10-11 digits; with the country code,
/// 12-13. Anything shorter gets no variant beyond itself.
pub fn phone_variants(canonical: &str) -> Vec<String> {
    let mut variants = vec![canonical.to_string()];

    if let Some(national) = canonical.strip_prefix(COUNTRY_CODE) {
        if national.len() >= 10 {
            variants.push(national.to_string());
        }
    } else if canonical.len() >= 10 {
        variants.push(format!("{COUNTRY_CODE}{canonical}"));
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strips_jid_suffix_and_formatting() {
        assert_eq!(
            canonical_phone("5511999990000@s.whatsapp.net"),
            "5511999990000"
        );
        assert_eq!(canonical_phone("+55 (11) 99999-0000"), "5511999990000");
        assert_eq!(canonical_phone("11999990000"), "11999990000");
    }

    #[test]
    fn variants_strip_country_code() {
        let v = phone_variants("5511999990000");
        assert_eq!(v, vec!["5511999990000".to_string(), "11999990000".to_string()]);
    }

    #[test]
    fn variants_add_country_code() {
        let v = phone_variants("11999990000");
        assert_eq!(v, vec!["11999990000".to_string(), "5511999990000".to_string()]);
    }

    #[test]
    fn short_numbers_get_no_extra_variant() {
        // A number starting with 55 but too short to be CC + DDD + local:
        // stripping would mangle it, so only the number itself is tried.
        let v = phone_variants("5511");
        assert_eq!(v, vec!["5511".to_string()]);
    }
}
