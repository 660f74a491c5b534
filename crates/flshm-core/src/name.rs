//! Connection name validity predicate.
//!
//! A pure function of the byte string, independent of the region, per the
//! design goal that validity can be checked (and property-tested) without a
//! live mapping.
//!
//! # Open question
//!
//! The exact unreserved-identifier character set the ASVM accepts is not
//! available to this implementation (see `DESIGN.md`). This predicate
//! accepts ASCII alphanumerics, `_`, `-`, and `.`, which covers every
//! connection name this workspace's own test harnesses construct; widen it
//! if a real ASVM-interoperating name is found to need more.

use crate::registry::SLOT_NAME_MAX;

/// Returns `true` if `name` may be stored as a connection name: non-empty,
/// free of embedded NUL bytes, within the per-slot length budget, and
/// either an unreserved identifier or a `{digits}:{name}` reserved form.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > SLOT_NAME_MAX {
        return false;
    }
    if name.as_bytes().contains(&0) {
        return false;
    }

    if let Some((prefix, rest)) = name.split_once(':') {
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            return !rest.is_empty() && is_unreserved_identifier(rest);
        }
        return false;
    }

    is_unreserved_identifier(name)
}

fn is_unreserved_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_unreserved_byte)
}

fn is_unreserved_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.'
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_name(""));
    }

    #[test]
    fn rejects_embedded_nul() {
        assert!(!is_valid_name("foo\0bar"));
    }

    #[test]
    fn rejects_over_length() {
        let long = "a".repeat(SLOT_NAME_MAX + 1);
        assert!(!is_valid_name(&long));
    }

    #[test]
    fn accepts_max_length() {
        let max = "a".repeat(SLOT_NAME_MAX);
        assert!(is_valid_name(&max));
    }

    #[test]
    fn accepts_reserved_digit_prefix_form() {
        assert!(is_valid_name("12:myConnection"));
        assert!(is_valid_name("0:a"));
    }

    #[test]
    fn rejects_malformed_reserved_form() {
        assert!(!is_valid_name("1a:name"));
        assert!(!is_valid_name("1:"));
        assert!(!is_valid_name(":name"));
    }

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_valid_name("_foo"));
        assert!(is_valid_name("my-connection.name"));
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("has/slash"));
    }

    proptest! {
        #[test]
        fn valid_identifiers_round_trip(name in "[a-zA-Z0-9_.-]{1,64}") {
            prop_assert!(is_valid_name(&name));
        }

        #[test]
        fn reserved_form_always_valid(digits in "[0-9]{1,6}", rest in "[a-zA-Z0-9_.-]{1,32}") {
            let name = format!("{digits}:{rest}");
            prop_assert!(is_valid_name(&name));
        }

        #[test]
        fn strings_with_nul_are_always_rejected(name in ".*\u{0}.*") {
            prop_assert!(!is_valid_name(&name));
        }
    }
}
