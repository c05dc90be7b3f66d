/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use lead_relay::normalize::{
    extract_names, generate_event_id, is_older_than, normalize_country, normalize_location,
    normalize_phone,
};
use proptest::prelude::*;

// Property: phone normalization should never panic, and any produced
// number is in E.164-ish shape
proptest! {
    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*", hint in proptest::option::of("\\PC*")) {
        let _ = normalize_phone(Some(&phone), hint.as_deref());
    }

    #[test]
    fn normalized_phones_start_with_plus(digits in "[0-9]{8,15}") {
        if let Some(normalized) = normalize_phone(Some(&digits), None) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn bare_ten_digit_numbers_default_to_mexico(digits in "[0-9]{10}") {
        let normalized = normalize_phone(Some(&digits), None);
        prop_assert!(normalized.is_some());
        let normalized = normalized.unwrap();
        prop_assert_eq!(normalized, format!("+52{}", digits));
    }

    #[test]
    fn us_hint_ten_digits_get_plus_one(digits in "[0-9]{10}") {
        let normalized = normalize_phone(Some(&digits), Some("us")).unwrap();
        prop_assert_eq!(normalized, format!("+1{}", digits));
    }
}

// Property: event id generation is deterministic and well-formed
proptest! {
    #[test]
    fn event_id_is_64_hex_chars(id in "\\PC+", status in "\\PC+", date in proptest::option::of("\\PC*")) {
        let event_id = generate_event_id(&id, &status, date.as_deref());
        prop_assert_eq!(event_id.len(), 64);
        prop_assert!(event_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn event_id_deterministic_when_date_fixed(id in "\\PC+", status in "\\PC+", date in "\\PC*") {
        let a = generate_event_id(&id, &status, Some(&date));
        let b = generate_event_id(&id, &status, Some(&date));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn event_id_distinguishes_identities(a in "[a-z]{1,10}", b in "[A-Z]{1,10}") {
        let x = generate_event_id(&a, "Nuevo Lead", Some("2025-01-01"));
        let y = generate_event_id(&b, "Nuevo Lead", Some("2025-01-01"));
        prop_assert_ne!(x, y);
    }
}

// Property: name extraction and location normalization invariants
proptest! {
    #[test]
    fn first_name_has_no_whitespace(name in "\\PC*") {
        let (first, _) = extract_names(Some(&name));
        if let Some(first) = first {
            prop_assert!(!first.chars().any(char::is_whitespace));
        }
    }

    #[test]
    fn normalized_location_is_trimmed_lowercase(loc in "\\PC*") {
        if let Some(normalized) = normalize_location(Some(&loc)) {
            prop_assert!(!normalized.starts_with(' '));
            prop_assert!(!normalized.ends_with(' '));
            prop_assert!(!normalized.contains("  "));
            prop_assert_eq!(normalized.clone(), normalized.to_lowercase());
        }
    }

    #[test]
    fn normalized_country_is_at_most_two_chars_for_unmapped(country in "[A-Za-z]{3,20}") {
        if let Some(code) = normalize_country(Some(&country)) {
            prop_assert!(code.chars().count() <= 2);
        }
    }
}

// Property: the age filter never panics, whatever the date string
proptest! {
    #[test]
    fn age_filter_never_panics(date in "\\PC*", max_days in 0i64..3650) {
        let _ = is_older_than(Some(&date), max_days);
    }
}
