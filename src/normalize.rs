//! Canonical, privacy-safe representations of raw lead fields.
//!
//! Pure functions only. Every PII field goes through [`sha256_hex`] before
//! it is allowed to cross the dispatch boundary; raw values never leave the
//! process except for the non-PII technical fields (IP, user agent).

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the trimmed input. Required format for every
/// hashed field in the Conversions API user-data bag.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase + trim. Empty input normalizes to `None`.
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    let email = email?.trim();
    if email.is_empty() {
        return None;
    }
    Some(email.to_lowercase())
}

/// Normalizes a phone number to E.164.
///
/// Uses the country hint, when present, to disambiguate 10-digit numbers
/// (US vs. Mexico). Untagged 10-digit numbers default to Mexico, the
/// dominant market for this dataset. That default is a known source of
/// silent misclassification for untagged international leads; it trades
/// occasional wrong country codes for not dropping ambiguous numbers.
pub fn normalize_phone(phone: Option<&str>, country_hint: Option<&str>) -> Option<String> {
    let raw = phone?;

    // Remove all non-digits and non-plus
    let cleaned = Regex::new(r"[^\d+]").unwrap().replace_all(raw, "").to_string();
    if cleaned.is_empty() {
        return None;
    }

    // Already has country code
    if cleaned.starts_with('+') {
        return Some(cleaned);
    }

    let hint = country_hint.map(|c| c.trim().to_lowercase()).unwrap_or_default();

    // 1. USA / Canada heuristic
    if matches!(
        hint.as_str(),
        "us" | "usa" | "estados unidos" | "united states" | "ca" | "canada"
    ) {
        if cleaned.len() == 10 {
            return Some(format!("+1{}", cleaned));
        }
        if cleaned.len() == 11 && cleaned.starts_with('1') {
            return Some(format!("+{}", cleaned));
        }
    }

    // 2. Colombia heuristic
    if matches!(hint.as_str(), "co" | "colombia") && cleaned.len() == 10 {
        return Some(format!("+57{}", cleaned));
    }

    // 3. Mexico heuristic (default for this business context)
    // Already carries the 52 country code: 52XXXXXXXXXX
    if cleaned.starts_with("52") && cleaned.len() == 12 {
        return Some(format!("+{}", cleaned));
    }

    // Mexican number without country code (10 digits)
    if cleaned.len() == 10 {
        return Some(format!("+52{}", cleaned));
    }

    // If > 10 digits, take last 10 and assume MX (fallback)
    if cleaned.len() > 10 {
        return Some(format!("+52{}", &cleaned[cleaned.len() - 10..]));
    }

    None
}

/// Splits a full name into (first name, last name).
///
/// First whitespace-delimited token is the first name; the remaining tokens
/// joined form the last name. Single-token names have no last name.
pub fn extract_names(full_name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(full_name) = full_name else {
        return (None, None);
    };
    let mut parts = full_name.split_whitespace();
    let first = match parts.next() {
        Some(p) => p.to_string(),
        None => return (None, None),
    };
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (Some(first), last)
}

/// Normalizes city/state: trim, lowercase, collapse internal whitespace.
pub fn normalize_location(loc: Option<&str>) -> Option<String> {
    let loc = loc?.trim();
    if loc.is_empty() {
        return None;
    }
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(loc, " ").to_string();
    Some(collapsed.to_lowercase())
}

/// Normalizes a country name to its ISO 3166-1 alpha-2 code.
///
/// 2-character inputs pass through. Common Spanish/English country names
/// are resolved through a fixed alias table; anything else falls back to
/// the first two characters.
pub fn normalize_country(country: Option<&str>) -> Option<String> {
    let c = country?.trim().to_lowercase();
    if c.is_empty() {
        return None;
    }
    if c.chars().count() == 2 {
        return Some(c);
    }

    let mapped = match c.as_str() {
        "mexico" | "méxico" => "mx",
        "united states" | "usa" | "estados unidos" => "us",
        "canada" | "canadá" => "ca",
        "spain" | "españa" => "es",
        "colombia" => "co",
        "argentina" => "ar",
        "chile" => "cl",
        "peru" | "perú" => "pe",
        "brazil" | "brasil" => "br",
        _ => return Some(c.chars().take(2).collect()),
    };
    Some(mapped.to_string())
}

/// Lenient ISO-8601 / RFC 3339 timestamp parsing.
///
/// Upstream rows carry timestamps in a few shapes (RFC 3339, space-separated
/// with offset, naive). Unparseable values yield `None` rather than an
/// error; callers treat them as "no timestamp".
pub fn parse_timestamp(timestamp_str: &str) -> Option<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::DateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f %z")
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .ok()
}

/// Converts an optional ISO timestamp to Unix seconds; absent or
/// unparseable input yields the current time.
pub fn to_unix_seconds(date_str: Option<&str>) -> i64 {
    date_str
        .and_then(parse_timestamp)
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp())
}

/// Whether `date_str` is strictly more than `max_days` whole days away from
/// now. The difference is rounded UP to whole days, so a timestamp exactly
/// `max_days` old still passes. Unparseable or absent dates are never "too
/// old".
pub fn is_older_than(date_str: Option<&str>, max_days: i64) -> bool {
    let Some(date) = date_str.and_then(parse_timestamp) else {
        return false;
    };
    let diff_ms = (Utc::now() - date).num_milliseconds().abs();
    let diff_days = (diff_ms + 86_400_000 - 1) / 86_400_000;
    diff_days > max_days
}

/// Deterministic event id for deduplication: SHA-256 of
/// `"{identity}_{status}_{conversion date}"`. Absent conversion dates
/// resolve to the current time, which makes such events unique per receipt.
pub fn generate_event_id(
    effective_id: &str,
    status: &str,
    conversion_date: Option<&str>,
) -> String {
    let date_str = conversion_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    sha256_hex(&format!("{}_{}_{}", effective_id, status, date_str))
}
