//! Recognisers for [`StringFormat`] tags.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::schema::StringFormat;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid regex is valid")
});

static HOSTNAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .expect("hostname label regex is valid")
});

// E.164-ish: optional +, 7 to 15 digits, common separators allowed.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ().-]{5,18}[0-9]$").expect("phone regex is valid")
});

/// Whether `value` is a well-formed instance of `format`.
pub fn matches_format(format: StringFormat, value: &str) -> bool {
    match format {
        StringFormat::Email => value.len() <= 254 && EMAIL.is_match(value),
        StringFormat::Url => url::Url::parse(value).is_ok_and(|u| u.has_host()),
        StringFormat::Uuid => UUID.is_match(value),
        StringFormat::Ipv4 => value.parse::<Ipv4Addr>().is_ok(),
        StringFormat::Ipv6 => value.parse::<Ipv6Addr>().is_ok(),
        StringFormat::Hostname => is_hostname(value),
        StringFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        StringFormat::Datetime => DateTime::parse_from_rfc3339(value).is_ok(),
        StringFormat::Phone => {
            let digits = value.chars().filter(char::is_ascii_digit).count();
            PHONE.is_match(value) && (7..=15).contains(&digits)
        }
    }
}

fn is_hostname(value: &str) -> bool {
    let trimmed = value.strip_suffix('.').unwrap_or(value);
    !trimmed.is_empty()
        && trimmed.len() <= 253
        && trimmed.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(matches_format(StringFormat::Email, "user@example.com"));
        assert!(matches_format(StringFormat::Email, "USER+tag@mail.example.co.uk"));
        assert!(!matches_format(StringFormat::Email, "user@localhost"));
        assert!(!matches_format(StringFormat::Email, "not-an-email"));
        assert!(!matches_format(StringFormat::Email, "a@b@example.com"));
    }

    #[test]
    fn test_url_and_uuid() {
        assert!(matches_format(StringFormat::Url, "https://example.com/path?q=1"));
        assert!(!matches_format(StringFormat::Url, "example.com"));
        assert!(matches_format(
            StringFormat::Uuid,
            "550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!matches_format(StringFormat::Uuid, "550e8400-e29b-41d4-a716"));
    }

    #[test]
    fn test_ip_and_hostname() {
        assert!(matches_format(StringFormat::Ipv4, "192.168.0.1"));
        assert!(!matches_format(StringFormat::Ipv4, "256.1.1.1"));
        assert!(matches_format(StringFormat::Ipv6, "::1"));
        assert!(matches_format(StringFormat::Hostname, "api.example.com"));
        assert!(matches_format(StringFormat::Hostname, "example.com."));
        assert!(!matches_format(StringFormat::Hostname, "-bad.example.com"));
        assert!(!matches_format(StringFormat::Hostname, "a..b"));
    }

    #[test]
    fn test_dates_and_phone() {
        assert!(matches_format(StringFormat::Date, "2024-02-29"));
        assert!(!matches_format(StringFormat::Date, "2023-02-29"));
        assert!(matches_format(StringFormat::Datetime, "2024-01-01T12:00:00Z"));
        assert!(!matches_format(StringFormat::Datetime, "2024-01-01 12:00"));
        assert!(matches_format(StringFormat::Phone, "+1 (555) 123-4567"));
        assert!(!matches_format(StringFormat::Phone, "12"));
    }
}
