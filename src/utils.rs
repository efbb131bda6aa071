use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Current UTC time as RFC 3339, e.g. `2024-05-01T12:00:00.123Z`
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    // Only fails for years outside of 0..=9999
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Split a comma separated list, dropping empty items
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_back() {
        let now = now_rfc3339();
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok());
    }

    #[test]
    fn lists() {
        assert_eq!(split_list("en, zh-Hans,,"), ["en", "zh-Hans"]);
        assert!(split_list("").is_empty());
    }
}
