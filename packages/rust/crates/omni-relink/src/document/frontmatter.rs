use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

use super::compile_regex;

static FRONTMATTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n(?:---|\.\.\.)[ \t]*(?:\r?\n|\z)"));

/// Leading YAML block of a document.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frontmatter {
    pub value: Option<Value>,
    /// Byte offset where the body starts (0 without frontmatter).
    pub end: usize,
}

pub(crate) fn parse_frontmatter(content: &str) -> Frontmatter {
    let Some(caps) = FRONTMATTER_REGEX.captures(content) else {
        return Frontmatter::default();
    };
    let end = caps.get(0).map_or(0, |m| m.end());
    let value = caps
        .get(1)
        .and_then(|m| serde_yaml::from_str::<Value>(m.as_str()).ok());
    Frontmatter { value, end }
}

fn parse_timestamp_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => num
            .as_i64()
            .or_else(|| num.as_u64().and_then(|v| i64::try_from(v).ok())),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(epoch) = trimmed.parse::<i64>() {
                return Some(epoch);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                return Some(dt.timestamp());
            }
            for format in ["%Y-%m-%d", "%Y/%m/%d"] {
                if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                    return date
                        .and_hms_opt(0, 0, 0)
                        .map(|naive| Utc.from_utc_datetime(&naive).timestamp());
                }
            }
            None
        }
        _ => None,
    }
}

/// Creation timestamp from `created`, `created_at` or `date`.
pub(crate) fn created_timestamp(frontmatter: Option<&Value>) -> Option<i64> {
    let value = frontmatter?;
    ["created", "created_at", "date"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(parse_timestamp_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontmatter_end_and_created() {
        let content = "---\ntitle: Guide\ncreated: 2024-03-01\n---\n# Guide\n";
        let fm = parse_frontmatter(content);
        assert_eq!(&content[fm.end..], "# Guide\n");
        assert_eq!(created_timestamp(fm.value.as_ref()), Some(1_709_251_200));
    }

    #[test]
    fn test_no_frontmatter() {
        let fm = parse_frontmatter("# Title\n---\n");
        assert_eq!(fm.end, 0);
        assert!(fm.value.is_none());
    }

    #[test]
    fn test_created_epoch_and_rfc3339() {
        let value: Value = serde_yaml::from_str("date: \"2024-03-01T00:00:10Z\"").unwrap_or_default();
        assert_eq!(created_timestamp(Some(&value)), Some(1_709_251_210));
        let value: Value = serde_yaml::from_str("created_at: 42").unwrap_or_default();
        assert_eq!(created_timestamp(Some(&value)), Some(42));
    }
}
