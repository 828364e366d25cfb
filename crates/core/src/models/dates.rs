use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%b %d, %Y", "%d %b, %Y", "%B %d, %Y"];

/// Accepts the handful of date spellings the catalog carries and maps
/// anything else (including `null`) to `None` instead of failing the record.
pub(super) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => parse_date(&text),
        Some(Value::Number(year)) => year
            .as_i64()
            .and_then(|year| i32::try_from(year).ok())
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        _ => None,
    })
}

pub(super) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // Timestamps like "2020-09-17T00:00:00" keep only the date part.
    let head = text.split('T').next().unwrap_or(text);
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(head, format) {
            return Some(date);
        }
    }
    if head.len() == 4 {
        if let Ok(year) = head.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_spellings() {
        let expected = NaiveDate::from_ymd_opt(2015, 5, 18);
        assert_eq!(parse_date("2015-05-18"), expected);
        assert_eq!(parse_date("May 18, 2015"), expected);
        assert_eq!(parse_date("18 May, 2015"), expected);
        assert_eq!(parse_date("2015-05-18T10:00:00"), expected);
        assert_eq!(parse_date("2015"), NaiveDate::from_ymd_opt(2015, 1, 1));
        assert_eq!(parse_date("coming soon"), None);
        assert_eq!(parse_date(""), None);
    }
}
