use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

// Search related structs

/// Transient search request; every field is optional and each present field
/// narrows the result set further.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, alias = "keyword")]
    pub keywords: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub max_rating: Option<f64>,
    /// Inclusive lower bound; a bare date starts at midnight
    #[serde(default, deserialize_with = "deserialize_range_start")]
    pub start_date: Option<NaiveDateTime>,
    /// Inclusive upper bound; a bare date covers the whole day
    #[serde(default, deserialize_with = "deserialize_range_end")]
    pub end_date: Option<NaiveDateTime>,
    /// Owner restriction, only honoured by the per-user search
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl SearchCriteria {
    /// Keyword text, treating an empty string as absent
    pub fn keyword(&self) -> Option<&str> {
        self.keywords.as_deref().filter(|k| !k.is_empty())
    }

    /// Tag names, treating an empty list as absent
    pub fn tag_names(&self) -> Option<&[String]> {
        self.tags.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_keywords_or_tags(&self) -> bool {
        self.keyword().is_some() || self.tag_names().is_some()
    }
}

/// Optional narrowing for the description and tag lookups. At most one of the
/// two may be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupFilter {
    pub rating_filter: Option<f64>,
    /// Calendar day (`YYYY-MM-DD`) the photo was created on
    pub created_at: Option<NaiveDate>,
}

/// Parses a search bound given as an RFC 3339 timestamp (converted to UTC), a
/// naive date-time (`T` or space separated) or a bare date. Bare dates are
/// completed with `day_time`.
fn parse_range_bound(raw: &str, day_time: NaiveTime) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(day_time))
}

fn deserialize_range_bound<'de, D>(
    deserializer: D,
    day_time: NaiveTime,
) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_range_bound(&raw, day_time).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid date '{}', expected YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or RFC 3339",
                raw
            ))
        }),
    }
}

fn deserialize_range_start<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_range_bound(deserializer, NaiveTime::default())
}

fn deserialize_range_end<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    deserialize_range_bound(deserializer, end_of_day)
}
