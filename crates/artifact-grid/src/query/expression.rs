//! Backend query types and the shallow field merge.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::ArtifactMetadata;

/// Inclusive capture-date bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(min) = self.min_value {
            if date < min {
                return false;
            }
        }
        if let Some(max) = self.max_value {
            if date > max {
                return false;
            }
        }
        true
    }
}

/// One conjunction of field predicates sent to the query API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<DateRangeQuery>,
}

impl ArtifactQuery {
    /// Field-wise shallow merge. Fields set on `other` win; the result is a new value.
    pub fn merge(&self, other: &ArtifactQuery) -> ArtifactQuery {
        ArtifactQuery {
            name: other.name.clone().or_else(|| self.name.clone()),
            notes: other.notes.clone().or_else(|| self.notes.clone()),
            camera: other.camera.clone().or_else(|| self.camera.clone()),
            session: other.session.clone().or_else(|| self.session.clone()),
            capture_date: other
                .capture_date
                .clone()
                .or_else(|| self.capture_date.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_fields().iter().all(Option::is_none) && self.capture_date.is_none()
    }

    pub fn text_fields(&self) -> [Option<&str>; 4] {
        [
            self.name.as_deref(),
            self.notes.as_deref(),
            self.camera.as_deref(),
            self.session.as_deref(),
        ]
    }

    pub fn text_field_count(&self) -> usize {
        self.text_fields().iter().filter(|field| field.is_some()).count()
    }

    /// Evaluates this conjunction against a metadata record.
    ///
    /// Text fields match as case-insensitive substrings; a date range requires
    /// a capture date inside its bounds.
    pub fn matches(&self, metadata: &ArtifactMetadata) -> bool {
        let text_ok = self
            .text_fields()
            .into_iter()
            .zip(metadata.text_fields())
            .all(|(needle, haystack)| match needle {
                None => true,
                Some(needle) => haystack
                    .map(|value| value.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
            });
        if !text_ok {
            return false;
        }

        match &self.capture_date {
            None => true,
            Some(range) => metadata
                .capture_date
                .map(|date| range.contains(date))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn merge_prefers_other_and_keeps_self() {
        let left = ArtifactQuery {
            name: Some("left".to_string()),
            camera: Some("cam".to_string()),
            ..Default::default()
        };
        let right = ArtifactQuery {
            name: Some("right".to_string()),
            ..Default::default()
        };

        let merged = left.merge(&right);
        assert_eq!(merged.name.as_deref(), Some("right"));
        assert_eq!(merged.camera.as_deref(), Some("cam"));
        assert_eq!(left.name.as_deref(), Some("left"));
    }

    #[test]
    fn merge_replaces_date_range_whole() {
        let left = ArtifactQuery {
            capture_date: Some(DateRangeQuery {
                min_value: Some(date(2020, 1, 1)),
                max_value: None,
            }),
            ..Default::default()
        };
        let right = ArtifactQuery {
            capture_date: Some(DateRangeQuery {
                min_value: None,
                max_value: Some(date(2021, 1, 1)),
            }),
            ..Default::default()
        };

        let merged = left.merge(&right);
        let range = merged.capture_date.expect("range");
        assert_eq!(range.min_value, None);
        assert_eq!(range.max_value, Some(date(2021, 1, 1)));
    }

    #[test]
    fn matches_text_case_insensitively() {
        let query = ArtifactQuery {
            notes: Some("SEA".to_string()),
            ..Default::default()
        };
        let metadata = ArtifactMetadata {
            notes: Some("By the seaside".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&metadata));
        assert!(!query.matches(&ArtifactMetadata::default()));
    }

    #[test]
    fn matches_date_bounds_inclusively() {
        let query = ArtifactQuery {
            capture_date: Some(DateRangeQuery {
                min_value: Some(date(2022, 3, 1)),
                max_value: Some(date(2022, 3, 1)),
            }),
            ..Default::default()
        };
        let on_day = ArtifactMetadata {
            capture_date: Some(date(2022, 3, 1)),
            ..Default::default()
        };
        let after = ArtifactMetadata {
            capture_date: Some(date(2022, 3, 2)),
            ..Default::default()
        };
        assert!(query.matches(&on_day));
        assert!(!query.matches(&after));
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = ArtifactQuery::default();
        assert!(query.is_empty());
        assert!(query.matches(&ArtifactMetadata::default()));
    }

    #[test]
    fn serializes_camel_case_date_bounds() {
        let query = ArtifactQuery {
            capture_date: Some(DateRangeQuery {
                min_value: None,
                max_value: Some(date(2022, 3, 1)),
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&query).expect("json");
        assert_eq!(json["captureDate"]["maxValue"], "2022-03-01");
        assert!(json.get("name").is_none());
    }
}
