//! Boolean filter trees over chunk metadata.
//!
//! A [`FilterExpression`] is built once per query by [`FilterBuilder`] and can be
//! rendered three ways: the `$and`/`$or` JSON operator form (logging, external
//! stores), a compiled in-process matcher, and SQL (see the SQLite store).

use super::{DateConstraint, ParsedQuery};
use crate::error::Result;
use crate::vector_store::DocumentChunk;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

/// Metadata fields a predicate can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ShowName,
    Hosts,
    PublishedAt,
    Text,
    Title,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ShowName => "show_name",
            Field::Hosts => "hosts",
            Field::PublishedAt => "published_at",
            Field::Text => "text",
            Field::Title => "title",
        }
    }

    fn string_value<'a>(&self, chunk: &'a DocumentChunk) -> Option<&'a str> {
        match self {
            Field::ShowName => Some(&chunk.metadata.show_name),
            Field::Hosts => Some(&chunk.metadata.hosts),
            Field::Text => Some(&chunk.text),
            Field::Title => Some(&chunk.metadata.title),
            Field::PublishedAt => None,
        }
    }

    fn numeric_value(&self, chunk: &DocumentChunk) -> Option<i64> {
        match self {
            Field::PublishedAt => Some(chunk.metadata.published_at),
            _ => None,
        }
    }
}

/// A node in the filter tree.
///
/// `Like` and `ILike` patterns use SQL LIKE syntax: `%` matches any run of
/// characters, `_` one character, and a backslash escapes the next character.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    In { field: Field, values: Vec<String> },
    Like { field: Field, pattern: String },
    ILike { field: Field, pattern: String },
    Gte { field: Field, value: i64 },
    Lte { field: Field, value: i64 },
}

impl FilterExpression {
    /// Combine with another expression under AND, flattening a top-level AND.
    pub fn and(self, other: FilterExpression) -> FilterExpression {
        match self {
            FilterExpression::And(mut children) => {
                children.push(other);
                FilterExpression::And(children)
            }
            single => FilterExpression::And(vec![single, other]),
        }
    }

    /// Top-level groups when this is an AND node, otherwise the node itself.
    pub fn groups(&self) -> &[FilterExpression] {
        match self {
            FilterExpression::And(children) => children,
            single => std::slice::from_ref(single),
        }
    }

    /// Whether this node is an OR-group of free-text/title substring predicates.
    pub fn is_topic_group(&self) -> bool {
        match self {
            FilterExpression::Or(children) => {
                !children.is_empty()
                    && children.iter().all(|c| {
                        matches!(
                            c,
                            FilterExpression::ILike {
                                field: Field::Text | Field::Title,
                                ..
                            }
                        )
                    })
            }
            _ => false,
        }
    }

    /// Drop top-level topic groups, keeping the entity and date constraints.
    pub fn without_topic_groups(&self) -> Option<FilterExpression> {
        match self {
            FilterExpression::And(children) => {
                let kept: Vec<FilterExpression> = children
                    .iter()
                    .filter(|c| !c.is_topic_group())
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(FilterExpression::And(kept))
                }
            }
            other if other.is_topic_group() => None,
            other => Some(other.clone()),
        }
    }

    /// Render in the `$and`/`$or` JSON operator form.
    pub fn to_json(&self) -> Value {
        match self {
            FilterExpression::And(children) => {
                json!({ "$and": children.iter().map(|c| c.to_json()).collect::<Vec<_>>() })
            }
            FilterExpression::Or(children) => {
                json!({ "$or": children.iter().map(|c| c.to_json()).collect::<Vec<_>>() })
            }
            FilterExpression::In { field, values } => json!({ field.as_str(): { "$in": values } }),
            FilterExpression::Like { field, pattern } => {
                json!({ field.as_str(): { "$like": pattern } })
            }
            FilterExpression::ILike { field, pattern } => {
                json!({ field.as_str(): { "$ilike": pattern } })
            }
            FilterExpression::Gte { field, value } => json!({ field.as_str(): { "$gte": value } }),
            FilterExpression::Lte { field, value } => json!({ field.as_str(): { "$lte": value } }),
        }
    }

    /// Compile into a matcher that can be evaluated against chunks.
    pub fn compile(&self) -> Result<CompiledFilter> {
        let node = match self {
            FilterExpression::And(children) => CompiledFilter::And(
                children.iter().map(|c| c.compile()).collect::<Result<_>>()?,
            ),
            FilterExpression::Or(children) => CompiledFilter::Or(
                children.iter().map(|c| c.compile()).collect::<Result<_>>()?,
            ),
            FilterExpression::In { field, values } => CompiledFilter::In {
                field: *field,
                values: values.clone(),
            },
            FilterExpression::Like { field, pattern } => CompiledFilter::Pattern {
                field: *field,
                regex: like_to_regex(pattern, false)?,
            },
            FilterExpression::ILike { field, pattern } => CompiledFilter::Pattern {
                field: *field,
                regex: like_to_regex(pattern, true)?,
            },
            FilterExpression::Gte { field, value } => CompiledFilter::Gte {
                field: *field,
                value: *value,
            },
            FilterExpression::Lte { field, value } => CompiledFilter::Lte {
                field: *field,
                value: *value,
            },
        };
        Ok(node)
    }
}

/// A filter ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledFilter {
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
    In { field: Field, values: Vec<String> },
    Pattern { field: Field, regex: Regex },
    Gte { field: Field, value: i64 },
    Lte { field: Field, value: i64 },
}

impl CompiledFilter {
    pub fn matches(&self, chunk: &DocumentChunk) -> bool {
        match self {
            CompiledFilter::And(children) => children.iter().all(|c| c.matches(chunk)),
            CompiledFilter::Or(children) => children.iter().any(|c| c.matches(chunk)),
            CompiledFilter::In { field, values } => field
                .string_value(chunk)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            CompiledFilter::Pattern { field, regex } => {
                field.string_value(chunk).is_some_and(|v| regex.is_match(v))
            }
            CompiledFilter::Gte { field, value } => {
                field.numeric_value(chunk).is_some_and(|v| v >= *value)
            }
            CompiledFilter::Lte { field, value } => {
                field.numeric_value(chunk).is_some_and(|v| v <= *value)
            }
        }
    }
}

/// Escape LIKE metacharacters so `value` matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translate a LIKE pattern into an anchored regex.
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let mut re = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut chars = pattern.chars();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => re.push_str(&regex::escape(next.encode_utf8(&mut buf))),
                None => re.push_str(r"\\"),
            },
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

/// First second of `year`, UTC.
pub fn year_start(year: i32) -> i64 {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Last second of `year`, UTC.
pub fn year_end(year: i32) -> i64 {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Converts a [`ParsedQuery`] into a filter tree.
#[derive(Debug, Clone, Copy)]
pub struct FilterBuilder {
    corpus_start_year: i32,
    current_year: i32,
}

impl FilterBuilder {
    pub fn new(corpus_start_year: i32, current_year: i32) -> Self {
        Self {
            corpus_start_year,
            current_year,
        }
    }

    /// Build the full filter: shows, hosts, date and topics, ANDed together.
    ///
    /// Returns `None` when the query carries no constraints at all.
    pub fn build(&self, parsed: &ParsedQuery) -> Option<FilterExpression> {
        let mut groups = self.entity_groups(parsed);
        if let Some(topics) = Self::topic_group(&parsed.topics) {
            groups.push(topics);
        }

        if groups.is_empty() {
            debug!("No filter parsed");
            return None;
        }

        let filter = FilterExpression::And(groups);
        debug!("Final filter: {}", filter.to_json());
        Some(filter)
    }

    /// One OR-group with a text and a title substring predicate per topic.
    pub fn topic_group(topics: &[String]) -> Option<FilterExpression> {
        let predicates: Vec<FilterExpression> = topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .flat_map(|topic| {
                let pattern = format!("%{}%", escape_like(topic));
                [
                    FilterExpression::ILike {
                        field: Field::Text,
                        pattern: pattern.clone(),
                    },
                    FilterExpression::ILike {
                        field: Field::Title,
                        pattern,
                    },
                ]
            })
            .collect();

        if predicates.is_empty() {
            None
        } else {
            Some(FilterExpression::Or(predicates))
        }
    }

    /// The pair of inequality predicates for a date constraint.
    pub fn date_group(&self, date: &DateConstraint) -> FilterExpression {
        let (from, to) = date.bounds(self.corpus_start_year, self.current_year);
        FilterExpression::And(vec![
            FilterExpression::Gte {
                field: Field::PublishedAt,
                value: from,
            },
            FilterExpression::Lte {
                field: Field::PublishedAt,
                value: to,
            },
        ])
    }

    fn entity_groups(&self, parsed: &ParsedQuery) -> Vec<FilterExpression> {
        let mut groups = Vec::new();

        if !parsed.shows.is_empty() {
            groups.push(FilterExpression::In {
                field: Field::ShowName,
                values: parsed.shows.iter().cloned().collect(),
            });
        }

        for host in &parsed.hosts {
            groups.push(FilterExpression::Like {
                field: Field::Hosts,
                pattern: format!("%{}%", escape_like(host)),
            });
        }

        if let Some(date) = &parsed.date {
            groups.push(self.date_group(date));
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk;

    fn builder() -> FilterBuilder {
        FilterBuilder::new(2012, 2025)
    }

    #[test]
    fn test_empty_query_builds_no_filter() {
        assert!(builder().build(&ParsedQuery::default()).is_none());
    }

    #[test]
    fn test_blank_topics_are_ignored() {
        let parsed = ParsedQuery {
            topics: vec!["Valid Topic".into(), "   ".into(), "".into()],
            ..Default::default()
        };
        let filter = builder().build(&parsed).unwrap();
        assert_eq!(
            filter.to_json(),
            json!({"$and": [{"$or": [
                {"text": {"$ilike": "%Valid Topic%"}},
                {"title": {"$ilike": "%Valid Topic%"}},
            ]}]})
        );
    }

    #[test]
    fn test_all_groups_in_order() {
        let parsed = ParsedQuery {
            shows: ["Show A".to_string()].into(),
            hosts: ["Host B".to_string()].into(),
            topics: vec!["Topic C".into(), "Topic D".into()],
            date: Some(DateConstraint::Exact(2021)),
        };
        let filter = builder().build(&parsed).unwrap();

        assert_eq!(filter.groups().len(), 4);
        assert_eq!(
            filter.to_json(),
            json!({"$and": [
                {"show_name": {"$in": ["Show A"]}},
                {"hosts": {"$like": "%Host B%"}},
                {"$and": [
                    {"published_at": {"$gte": 1609459200}},
                    {"published_at": {"$lte": 1640995199}},
                ]},
                {"$or": [
                    {"text": {"$ilike": "%Topic C%"}},
                    {"title": {"$ilike": "%Topic C%"}},
                    {"text": {"$ilike": "%Topic D%"}},
                    {"title": {"$ilike": "%Topic D%"}},
                ]},
            ]})
        );
    }

    #[test]
    fn test_host_metacharacters_escaped() {
        let parsed = ParsedQuery {
            hosts: ["Host_With%Chars".to_string()].into(),
            ..Default::default()
        };
        let filter = builder().build(&parsed).unwrap();
        assert_eq!(
            filter.to_json(),
            json!({"$and": [{"hosts": {"$like": "%Host\\_With\\%Chars%"}}]})
        );

        let matcher = filter.compile().unwrap();
        let mut hit = chunk("v1", 0.0, 0, "text");
        hit.metadata.hosts = "Someone, Host_With%Chars".to_string();
        let mut miss = chunk("v2", 0.0, 0, "text");
        miss.metadata.hosts = "HostXWithYChars".to_string();
        assert!(matcher.matches(&hit));
        assert!(!matcher.matches(&miss));
    }

    #[test]
    fn test_date_bounds() {
        let b = builder();
        let bounds = |d: DateConstraint| match b.date_group(&d) {
            FilterExpression::And(pair) => match (&pair[0], &pair[1]) {
                (
                    FilterExpression::Gte { value: from, .. },
                    FilterExpression::Lte { value: to, .. },
                ) => (*from, *to),
                other => panic!("unexpected pair {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        };

        assert_eq!(bounds(DateConstraint::Exact(2021)), (year_start(2021), year_end(2021)));
        assert_eq!(
            bounds(DateConstraint::Range { start: 2015, end: 2017 }),
            (year_start(2015), year_end(2017))
        );
        assert_eq!(bounds(DateConstraint::Before(2020)), (1325376000, year_end(2019)));
        assert_eq!(bounds(DateConstraint::After(2019)), (year_start(2020), year_end(2025)));
    }

    #[test]
    fn test_without_topic_groups() {
        let parsed = ParsedQuery {
            shows: ["Gamescast".to_string()].into(),
            topics: vec!["Zelda".into()],
            ..Default::default()
        };
        let filter = builder().build(&parsed).unwrap();
        let base = filter.without_topic_groups().unwrap();
        assert_eq!(base.groups().len(), 1);
        assert!(!base.groups()[0].is_topic_group());

        let topics_only = FilterBuilder::topic_group(&["Zelda".to_string()]).unwrap();
        assert!(topics_only.without_topic_groups().is_none());
    }

    #[test]
    fn test_compiled_matcher() {
        let parsed = ParsedQuery {
            shows: ["Gamescast".to_string()].into(),
            topics: vec!["rocket league".into()],
            date: Some(DateConstraint::Exact(2021)),
            ..Default::default()
        };
        let matcher = builder().build(&parsed).unwrap().compile().unwrap();

        let mut hit = chunk("v1", 0.0, year_start(2021) + 60, "We played Rocket League all night");
        hit.metadata.show_name = "Gamescast".to_string();
        assert!(matcher.matches(&hit));

        let mut wrong_year = hit.clone();
        wrong_year.metadata.published_at = year_start(2022);
        assert!(!matcher.matches(&wrong_year));

        let mut title_only = hit.clone();
        title_only.text = "nothing relevant".to_string();
        title_only.metadata.title = "ROCKET LEAGUE special".to_string();
        assert!(matcher.matches(&title_only));

        let mut wrong_show = hit;
        wrong_show.metadata.show_name = "Gamescast Extra".to_string();
        assert!(!matcher.matches(&wrong_show));
    }

    #[test]
    fn test_like_to_regex() {
        let re = like_to_regex("%100\\%%", false).unwrap();
        assert!(re.is_match("a 100% effort"));
        assert!(!re.is_match("a 1000 effort"));

        let re = like_to_regex("_at", true).unwrap();
        assert!(re.is_match("CAT"));
        assert!(!re.is_match("at"));
    }
}
