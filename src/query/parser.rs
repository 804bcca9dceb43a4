//! Entity extraction from free-text questions.
//!
//! The language model does the fuzzy part (spotting "KFGD" or "gregg miller");
//! everything it returns is then checked against the vocabulary here, so the
//! resulting [`ParsedQuery`] only ever names real shows and hosts.

use super::roman::decimal_variant;
use super::{DateConstraint, ParsedQuery};
use crate::config::{ParserSettings, Prompts};
use crate::error::Result;
use crate::llm::{clean_response, LanguageModel};
use crate::vector_store::Vocabulary;
use chrono::Datelike;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Raw reply shape requested from the model.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParseReply {
    shows: Option<Vec<String>>,
    hosts: Option<Vec<String>>,
    topics: Option<Vec<String>>,
    exact_year: Option<Value>,
    year_range: Option<Value>,
    before_year: Option<Value>,
    after_year: Option<Value>,
}

/// Extracts shows, hosts, a date constraint and topics from a question.
pub struct QueryParser {
    model: Arc<dyn LanguageModel>,
    prompts: Prompts,
    primary_hosts: BTreeMap<String, String>,
    corpus_start_year: i32,
    current_year: i32,
}

impl QueryParser {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Prompts, settings: &ParserSettings) -> Self {
        Self {
            model,
            prompts,
            primary_hosts: settings.primary_hosts.clone(),
            corpus_start_year: settings.corpus_start_year,
            current_year: chrono::Utc::now().year(),
        }
    }

    /// Pin the year used as the upper clamp bound.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn corpus_start_year(&self) -> i32 {
        self.corpus_start_year
    }

    /// Parse a question.
    ///
    /// `Ok(None)` means the model's reply could not be understood; callers fall
    /// back to an unfiltered search. Transport failures are returned as errors.
    #[instrument(skip(self, vocabulary), fields(query = %query))]
    pub async fn parse(&self, query: &str, vocabulary: &Vocabulary) -> Result<Option<ParsedQuery>> {
        let prompt = self.build_prompt(query, vocabulary);
        let reply = self.model.invoke(&prompt).await?;
        Ok(self.interpret(&reply, vocabulary))
    }

    fn build_prompt(&self, query: &str, vocabulary: &Vocabulary) -> String {
        let primary_hosts = self
            .primary_hosts
            .iter()
            .map(|(first, full)| format!("'{}' likely refers to '{}'", first, full))
            .collect::<Vec<_>>()
            .join(", ");

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("show_names".to_string(), vocabulary.show_names.join(", "));
        vars.insert("hosts".to_string(), vocabulary.hosts.join(", "));
        vars.insert("primary_hosts".to_string(), primary_hosts);
        vars.insert("corpus_start_year".to_string(), self.corpus_start_year.to_string());
        vars.insert("current_year".to_string(), self.current_year.to_string());

        self.prompts.render_with_custom(&self.prompts.parser.template, &vars)
    }

    /// Turn a raw model reply into a validated [`ParsedQuery`].
    pub fn interpret(&self, reply: &str, vocabulary: &Vocabulary) -> Option<ParsedQuery> {
        let cleaned = clean_response(reply);
        let raw: ParseReply = match serde_json::from_str(&cleaned) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not parse query entities: {}", e);
                return None;
            }
        };

        let shows: BTreeSet<String> = raw
            .shows
            .unwrap_or_default()
            .iter()
            .filter_map(|s| self.resolve_show(s, vocabulary))
            .collect();

        let hosts: BTreeSet<String> = raw
            .hosts
            .unwrap_or_default()
            .iter()
            .filter_map(|h| self.resolve_host(h, vocabulary))
            .collect();

        let date = self.pick_date(
            raw.exact_year.as_ref(),
            raw.year_range.as_ref(),
            raw.before_year.as_ref(),
            raw.after_year.as_ref(),
        );

        let topics = self.clean_topics(raw.topics.unwrap_or_default(), &shows, &hosts);

        let parsed = ParsedQuery {
            shows,
            hosts,
            topics,
            date,
        };
        debug!(?parsed, "Parsed query");
        Some(parsed)
    }

    fn resolve_show(&self, candidate: &str, vocabulary: &Vocabulary) -> Option<String> {
        let key = normalize(candidate);
        if key.is_empty() {
            return None;
        }

        // A bare first name never implies a show
        let single_word = candidate.split_whitespace().count() == 1;
        if single_word && self.primary_hosts.keys().any(|first| normalize(first) == key) {
            debug!("Ignoring show candidate '{}': it is a host's first name", candidate);
            return None;
        }

        if let Some(exact) = vocabulary.show_names.iter().find(|s| normalize(s) == key) {
            return Some(exact.clone());
        }

        // Partial name, e.g. "PS I Love You" for "PS I Love You XOXO"
        let partial: Vec<&String> = vocabulary
            .show_names
            .iter()
            .filter(|s| !single_word && normalize(s).contains(&key))
            .collect();
        match partial.as_slice() {
            [only] => Some((*only).clone()),
            _ => {
                debug!("Dropping unknown show '{}'", candidate);
                None
            }
        }
    }

    fn resolve_host(&self, candidate: &str, vocabulary: &Vocabulary) -> Option<String> {
        let key = normalize(candidate);
        if key.is_empty() {
            return None;
        }

        if let Some(exact) = vocabulary.hosts.iter().find(|h| normalize(h) == key) {
            return Some(exact.clone());
        }

        let first = candidate.split_whitespace().next().unwrap_or_default();
        let alias = self
            .primary_hosts
            .iter()
            .find(|(name, _)| normalize(name) == normalize(first))
            .map(|(_, full)| full.clone());

        match alias {
            // Only trust the alias when the rest of the name agrees with it
            Some(full) if candidate.split_whitespace().count() == 1 || normalize(&full) == key => {
                Some(full)
            }
            _ => {
                debug!("Dropping unknown host '{}'", candidate);
                None
            }
        }
    }

    fn pick_date(
        &self,
        exact: Option<&Value>,
        range: Option<&Value>,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Option<DateConstraint> {
        let clamp = |year: i32| year.clamp(self.corpus_start_year, self.current_year);

        let signals = [
            exact.and_then(year_of).map(|y| DateConstraint::Exact(clamp(y))),
            range.and_then(range_of).map(|(a, b)| {
                let (a, b) = (clamp(a), clamp(b));
                DateConstraint::Range {
                    start: a.min(b),
                    end: a.max(b),
                }
            }),
            before.and_then(year_of).map(|y| DateConstraint::Before(clamp(y))),
            after.and_then(year_of).map(|y| DateConstraint::After(clamp(y))),
        ];

        let found = signals.iter().flatten().count();
        if found > 1 {
            warn!("Model returned {} date constraints; keeping the highest-precedence one", found);
        }

        // Precedence: exact > range > before > after
        signals.into_iter().flatten().next()
    }

    fn clean_topics(
        &self,
        topics: Vec<String>,
        shows: &BTreeSet<String>,
        hosts: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut taken: HashSet<String> = shows.iter().chain(hosts.iter()).map(|s| normalize(s)).collect();
        for (first, full) in &self.primary_hosts {
            if hosts.contains(full) {
                taken.insert(normalize(first));
            }
        }

        let mut seen = HashSet::new();
        let mut cleaned = Vec::new();
        for topic in topics {
            let topic = topic.trim().to_string();
            if topic.is_empty() || taken.contains(&normalize(&topic)) {
                continue;
            }

            let variant = decimal_variant(&topic);
            for candidate in std::iter::once(topic).chain(variant) {
                if seen.insert(candidate.to_lowercase()) {
                    cleaned.push(candidate);
                }
            }
        }
        cleaned
    }
}

/// Lowercase alphanumerics only; "P.S. I Love You" and "ps i love you" agree.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn year_of(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("NOT_FOUND") {
                None
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

fn range_of(value: &Value) -> Option<(i32, i32)> {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    let re = RANGE.get_or_init(|| Regex::new(r"(\d{4})\D+(\d{4})").expect("static regex"));

    match value {
        Value::String(s) => {
            let caps = re.captures(s)?;
            Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
        }
        Value::Array(items) => match items.as_slice() {
            [a, b] => Some((year_of(a)?, year_of(b)?)),
            _ => None,
        },
        _ => None,
    }
}
