//! Query understanding: turning a free-text question into a retrieval plan.

mod filter;
mod parser;
mod roman;

pub use filter::{
    escape_like, like_to_regex, year_end, year_start, CompiledFilter, Field, FilterBuilder,
    FilterExpression,
};
pub use parser::QueryParser;

use std::collections::BTreeSet;

/// Structured entities extracted from a question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Canonical show names.
    pub shows: BTreeSet<String>,
    /// Canonical host names.
    pub hosts: BTreeSet<String>,
    /// Free topic phrases, in the order they were found.
    pub topics: Vec<String>,
    /// At most one date constraint.
    pub date: Option<DateConstraint>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.shows.is_empty() && self.hosts.is_empty() && self.topics.is_empty() && self.date.is_none()
    }

    pub fn exact_year(&self) -> Option<i32> {
        match self.date {
            Some(DateConstraint::Exact(year)) => Some(year),
            _ => None,
        }
    }
}

/// A publish-date constraint. Being an enum, only one kind can ever be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateConstraint {
    Exact(i32),
    Range { start: i32, end: i32 },
    Before(i32),
    After(i32),
}

impl DateConstraint {
    /// Inclusive `published_at` bounds in UTC epoch seconds.
    pub fn bounds(&self, corpus_start_year: i32, current_year: i32) -> (i64, i64) {
        match *self {
            DateConstraint::Exact(year) => (year_start(year), year_end(year)),
            DateConstraint::Range { start, end } => (year_start(start), year_end(end)),
            DateConstraint::Before(year) => (year_start(corpus_start_year), year_end(year - 1)),
            DateConstraint::After(year) => (year_start(year + 1), year_end(current_year)),
        }
    }
}

impl std::fmt::Display for DateConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateConstraint::Exact(year) => write!(f, "{}", year),
            DateConstraint::Range { start, end } => write!(f, "{}-{}", start, end),
            DateConstraint::Before(year) => write!(f, "before {}", year),
            DateConstraint::After(year) => write!(f, "after {}", year),
        }
    }
}
