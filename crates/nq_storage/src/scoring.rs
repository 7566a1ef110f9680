//! Keyword relevance for the in-memory table.
//!
//! The signal is deliberately crude: each query token is looked up as a
//! plain substring of the lower-cased title and body, a title hit weighs
//! twice a body hit, and nothing is normalised by length or frequency.

use std::cmp::Ordering;
use chrono::NaiveDate;
use nq_core::{ArticleRecord, ScoredCandidate};

pub const TITLE_WEIGHT: u32 = 2;
pub const BODY_WEIGHT: u32 = 1;

pub fn tokenize(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// `2 * (tokens found in title) + (tokens found in body)`. A token found in
/// both fields counts in both.
pub fn score(query: &str, article: &ArticleRecord) -> u32 {
    score_tokens(&tokenize(query), article)
}

fn score_tokens(tokens: &[String], article: &ArticleRecord) -> u32 {
    let title = article.title.to_lowercase();
    let body = article.body.to_lowercase();

    let title_hits = tokens.iter().filter(|t| title.contains(t.as_str())).count() as u32;
    let body_hits = tokens.iter().filter(|t| body.contains(t.as_str())).count() as u32;

    title_hits * TITLE_WEIGHT + body_hits * BODY_WEIGHT
}

/// Newest first; undated articles sort after every dated one.
pub fn newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Oldest first; undated articles sort after every dated one.
pub fn oldest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Scores every article, drops those without a single hit and orders the
/// rest by score descending. Equal scores are ordered by publication date,
/// newest first, and remaining ties keep the input order.
pub fn rank<'a, I>(query: &str, articles: I) -> Vec<ScoredCandidate>
where
    I: IntoIterator<Item = &'a ArticleRecord>,
{
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(u32, &ArticleRecord)> = articles
        .into_iter()
        .map(|article| (score_tokens(&tokens, article), article))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then_with(|| newest_first(a.published_at, b.published_at))
    });

    scored
        .into_iter()
        .map(|(score, article)| ScoredCandidate::new(article.clone(), score as f32))
        .collect()
}
