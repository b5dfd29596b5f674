/// Relevance scoring for free-text career search.
///
/// Each record is scored by weighted, case-insensitive field matching:
/// - title: exact, starts-with, or contains (highest tier only)
/// - job-title aliases, skills, required skills: exact or contains (highest tier only)
/// - industry tag and description: contains
/// - multi-word queries: a flat bonus per token (> 2 chars) found in the title,
///   an alias, or a skill
/// - emerging-technology boost when both the query and the record mention the curated
///   keyword set
///
/// Records scoring 0 are dropped. Sorting is stable, so equal scores keep input order.
use std::collections::HashSet;

use crate::model::CareerRecord;
use crate::tuning::ScoringWeights;

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub record: CareerRecord,
    pub score: u32,
}

pub struct RelevanceScorer {
    weights: ScoringWeights,
}

/// A query normalized once per ranking call.
struct PreparedQuery {
    text: String,
    tokens: Vec<String>,
    mentions_emerging: bool,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn max_results(&self) -> usize {
        self.weights.max_results
    }

    /// Rank `records` against `query`, highest score first, truncated to the configured
    /// maximum result count.
    pub fn score(&self, query: &str, records: &[CareerRecord]) -> Vec<ScoreResult> {
        let mut ranked = self.rank(query, records);
        ranked.truncate(self.weights.max_results);
        ranked
    }

    /// Rank `records` against `query` without truncation. Used when filtering a whole
    /// local dataset before pagination.
    pub fn rank(&self, query: &str, records: &[CareerRecord]) -> Vec<ScoreResult> {
        let Some(prepared) = self.prepare(query) else {
            return Vec::new();
        };

        let mut ranked: Vec<ScoreResult> = records
            .iter()
            .filter_map(|record| {
                let score = self.score_record(&prepared, record);
                (score > 0).then(|| ScoreResult {
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        // `sort_by` is stable: ties keep their input order.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    fn prepare(&self, query: &str) -> Option<PreparedQuery> {
        let text = query.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        // Every qualifying occurrence counts, so a repeated word earns the bonus again.
        let tokens = if words.len() > 1 {
            words
                .into_iter()
                .filter(|word| word.chars().count() > self.weights.min_token_chars)
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let mentions_emerging = self
            .weights
            .emerging_keywords
            .iter()
            .any(|kw| mentions_keyword(&text, kw));

        Some(PreparedQuery {
            text,
            tokens,
            mentions_emerging,
        })
    }

    fn score_record(&self, query: &PreparedQuery, record: &CareerRecord) -> u32 {
        let w = &self.weights;
        let q = query.text.as_str();

        let title = record.title.to_lowercase();
        let aliases = lowercase_all(&record.job_title_aliases);
        let skills = lowercase_all(&record.skills);
        let required = lowercase_all(&record.requirements.skills);

        let mut score = 0;

        if title == q {
            score += w.title_exact;
        } else if title.starts_with(q) {
            score += w.title_prefix;
        } else if title.contains(q) {
            score += w.title_contains;
        }

        score += tiered(&aliases, q, w.alias_exact, w.alias_contains);
        score += tiered(&skills, q, w.skill_exact, w.skill_contains);
        score += tiered(&required, q, w.required_skill_exact, w.required_skill_contains);

        if record.industry_tag.to_lowercase().contains(q) {
            score += w.industry_contains;
        }
        if record.description.to_lowercase().contains(q) {
            score += w.description_contains;
        }

        for token in &query.tokens {
            let token = token.as_str();
            let found = title.contains(token)
                || aliases.iter().any(|a| a.contains(token))
                || skills.iter().any(|s| s.contains(token));
            if found {
                score += w.token_bonus;
            }
        }

        if query.mentions_emerging && self.record_is_emerging(&title, &skills, record) {
            score += w.emerging_boost;
        }

        score
    }

    fn record_is_emerging(&self, title: &str, skills: &[String], record: &CareerRecord) -> bool {
        let tag = record.industry_tag.to_lowercase();
        self.weights.emerging_keywords.iter().any(|kw| {
            mentions_keyword(title, kw)
                || mentions_keyword(&tag, kw)
                || skills.iter().any(|s| mentions_keyword(s, kw))
        })
    }
}

/// Exact match anywhere wins over a substring match; at most one tier is awarded.
fn tiered(values: &[String], q: &str, exact: u32, contains: u32) -> u32 {
    if values.iter().any(|v| v == q) {
        exact
    } else if values.iter().any(|v| v.contains(q)) {
        contains
    } else {
        0
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Multi-word keywords match as phrases; single words must match a whole word, so that
/// "ai" does not match "maintenance".
fn mentions_keyword(text: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.contains(char::is_whitespace) {
        text.contains(keyword.as_str())
    } else {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    }
}

/// Up to five distinct titles, then skills, from `records` that contain `query`.
pub fn suggestions(query: &str, records: &[CareerRecord]) -> Vec<String> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let titles = records.iter().map(|r| &r.title);
    let skills = records.iter().flat_map(|r| r.skills.iter());
    titles
        .chain(skills)
        .filter(|candidate| candidate.to_lowercase().contains(&q))
        .filter(|candidate| seen.insert(candidate.to_lowercase()))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}
