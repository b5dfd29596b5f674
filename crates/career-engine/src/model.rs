use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9][0-9,]*)").expect("valid regex"));

/// Career level, ordered `Entry < Intermediate < Advanced < Expert`.
///
/// Serialized as the lowercase name; the single-letter codes used by the catalog
/// service (`E`, `I`, `A`, `X`) are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "E", alias = "Entry")]
    Entry,
    #[serde(alias = "I", alias = "Intermediate")]
    Intermediate,
    #[serde(alias = "A", alias = "Advanced")]
    Advanced,
    #[serde(alias = "X", alias = "Expert")]
    Expert,
}

impl Level {
    #[cfg(test)]
    pub const ALL: [Level; 4] = [Level::Entry, Level::Intermediate, Level::Advanced, Level::Expert];

    /// Integer rank, Entry = 1 through Expert = 4.
    pub fn rank(self) -> u8 {
        match self {
            Level::Entry => 1,
            Level::Intermediate => 2,
            Level::Advanced => 3,
            Level::Expert => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Entry => "entry",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
            Level::Expert => "expert",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e" | "entry" => Ok(Level::Entry),
            "i" | "intermediate" => Ok(Level::Intermediate),
            "a" | "advanced" => Ok(Level::Advanced),
            "x" | "expert" => Ok(Level::Expert),
            other => Err(format!("unknown level: '{other}'")),
        }
    }
}

/// Structured requirements attached to a career record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A normalized career record. Immutable once built from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerRecord {
    /// Unique across the whole catalog, e.g. "software-engineer"
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub level: Level,
    /// Display string, e.g. "$80,000 - $120,000"
    #[serde(default)]
    pub salary_range: String,
    /// Display string, e.g. "2-4 years"
    #[serde(default)]
    pub experience_requirement: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub job_title_aliases: Vec<String>,
    #[serde(default)]
    pub requirements: Requirements,
    /// Industry category tag, e.g. "tech", "healthcare"
    #[serde(default)]
    pub industry_tag: String,
}

impl CareerRecord {
    /// Dollar figures in the salary range, in display order.
    /// "$80,000 - $120,000" yields `[80000, 120000]`.
    pub fn salary_figures(&self) -> Vec<u64> {
        DOLLAR_AMOUNT
            .captures_iter(&self.salary_range)
            .filter_map(|c| c[1].replace(',', "").parse().ok())
            .collect()
    }

    /// Lower bound of the salary range, 0 when the range has no dollar figure.
    pub fn salary_floor(&self) -> u64 {
        self.salary_figures().first().copied().unwrap_or(0)
    }

    /// Mean of the range's dollar figures, `None` when there are none.
    pub fn estimated_salary(&self) -> Option<u64> {
        let figures = self.salary_figures();
        if figures.is_empty() {
            return None;
        }
        Some(figures.iter().sum::<u64>() / figures.len() as u64)
    }

    /// Skills a candidate needs for this career: the explicit requirement list when present,
    /// otherwise the general skill list.
    pub fn required_skills(&self) -> &[String] {
        if self.requirements.skills.is_empty() {
            &self.skills
        } else {
            &self.requirements.skills
        }
    }

    /// Case-insensitive check whether any of `skills` appears in this record's skill list,
    /// by substring in either direction.
    pub fn shares_skill_with(&self, skills: &[String]) -> bool {
        self.skill_overlap(skills) > 0
    }

    /// Number of this record's skills that overlap `skills` (case-insensitive substring in
    /// either direction).
    pub fn skill_overlap(&self, skills: &[String]) -> usize {
        let wanted: Vec<String> = skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self.skills
            .iter()
            .map(|s| s.to_lowercase())
            .filter(|own| {
                wanted
                    .iter()
                    .any(|w| own.contains(w.as_str()) || w.contains(own.as_str()))
            })
            .count()
    }
}

/// Source that produced a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Remote,
    CachedSnapshot,
    Bundled,
    None,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Remote => "remote",
            SourceKind::CachedSnapshot => "cached_snapshot",
            SourceKind::Bundled => "bundled",
            SourceKind::None => "none",
        })
    }
}

/// The payload of a resolution: one page of records plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub records: Vec<CareerRecord>,
    pub total: usize,
    pub source: SourceKind,
}

impl RecordSet {
    pub fn new(records: Vec<CareerRecord>, total: usize, source: SourceKind) -> Self {
        let total = total.max(records.len());
        Self { records, total, source }
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            source: SourceKind::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Optional filters accompanying a free-text search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub industry: Option<String>,
    pub level: Option<Level>,
    pub skills: Vec<String>,
    /// Bounds on the salary floor (the range's lower figure), inclusive.
    pub salary_min: Option<u64>,
    pub salary_max: Option<u64>,
}

/// User experience tag from the skills assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ExperienceLevel {
    /// Career levels a user with this experience is matched against.
    pub fn allowed_levels(self) -> &'static [Level] {
        match self {
            ExperienceLevel::Beginner => &[Level::Entry],
            ExperienceLevel::Intermediate => &[Level::Entry, Level::Intermediate],
            ExperienceLevel::Advanced => &[Level::Intermediate, Level::Advanced],
            ExperienceLevel::Expert => &[Level::Advanced, Level::Expert],
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            "expert" => Ok(ExperienceLevel::Expert),
            other => Err(format!("unknown experience level: '{other}'")),
        }
    }
}

/// A user's self-assessment used for recommendations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub skills: Vec<String>,
    pub experience: Option<ExperienceLevel>,
    /// Career-goal tag, e.g. "technical" or "analyst"
    pub career_goal: Option<String>,
}

/// "$97,500"
pub fn format_dollars(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
