use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Parameters ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchCareersParams {
    /// Free-text query matched against titles, job-title aliases, skills and descriptions.
    #[serde(default)]
    pub query: String,
    /// Industry tag filter such as "tech" or "healthcare".
    pub industry: Option<String>,
    /// Level filter: "entry", "intermediate", "advanced" or "expert".
    pub level: Option<String>,
    /// Only return careers listing at least one of these skills.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Minimum starting salary in dollars, compared with the low end of each salary range.
    pub salary_min: Option<u64>,
    /// Maximum starting salary in dollars, compared with the low end of each salary range.
    pub salary_max: Option<u64>,
    /// 1-based page number (default: 1).
    pub page: Option<u32>,
    /// Page size (default and maximum: 20).
    pub limit: Option<u32>,
    /// Optional client session id. A search superseded by a newer search in the same
    /// session is discarded instead of returned.
    pub session: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetCareerParams {
    /// Career record id, e.g. "software-engineer".
    pub career_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecommendationParams {
    /// Skills the user already has.
    #[serde(default)]
    pub skills: Vec<String>,
    /// "beginner", "intermediate", "advanced" or "expert". Omit to allow every level.
    pub experience_level: Option<String>,
    /// Career goal: "technical", "management", "entrepreneur", "specialist", "creative"
    /// or "analyst". Omit to allow every goal.
    pub career_goal: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransitionParams {
    /// Current level: "entry", "intermediate", "advanced" or "expert".
    pub current_level: String,
    /// Optional target level; suggestions outside current..=target are returned locked.
    pub target_level: Option<String>,
    /// Optional id of the user's current career, used for skill overlap.
    pub current_career_id: Option<String>,
    /// Additional skills to use for skill overlap.
    #[serde(default)]
    pub skills: Vec<String>,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CareerSummary {
    pub id: String,
    pub title: String,
    pub level: String,
    pub industry: String,
    pub salary_range: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CareerRequirements {
    pub education: Vec<String>,
    pub experience: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CareerDetailResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: String,
    pub industry: String,
    pub salary_range: String,
    pub experience_requirement: String,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub job_title_aliases: Vec<String>,
    pub requirements: CareerRequirements,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchCareersResponse {
    pub careers: Vec<CareerSummary>,
    pub total: usize,
    pub has_more: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CareerPathMatch {
    pub career: CareerSummary,
    /// Skill-match ratio in [0, 1].
    pub match_ratio: f64,
    /// `match_ratio` as a whole percentage.
    pub match_percent: u8,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    /// Why this career was recommended.
    pub reasons: Vec<String>,
    /// Midpoint of the salary range, e.g. "$97,500". Absent when the range has no figures.
    pub estimated_salary: Option<String>,
    /// Rough time to make the move: "0-1 years", "1-2 years" or "2-3 years".
    pub time_to_transition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkillDevelopmentItem {
    pub skill: String,
    /// "High", "Medium" or "Low".
    pub priority: String,
    /// Number of recommended careers requiring this skill.
    pub frequency: usize,
    pub timeline: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Roadmap {
    pub short_term: Vec<String>,
    pub medium_term: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecommendationResponse {
    pub career_paths: Vec<CareerPathMatch>,
    pub skill_development: Vec<SkillDevelopmentItem>,
    pub roadmap: Roadmap,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionItem {
    pub career: CareerSummary,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionResponse {
    pub lateral: Vec<TransitionItem>,
    pub level_up: Vec<TransitionItem>,
    pub skill_based: Vec<TransitionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateCacheResponse {
    pub invalidated_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsResponse {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub expired_entries: usize,
}
