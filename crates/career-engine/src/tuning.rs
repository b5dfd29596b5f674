/// Tunable constants for scoring, recommendation and transition suggestions.
///
/// Defaults reproduce the catalog's established ranking behavior. A JSON file named by
/// `CAREER_TUNING_PATH` may override any subset of fields.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub scoring: ScoringWeights,
    pub recommendation: RecommendationTuning,
    pub transition: TransitionTuning,
}

impl Tuning {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read tuning file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("invalid tuning file {}: {e}", path.display()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub title_exact: u32,
    pub title_prefix: u32,
    pub title_contains: u32,
    pub alias_exact: u32,
    pub alias_contains: u32,
    pub skill_exact: u32,
    pub skill_contains: u32,
    pub required_skill_exact: u32,
    pub required_skill_contains: u32,
    pub industry_contains: u32,
    pub description_contains: u32,
    /// Bonus per query token found in title, aliases or skills (multi-word queries only).
    pub token_bonus: u32,
    /// Tokens must be strictly longer than this many characters to earn the bonus.
    pub min_token_chars: usize,
    pub emerging_boost: u32,
    pub emerging_keywords: Vec<String>,
    pub max_results: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title_exact: 100,
            title_prefix: 80,
            title_contains: 60,
            alias_exact: 70,
            alias_contains: 40,
            skill_exact: 50,
            skill_contains: 25,
            required_skill_exact: 45,
            required_skill_contains: 20,
            industry_contains: 15,
            description_contains: 10,
            token_bonus: 10,
            min_token_chars: 2,
            emerging_boost: 30,
            emerging_keywords: [
                "ai",
                "artificial intelligence",
                "machine learning",
                "deep learning",
                "llm",
                "blockchain",
                "web3",
                "quantum",
                "robotics",
                "drone",
                "drones",
                "iot",
                "augmented reality",
                "virtual reality",
                "metaverse",
                "emerging",
                "autonomous",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_results: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationTuning {
    /// Weight of a partial (substring) skill match relative to an exact one.
    pub partial_match_weight: f64,
    /// Candidates must strictly exceed this skill-match ratio.
    pub min_skill_match: f64,
    pub max_results: usize,
    pub max_plan_items: usize,
    /// Gap frequency at or above which a skill is High priority.
    pub high_priority_at: usize,
    /// Gap frequency at or above which a skill is Medium priority.
    pub medium_priority_at: usize,
    /// Career-goal tag to representative skill keywords.
    pub goal_keywords: BTreeMap<String, Vec<String>>,
}

impl Default for RecommendationTuning {
    fn default() -> Self {
        let goal = |tag: &str, words: &[&str]| {
            (
                tag.to_string(),
                words.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            )
        };
        Self {
            partial_match_weight: 0.5,
            min_skill_match: 0.2,
            max_results: 8,
            max_plan_items: 6,
            high_priority_at: 3,
            medium_priority_at: 2,
            goal_keywords: BTreeMap::from([
                goal(
                    "technical",
                    &[
                        "programming", "software", "javascript", "python", "java", "react",
                        "node", "sql", "cloud", "aws", "docker", "kubernetes", "devops",
                        "architecture", "system design", "git",
                    ],
                ),
                goal(
                    "management",
                    &[
                        "leadership", "team management", "project management", "people",
                        "stakeholder", "operations", "strategy", "mentoring", "budget",
                    ],
                ),
                goal(
                    "entrepreneur",
                    &[
                        "business", "strategy", "sales", "marketing", "finance",
                        "fundraising", "negotiation", "product", "operations",
                    ],
                ),
                goal(
                    "specialist",
                    &[
                        "consulting", "research", "analysis", "compliance", "security",
                        "certification", "audit", "domain", "expert",
                    ],
                ),
                goal(
                    "creative",
                    &[
                        "design", "ux", "user interface", "branding", "illustration", "animation",
                        "video", "photography", "copywriting", "content", "creative",
                    ],
                ),
                goal(
                    "analyst",
                    &[
                        "data", "analytics", "analysis", "statistics", "excel", "tableau",
                        "sql", "machine learning", "python", "visualization",
                    ],
                ),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionTuning {
    /// Maximum suggestions per bucket.
    pub bucket_size: usize,
}

impl Default for TransitionTuning {
    fn default() -> Self {
        Self { bucket_size: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        std::fs::write(
            &path,
            r#"{"scoring":{"title_exact":120},"recommendation":{"max_results":4}}"#,
        )
        .unwrap();

        let tuning = Tuning::from_file(&path).unwrap();
        assert_eq!(tuning.scoring.title_exact, 120);
        assert_eq!(tuning.scoring.title_prefix, 80);
        assert_eq!(tuning.recommendation.max_results, 4);
        assert_eq!(tuning.recommendation.min_skill_match, 0.2);
        assert_eq!(tuning.transition.bucket_size, 3);
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Tuning::from_file(&path), Err(AppError::Config(_))));
    }
}
