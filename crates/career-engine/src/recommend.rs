/// Skill-gap analysis and career recommendations for a user profile.
///
/// A candidate is retained when its skill-match ratio strictly exceeds the configured
/// minimum, its level is allowed for the user's experience tag, and one of its skills
/// touches the keyword set of the user's career goal. Retained candidates are ranked by
/// ratio; the skills they require that the user lacks become the development plan.
/// Each match carries plain-language reasons, an estimated salary and a rough transition
/// time.
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::model::{CareerRecord, ExperienceLevel, Level, UserProfile};
use crate::tuning::RecommendationTuning;

const LONG_TERM_TARGETS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CareerMatch {
    pub record: CareerRecord,
    /// Skill-match ratio in [0, 1].
    pub ratio: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reasons: Vec<String>,
    /// Midpoint of the record's salary range, in dollars.
    pub estimated_salary: Option<u64>,
    pub time_to_transition: &'static str,
}

impl CareerMatch {
    pub fn percent(&self) -> u8 {
        (self.ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn timeline(self) -> &'static str {
        match self {
            Priority::High => "1-3 months",
            Priority::Medium => "3-6 months",
            Priority::Low => "6-12 months",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillGap {
    pub skill: String,
    pub priority: Priority,
    /// How many recommended careers require this skill.
    pub frequency: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadmapPlan {
    pub short_term: Vec<String>,
    pub medium_term: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendation {
    pub career_paths: Vec<CareerMatch>,
    pub skill_development: Vec<SkillGap>,
    pub roadmap: RoadmapPlan,
}

pub struct RecommendationEngine {
    tuning: RecommendationTuning,
}

impl RecommendationEngine {
    pub fn new(tuning: RecommendationTuning) -> Self {
        Self { tuning }
    }

    /// Rank `pool` against `profile` and derive the development plan and roadmap.
    pub fn recommend(&self, profile: &UserProfile, pool: &[CareerRecord]) -> Recommendation {
        let goal = profile
            .career_goal
            .as_deref()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty());
        let goal_keywords = self.goal_keywords(goal.as_deref());

        let mut career_paths: Vec<CareerMatch> = pool
            .iter()
            .filter(|r| level_compatible(profile.experience, r.level))
            .filter(|r| goal_compatible(goal_keywords, r))
            .map(|r| self.skill_match(&profile.skills, r))
            .filter(|m| m.ratio > self.tuning.min_skill_match)
            .map(|mut m| {
                explain(&mut m, profile.experience, goal_keywords.and(goal.as_deref()));
                m
            })
            .collect();

        // Stable: equal ratios keep pool order.
        career_paths.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
        career_paths.truncate(self.tuning.max_results);

        let skill_development = self.development_plan(&career_paths);
        let roadmap = build_roadmap(&career_paths, &skill_development);

        debug!(
            pool = pool.len(),
            retained = career_paths.len(),
            plan = skill_development.len(),
            "recommendations computed"
        );

        Recommendation {
            career_paths,
            skill_development,
            roadmap,
        }
    }

    /// `(exact + partial_weight * partial) / max(1, required)`, clamped to [0, 1].
    ///
    /// A required skill counts as exact when a user skill equals it (case-insensitive),
    /// otherwise as partial when either contains the other.
    pub fn skill_match(&self, user_skills: &[String], record: &CareerRecord) -> CareerMatch {
        let user: Vec<String> = user_skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let required = record.required_skills();
        let mut exact = 0usize;
        let mut partial = 0usize;
        let mut matched_skills = Vec::new();
        let mut missing_skills = Vec::new();

        for skill in required {
            let needed = skill.trim().to_lowercase();
            if needed.is_empty() {
                continue;
            }
            if user.iter().any(|u| *u == needed) {
                exact += 1;
                matched_skills.push(skill.clone());
            } else if user
                .iter()
                .any(|u| needed.contains(u.as_str()) || u.contains(needed.as_str()))
            {
                partial += 1;
                matched_skills.push(skill.clone());
            } else {
                missing_skills.push(skill.clone());
            }
        }

        let weighted = exact as f64 + self.tuning.partial_match_weight * partial as f64;
        let ratio = (weighted / required.len().max(1) as f64).clamp(0.0, 1.0);

        let mut reasons = Vec::new();
        if !matched_skills.is_empty() {
            reasons.push(format!("Matches skills: {}", matched_skills.join(", ")));
        }

        CareerMatch {
            record: record.clone(),
            ratio,
            time_to_transition: transition_time(missing_skills.len()),
            estimated_salary: record.estimated_salary(),
            matched_skills,
            missing_skills,
            reasons,
        }
    }

    /// `goal` is expected trimmed and lower-cased.
    fn goal_keywords(&self, goal: Option<&str>) -> Option<&[String]> {
        let goal = goal?;
        match self.tuning.goal_keywords.get(goal) {
            Some(keywords) => Some(keywords.as_slice()),
            None => {
                debug!(goal, "unknown career goal, not filtering by goal");
                None
            }
        }
    }

    /// Missing skills across `matches`, most frequent first (first-seen order on ties),
    /// capped at the configured plan length.
    fn development_plan(&self, matches: &[CareerMatch]) -> Vec<SkillGap> {
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for m in matches {
            for skill in &m.missing_skills {
                let key = skill.trim().to_lowercase();
                match index.get(&key) {
                    Some(&i) => order[i].1 += 1,
                    None => {
                        index.insert(key, order.len());
                        order.push((skill.trim().to_string(), 1));
                    }
                }
            }
        }

        order.sort_by(|a, b| b.1.cmp(&a.1));
        order
            .into_iter()
            .take(self.tuning.max_plan_items)
            .map(|(skill, frequency)| SkillGap {
                skill,
                priority: self.priority_for(frequency),
                frequency,
            })
            .collect()
    }

    fn priority_for(&self, frequency: usize) -> Priority {
        if frequency >= self.tuning.high_priority_at {
            Priority::High
        } else if frequency >= self.tuning.medium_priority_at {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// With no experience tag every level passes.
pub fn level_compatible(experience: Option<ExperienceLevel>, level: Level) -> bool {
    experience.map_or(true, |e| e.allowed_levels().contains(&level))
}

/// With no (or an unknown) goal every record passes. Otherwise one of the record's
/// skills or required skills must contain a goal keyword, case-insensitively.
fn goal_compatible(keywords: Option<&[String]>, record: &CareerRecord) -> bool {
    let Some(keywords) = keywords else {
        return true;
    };
    record
        .skills
        .iter()
        .chain(record.requirements.skills.iter())
        .map(|s| s.to_lowercase())
        .any(|skill| keywords.iter().any(|kw| skill.contains(kw.as_str())))
}

/// Adds the experience and goal reasons. `goal` is set only when it filtered the pool.
fn explain(m: &mut CareerMatch, experience: Option<ExperienceLevel>, goal: Option<&str>) {
    if let Some(experience) = experience {
        let home = experience.allowed_levels().last().copied();
        m.reasons.push(if home == Some(m.record.level) {
            "Suitable for your experience level".to_string()
        } else {
            "Builds on experience you already have".to_string()
        });
    }
    if let Some(goal) = goal {
        m.reasons.push(format!("Aligns with your {goal} goal"));
    }
}

/// Rough time to close a gap of `missing` required skills.
fn transition_time(missing: usize) -> &'static str {
    match missing {
        0..=2 => "0-1 years",
        3..=5 => "1-2 years",
        _ => "2-3 years",
    }
}

fn build_roadmap(matches: &[CareerMatch], plan: &[SkillGap]) -> RoadmapPlan {
    let mut roadmap = RoadmapPlan::default();

    for gap in plan {
        match gap.priority {
            Priority::High => roadmap.short_term.push(format!("Learn {}", gap.skill)),
            Priority::Medium | Priority::Low => {
                roadmap.medium_term.push(format!("Build experience with {}", gap.skill))
            }
        }
    }

    if let Some(top) = matches.first() {
        if roadmap.short_term.is_empty() {
            if let Some(skill) = top.missing_skills.first().or(top.matched_skills.first()) {
                roadmap.short_term.push(format!("Strengthen {skill}"));
            }
        }
        if let Some(cert) = top.record.certifications.first() {
            roadmap.medium_term.push(format!("Earn the {cert} certification"));
        }
    }

    roadmap.long_term = matches
        .iter()
        .take(LONG_TERM_TARGETS)
        .map(|m| format!("Move into a {} role", m.record.title))
        .collect();

    roadmap
}
