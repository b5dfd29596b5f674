/// Level-based transition suggestions.
///
/// Candidates are sorted into three buckets relative to the user's current level:
/// - lateral: same level, related by skill or industry
/// - level-up: exactly one level above
/// - skill-based: any level, sharing a skill with the user's anchor skill set
///
/// With a target level set, candidates outside `current..=target` are returned locked.
/// A bucket left empty by the live pool is refilled from the seed dataset using the same
/// predicates.
use std::collections::HashSet;

use tracing::debug;

use crate::model::{CareerRecord, Level};
use crate::seed::SeedDataset;
use crate::tuning::TransitionTuning;

#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    pub current_level: Option<Level>,
    pub target_level: Option<Level>,
    /// The user's current career, if known. Its skills join the anchor set and it is
    /// never suggested.
    pub current_career: Option<CareerRecord>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionItem {
    pub record: CareerRecord,
    pub locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionBuckets {
    pub lateral: Vec<TransitionItem>,
    pub level_up: Vec<TransitionItem>,
    pub skill_based: Vec<TransitionItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Lateral,
    LevelUp,
    SkillBased,
}

/// Per-call view of the request with the target already validated.
struct Anchor<'a> {
    current: Level,
    target: Option<Level>,
    skills: Vec<String>,
    career_id: Option<&'a str>,
    industry: Option<String>,
}

impl Anchor<'_> {
    fn locked(&self, level: Level) -> bool {
        is_locked(self.current, self.target, level)
    }
}

pub struct TransitionPolicy {
    tuning: TransitionTuning,
    seed: SeedDataset,
}

impl TransitionPolicy {
    pub fn new(tuning: TransitionTuning, seed: SeedDataset) -> Self {
        Self { tuning, seed }
    }

    /// Classify `pool` into transition buckets for `request`.
    ///
    /// Without a current level there is nothing to anchor on and all buckets are empty.
    pub fn classify(&self, request: &TransitionRequest, pool: &[CareerRecord]) -> TransitionBuckets {
        let Some(current) = request.current_level else {
            return TransitionBuckets::default();
        };

        let target = request.target_level.filter(|t| *t > current);
        if request.target_level.is_some() && target.is_none() {
            debug!(%current, "target level not above current level, ignoring it");
        }

        let mut skills: Vec<String> = request.skills.clone();
        if let Some(career) = &request.current_career {
            skills.extend(career.skills.iter().cloned());
        }
        skills.retain(|s| !s.trim().is_empty());

        let anchor = Anchor {
            current,
            target,
            skills,
            career_id: request.current_career.as_ref().map(|c| c.id.as_str()),
            industry: request
                .current_career
                .as_ref()
                .map(|c| c.industry_tag.trim().to_lowercase())
                .filter(|i| !i.is_empty()),
        };

        let none = HashSet::new();
        let lateral = self.fill(Bucket::Lateral, &anchor, pool, &none);
        let level_up = self.fill(Bucket::LevelUp, &anchor, pool, &none);

        let taken: HashSet<String> = lateral
            .iter()
            .chain(level_up.iter())
            .map(|item| item.record.id.clone())
            .collect();
        let skill_based = self.fill(Bucket::SkillBased, &anchor, pool, &taken);

        debug!(
            pool = pool.len(),
            lateral = lateral.len(),
            level_up = level_up.len(),
            skill_based = skill_based.len(),
            "transition buckets classified"
        );

        TransitionBuckets {
            lateral,
            level_up,
            skill_based,
        }
    }

    /// Bucket from the live pool, falling back to the seed dataset when empty.
    fn fill(
        &self,
        bucket: Bucket,
        anchor: &Anchor<'_>,
        pool: &[CareerRecord],
        exclude: &HashSet<String>,
    ) -> Vec<TransitionItem> {
        let items = self.select(bucket, anchor, pool, exclude);
        if !items.is_empty() {
            return items;
        }
        let seeded = self.select(bucket, anchor, self.seed.records(), exclude);
        if !seeded.is_empty() {
            debug!(?bucket, count = seeded.len(), "transition bucket filled from seed dataset");
        }
        seeded
    }

    fn select(
        &self,
        bucket: Bucket,
        anchor: &Anchor<'_>,
        candidates: &[CareerRecord],
        exclude: &HashSet<String>,
    ) -> Vec<TransitionItem> {
        let mut seen = HashSet::new();
        let mut scored: Vec<(usize, TransitionItem)> = candidates
            .iter()
            .filter(|r| anchor.career_id != Some(r.id.as_str()))
            .filter(|r| !exclude.contains(&r.id))
            .filter(|r| seen.insert(r.id.as_str()))
            .filter_map(|r| {
                let overlap = r.skill_overlap(&anchor.skills);
                matches(bucket, anchor, r, overlap).then(|| {
                    (
                        overlap,
                        TransitionItem {
                            record: r.clone(),
                            locked: anchor.locked(r.level),
                        },
                    )
                })
            })
            .collect();

        // Stable: unlocked first, then more shared skills, then candidate order.
        scored.sort_by(|(oa, a), (ob, b)| a.locked.cmp(&b.locked).then(ob.cmp(oa)));
        scored
            .into_iter()
            .take(self.tuning.bucket_size)
            .map(|(_, item)| item)
            .collect()
    }
}

fn matches(bucket: Bucket, anchor: &Anchor<'_>, record: &CareerRecord, overlap: usize) -> bool {
    match bucket {
        Bucket::Lateral => {
            record.level == anchor.current
                && (anchor.skills.is_empty() || overlap > 0 || same_industry(anchor, record))
        }
        Bucket::LevelUp => record.level.rank() == anchor.current.rank() + 1,
        Bucket::SkillBased => overlap > 0,
    }
}

fn same_industry(anchor: &Anchor<'_>, record: &CareerRecord) -> bool {
    anchor
        .industry
        .as_deref()
        .is_some_and(|industry| record.industry_tag.trim().eq_ignore_ascii_case(industry))
}

/// A candidate is locked when a target is set above the current level and the candidate's
/// level falls outside `current..=target`.
pub fn is_locked(current: Level, target: Option<Level>, level: Level) -> bool {
    match target {
        Some(target) if target > current => !(current..=target).contains(&level),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{record, strings};
    use crate::seed::Dataset;

    fn policy() -> TransitionPolicy {
        TransitionPolicy::new(TransitionTuning::default(), Dataset::from_records("empty", 1, Vec::new()))
    }

    fn request(current: Level, target: Option<Level>, skills: &[&str]) -> TransitionRequest {
        TransitionRequest {
            current_level: Some(current),
            target_level: target,
            current_career: None,
            skills: strings(skills),
        }
    }

    fn ids(items: &[TransitionItem]) -> Vec<&str> {
        items.iter().map(|i| i.record.id.as_str()).collect()
    }

    #[test]
    fn target_band_locks_levels_outside_it() {
        let target = Some(Level::Expert);
        assert!(!is_locked(Level::Intermediate, target, Level::Advanced));
        assert!(!is_locked(Level::Intermediate, target, Level::Intermediate));
        assert!(!is_locked(Level::Intermediate, target, Level::Expert));
        assert!(is_locked(Level::Intermediate, target, Level::Entry));

        // No target, or a target not above current: nothing is locked.
        assert!(!is_locked(Level::Intermediate, None, Level::Entry));
        assert!(!is_locked(Level::Advanced, Some(Level::Entry), Level::Entry));
        assert!(!is_locked(Level::Advanced, Some(Level::Advanced), Level::Entry));
    }

    #[test]
    fn intermediate_to_expert_flags_entry_candidates() {
        let pool = vec![
            record("entry-sql", "Report Writer", Level::Entry, &["SQL"]),
            record("adv-sql", "Database Architect", Level::Advanced, &["SQL"]),
        ];
        let buckets = policy().classify(&request(Level::Intermediate, Some(Level::Expert), &["SQL"]), &pool);

        assert_eq!(ids(&buckets.level_up), vec!["adv-sql"]);
        assert!(!buckets.level_up[0].locked);

        // Skill-based ignores the band but still flags the lock.
        assert_eq!(ids(&buckets.skill_based), vec!["entry-sql"]);
        assert!(buckets.skill_based[0].locked);
    }

    #[test]
    fn buckets_follow_level_and_skill_rules() {
        let mut current = record("current", "Data Analyst", Level::Intermediate, &["SQL", "Excel"]);
        current.industry_tag = "tech".to_string();

        let mut same_industry = record("qa", "QA Analyst", Level::Intermediate, &["Testing"]);
        same_industry.industry_tag = "Tech".to_string();

        let pool = vec![
            current.clone(),
            record("bi", "BI Developer", Level::Intermediate, &["SQL", "Tableau"]),
            record("chef", "Chef", Level::Intermediate, &["Cooking"]),
            same_industry,
            record("ds", "Data Scientist", Level::Advanced, &["Python"]),
            record("arch", "Principal Architect", Level::Expert, &["SQL"]),
            record("clerk", "Finance Clerk", Level::Entry, &["Excel"]),
        ];

        let req = TransitionRequest {
            current_level: Some(Level::Intermediate),
            target_level: None,
            current_career: Some(current),
            skills: Vec::new(),
        };
        let buckets = policy().classify(&req, &pool);

        assert_eq!(ids(&buckets.lateral), vec!["bi", "qa"]);
        assert_eq!(ids(&buckets.level_up), vec!["ds"]);
        // "bi" shares skills but is already lateral.
        assert_eq!(ids(&buckets.skill_based), vec!["arch", "clerk"]);
        assert!(buckets
            .lateral
            .iter()
            .chain(&buckets.level_up)
            .chain(&buckets.skill_based)
            .all(|i| i.record.id != "current" && !i.locked));
    }

    #[test]
    fn without_anchor_skills_lateral_takes_any_same_level_role() {
        let pool = vec![
            record("a", "A", Level::Entry, &["X"]),
            record("b", "B", Level::Entry, &["Y"]),
            record("c", "C", Level::Intermediate, &["Z"]),
        ];
        let buckets = policy().classify(&request(Level::Entry, None, &[]), &pool);
        assert_eq!(ids(&buckets.lateral), vec!["a", "b"]);
        assert_eq!(ids(&buckets.level_up), vec!["c"]);
        assert!(buckets.skill_based.is_empty());
    }

    #[test]
    fn unlocked_then_overlap_then_pool_order_and_capped() {
        let pool = vec![
            record("locked", "Locked", Level::Entry, &["SQL", "Python", "Excel"]),
            record("one-a", "One A", Level::Advanced, &["SQL"]),
            record("two", "Two", Level::Expert, &["SQL", "Python"]),
            record("one-b", "One B", Level::Advanced, &["Python"]),
            record("one-c", "One C", Level::Expert, &["Excel"]),
        ];
        let buckets = policy().classify(
            &request(Level::Intermediate, Some(Level::Expert), &["SQL", "Python", "Excel"]),
            &pool,
        );

        // level-up takes one-a and one-b, so skill-based sees the rest.
        assert_eq!(ids(&buckets.level_up), vec!["one-a", "one-b"]);
        assert_eq!(ids(&buckets.skill_based), vec!["two", "one-c", "locked"]);
        assert!(buckets.skill_based[2].locked);

        let wide: Vec<CareerRecord> = (0..6)
            .map(|i| record(&format!("r{i}"), "Role", Level::Entry, &["SQL"]))
            .collect();
        let buckets = policy().classify(&request(Level::Entry, None, &["SQL"]), &wide);
        assert_eq!(ids(&buckets.lateral), vec!["r0", "r1", "r2"]);
        assert_eq!(ids(&buckets.skill_based), vec!["r3", "r4", "r5"]);
    }

    #[test]
    fn empty_buckets_fall_back_to_seed_dataset() {
        let policy = TransitionPolicy::new(TransitionTuning::default(), Dataset::transition_seed());
        let buckets = policy.classify(&request(Level::Entry, None, &["Communication"]), &[]);

        assert!(!buckets.lateral.is_empty());
        assert!(!buckets.level_up.is_empty());
        assert!(!buckets.skill_based.is_empty());
        assert!(buckets.lateral.iter().all(|i| i.record.level == Level::Entry));
        assert!(buckets.level_up.iter().all(|i| i.record.level == Level::Intermediate));

        let taken: HashSet<&str> = ids(&buckets.lateral)
            .into_iter()
            .chain(ids(&buckets.level_up))
            .collect();
        assert!(buckets.skill_based.iter().all(|i| !taken.contains(i.record.id.as_str())));
    }

    #[test]
    fn live_results_suppress_seed_fallback() {
        let policy = TransitionPolicy::new(TransitionTuning::default(), Dataset::transition_seed());
        let pool = vec![record("live", "Live Role", Level::Entry, &["Communication"])];
        let buckets = policy.classify(&request(Level::Entry, None, &["Communication"]), &pool);
        assert_eq!(ids(&buckets.lateral), vec!["live"]);
    }

    #[test]
    fn missing_current_level_yields_nothing() {
        let pool = vec![record("a", "A", Level::Entry, &["X"])];
        let buckets = policy().classify(&TransitionRequest::default(), &pool);
        assert_eq!(buckets, TransitionBuckets::default());
    }
}
