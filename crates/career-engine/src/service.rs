/// The career service: the operations exposed to callers, built on the cache, the
/// resolver and the scoring, recommendation and transition engines.
///
/// Every operation degrades to an empty result rather than failing.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::cache::{CacheStats, CareerCache};
use crate::model::{CareerRecord, Level, RecordSet, SearchFilters, SourceKind, UserProfile};
use crate::recommend::{Recommendation, RecommendationEngine};
use crate::resolver::{CatalogQuery, SourceResolver, DEFAULT_PAGE_LIMIT};
use crate::scoring::{self, RelevanceScorer};
use crate::seed::SeedDataset;
use crate::transition::{TransitionBuckets, TransitionPolicy, TransitionRequest};
use crate::tuning::Tuning;

pub const DEFAULT_POOL_LIMIT: u32 = 200;

const PRELOAD_INDUSTRIES: [&str; 3] = ["tech", "healthcare", "business"];
const PRELOAD_QUERIES: [&str; 3] = ["developer", "engineer", "manager"];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub records: Vec<CareerRecord>,
    pub total: usize,
    pub has_more: bool,
    pub suggestions: Vec<String>,
    pub source: SourceKind,
}

/// Ticket counter for discarding superseded requests: only the most recently begun
/// ticket is current.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    latest: AtomicU64,
}

impl RequestGeneration {
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

pub struct CareerService {
    cache: Arc<CareerCache>,
    resolver: Arc<SourceResolver>,
    scorer: Arc<RelevanceScorer>,
    recommender: RecommendationEngine,
    transitions: TransitionPolicy,
    pool_limit: u32,
}

impl CareerService {
    pub fn new(
        cache: Arc<CareerCache>,
        resolver: Arc<SourceResolver>,
        scorer: Arc<RelevanceScorer>,
        tuning: &Tuning,
        seed: SeedDataset,
        pool_limit: u32,
    ) -> Self {
        Self {
            cache,
            resolver,
            scorer,
            recommender: RecommendationEngine::new(tuning.recommendation.clone()),
            transitions: TransitionPolicy::new(tuning.transition.clone(), seed),
            pool_limit: pool_limit.max(1),
        }
    }

    /// Cached resolution of `query`.
    async fn fetch(&self, query: CatalogQuery) -> RecordSet {
        let key = query.cache_key();
        let resolver = Arc::clone(&self.resolver);
        self.cache
            .get_or_load(&key, move || async move { resolver.resolve(&query).await })
            .await
    }

    /// One page of careers matching `query` and `filters`.
    ///
    /// `limit` is clamped to the scorer's result cap. With non-blank query text the page is
    /// re-ranked by relevance, and records that do not match the text at all are dropped
    /// from the page and the total. Only zero-scoring records count as dropped.
    pub async fn search_careers(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> SearchPage {
        let page = page.max(1);
        let limit = limit.clamp(1, self.scorer.max_results().max(1) as u32);
        let set = self
            .fetch(CatalogQuery::search(query, filters, page, limit))
            .await;

        let (records, total) = if query.trim().is_empty() {
            (set.records, set.total)
        } else {
            let fetched = set.records.len();
            let ranked: Vec<CareerRecord> = self
                .scorer
                .rank(query, &set.records)
                .into_iter()
                .map(|s| s.record)
                .collect();
            let unmatched = fetched - ranked.len();
            (ranked, set.total.saturating_sub(unmatched))
        };

        let suggestions = scoring::suggestions(query, &records);
        let has_more = (page as usize) * (limit as usize) < total;
        debug!(query, page, limit, total, source = %set.source, "search served");

        SearchPage {
            records,
            total,
            has_more,
            suggestions,
            source: set.source,
        }
    }

    /// Like [`search_careers`](Self::search_careers), but returns `None` when another
    /// search began on `generation` before this one finished.
    pub async fn search_latest(
        &self,
        generation: &RequestGeneration,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Option<SearchPage> {
        let ticket = generation.begin();
        let result = self.search_careers(query, filters, page, limit).await;
        if generation.is_current(ticket) {
            Some(result)
        } else {
            debug!(query, ticket, "superseded search discarded");
            None
        }
    }

    pub async fn get_career_by_id(&self, id: &str) -> Option<CareerRecord> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        self.fetch(CatalogQuery::by_id(id))
            .await
            .records
            .into_iter()
            .find(|r| r.id == id)
    }

    /// The candidate pool for recommendations and transitions: the first
    /// `pool_limit` records of the unfiltered catalog.
    pub async fn catalog_pool(&self) -> Vec<CareerRecord> {
        self.fetch(CatalogQuery::pool(self.pool_limit)).await.records
    }

    pub async fn get_recommendations(&self, profile: &UserProfile) -> Recommendation {
        let pool = self.catalog_pool().await;
        self.recommender.recommend(profile, &pool)
    }

    pub async fn get_transition_suggestions(
        &self,
        current_level: Level,
        target_level: Option<Level>,
        current_career_id: Option<&str>,
        skills: Vec<String>,
    ) -> TransitionBuckets {
        let current_career = match current_career_id {
            Some(id) => {
                let found = self.get_career_by_id(id).await;
                if found.is_none() {
                    debug!(id, "current career not found, using supplied skills only");
                }
                found
            }
            None => None,
        };

        let request = TransitionRequest {
            current_level: Some(current_level),
            target_level,
            current_career,
            skills,
        };
        let pool = self.catalog_pool().await;
        self.transitions.classify(&request, &pool)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Warm the cache with the common industry and keyword searches and the candidate
    /// pool.
    pub async fn warm_up(&self) {
        let no_filters = SearchFilters::default();
        let industry_filters: Vec<SearchFilters> = PRELOAD_INDUSTRIES
            .iter()
            .map(|industry| SearchFilters {
                industry: Some(industry.to_string()),
                ..SearchFilters::default()
            })
            .collect();

        let industries = industry_filters
            .iter()
            .map(|filters| self.search_careers("", filters, 1, DEFAULT_PAGE_LIMIT));
        let queries = PRELOAD_QUERIES
            .iter()
            .map(|query| self.search_careers(query, &no_filters, 1, DEFAULT_PAGE_LIMIT));

        let (searches, pool) = tokio::join!(
            join_all(industries.chain(queries)),
            self.catalog_pool()
        );

        let warmed = searches.iter().filter(|page| !page.records.is_empty()).count();
        info!(
            searches = searches.len(),
            warmed,
            pool = pool.len(),
            cached = self.cache.stats().size,
            "cache preloaded"
        );
    }

    /// Wait for pending cache writes to reach durable storage.
    pub async fn flush(&self) {
        self.cache.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use career_common::storage::MemoryBlobStore;

    use super::*;
    use crate::cache::CacheSettings;
    use crate::clock::testing::ManualClock;
    use crate::model::fixtures::{record, strings};
    use crate::model::ExperienceLevel;
    use crate::resolver::testing::FakeCatalog;
    use crate::resolver::{CatalogService, SnapshotStore};
    use crate::seed::Dataset;

    async fn service_with(remote: Option<Arc<FakeCatalog>>) -> CareerService {
        let store = Arc::new(MemoryBlobStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let tuning = Tuning::default();
        let scorer = Arc::new(RelevanceScorer::new(tuning.scoring.clone()));

        let cache = CareerCache::open(store.clone(), CacheSettings::default(), clock).await;
        let resolver = SourceResolver::new(
            remote.map(|r| r as Arc<dyn CatalogService>),
            SnapshotStore::new(store),
            Dataset::bundled_catalog(),
            Arc::clone(&scorer),
        );
        CareerService::new(
            Arc::new(cache),
            Arc::new(resolver),
            scorer,
            &tuning,
            Dataset::transition_seed(),
            DEFAULT_POOL_LIMIT,
        )
    }

    fn developers(n: usize) -> Vec<CareerRecord> {
        (0..n)
            .map(|i| record(&format!("dev{i}"), &format!("Developer {i}"), Level::Entry, &["Git"]))
            .collect()
    }

    #[tokio::test]
    async fn repeated_search_is_served_from_cache() {
        let remote = Arc::new(FakeCatalog::serving(developers(3)));
        let service = service_with(Some(remote.clone())).await;
        let filters = SearchFilters::default();

        let first = service.search_careers("developer", &filters, 1, 20).await;
        let second = service.search_careers("  Developer", &filters, 1, 20).await;

        assert_eq!(first, second);
        assert_eq!(first.source, SourceKind::Remote);
        assert_eq!(first.total, 3);
        assert!(!first.has_more);
        assert_eq!(first.suggestions[0], "Developer 0");
        assert_eq!(remote.calls(), 1);
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn pagination_reports_has_more() {
        let remote = Arc::new(FakeCatalog::serving(developers(5)));
        let service = service_with(Some(remote)).await;
        let filters = SearchFilters::default();

        let page1 = service.search_careers("", &filters, 1, 2).await;
        assert_eq!(page1.records.len(), 2);
        assert_eq!(page1.total, 5);
        assert!(page1.has_more);
        assert!(page1.suggestions.is_empty());

        let page3 = service.search_careers("", &filters, 3, 2).await;
        assert_eq!(page3.records.len(), 1);
        assert!(!page3.has_more);

        // Oversized limits are clamped to the scorer's cap.
        let wide = service.search_careers("", &filters, 1, 500).await;
        assert_eq!(wide.records.len(), 5);
    }

    #[tokio::test]
    async fn remote_ignoring_page_size_still_yields_requested_page() {
        let remote = Arc::new(FakeCatalog::serving(developers(25)).ignoring_paging());
        let service = service_with(Some(remote)).await;

        let page = service.search_careers("developer", &SearchFilters::default(), 1, 5).await;
        assert_eq!(page.source, SourceKind::Remote);
        assert_eq!(page.records.len(), 5);
        assert_eq!(page.total, 25);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn invalidate_all_bypasses_cache() {
        let remote = Arc::new(FakeCatalog::serving(developers(2)));
        let service = service_with(Some(remote.clone())).await;

        service.search_careers("developer", &SearchFilters::default(), 1, 20).await;
        assert_eq!(service.invalidate_all(), 1);
        service.search_careers("developer", &SearchFilters::default(), 1, 20).await;
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn unreachable_remote_falls_back_to_bundled_catalog() {
        let service = service_with(Some(Arc::new(FakeCatalog::failing()))).await;

        let page = service.search_careers("nurse", &SearchFilters::default(), 1, 20).await;
        assert_eq!(page.source, SourceKind::Bundled);
        assert_eq!(page.records[0].id, "nurse-practitioner");

        let career = service.get_career_by_id("registered-nurse").await.unwrap();
        assert_eq!(career.title, "Registered Nurse");
        assert!(service.get_career_by_id("no-such-career").await.is_none());
        assert!(service.get_career_by_id("  ").await.is_none());
    }

    #[tokio::test]
    async fn superseded_search_is_discarded() {
        let remote = Arc::new(FakeCatalog::serving(developers(3)).with_delay(Duration::from_millis(20)));
        let service = service_with(Some(remote)).await;
        let generation = RequestGeneration::default();
        let filters = SearchFilters::default();

        let (older, newer) = tokio::join!(
            service.search_latest(&generation, "developer 1", &filters, 1, 20),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                service.search_latest(&generation, "developer 2", &filters, 1, 20).await
            },
        );

        assert!(older.is_none());
        assert_eq!(newer.unwrap().records[0].id, "dev2");
    }

    #[tokio::test]
    async fn beginner_recommendations_stay_entry_level() {
        let service = service_with(None).await;
        let profile = UserProfile {
            skills: strings(&["Python", "SQL", "Excel"]),
            experience: Some(ExperienceLevel::Beginner),
            career_goal: None,
        };

        let rec = service.get_recommendations(&profile).await;
        assert!(!rec.career_paths.is_empty());
        assert!(rec.career_paths.iter().all(|m| m.record.level == Level::Entry));
        assert_eq!(rec.career_paths[0].record.id, "data-analyst");
    }

    #[tokio::test]
    async fn transitions_use_current_career_and_lock_outside_target() {
        let service = service_with(None).await;

        let buckets = service
            .get_transition_suggestions(
                Level::Intermediate,
                Some(Level::Advanced),
                Some("software-engineer"),
                Vec::new(),
            )
            .await;

        let all: Vec<_> = buckets
            .lateral
            .iter()
            .chain(&buckets.level_up)
            .chain(&buckets.skill_based)
            .collect();
        assert!(all.iter().all(|i| i.record.id != "software-engineer"));
        assert!(buckets.lateral.iter().all(|i| i.record.level == Level::Intermediate));
        assert!(buckets.level_up.iter().all(|i| i.record.level == Level::Advanced && !i.locked));
        assert!(all
            .iter()
            .all(|i| i.locked == !(Level::Intermediate..=Level::Advanced).contains(&i.record.level)));
        assert_eq!(buckets.lateral[0].record.id, "devops-engineer");
    }

    #[tokio::test]
    async fn warm_up_fills_cache() {
        let service = service_with(None).await;
        service.warm_up().await;
        // three industries, three keyword searches and the candidate pool
        assert_eq!(service.cache_stats().size, 7);
    }
}
