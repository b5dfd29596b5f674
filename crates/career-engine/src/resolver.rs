/// Career record resolution across an ordered chain of sources.
///
/// Sources are tried in fixed order, each at most once per call:
/// 1. `Remote`: the catalog service over HTTP (disabled when no URL is configured)
/// 2. `Snapshot`: the durable local copy of records previously served by the remote
/// 3. `Bundled`: the catalog compiled into the binary
///
/// The first source returning a non-empty page wins. Source failures are logged and fall
/// through; `resolve` itself never fails and returns an empty set when every source is
/// exhausted. Remote results are merged into the snapshot before being returned.
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use career_common::catalog_api::CatalogApiClient;
use career_common::storage::BlobStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ResolutionError, ScoringInputError};
use crate::model::{CareerRecord, Level, RecordSet, Requirements, SearchFilters, SourceKind};
use crate::scoring::RelevanceScorer;
use crate::seed::BundledCatalog;

pub const KEY_PREFIX: &str = "career:v1:";
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

const SNAPSHOT_NAMESPACE: &str = "catalog_snapshot";
const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_MAX_RECORDS: usize = 5000;

// --- Query ---

/// A request for career records. Two queries that normalize identically share a cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub text: String,
    pub industry: Option<String>,
    pub level: Option<Level>,
    pub skills: Vec<String>,
    pub salary_min: Option<u64>,
    pub salary_max: Option<u64>,
    pub id: Option<String>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl CatalogQuery {
    pub fn search(text: &str, filters: &SearchFilters, page: u32, limit: u32) -> Self {
        Self {
            text: text.to_string(),
            industry: filters.industry.clone(),
            level: filters.level,
            skills: filters.skills.clone(),
            salary_min: filters.salary_min,
            salary_max: filters.salary_max,
            id: None,
            page,
            limit,
        }
    }

    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::pool(1)
        }
    }

    /// The first `limit` records of the whole catalog, unfiltered.
    pub fn pool(limit: u32) -> Self {
        Self {
            text: String::new(),
            industry: None,
            level: None,
            skills: Vec::new(),
            salary_min: None,
            salary_max: None,
            id: None,
            page: 1,
            limit,
        }
    }

    /// Trimmed, lower-cased text and industry; sorted, de-duplicated, lower-cased skills;
    /// page and limit at least 1. Salary bounds pass through unchanged.
    pub fn normalized(&self) -> Self {
        let non_blank = |s: &Option<String>| {
            s.as_deref()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };

        let mut skills: Vec<String> = self
            .skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        skills.sort();
        skills.dedup();

        Self {
            text: self.text.trim().to_lowercase(),
            industry: non_blank(&self.industry),
            level: self.level,
            skills,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            id: self
                .id
                .as_deref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            page: self.page.max(1),
            limit: self.limit.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit.max(1) as usize
    }

    /// Deterministic cache key: SHA-256 over a fixed-order rendering of the normalized
    /// query.
    pub fn cache_key(&self) -> String {
        let q = self.normalized();
        let canonical = format!(
            "text={}|industry={}|level={}|skills={}|salary_min={}|salary_max={}|id={}|page={}|limit={}",
            q.text,
            q.industry.as_deref().unwrap_or(""),
            q.level.map(Level::as_str).unwrap_or(""),
            q.skills.join(","),
            q.salary_min.map(|v| v.to_string()).unwrap_or_default(),
            q.salary_max.map(|v| v.to_string()).unwrap_or_default(),
            q.id.as_deref().unwrap_or(""),
            q.page,
            q.limit,
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{KEY_PREFIX}records:{:x}", hasher.finalize())
    }

    /// Evaluate this query against an in-memory record list: filter, rank by text when
    /// present, then paginate. `total` counts matches before pagination.
    pub fn apply_locally(
        &self,
        records: &[CareerRecord],
        scorer: &RelevanceScorer,
        source: SourceKind,
    ) -> RecordSet {
        let q = self.normalized();
        let filtered: Vec<CareerRecord> = records.iter().filter(|r| q.accepts(r)).cloned().collect();

        let ranked: Vec<CareerRecord> = if q.text.is_empty() {
            filtered
        } else {
            scorer
                .rank(&q.text, &filtered)
                .into_iter()
                .map(|s| s.record)
                .collect()
        };

        let total = ranked.len();
        let page: Vec<CareerRecord> = ranked
            .into_iter()
            .skip(q.offset())
            .take(q.limit as usize)
            .collect();
        RecordSet::new(page, total, source)
    }

    /// Expects `self` to be normalized.
    fn accepts(&self, record: &CareerRecord) -> bool {
        if let Some(id) = &self.id {
            if record.id != *id {
                return false;
            }
        }
        if let Some(industry) = &self.industry {
            if !record.industry_tag.trim().eq_ignore_ascii_case(industry) {
                return false;
            }
        }
        if let Some(level) = self.level {
            if record.level != level {
                return false;
            }
        }
        if self.salary_min.is_some() || self.salary_max.is_some() {
            let floor = record.salary_floor();
            if self.salary_min.is_some_and(|min| floor < min)
                || self.salary_max.is_some_and(|max| floor > max)
            {
                return false;
            }
        }
        self.skills.is_empty() || record.shares_skill_with(&self.skills)
    }

    fn remote_params(&self) -> Vec<(&'static str, String)> {
        let q = self.normalized();
        let mut params = vec![("page", q.page.to_string()), ("limit", q.limit.to_string())];
        if !q.text.is_empty() {
            params.push(("q", q.text));
        }
        if let Some(industry) = q.industry {
            params.push(("industry", industry));
        }
        if let Some(level) = q.level {
            params.push(("level", level.as_str().to_string()));
        }
        if !q.skills.is_empty() {
            params.push(("skills", q.skills.join(",")));
        }
        if let Some(min) = q.salary_min {
            params.push(("salary_min", min.to_string()));
        }
        if let Some(max) = q.salary_max {
            params.push(("salary_max", max.to_string()));
        }
        if let Some(id) = q.id {
            params.push(("id", id));
        }
        params
    }
}

// --- Remote ---

/// A career row as served by the catalog service. Accepts both the descriptive field names
/// and the compact ones (`t`, `l`, `s`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteCareerRow {
    pub id: Option<String>,
    #[serde(alias = "t")]
    pub title: Option<String>,
    #[serde(alias = "l")]
    pub level: Option<String>,
    #[serde(default, alias = "d")]
    pub description: Option<String>,
    #[serde(default, alias = "sr", alias = "salaryRange")]
    pub salary_range: Option<String>,
    #[serde(default, alias = "te", alias = "experienceRequirement")]
    pub experience_requirement: Option<String>,
    #[serde(default, alias = "s")]
    pub skills: Vec<String>,
    #[serde(default, alias = "c")]
    pub certifications: Vec<String>,
    #[serde(default, alias = "jt", alias = "jobTitleAliases")]
    pub job_title_aliases: Vec<String>,
    #[serde(default, alias = "r")]
    pub requirements: Option<RemoteRequirements>,
    #[serde(default, alias = "industry", alias = "industryTag")]
    pub industry_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteRequirements {
    #[serde(default, alias = "e")]
    pub education: Vec<String>,
    #[serde(default, alias = "exp")]
    pub experience: Option<String>,
    #[serde(default, alias = "sk")]
    pub skills: Vec<String>,
}

impl TryFrom<RemoteCareerRow> for CareerRecord {
    type Error = ScoringInputError;

    fn try_from(row: RemoteCareerRow) -> Result<Self, Self::Error> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let id = non_blank(row.id).ok_or(ScoringInputError::MissingField { field: "id" })?;
        let title = non_blank(row.title).ok_or(ScoringInputError::MissingField { field: "title" })?;
        let raw_level = non_blank(row.level).ok_or(ScoringInputError::MissingField { field: "level" })?;
        let level = raw_level
            .parse::<Level>()
            .map_err(|_| ScoringInputError::InvalidLevel {
                id: id.clone(),
                level: raw_level,
            })?;

        let requirements = row
            .requirements
            .map(|r| Requirements {
                education: r.education,
                experience: non_blank(r.experience),
                skills: r.skills,
            })
            .unwrap_or_default();

        Ok(CareerRecord {
            id,
            title,
            description: row.description.unwrap_or_default(),
            level,
            salary_range: row.salary_range.unwrap_or_default(),
            experience_requirement: row.experience_requirement.unwrap_or_default(),
            skills: row.skills,
            certifications: row.certifications,
            job_title_aliases: row.job_title_aliases,
            requirements,
            industry_tag: row.industry_tag.unwrap_or_default(),
        })
    }
}

/// One page of rows from the catalog service.
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub rows: Vec<RemoteCareerRow>,
    /// Server-side match count, when reported.
    pub total: Option<usize>,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn fetch_page(&self, query: &CatalogQuery) -> Result<RemotePage, ResolutionError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteBody {
    Page {
        careers: Vec<serde_json::Value>,
        #[serde(default)]
        total: Option<usize>,
    },
    Rows(Vec<serde_json::Value>),
}

/// `GET {base}/careers` on the catalog service.
pub struct HttpCatalogService {
    client: CatalogApiClient,
}

impl HttpCatalogService {
    pub fn new(client: CatalogApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogService for HttpCatalogService {
    async fn fetch_page(&self, query: &CatalogQuery) -> Result<RemotePage, ResolutionError> {
        let body: RemoteBody = self
            .client
            .get_json("careers", &query.remote_params())
            .await
            .map_err(|e| {
                warn!(
                    base_url = %self.client.config().base_url,
                    unreachable = e.is_unreachable(),
                    error = %e,
                    "catalog service request failed"
                );
                ResolutionError::Remote(e.to_string())
            })?;

        let (values, total) = match body {
            RemoteBody::Page { careers, total } => (careers, total),
            RemoteBody::Rows(rows) => (rows, None),
        };

        // Decode row by row so one malformed row does not discard the page.
        let rows = values
            .into_iter()
            .filter_map(|v| {
                serde_json::from_value::<RemoteCareerRow>(v)
                    .inspect_err(|e| warn!(error = %e, "undecodable catalog row skipped"))
                    .ok()
            })
            .collect();
        Ok(RemotePage { rows, total })
    }
}

fn normalize_rows(rows: Vec<RemoteCareerRow>) -> Vec<CareerRecord> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|row| {
            CareerRecord::try_from(row)
                .inspect_err(|e| warn!(error = %e, "catalog row skipped"))
                .ok()
        })
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

// --- Durable snapshot ---

#[derive(Serialize, Deserialize)]
struct CatalogSnapshot {
    version: u32,
    records: Vec<CareerRecord>,
}

/// Durable copy of records previously returned by the remote service.
pub struct SnapshotStore {
    store: Arc<dyn BlobStore>,
    max_records: usize,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_max_records(store, SNAPSHOT_MAX_RECORDS)
    }

    pub fn with_max_records(store: Arc<dyn BlobStore>, max_records: usize) -> Self {
        Self {
            store,
            max_records: max_records.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// All snapshot records. A missing snapshot is empty; an unreadable one is an error.
    pub async fn load(&self) -> Result<Vec<CareerRecord>, ResolutionError> {
        let Some(bytes) = self.store.read_blob(SNAPSHOT_NAMESPACE).await else {
            return Ok(Vec::new());
        };
        let snapshot: CatalogSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| ResolutionError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ResolutionError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot.records)
    }

    /// Merge `records` by id, newest wins, keeping the most recent `max_records`.
    /// An unreadable snapshot is replaced.
    pub async fn merge(&self, records: &[CareerRecord]) -> bool {
        if records.is_empty() {
            return true;
        }
        let _guard = self.write_lock.lock().await;

        let mut merged = self.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "replacing unreadable catalog snapshot");
            Vec::new()
        });
        let incoming: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        merged.retain(|r| !incoming.contains(r.id.as_str()));
        merged.extend(records.iter().cloned());
        if merged.len() > self.max_records {
            let excess = merged.len() - self.max_records;
            merged.drain(..excess);
        }

        let snapshot = CatalogSnapshot {
            version: SNAPSHOT_VERSION,
            records: merged,
        };
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                let written = self.store.write_blob(SNAPSHOT_NAMESPACE, &bytes).await;
                if written {
                    debug!(records = snapshot.records.len(), backend = self.store.backend(), "catalog snapshot updated");
                }
                written
            }
            Err(e) => {
                warn!(error = %e, "failed to encode catalog snapshot");
                false
            }
        }
    }
}

// --- Resolver ---

/// One link of the resolution chain.
pub enum CatalogSource<'a> {
    Remote(Option<&'a dyn CatalogService>),
    Snapshot(&'a SnapshotStore),
    Bundled(&'a BundledCatalog),
}

impl CatalogSource<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            CatalogSource::Remote(_) => SourceKind::Remote,
            CatalogSource::Snapshot(_) => SourceKind::CachedSnapshot,
            CatalogSource::Bundled(_) => SourceKind::Bundled,
        }
    }

    async fn fetch(
        &self,
        query: &CatalogQuery,
        scorer: &RelevanceScorer,
    ) -> Result<RecordSet, ResolutionError> {
        match self {
            CatalogSource::Remote(None) => Err(ResolutionError::Disabled(SourceKind::Remote)),
            CatalogSource::Remote(Some(service)) => {
                let page = service.fetch_page(query).await?;
                let mut records = normalize_rows(page.rows);
                let total = page.total.unwrap_or(records.len()).max(records.len());
                let limit = query.normalized().limit as usize;
                if records.len() > limit {
                    debug!(rows = records.len(), limit, "remote page over limit, truncated");
                    records.truncate(limit);
                }
                Ok(RecordSet::new(records, total, SourceKind::Remote))
            }
            CatalogSource::Snapshot(store) => {
                let records = store.load().await?;
                Ok(query.apply_locally(&records, scorer, SourceKind::CachedSnapshot))
            }
            CatalogSource::Bundled(catalog) => {
                Ok(query.apply_locally(catalog.records(), scorer, SourceKind::Bundled))
            }
        }
    }
}

pub struct SourceResolver {
    remote: Option<Arc<dyn CatalogService>>,
    snapshot: SnapshotStore,
    bundled: BundledCatalog,
    scorer: Arc<RelevanceScorer>,
}

impl SourceResolver {
    pub fn new(
        remote: Option<Arc<dyn CatalogService>>,
        snapshot: SnapshotStore,
        bundled: BundledCatalog,
        scorer: Arc<RelevanceScorer>,
    ) -> Self {
        Self {
            remote,
            snapshot,
            bundled,
            scorer,
        }
    }

    fn chain(&self) -> [CatalogSource<'_>; 3] {
        [
            CatalogSource::Remote(self.remote.as_deref()),
            CatalogSource::Snapshot(&self.snapshot),
            CatalogSource::Bundled(&self.bundled),
        ]
    }

    /// Resolve `query` through the source chain. Never fails.
    pub async fn resolve(&self, query: &CatalogQuery) -> RecordSet {
        for source in self.chain() {
            let kind = source.kind();
            match source.fetch(query, &self.scorer).await {
                Ok(set) if !set.is_empty() => {
                    if kind == SourceKind::Remote {
                        self.snapshot.merge(&set.records).await;
                    }
                    info!(source = %kind, records = set.records.len(), total = set.total, "records resolved");
                    return set;
                }
                Ok(_) => debug!(source = %kind, "source returned no records"),
                Err(ResolutionError::Disabled(_)) => debug!(source = %kind, "source disabled"),
                Err(e) => warn!(source = %kind, error = %e, "source failed, falling through"),
            }
        }
        debug!("all sources exhausted");
        RecordSet::empty()
    }
}


#[cfg(test)]
mod tests {
    use career_common::storage::MemoryBlobStore;

    use super::testing::FakeCatalog;
    use super::*;
    use crate::model::fixtures::{record, strings};
    use crate::seed::Dataset;
    use crate::tuning::ScoringWeights;

    fn scorer() -> Arc<RelevanceScorer> {
        Arc::new(RelevanceScorer::new(ScoringWeights::default()))
    }

    fn empty_bundle() -> BundledCatalog {
        Dataset::from_records("empty", 1, Vec::new())
    }

    fn resolver(
        remote: Option<Arc<FakeCatalog>>,
        store: Arc<MemoryBlobStore>,
        bundled: BundledCatalog,
    ) -> SourceResolver {
        SourceResolver::new(
            remote.map(|r| r as Arc<dyn CatalogService>),
            SnapshotStore::new(store),
            bundled,
            scorer(),
        )
    }

    fn remote_records() -> Vec<CareerRecord> {
        vec![
            record("rust-dev", "Rust Developer", Level::Intermediate, &["Rust", "Git"]),
            record("go-dev", "Go Developer", Level::Intermediate, &["Go", "Git"]),
        ]
    }

    #[test]
    fn cache_key_ignores_skill_order_case_and_whitespace() {
        let filters_a = SearchFilters {
            industry: Some(" Tech ".to_string()),
            level: Some(Level::Entry),
            skills: strings(&["SQL", "python", "Python"]),
            ..SearchFilters::default()
        };
        let filters_b = SearchFilters {
            industry: Some("tech".to_string()),
            level: Some(Level::Entry),
            skills: strings(&["python ", "sql"]),
            ..SearchFilters::default()
        };
        let a = CatalogQuery::search("  Data Analyst", &filters_a, 1, 20);
        let b = CatalogQuery::search("data analyst ", &filters_b, 1, 20);

        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("career:v1:records:"));

        let next_page = CatalogQuery::search("data analyst", &filters_b, 2, 20);
        assert_ne!(a.cache_key(), next_page.cache_key());
        let other_level = CatalogQuery::search(
            "data analyst",
            &SearchFilters {
                level: Some(Level::Expert),
                ..filters_b.clone()
            },
            1,
            20,
        );
        assert_ne!(a.cache_key(), other_level.cache_key());
        let salary_floor = CatalogQuery::search(
            "data analyst",
            &SearchFilters {
                salary_min: Some(60_000),
                ..filters_b.clone()
            },
            1,
            20,
        );
        assert_ne!(a.cache_key(), salary_floor.cache_key());
    }

    #[test]
    fn salary_bounds_filter_on_the_range_floor() {
        let salaried = |id: &str, range: &str| {
            let mut r = record(id, id, Level::Intermediate, &["Excel"]);
            r.salary_range = range.to_string();
            r
        };
        let records = vec![
            salaried("low", "$40,000 - $55,000"),
            salaried("mid", "$65,000 - $95,000"),
            salaried("high", "$120,000 - $170,000"),
            salaried("unlisted", "Varies"),
        ];
        let ids = |filters: SearchFilters| -> Vec<String> {
            CatalogQuery::search("", &filters, 1, 20)
                .apply_locally(&records, &scorer(), SourceKind::Bundled)
                .records
                .into_iter()
                .map(|r| r.id)
                .collect()
        };

        let at_least_65k = SearchFilters {
            salary_min: Some(65_000),
            ..SearchFilters::default()
        };
        assert_eq!(ids(at_least_65k), vec!["mid", "high"]);

        // An unparsable range counts as a floor of 0.
        let at_most_65k = SearchFilters {
            salary_max: Some(65_000),
            ..SearchFilters::default()
        };
        assert_eq!(ids(at_most_65k), vec!["low", "mid", "unlisted"]);

        let band = SearchFilters {
            salary_min: Some(50_000),
            salary_max: Some(100_000),
            ..SearchFilters::default()
        };
        assert_eq!(ids(band), vec!["mid"]);
    }

    #[test]
    fn local_evaluation_filters_ranks_and_paginates() {
        let mut records: Vec<CareerRecord> = (0..5)
            .map(|i| {
                let mut r = record(&format!("dev{i}"), &format!("Developer {i}"), Level::Entry, &["Git"]);
                r.industry_tag = "tech".to_string();
                r
            })
            .collect();
        let mut nurse = record("nurse", "Nurse", Level::Entry, &["Patient Care"]);
        nurse.industry_tag = "healthcare".to_string();
        records.push(nurse);

        let filters = SearchFilters {
            industry: Some("TECH".to_string()),
            ..SearchFilters::default()
        };
        let set = CatalogQuery::search("developer", &filters, 2, 2).apply_locally(
            &records,
            &scorer(),
            SourceKind::Bundled,
        );
        assert_eq!(set.total, 5);
        let ids: Vec<&str> = set.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["dev2", "dev3"]);
        assert_eq!(set.source, SourceKind::Bundled);

        let by_id = CatalogQuery::by_id("nurse").apply_locally(&records, &scorer(), SourceKind::Bundled);
        assert_eq!(by_id.records.len(), 1);

        let no_match = CatalogQuery::search("astronaut", &SearchFilters::default(), 1, 10)
            .apply_locally(&records, &scorer(), SourceKind::Bundled);
        assert!(no_match.is_empty());
        assert_eq!(no_match.total, 0);
    }

    #[test]
    fn remote_rows_normalize_or_are_rejected() {
        let row: RemoteCareerRow = serde_json::from_str(
            r#"{"id":"pm","t":"Project Manager","l":"I","s":["Scrum"],"r":{"e":["BA"],"exp":"3 years","sk":["Scrum"]}}"#,
        )
        .unwrap();
        let record = CareerRecord::try_from(row).unwrap();
        assert_eq!(record.title, "Project Manager");
        assert_eq!(record.level, Level::Intermediate);
        assert_eq!(record.requirements.experience.as_deref(), Some("3 years"));
        assert!(record.certifications.is_empty());

        let missing: RemoteCareerRow = serde_json::from_str(r#"{"id":"x","level":"entry"}"#).unwrap();
        assert!(matches!(
            CareerRecord::try_from(missing),
            Err(ScoringInputError::MissingField { field: "title" })
        ));

        let bad_level: RemoteCareerRow =
            serde_json::from_str(r#"{"id":"x","title":"X","level":"senior"}"#).unwrap();
        assert!(matches!(
            CareerRecord::try_from(bad_level),
            Err(ScoringInputError::InvalidLevel { .. })
        ));
    }

    #[tokio::test]
    async fn remote_success_is_written_through_to_snapshot() {
        let remote = Arc::new(FakeCatalog::serving(remote_records()));
        let store = Arc::new(MemoryBlobStore::new());
        let chain = resolver(Some(remote.clone()), store.clone(), empty_bundle());

        let set = chain.resolve(&CatalogQuery::pool(50)).await;
        assert_eq!(set.source, SourceKind::Remote);
        assert_eq!(set.records.len(), 2);
        assert_eq!(remote.calls(), 1);

        let snapshot = SnapshotStore::new(store).load().await.unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn oversized_remote_page_is_cut_to_limit() {
        let rows: Vec<CareerRecord> = (0..25)
            .map(|i| record(&format!("dev{i}"), &format!("Developer {i}"), Level::Entry, &["Git"]))
            .collect();
        let remote = Arc::new(FakeCatalog::serving(rows).ignoring_paging());
        let chain = resolver(Some(remote), Arc::new(MemoryBlobStore::new()), empty_bundle());

        let query = CatalogQuery::search("developer", &SearchFilters::default(), 1, 5);
        let set = chain.resolve(&query).await;
        assert_eq!(set.source, SourceKind::Remote);
        assert_eq!(set.records.len(), 5);
        assert_eq!(set.total, 25);
        assert_eq!(set.records[0].id, "dev0");
    }

    #[tokio::test]
    async fn snapshot_serves_when_remote_fails() {
        let remote = Arc::new(FakeCatalog::serving(remote_records()));
        let store = Arc::new(MemoryBlobStore::new());
        let chain = resolver(Some(remote.clone()), store, Dataset::bundled_catalog());

        chain.resolve(&CatalogQuery::pool(50)).await;
        remote.set_failing(true);

        let query = CatalogQuery::search("rust", &SearchFilters::default(), 1, 20);
        let set = chain.resolve(&query).await;
        assert_eq!(set.source, SourceKind::CachedSnapshot);
        assert_eq!(set.records[0].id, "rust-dev");
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn bundled_catalog_is_the_last_resort() {
        let remote = Arc::new(FakeCatalog::failing());
        let store = Arc::new(MemoryBlobStore::new());
        store.write_blob(SNAPSHOT_NAMESPACE, b"{not json").await;
        let chain = resolver(Some(remote.clone()), store, Dataset::bundled_catalog());

        let query = CatalogQuery::search("nurse", &SearchFilters::default(), 1, 20);
        let set = chain.resolve(&query).await;
        assert_eq!(set.source, SourceKind::Bundled);
        assert!(!set.is_empty());
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_returns_empty_after_one_attempt_each() {
        let remote = Arc::new(FakeCatalog::serving(Vec::new()));
        let chain = resolver(Some(remote.clone()), Arc::new(MemoryBlobStore::new()), empty_bundle());

        let set = chain.resolve(&CatalogQuery::pool(10)).await;
        assert_eq!(set, RecordSet::empty());
        assert_eq!(remote.calls(), 1);

        // Without a remote configured the chain still resolves locally.
        let local_only = resolver(None, Arc::new(MemoryBlobStore::new()), Dataset::bundled_catalog());
        let set = local_only.resolve(&CatalogQuery::by_id("registered-nurse")).await;
        assert_eq!(set.source, SourceKind::Bundled);
        assert_eq!(set.records[0].id, "registered-nurse");
    }

    #[tokio::test]
    async fn snapshot_merge_keeps_newest_and_caps_size() {
        let store = Arc::new(MemoryBlobStore::new());
        let snapshot = SnapshotStore::with_max_records(store, 3);

        snapshot
            .merge(&[
                record("a", "A v1", Level::Entry, &[]),
                record("b", "B", Level::Entry, &[]),
            ])
            .await;
        snapshot
            .merge(&[
                record("a", "A v2", Level::Entry, &[]),
                record("c", "C", Level::Entry, &[]),
                record("d", "D", Level::Entry, &[]),
            ])
            .await;

        let records = snapshot.load().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(records[0].title, "A v2");
    }
}
