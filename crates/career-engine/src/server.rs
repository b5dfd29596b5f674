/// MCP server exposing the career service.
///
/// Tools:
/// - `search_careers`: ranked, paginated career search with suggestions
/// - `get_career`: full record by id
/// - `get_recommendations`: career paths, skill-development plan and roadmap for a profile
/// - `get_transition_suggestions`: lateral, level-up and skill-based next steps
/// - `invalidate_cache`: drop every cached result
/// - `cache_stats`: cache size and hit counters
use std::collections::HashMap;
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use career_common::mcp_api::{
    CacheStatsResponse, CareerDetailResponse, CareerPathMatch, CareerRequirements, CareerSummary,
    GetCareerParams, InvalidateCacheResponse, RecommendationParams, RecommendationResponse,
    Roadmap, SearchCareersParams, SearchCareersResponse, SkillDevelopmentItem, TransitionItem as ApiTransitionItem,
    TransitionParams, TransitionResponse,
};

use crate::error::AppError;
use crate::model::{format_dollars, CareerRecord, ExperienceLevel, Level, SearchFilters, UserProfile};
use crate::recommend::{CareerMatch, Recommendation, SkillGap};
use crate::resolver::DEFAULT_PAGE_LIMIT;
use crate::service::{CareerService, RequestGeneration};
use crate::transition::TransitionItem;

/// Sessions tracked for superseded-search detection before the table is reset.
const MAX_SESSIONS: usize = 1024;

#[derive(Clone)]
pub struct CareerServer {
    service: Arc<CareerService>,
    sessions: Arc<Mutex<HashMap<String, Arc<RequestGeneration>>>>,
    tool_router: ToolRouter<CareerServer>,
}

impl CareerServer {
    pub fn new(service: Arc<CareerService>) -> Self {
        Self {
            service,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            tool_router: Self::tool_router(),
        }
    }

    async fn generation(&self, session: &str) -> Arc<RequestGeneration> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= MAX_SESSIONS && !sessions.contains_key(session) {
            warn!(sessions = sessions.len(), "session table full, resetting");
            sessions.clear();
        }
        Arc::clone(sessions.entry(session.to_string()).or_default())
    }
}

#[tool_router]
impl CareerServer {
    #[tool(description = "Search careers by free text with optional industry, level, skill and salary filters. Returns a ranked page of careers, the total match count, whether more pages exist, and query suggestions.")]
    async fn search_careers(
        &self,
        Parameters(params): Parameters<SearchCareersParams>,
    ) -> Result<Json<SearchCareersResponse>, String> {
        let filters = search_filters(&params)?;
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        let session = params.session.filter(|s| !s.trim().is_empty());
        let result = match session {
            Some(session) => {
                let generation = self.generation(&session).await;
                self.service
                    .search_latest(&generation, &params.query, &filters, page, limit)
                    .await
                    .ok_or_else(|| {
                        AppError::InvalidRequest(format!(
                            "search superseded by a newer search in session '{session}'"
                        ))
                        .to_string()
                    })?
            }
            None => {
                self.service
                    .search_careers(&params.query, &filters, page, limit)
                    .await
            }
        };

        Ok(Json(SearchCareersResponse {
            careers: result.records.iter().map(to_summary).collect(),
            total: result.total,
            has_more: result.has_more,
            suggestions: result.suggestions,
        }))
    }

    #[tool(description = "Get the full details of a career by id (e.g. 'software-engineer'), including requirements, certifications and alternative job titles.")]
    async fn get_career(
        &self,
        Parameters(params): Parameters<GetCareerParams>,
    ) -> Result<Json<CareerDetailResponse>, String> {
        let career_id = params.career_id.trim().to_string();
        if career_id.is_empty() {
            return Err(AppError::InvalidRequest("career_id must not be empty".to_string()).to_string());
        }

        let record = self
            .service
            .get_career_by_id(&career_id)
            .await
            .ok_or_else(|| AppError::NotFound(career_id.clone()).to_string())?;

        Ok(Json(to_detail(&record)))
    }

    #[tool(description = "Recommend careers for a user's skills, experience level and career goal. Returns matching career paths with skill gaps, a prioritized skill-development plan and a short/medium/long-term roadmap.")]
    async fn get_recommendations(
        &self,
        Parameters(params): Parameters<RecommendationParams>,
    ) -> Result<Json<RecommendationResponse>, String> {
        let experience = params
            .experience_level
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .and_then(|e| {
                e.parse::<ExperienceLevel>()
                    .inspect_err(|err| warn!(error = %err, "ignoring experience level"))
                    .ok()
            });

        let profile = UserProfile {
            skills: params.skills,
            experience,
            career_goal: params.career_goal.filter(|g| !g.trim().is_empty()),
        };

        let recommendation = self.service.get_recommendations(&profile).await;
        Ok(Json(to_recommendation_response(recommendation)))
    }

    #[tool(description = "Suggest next career steps from a current level: lateral moves at the same level, level-up roles one level above, and skill-based moves sharing skills with the current career. With a target level, roles outside current..=target are marked locked.")]
    async fn get_transition_suggestions(
        &self,
        Parameters(params): Parameters<TransitionParams>,
    ) -> Result<Json<TransitionResponse>, String> {
        let current_level = parse_level(Some(params.current_level.as_str()), "current_level")?.ok_or_else(|| {
            AppError::InvalidRequest("current_level must not be empty".to_string()).to_string()
        })?;
        let target_level = parse_level(params.target_level.as_deref(), "target_level")?;
        let current_career_id = params
            .current_career_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let buckets = self
            .service
            .get_transition_suggestions(current_level, target_level, current_career_id, params.skills)
            .await;

        Ok(Json(TransitionResponse {
            lateral: buckets.lateral.iter().map(to_transition_item).collect(),
            level_up: buckets.level_up.iter().map(to_transition_item).collect(),
            skill_based: buckets.skill_based.iter().map(to_transition_item).collect(),
        }))
    }

    #[tool(description = "Drop every cached career result so the next request of any kind is resolved again from the catalog.")]
    async fn invalidate_cache(&self) -> Result<Json<InvalidateCacheResponse>, String> {
        info!("invalidate_cache tool invoked");
        let invalidated_entries = self.service.invalidate_all();
        Ok(Json(InvalidateCacheResponse { invalidated_entries }))
    }

    #[tool(description = "Report cache size, capacity, hit/miss counters, coalesced loads and expired entries.")]
    async fn cache_stats(&self) -> Result<Json<CacheStatsResponse>, String> {
        let stats = self.service.cache_stats();
        Ok(Json(CacheStatsResponse {
            size: stats.size,
            max_size: stats.max_size,
            hits: stats.hits,
            misses: stats.misses,
            coalesced: stats.coalesced,
            expired_entries: stats.expired_entries,
        }))
    }
}

/// Blank or missing values are `None`; anything else must name a level.
fn parse_level(raw: Option<&str>, field: &str) -> Result<Option<Level>, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<Level>()
            .map(Some)
            .map_err(|e| AppError::InvalidRequest(format!("{field}: {e}")).to_string()),
    }
}

fn search_filters(params: &SearchCareersParams) -> Result<SearchFilters, String> {
    if let (Some(min), Some(max)) = (params.salary_min, params.salary_max) {
        if min > max {
            return Err(AppError::InvalidRequest(format!(
                "salary_min ({min}) is above salary_max ({max})"
            ))
            .to_string());
        }
    }
    Ok(SearchFilters {
        industry: params.industry.clone().filter(|i| !i.trim().is_empty()),
        level: parse_level(params.level.as_deref(), "level")?,
        skills: params.skills.clone(),
        salary_min: params.salary_min,
        salary_max: params.salary_max,
    })
}

fn to_summary(record: &CareerRecord) -> CareerSummary {
    CareerSummary {
        id: record.id.clone(),
        title: record.title.clone(),
        level: record.level.to_string(),
        industry: record.industry_tag.clone(),
        salary_range: record.salary_range.clone(),
        skills: record.skills.clone(),
    }
}

fn to_detail(record: &CareerRecord) -> CareerDetailResponse {
    CareerDetailResponse {
        id: record.id.clone(),
        title: record.title.clone(),
        description: record.description.clone(),
        level: record.level.to_string(),
        industry: record.industry_tag.clone(),
        salary_range: record.salary_range.clone(),
        experience_requirement: record.experience_requirement.clone(),
        skills: record.skills.clone(),
        certifications: record.certifications.clone(),
        job_title_aliases: record.job_title_aliases.clone(),
        requirements: CareerRequirements {
            education: record.requirements.education.clone(),
            experience: record.requirements.experience.clone(),
            skills: record.requirements.skills.clone(),
        },
    }
}

fn to_path_match(m: &CareerMatch) -> CareerPathMatch {
    CareerPathMatch {
        career: to_summary(&m.record),
        match_ratio: m.ratio,
        match_percent: m.percent(),
        matched_skills: m.matched_skills.clone(),
        missing_skills: m.missing_skills.clone(),
        reasons: m.reasons.clone(),
        estimated_salary: m.estimated_salary.map(format_dollars),
        time_to_transition: m.time_to_transition.to_string(),
    }
}

fn to_plan_item(gap: &SkillGap) -> SkillDevelopmentItem {
    SkillDevelopmentItem {
        skill: gap.skill.clone(),
        priority: gap.priority.to_string(),
        frequency: gap.frequency,
        timeline: gap.priority.timeline().to_string(),
    }
}

fn to_recommendation_response(rec: Recommendation) -> RecommendationResponse {
    RecommendationResponse {
        career_paths: rec.career_paths.iter().map(to_path_match).collect(),
        skill_development: rec.skill_development.iter().map(to_plan_item).collect(),
        roadmap: Roadmap {
            short_term: rec.roadmap.short_term,
            medium_term: rec.roadmap.medium_term,
            long_term: rec.roadmap.long_term,
        },
    }
}

fn to_transition_item(item: &TransitionItem) -> ApiTransitionItem {
    ApiTransitionItem {
        career: to_summary(&item.record),
        locked: item.locked,
    }
}

#[tool_handler]
impl ServerHandler for CareerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "career-engine".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Career catalog MCP server. Use search_careers to find careers by keyword \
                 and filters, get_career for full details, get_recommendations to match a \
                 skill profile to career paths, and get_transition_suggestions for next \
                 steps from a current level. Results are cached; invalidate_cache forces \
                 fresh lookups and cache_stats reports cache health."
                    .to_string(),
            ),
        }
    }
}
