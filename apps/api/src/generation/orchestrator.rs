//! Stage orchestration — one model call per stage, outputs threaded forward.
//!
//! Flow: analyze → generate projects → (backstories | learning resources).
//!
//! Each function takes the session by `&mut` and only writes to it after its
//! model call succeeded, so a provider failure leaves the session exactly as
//! it was before the action.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::parser::{
    parse_classification, split_projects, BackstoryView, Classification, HeadingStyle, ProjectSet,
    SeniorityLevel,
};
use crate::generation::prompts::{PromptParams, PromptTemplate};
use crate::llm_client::TextModel;
use crate::session::{estimate_tokens, JobContext, SessionState};

/// Substituted when the user leaves the company name blank.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
const BLANK_COMPANY_WARNING: &str = "Please enter a company name for better results.";

/// Raw user input for an analysis run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSubmission {
    #[serde(default)]
    pub company_name: String,
    pub job_description: String,
}

/// Outcome of the analysis stage.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub classification: Classification,
    /// Seniority mapped onto the four standard levels, when recognizable.
    pub canonical_seniority: Option<SeniorityLevel>,
    /// Classification fields that fell back to defaults.
    pub fallback_fields: Vec<&'static str>,
    /// Input substitutions made before analysis ran.
    pub warnings: Vec<String>,
}

/// Applies the input policy: an empty job description is rejected, a blank
/// company name is replaced with a placeholder and a warning.
pub fn prepare_job(submission: JobSubmission) -> Result<(JobContext, Vec<String>), AppError> {
    if submission.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let mut warnings = Vec::new();
    let company_name = match submission.company_name.trim() {
        "" => {
            warn!("Blank company name, using '{UNKNOWN_COMPANY}'");
            warnings.push(BLANK_COMPANY_WARNING.to_string());
            UNKNOWN_COMPANY.to_string()
        }
        name => name.to_string(),
    };

    Ok((
        JobContext {
            company_name,
            job_description: submission.job_description,
        },
        warnings,
    ))
}

/// Idle → Analyzed. One model call; classification is best-effort.
pub async fn analyze_job(
    model: &dyn TextModel,
    state: &mut SessionState,
    submission: JobSubmission,
) -> Result<AnalysisReport, AppError> {
    let (job, warnings) = prepare_job(submission)?;

    info!("Analyzing job description for {}", job.company_name);
    let template = PromptTemplate::JobAnalysis;
    let prompt = template.render(
        &PromptParams::new()
            .with("company_name", &job.company_name)
            .with("job_description", &job.job_description),
    )?;
    let raw = model.complete(&prompt, template.max_output_tokens()).await?;

    let extraction = parse_classification(&raw);
    let fallback_fields = extraction.fallback_fields();
    if !fallback_fields.is_empty() {
        warn!("Analysis response missing {fallback_fields:?}, defaults substituted");
    }

    let classification = extraction.into_classification();
    let canonical_seniority = classification.canonical_seniority();
    if canonical_seniority.is_none() {
        warn!(
            "Seniority '{}' is not a standard level; passing it through unchanged",
            classification.seniority
        );
    }
    let query_tokens = estimate_tokens(&job.job_description);
    state.record_analysis(job, classification.clone());
    state.usage_mut().record_query(query_tokens);

    info!(
        "Job analyzed: industry={}, domain={}, seniority={}",
        classification.industry, classification.domain, classification.seniority
    );

    Ok(AnalysisReport {
        classification,
        canonical_seniority,
        fallback_fields,
        warnings,
    })
}

/// Analyzed → ProjectsGenerated. One model call. Replaces any earlier
/// projects and drops backstories and resources derived from them.
pub async fn generate_projects(
    model: &dyn TextModel,
    state: &mut SessionState,
) -> Result<(), AppError> {
    let (job, classification) = match (state.job(), state.classification()) {
        (Some(job), Some(classification)) => (job, classification),
        _ => {
            return Err(AppError::Conflict(
                "Analyze a job description before generating projects".to_string(),
            ))
        }
    };

    info!(
        "Generating projects for {} - {}",
        classification.industry, classification.domain
    );
    let template = PromptTemplate::ProjectGeneration;
    let prompt = template.render(
        &PromptParams::new()
            .with("industry", &classification.industry)
            .with("domain", &classification.domain)
            .with("company_name", &job.company_name)
            .with("job_description", &job.job_description)
            .with("seniority", &classification.seniority),
    )?;
    let raw = model.complete(&prompt, template.max_output_tokens()).await?;

    let projects = split_projects(&raw);
    if projects.heading_style == HeadingStyle::None {
        warn!("No project headings found in generation response; keeping raw text");
    }
    info!(
        "Generated {} projects ({:?} headings)",
        projects.projects.len(),
        projects.heading_style
    );

    state.usage_mut().record_response(estimate_tokens(&raw));
    state.record_projects(projects);
    Ok(())
}

/// The "generate resume projects" action: analysis followed by project generation.
pub async fn submit_job(
    model: &dyn TextModel,
    state: &mut SessionState,
    submission: JobSubmission,
) -> Result<AnalysisReport, AppError> {
    let report = analyze_job(model, state, submission).await?;
    generate_projects(model, state).await?;
    Ok(report)
}

/// ProjectsGenerated → BackstoriesGenerated. Refused once backstories exist.
pub async fn generate_backstories(
    model: &dyn TextModel,
    state: &mut SessionState,
) -> Result<(), AppError> {
    if state.backstories().is_some() {
        return Err(AppError::Conflict(
            "Backstories have already been generated for these projects".to_string(),
        ));
    }
    let (job, classification, projects) = downstream_inputs(state)?;

    info!("Generating backstories for {} projects", projects.projects.len());
    let template = PromptTemplate::BackstoryGeneration;
    let prompt = template.render(
        &PromptParams::new()
            .with("industry", &classification.industry)
            .with("domain", &classification.domain)
            .with("company_name", &job.company_name)
            .with("projects", &projects.raw)
            .with("seniority", &classification.seniority),
    )?;
    let raw = model.complete(&prompt, template.max_output_tokens()).await?;

    state.usage_mut().record_response(estimate_tokens(&raw));
    state.record_backstories(raw);

    if let Some(BackstoryView::Unparsed { .. }) = state.backstory_view() {
        warn!("Backstory count does not match project count; showing unparsed text");
    }
    Ok(())
}

/// ProjectsGenerated → ResourcesGenerated. Refused once a guide exists.
pub async fn generate_resources(
    model: &dyn TextModel,
    state: &mut SessionState,
) -> Result<(), AppError> {
    if state.resources().is_some() {
        return Err(AppError::Conflict(
            "Learning resources have already been generated for these projects".to_string(),
        ));
    }
    let (job, classification, projects) = downstream_inputs(state)?;

    info!("Generating learning resources");
    let template = PromptTemplate::LearningResources;
    let prompt = template.render(
        &PromptParams::new()
            .with("industry", &classification.industry)
            .with("domain", &classification.domain)
            .with("company_name", &job.company_name)
            .with("projects", &projects.raw)
            .with("job_description", &job.job_description)
            .with("seniority", &classification.seniority),
    )?;
    let raw = model.complete(&prompt, template.max_output_tokens()).await?;

    state.usage_mut().record_response(estimate_tokens(&raw));
    state.record_resources(raw);
    Ok(())
}

/// Inputs shared by the backstory and learning-resource stages.
fn downstream_inputs(
    state: &SessionState,
) -> Result<(&JobContext, &Classification, &ProjectSet), AppError> {
    match (state.job(), state.classification(), state.projects()) {
        (Some(job), Some(classification), Some(projects)) => Ok((job, classification, projects)),
        _ => Err(AppError::Conflict(
            "Generate projects before this step".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::parser::DEFAULT_SENIORITY;
    use crate::llm_client::scripted::ScriptedModel;
    use crate::session::{GeneratedFlags, Stage};

    const ANALYSIS: &str = "Industry: Retail\nDomain: Supply Chain\nSeniority: Senior\n";
    const PROJECTS: &str = "### Project 1: Forecasting\n* Cut waste **12%**\n\n### Project 2: Vendor Scorecards\n* Cut delays **20%**\n";
    const BACKSTORIES: &str = "PROJECT BACKSTORY: Spreadsheets everywhere.\nPROJECT BACKSTORY: No vendor metrics.\n";

    fn submission(company: &str, jd: &str) -> JobSubmission {
        JobSubmission {
            company_name: company.to_string(),
            job_description: jd.to_string(),
        }
    }

    async fn with_projects(model: &ScriptedModel) -> SessionState {
        let mut state = SessionState::new();
        submit_job(model, &mut state, submission("Acme", "Forecast demand for stores."))
            .await
            .unwrap();
        state
    }

    #[test]
    fn test_empty_job_description_is_rejected() {
        let err = prepare_job(submission("Acme", "   \n")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_blank_company_gets_placeholder_and_warning() {
        let (job, warnings) = prepare_job(submission("  ", "Build pipelines.")).unwrap();
        assert_eq!(job.company_name, UNKNOWN_COMPANY);
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_records_classification_and_query_tokens() {
        let model = ScriptedModel::new().reply(ANALYSIS);
        let mut state = SessionState::new();
        let jd = "x".repeat(41);

        let report = analyze_job(&model, &mut state, submission("Acme", &jd))
            .await
            .unwrap();

        assert_eq!(report.classification.industry, "Retail");
        assert_eq!(report.canonical_seniority, Some(SeniorityLevel::Senior));
        assert!(report.fallback_fields.is_empty());
        assert_eq!(state.stage(), Stage::Analyzed);
        assert_eq!(state.usage().query_tokens, 10);
        assert_eq!(state.usage().tokens_consumed, 10);
        assert_eq!(state.usage().response_tokens, 0);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("role at Acme"));
        assert_eq!(calls[0].1, 2000);
    }

    #[tokio::test]
    async fn test_unparseable_analysis_degrades_to_defaults() {
        let model = ScriptedModel::new().reply("Sorry, I can't tell.");
        let mut state = SessionState::new();

        let report = analyze_job(&model, &mut state, submission("Acme", "Do things."))
            .await
            .unwrap();

        assert_eq!(report.classification.seniority, DEFAULT_SENIORITY);
        assert_eq!(report.fallback_fields, vec!["industry", "domain", "seniority"]);
    }

    #[tokio::test]
    async fn test_submit_makes_two_calls_threading_classification() {
        let model = ScriptedModel::new().reply(ANALYSIS).reply(PROJECTS);
        let state = with_projects(&model).await;

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0.contains("deep knowledge of Retail and specifically Supply Chain"));
        assert!(calls[1].0.contains("seniority level is Senior"));

        assert_eq!(state.stage(), Stage::ProjectsGenerated);
        assert_eq!(state.projects().unwrap().projects.len(), 2);
        assert_eq!(
            state.usage().response_tokens,
            estimate_tokens(PROJECTS)
        );
    }

    #[tokio::test]
    async fn test_projects_require_analysis() {
        let model = ScriptedModel::new();
        let mut state = SessionState::new();
        let err = generate_projects(&model, &mut state).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backstories_use_project_text_and_pair() {
        let model = ScriptedModel::new()
            .reply(ANALYSIS)
            .reply(PROJECTS)
            .reply(BACKSTORIES);
        let mut state = with_projects(&model).await;

        generate_backstories(&model, &mut state).await.unwrap();

        let calls = model.calls();
        assert!(calls[2].0.contains("### Project 2: Vendor Scorecards"));
        assert_eq!(calls[2].1, 8000);
        match state.backstory_view().unwrap() {
            BackstoryView::Paired { items } => {
                assert_eq!(items[0].project_title, "Forecasting");
                assert_eq!(items[1].backstory, "No vendor metrics.");
            }
            other => panic!("expected pairing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_backstories_cannot_be_triggered_twice() {
        let model = ScriptedModel::new()
            .reply(ANALYSIS)
            .reply(PROJECTS)
            .reply(BACKSTORIES);
        let mut state = with_projects(&model).await;
        generate_backstories(&model, &mut state).await.unwrap();

        let err = generate_backstories(&model, &mut state).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_resources_include_job_description() {
        let model = ScriptedModel::new()
            .reply(ANALYSIS)
            .reply(PROJECTS)
            .reply("## KEY TERMINOLOGY EXPLAINED\n- OTIF");
        let mut state = with_projects(&model).await;

        generate_resources(&model, &mut state).await.unwrap();

        assert!(model.calls()[2].0.contains("Forecast demand for stores."));
        assert_eq!(state.resources(), Some("## KEY TERMINOLOGY EXPLAINED\n- OTIF"));
        assert!(state.flags().resources);
        assert!(!state.flags().backstories);
    }

    #[tokio::test]
    async fn test_resources_require_projects() {
        let model = ScriptedModel::new().reply(ANALYSIS);
        let mut state = SessionState::new();
        analyze_job(&model, &mut state, submission("Acme", "Do things."))
            .await
            .unwrap();

        let err = generate_resources(&model, &mut state).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_regenerating_projects_resets_downstream() {
        let model = ScriptedModel::new()
            .reply(ANALYSIS)
            .reply(PROJECTS)
            .reply(BACKSTORIES)
            .reply("guide")
            .reply(PROJECTS);
        let mut state = with_projects(&model).await;
        generate_backstories(&model, &mut state).await.unwrap();
        generate_resources(&model, &mut state).await.unwrap();

        generate_projects(&model, &mut state).await.unwrap();

        assert_eq!(
            state.flags(),
            GeneratedFlags {
                projects: true,
                backstories: false,
                resources: false,
            }
        );
        assert!(state.backstories().is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_session_untouched() {
        let model = ScriptedModel::new().reply(ANALYSIS).reply(PROJECTS).fail(503);
        let mut state = with_projects(&model).await;
        let usage_before = state.usage();

        let err = generate_backstories(&model, &mut state).await.unwrap_err();

        assert!(matches!(err, AppError::Llm(_)));
        assert!(!state.flags().backstories);
        assert_eq!(state.usage(), usage_before);
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_completed_analysis() {
        let model = ScriptedModel::new().reply(ANALYSIS).fail(500);
        let mut state = SessionState::new();

        let err = submit_job(&model, &mut state, submission("Acme", "Do things."))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Llm(_)));
        assert_eq!(state.stage(), Stage::Analyzed);
    }
}
