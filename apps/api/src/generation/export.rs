//! Plain-text results document offered for download once projects exist.

use crate::session::SessionState;

/// A rendered download: file name plus UTF-8 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsDocument {
    pub file_name: String,
    pub body: String,
}

/// `resume_projects_<company>.txt`, spaces turned into underscores.
///
/// Quotes, backslashes and control characters are replaced as well so the
/// name can go straight into a `Content-Disposition` header.
pub fn results_file_name(company_name: &str) -> String {
    let safe: String = company_name
        .chars()
        .map(|c| match c {
            ' ' | '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("resume_projects_{safe}.txt")
}

/// Assembles the download. `None` until projects have been generated.
pub fn render_results(state: &SessionState) -> Option<ResultsDocument> {
    let job = state.job()?;
    let classification = state.classification()?;
    let projects = state.projects()?;

    let mut body = format!(
        "RESUME PROJECTS FOR {company}\n\n\
         INDUSTRY: {industry}\n\
         DOMAIN: {domain}\n\
         SENIORITY LEVEL: {seniority}\n\n\
         # SUGGESTED PROJECTS\n{projects}\n",
        company = job.company_name,
        industry = classification.industry,
        domain = classification.domain,
        seniority = classification.seniority,
        projects = projects.raw.trim_end(),
    );

    if let Some(backstories) = state.backstories() {
        body.push_str(&format!(
            "\n# PROJECT BACKSTORIES\n{}\n",
            backstories.trim_end()
        ));
    }
    if let Some(resources) = state.resources() {
        body.push_str(&format!(
            "\n# LEARNING REPOSITORY\n{}\n",
            resources.trim_end()
        ));
    }

    Some(ResultsDocument {
        file_name: results_file_name(&job.company_name),
        body,
    })
}
