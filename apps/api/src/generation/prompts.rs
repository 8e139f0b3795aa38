//! Prompt template store — the four stage prompts and their placeholder contracts.
//!
//! The heading and bullet formats requested here are what `parser` expects back.
//! Changing the wording of a "Format your response" block breaks parsing.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("template '{template}' requires parameter '{name}'")]
    MissingParameter {
        template: &'static str,
        name: &'static str,
    },
}

/// Job analysis prompt. Replace: {company_name}, {job_description}
pub const JOB_ANALYSIS_TEMPLATE: &str = r#"
You are an expert career consultant with deep knowledge of various industries and domains.
Analyze the following job description for a role at {company_name} and extract:
1. The specific industry (e.g., Retail, Healthcare, Technology)
2. The specific domain within that industry (e.g., Data Science in Technology, Supply Chain in Retail)
3. Consider the company's {company_name} specialization and focus areas when determining the industry and domain.
4. Determine the seniority level of the role (Entry-level, Mid-level, Senior, Executive)

Focus on the job requirements, responsibilities, and company information. Ignore general information like DEI statements, benefits, and other standard corporate language that doesn't help determine the specific industry and domain.

If provided, use information about {company_name} to refine your analysis.

Format your response exactly like this:
Industry: [Industry Name]
Domain: [Domain Name]
Seniority: [Seniority Level]

Job Description:
{job_description}
"#;

/// Project generation prompt.
/// Replace: {industry}, {domain}, {company_name}, {seniority}, {job_description}
pub const PROJECT_GENERATION_TEMPLATE: &str = r#"
You are an industry expert with deep knowledge of {industry} and specifically {domain}. The job is at {company_name} and the seniority level is {seniority}.

Generate 3 impressive and highly specific professional projects that someone could list on their resume to demonstrate relevant experience for a role in {domain} within the {industry} industry, considering the company profile of {company_name}.

For each project:
1. Create a compelling, specific project heading (not generic)
2. Create 3-4 bullet points that describe the project:
   - First bullet MUST include a quantifiable business impact with specific metrics (use realistic numbers)
   - Remaining bullets should describe the specific actions, methodologies, tools, and processes used
   - Use industry-specific terminology, frameworks, and metrics that would be recognized by hiring managers
   - Include specific company types, product categories, or technical details that show deep domain knowledge
   - Avoid vague or generic statements; be detailed and specific enough to be convincing to industry insiders
   - BOLD key terms, tools, metrics, and industry-specific terminology by surrounding them with ** (e.g., **KPI**)

Analyze the job description below for any specific skills, tools, or frameworks to incorporate:
{job_description}

Your response must be formatted in Markdown EXACTLY as follows:

### Project 1: [Specific Project Title]
* [Business impact with specific metrics with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]

### Project 2: [Specific Project Title]
* [Business impact with specific metrics with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]

### Project 3: [Specific Project Title]
* [Business impact with specific metrics with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]
* [Specific action/methodology with domain-specific details with **key terms bolded**]

CRITICAL: Ensure that each bullet point is on its own separate line with a proper markdown asterisk (*) at the beginning of each line. Do NOT use the bullet character (•).
"#;

/// Interview backstory prompt.
/// Replace: {industry}, {domain}, {seniority}, {company_name}, {projects}
pub const BACKSTORY_GENERATION_TEMPLATE: &str = r#"
You are a career coach specializing in interview preparation for the {industry} industry and {domain} domain.

For the following project descriptions for a {seniority} level position at {company_name}, create concise backstories that the candidate can use during interviews when questioned about their experience.

The backstories should:
1. Be appropriate for the {seniority} level role
2. Include specific challenges faced and how they were overcome
3. Mention 2 specific questions that might be asked about this project in an interview, with suggested answers

Here are the projects:
{projects}

For each project, provide:

PROJECT BACKSTORY: [2-3 short paragraphs with context, challenges, and approach - be concise]

POTENTIAL INTERVIEW QUESTIONS AND ANSWERS:
1. Q: [Specific question about the project]
   A: [Suggested answer with specific details]
2. Q: [Specific question about challenges or outcomes]
   A: [Suggested answer with specific details]
"#;

/// Learning guide prompt.
/// Replace: {industry}, {domain}, {seniority}, {company_name}, {projects}, {job_description}
pub const LEARNING_RESOURCES_TEMPLATE: &str = r#"
You are an expert career coach and learning specialist in the {industry} industry, specifically in the {domain} domain.

Based on the job description and the following projects that were created for a {seniority} level role at {company_name}, create a focused learning guide for someone preparing for this role.

Projects:
{projects}

Job Description:
{job_description}

Create the following sections:

1. KEY TERMINOLOGY EXPLAINED:
   - Identify 8-10 important technical terms, acronyms, or industry jargon from the projects
   - Provide clear, concise definitions (2-3 sentences each)
   - Focus on terms that would be unfamiliar to someone new to this domain

2. CORE INTERVIEW QUESTIONS:
   - List 5-7 technical interview questions specific to this role/domain
   - Provide brief guidance on how to approach each question (1-2 sentences)

3. RECOMMENDED LEARNING RESOURCES:
   - 3-4 specific online courses from platforms like Coursera, edX, LinkedIn Learning, or Google Skillshop (with specific course names)
   - 2-3 YouTube channels or specific videos relevant to the skills needed

4. INTERVIEW PREPARATION WEBSITES:
   - List 3-5 specific websites that offer preparation resources for this role/industry
   - Briefly explain what each site offers (1 sentence)

Format your response with clear headings and bullet points. Be specific and practical in your recommendations. Focus on quality resources that would genuinely help someone prepare for this role.
"#;

/// One of the four stage prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    JobAnalysis,
    ProjectGeneration,
    BackstoryGeneration,
    LearningResources,
}

impl PromptTemplate {
    pub fn name(self) -> &'static str {
        match self {
            PromptTemplate::JobAnalysis => "job_analysis",
            PromptTemplate::ProjectGeneration => "project_generation",
            PromptTemplate::BackstoryGeneration => "backstory_generation",
            PromptTemplate::LearningResources => "learning_resources",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            PromptTemplate::JobAnalysis => JOB_ANALYSIS_TEMPLATE,
            PromptTemplate::ProjectGeneration => PROJECT_GENERATION_TEMPLATE,
            PromptTemplate::BackstoryGeneration => BACKSTORY_GENERATION_TEMPLATE,
            PromptTemplate::LearningResources => LEARNING_RESOURCES_TEMPLATE,
        }
    }

    /// Every placeholder the template declares. All must be supplied to `render`.
    pub fn placeholders(self) -> &'static [&'static str] {
        match self {
            PromptTemplate::JobAnalysis => &["company_name", "job_description"],
            PromptTemplate::ProjectGeneration => &[
                "industry",
                "domain",
                "company_name",
                "job_description",
                "seniority",
            ],
            PromptTemplate::BackstoryGeneration => {
                &["industry", "domain", "company_name", "projects", "seniority"]
            }
            PromptTemplate::LearningResources => &[
                "industry",
                "domain",
                "company_name",
                "projects",
                "job_description",
                "seniority",
            ],
        }
    }

    /// Output budget for the stage's model call.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            PromptTemplate::JobAnalysis | PromptTemplate::ProjectGeneration => 2000,
            PromptTemplate::BackstoryGeneration | PromptTemplate::LearningResources => 8000,
        }
    }

    /// Substitutes every declared placeholder in a single pass.
    ///
    /// Values are inserted literally: a job description that itself contains
    /// `{company_name}` is not expanded again. Unknown parameters are ignored.
    pub fn render(self, params: &PromptParams<'_>) -> Result<String, PromptError> {
        let declared = self.placeholders();
        if let Some(missing) = declared.iter().find(|name| !params.contains(name)) {
            return Err(PromptError::MissingParameter {
                template: self.name(),
                name: *missing,
            });
        }

        let text = self.text();
        let mut out = String::with_capacity(text.len() + params.total_len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let placeholder = after
                .find('}')
                .map(|close| (&after[..close], close))
                .filter(|(name, _)| declared.contains(name));

            match placeholder {
                Some((name, close)) => {
                    out.push_str(params.get(name).unwrap_or_default());
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}

/// Named values for template substitution.
#[derive(Debug, Clone, Default)]
pub struct PromptParams<'a> {
    values: HashMap<&'static str, &'a str>,
}

impl<'a> PromptParams<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: &'a str) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.values.get(name).copied()
    }

    fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn total_len(&self) -> usize {
        self.values.values().map(|v| v.len()).sum()
    }
}
