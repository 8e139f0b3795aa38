//! Response parser — tolerant extraction of structure from free-text model output.
//!
//! Nothing in here returns an error. Every extractor degrades to a coarser
//! result (a default value, an empty project list, the raw backstory text)
//! and says so through its return type.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INDUSTRY: &str = "Unknown";
pub const DEFAULT_DOMAIN: &str = "Unknown";
pub const DEFAULT_SENIORITY: &str = "Mid-level";

/// Literal marker that opens each backstory block.
pub const BACKSTORY_MARKER: &str = "PROJECT BACKSTORY:";

lazy_static! {
    static ref INDUSTRY_MATCHERS: Vec<Regex> = field_matchers("Industry");
    static ref DOMAIN_MATCHERS: Vec<Regex> = field_matchers("Domain");
    static ref SENIORITY_MATCHERS: Vec<Regex> = field_matchers("Seniority");
    static ref NUMBERED_HEADING: Regex =
        Regex::new(r"^###\s*Project\s+\d+\s*:\s*(.+?)\s*$").expect("regex for numbered project headings");
    static ref PLAIN_HEADING: Regex =
        Regex::new(r"^###\s+(.+?)\s*$").expect("regex for plain project headings");
    static ref BULLET: Regex = Regex::new(r"^[*\-•]\s+(.*)$").expect("regex for bullet markers");
}

/// Prioritized matchers for one `Label: value` line.
///
/// 1. strict: the label at the start of a line, exactly as the prompt asks for it
/// 2. tolerant: markdown decoration around the label (`**Industry:**`, `- Industry:`), any case
fn field_matchers(label: &str) -> Vec<Regex> {
    vec![
        Regex::new(&format!(r"(?m)^[ \t]*{label}:[ \t]*(.*?)[ \t]*\r?$"))
            .expect("regex for strict field line"),
        Regex::new(&format!(
            r"(?mi)^[ \t]*(?:[-*>#]+[ \t]+)?\**{label}\**[ \t]*:[ \t]*\**[ \t]*(.*?)[ \t]*\**[ \t]*\r?$"
        ))
        .expect("regex for tolerant field line"),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Classification
// ────────────────────────────────────────────────────────────────────────────

/// A value pulled out of model output, or the default that replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extracted<T> {
    pub value: T,
    /// True when no matcher produced a value and the default was substituted.
    pub fallback: bool,
}

impl<T> Extracted<T> {
    fn parsed(value: T) -> Self {
        Self {
            value,
            fallback: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            fallback: true,
        }
    }
}

/// The (industry, domain, seniority) triple inferred from a job description.
///
/// `seniority` is free text straight from the model. Use
/// `canonical_seniority` before relying on it being one of the four levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub industry: String,
    pub domain: String,
    pub seniority: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeniorityLevel {
    #[serde(rename = "Entry-level")]
    Entry,
    #[serde(rename = "Mid-level")]
    Mid,
    Senior,
    Executive,
}

impl Classification {
    /// Maps the free-text seniority onto one of the four canonical levels.
    pub fn canonical_seniority(&self) -> Option<SeniorityLevel> {
        let s = self.seniority.to_lowercase();
        if ["executive", "director", "vice president", "chief", "head of"]
            .iter()
            .any(|k| s.contains(k))
        {
            Some(SeniorityLevel::Executive)
        } else if ["senior", "lead", "staff", "principal"]
            .iter()
            .any(|k| s.contains(k))
        {
            Some(SeniorityLevel::Senior)
        } else if s.contains("mid") || s.contains("intermediate") {
            Some(SeniorityLevel::Mid)
        } else if ["entry", "junior", "graduate", "intern"]
            .iter()
            .any(|k| s.contains(k))
        {
            Some(SeniorityLevel::Entry)
        } else {
            None
        }
    }
}

/// Per-field extraction result for a job analysis response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationExtraction {
    pub industry: Extracted<String>,
    pub domain: Extracted<String>,
    pub seniority: Extracted<String>,
}

impl ClassificationExtraction {
    /// Names of the fields that fell back to their defaults.
    pub fn fallback_fields(&self) -> Vec<&'static str> {
        [
            ("industry", self.industry.fallback),
            ("domain", self.domain.fallback),
            ("seniority", self.seniority.fallback),
        ]
        .into_iter()
        .filter_map(|(name, fell_back)| fell_back.then_some(name))
        .collect()
    }

    pub fn into_classification(self) -> Classification {
        Classification {
            industry: self.industry.value,
            domain: self.domain.value,
            seniority: self.seniority.value,
        }
    }
}

/// Extracts industry, domain and seniority from a job analysis response.
pub fn parse_classification(raw: &str) -> ClassificationExtraction {
    ClassificationExtraction {
        industry: extract_field(raw, &INDUSTRY_MATCHERS, DEFAULT_INDUSTRY),
        domain: extract_field(raw, &DOMAIN_MATCHERS, DEFAULT_DOMAIN),
        seniority: extract_field(raw, &SENIORITY_MATCHERS, DEFAULT_SENIORITY),
    }
}

fn extract_field(raw: &str, matchers: &[Regex], default: &str) -> Extracted<String> {
    matchers
        .iter()
        .find_map(|matcher| {
            matcher
                .captures_iter(raw)
                .filter_map(|cap| cap.get(1))
                .map(|m| m.as_str().trim())
                .find(|value| !value.is_empty())
        })
        .map(|value| Extracted::parsed(value.to_string()))
        .unwrap_or_else(|| Extracted::fallback(default.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Projects
// ────────────────────────────────────────────────────────────────────────────

/// Which heading form the project splitter settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStyle {
    /// `### Project N: Title`
    Numbered,
    /// `### Title`
    Plain,
    /// No heading found; only the raw text is usable.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub title: String,
    /// Markdown bullet text with the marker removed. Lines that are not
    /// bullets are kept verbatim.
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSet {
    pub projects: Vec<Project>,
    pub heading_style: HeadingStyle,
    /// The model output exactly as returned. This is what later prompts receive.
    pub raw: String,
}

impl ProjectSet {
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|p| p.title.as_str())
    }
}

/// Splits a project generation response into projects by heading lines.
///
/// The numbered form is tried first; the plain form is used only when the
/// numbered form finds nothing.
pub fn split_projects(raw: &str) -> ProjectSet {
    let lines: Vec<&str> = raw.lines().collect();

    for (style, pattern) in [
        (HeadingStyle::Numbered, &*NUMBERED_HEADING),
        (HeadingStyle::Plain, &*PLAIN_HEADING),
    ] {
        let headings: Vec<(usize, &str)> = lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                pattern
                    .captures(line.trim())
                    .and_then(|cap| cap.get(1))
                    .map(|m| (idx, m.as_str()))
            })
            .collect();

        if headings.is_empty() {
            continue;
        }

        let projects = headings
            .iter()
            .enumerate()
            .map(|(i, (start, title))| {
                let end = headings.get(i + 1).map_or(lines.len(), |(next, _)| *next);
                Project {
                    title: title.to_string(),
                    bullets: lines[start + 1..end]
                        .iter()
                        .map(|line| line.trim())
                        .filter(|line| !line.is_empty())
                        .map(strip_bullet)
                        .collect(),
                }
            })
            .collect();

        return ProjectSet {
            projects,
            heading_style: style,
            raw: raw.to_string(),
        };
    }

    ProjectSet {
        projects: Vec::new(),
        heading_style: HeadingStyle::None,
        raw: raw.to_string(),
    }
}

fn strip_bullet(line: &str) -> String {
    BULLET
        .captures(line)
        .and_then(|cap| cap.get(1))
        .map_or(line, |m| m.as_str())
        .to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Backstories
// ────────────────────────────────────────────────────────────────────────────

/// Splits backstory output on `PROJECT BACKSTORY:`. Text before the first
/// marker is preamble and is dropped.
pub fn split_backstories(raw: &str) -> Vec<String> {
    raw.split(BACKSTORY_MARKER)
        .skip(1)
        .map(|section| section.trim().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairedBackstory {
    pub project_title: String,
    pub backstory: String,
}

/// How backstories are presented: one per project, or the whole text as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackstoryView {
    Paired { items: Vec<PairedBackstory> },
    Unparsed { raw: String },
}

/// Pairs backstory sections with project titles by position.
///
/// Pairing happens only when both counts are equal and non-zero. The content
/// of a section is never checked against the title it is paired with.
pub fn pair_backstories(projects: &ProjectSet, raw: &str) -> BackstoryView {
    let sections = split_backstories(raw);

    if sections.is_empty() || sections.len() != projects.projects.len() {
        return BackstoryView::Unparsed {
            raw: raw.to_string(),
        };
    }

    BackstoryView::Paired {
        items: projects
            .titles()
            .zip(sections)
            .map(|(title, backstory)| PairedBackstory {
                project_title: title.to_string(),
                backstory,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = "Industry:  Retail \nDomain: Supply Chain Analytics\nSeniority: Senior\n";

    const NUMBERED_PROJECTS: &str = r#"Here are your projects.

### Project 1: Demand Forecasting Overhaul
* Reduced stockouts by **18%** across 400 stores
* Built **Prophet** models per SKU-store pair

### Project 2: Supplier Scorecard Platform
* Cut late deliveries by **22%**
- Defined **OTIF** metrics with procurement
Partnered with 12 vendors directly

### Project 3: Markdown Optimization
* Lifted gross margin by **1.4 pts**
"#;

    const PLAIN_PROJECTS: &str = r#"### Route Planning Engine
* Saved **$2M** in fuel
### Warehouse Slotting
* Improved pick rate by **9%**
"#;

    const THREE_BACKSTORIES: &str = r#"Sure!

PROJECT BACKSTORY: Forecasting was done in spreadsheets.
POTENTIAL INTERVIEW QUESTIONS AND ANSWERS:
1. Q: Why Prophet?

PROJECT BACKSTORY: Vendors were never measured.

PROJECT BACKSTORY: Markdowns were set by gut feel.
"#;

    #[test]
    fn test_well_formed_analysis_is_extracted_and_trimmed() {
        let extraction = parse_classification(ANALYSIS);
        assert!(extraction.fallback_fields().is_empty());
        let c = extraction.into_classification();
        assert_eq!(c.industry, "Retail");
        assert_eq!(c.domain, "Supply Chain Analytics");
        assert_eq!(c.seniority, "Senior");
    }

    #[test]
    fn test_missing_seniority_defaults_to_mid_level() {
        let extraction = parse_classification("Industry: Healthcare\nDomain: Clinical Data\n");
        assert_eq!(extraction.industry, Extracted::parsed("Healthcare".to_string()));
        assert_eq!(extraction.domain.value, "Clinical Data");
        assert_eq!(
            extraction.seniority,
            Extracted::fallback("Mid-level".to_string())
        );
        assert_eq!(extraction.fallback_fields(), vec!["seniority"]);
    }

    #[test]
    fn test_unstructured_analysis_falls_back_everywhere() {
        let c = parse_classification("I could not determine anything.").into_classification();
        assert_eq!(c.industry, "Unknown");
        assert_eq!(c.domain, "Unknown");
        assert_eq!(c.seniority, "Mid-level");
    }

    #[test]
    fn test_first_match_per_label_wins() {
        let c = parse_classification("Industry: Finance\nIndustry: Insurance\n").into_classification();
        assert_eq!(c.industry, "Finance");
    }

    #[test]
    fn test_empty_label_value_is_a_fallback() {
        let extraction = parse_classification("Industry:\nDomain: Payments\n");
        assert!(extraction.industry.fallback);
        assert_eq!(extraction.domain.value, "Payments");
    }

    #[test]
    fn test_markdown_decorated_labels_use_tolerant_matcher() {
        let raw = "**Industry:** Technology\n- domain: Developer Tools\n* **Seniority**: Executive\r\n";
        let c = parse_classification(raw).into_classification();
        assert_eq!(c.industry, "Technology");
        assert_eq!(c.domain, "Developer Tools");
        assert_eq!(c.seniority, "Executive");
    }

    #[test]
    fn test_free_text_seniority_is_accepted_unvalidated() {
        let c = parse_classification("Seniority: Somewhere between mid and senior-ish").into_classification();
        assert_eq!(c.seniority, "Somewhere between mid and senior-ish");
    }

    #[test]
    fn test_canonical_seniority_mapping() {
        let with = |s: &str| Classification {
            industry: "x".into(),
            domain: "y".into(),
            seniority: s.into(),
        };
        assert_eq!(with("Entry-level").canonical_seniority(), Some(SeniorityLevel::Entry));
        assert_eq!(with("Mid-level").canonical_seniority(), Some(SeniorityLevel::Mid));
        assert_eq!(with("Senior").canonical_seniority(), Some(SeniorityLevel::Senior));
        assert_eq!(with("Executive").canonical_seniority(), Some(SeniorityLevel::Executive));
        assert_eq!(with("VP-ish?").canonical_seniority(), None);
    }

    #[test]
    fn test_numbered_headings_yield_projects_in_order() {
        let set = split_projects(NUMBERED_PROJECTS);
        assert_eq!(set.heading_style, HeadingStyle::Numbered);
        let titles: Vec<&str> = set.titles().collect();
        assert_eq!(
            titles,
            vec![
                "Demand Forecasting Overhaul",
                "Supplier Scorecard Platform",
                "Markdown Optimization"
            ]
        );
    }

    #[test]
    fn test_bullets_are_stripped_and_non_bullets_kept() {
        let set = split_projects(NUMBERED_PROJECTS);
        assert_eq!(
            set.projects[0].bullets,
            vec![
                "Reduced stockouts by **18%** across 400 stores",
                "Built **Prophet** models per SKU-store pair"
            ]
        );
        assert_eq!(
            set.projects[1].bullets,
            vec![
                "Cut late deliveries by **22%**",
                "Defined **OTIF** metrics with procurement",
                "Partnered with 12 vendors directly"
            ]
        );
        assert_eq!(set.projects[2].bullets.len(), 1);
    }

    #[test]
    fn test_bold_line_is_not_mistaken_for_bullet() {
        let set = split_projects("### Project 1: X\n**Stack:** Rust\n");
        assert_eq!(set.projects[0].bullets, vec!["**Stack:** Rust"]);
    }

    #[test]
    fn test_plain_headings_are_the_fallback() {
        let set = split_projects(PLAIN_PROJECTS);
        assert_eq!(set.heading_style, HeadingStyle::Plain);
        assert_eq!(set.projects.len(), 2);
        assert_eq!(set.projects[0].title, "Route Planning Engine");
        assert_eq!(set.projects[1].bullets, vec!["Improved pick rate by **9%**"]);
    }

    #[test]
    fn test_no_headings_keeps_raw_text_only() {
        let set = split_projects("1. Do a thing\n2. Do another");
        assert_eq!(set.heading_style, HeadingStyle::None);
        assert!(set.projects.is_empty());
        assert_eq!(set.raw, "1. Do a thing\n2. Do another");
    }

    #[test]
    fn test_indented_headings_still_split() {
        let set = split_projects("  ### Project 1: Yard Scheduler\n  * Cut dwell time\n\t### Project 2: Dock Planner\n");
        assert_eq!(set.heading_style, HeadingStyle::Numbered);
        assert_eq!(set.titles().collect::<Vec<_>>(), vec!["Yard Scheduler", "Dock Planner"]);
        assert_eq!(set.projects[0].bullets, vec!["Cut dwell time"]);
    }

    #[test]
    fn test_deeper_headings_are_not_projects() {
        let set = split_projects("#### Notes\n* nothing here");
        assert_eq!(set.heading_style, HeadingStyle::None);
    }

    #[test]
    fn test_backstory_split_drops_preamble() {
        let sections = split_backstories(THREE_BACKSTORIES);
        assert_eq!(sections.len(), 3);
        assert!(sections[0].starts_with("Forecasting was done in spreadsheets."));
        assert_eq!(sections[2], "Markdowns were set by gut feel.");
    }

    #[test]
    fn test_equal_counts_pair_positionally() {
        let projects = split_projects(NUMBERED_PROJECTS);
        match pair_backstories(&projects, THREE_BACKSTORIES) {
            BackstoryView::Paired { items } => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[1].project_title, "Supplier Scorecard Platform");
                assert_eq!(items[1].backstory, "Vendors were never measured.");
            }
            other => panic!("expected paired backstories, got {other:?}"),
        }
    }

    #[test]
    fn test_count_mismatch_shows_raw_text() {
        let projects = split_projects(NUMBERED_PROJECTS);
        let two = "PROJECT BACKSTORY: one\nPROJECT BACKSTORY: two\n";
        assert_eq!(
            pair_backstories(&projects, two),
            BackstoryView::Unparsed {
                raw: two.to_string()
            }
        );
    }

    #[test]
    fn test_zero_sections_never_pair() {
        let projects = split_projects("no headings");
        let view = pair_backstories(&projects, "no markers either");
        assert!(matches!(view, BackstoryView::Unparsed { .. }));
    }
}
