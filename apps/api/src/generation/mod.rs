// Resume project generation: prompt templates, model-output parsing,
// stage orchestration and the downloadable results document.
// All model calls go through llm_client::TextModel.

pub mod export;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
