use migrator_rules::{location_code, JavaReferenced};
use serde::Serialize;
use serde_json::Value;

/// The only analysis domain the backend command serves.
pub const PROJECT: &str = "java";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AnalysisMode {
    #[default]
    #[serde(rename = "source-only")]
    SourceOnly,
    #[serde(rename = "full")]
    Full,
}

/// Argument object of one search command call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub project: String,
    pub location: String,
    pub query: String,
    pub analysis_mode: AnalysisMode,
}

impl QueryParams {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "project": self.project,
            "location": self.location,
            "query": self.query,
            "analysisMode": self.analysis_mode,
        })
    }
}

/// Translates a `java.referenced` leaf. The pattern is passed through untouched; validating it is
/// the backend's business.
pub fn to_query_params(leaf: &JavaReferenced) -> QueryParams {
    QueryParams {
        project: PROJECT.to_string(),
        location: location_code(&leaf.location),
        query: leaf.pattern.clone(),
        analysis_mode: AnalysisMode::SourceOnly,
    }
}
