//! Gemini `generateContent` request construction.

use serde::Serialize;

use crate::LookupRequest;

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

/// Search grounding; the response carries `groundingMetadata` when used.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

impl GenerateContentRequest {
    pub fn for_lookup(request: &LookupRequest) -> Self {
        Self {
            contents: vec![Content { role: "user", parts: vec![Part { text: build_prompt(request) }] }],
            tools: vec![Tool { google_search: serde_json::json!({}) }],
            generation_config: GenerationConfig { temperature: 0.2 },
        }
    }
}

/// Prompt asking for reviews of `hostname` in a fixed JSON shape.
///
/// With no source domains only the `isSource` judgement is requested.
pub fn build_prompt(request: &LookupRequest) -> String {
    let hostname = &request.hostname;
    let is_source_rule = format!(
        "\"isSource\" is true only if {hostname} itself is a website whose main purpose is publishing \
         reviews or ratings of other businesses or websites."
    );

    if request.is_source_only() {
        return format!(
            "Decide whether the website {hostname} is a review aggregator.\n\
             {is_source_rule}\n\
             Respond with JSON only, no prose: {{\"isSource\": boolean, \"reviews\": []}}"
        );
    }

    let sources = request.source_domains.join(", ");
    format!(
        "Find what trusted review sites say about the website {hostname}.\n\
         Only use these sources, in this order: {sources}.\n\
         For each source that has reviews of {hostname}, add one entry to \"reviews\" with:\n\
         - \"source\": the source domain\n\
         - \"url\": the page on that source reviewing {hostname}\n\
         - \"rating\": a number from 0 to 5\n\
         - \"summary\": at most {bullets} short bullet strings, each at most {words} words\n\
         Skip sources with no reviews of {hostname}.\n\
         {is_source_rule}\n\
         Respond with JSON only, no prose: \
         {{\"isSource\": boolean, \"reviews\": [{{\"source\": string, \"url\": string, \"rating\": number, \"summary\": [string]}}]}}",
        bullets = request.max_bullets,
        words = request.max_words,
    )
}
