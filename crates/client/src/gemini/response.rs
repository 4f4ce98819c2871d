//! Gemini response types and normalization.

use repute_core::Review;
use serde::Deserialize;

use crate::{LookupResponse, UpstreamError};

/// Raw response from `generateContent`.
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub grounding_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// The JSON document the model is asked to produce.
#[derive(Debug, Default, Deserialize)]
struct ReputationPayload {
    #[serde(default, rename = "isSource")]
    is_source: bool,
    #[serde(default, deserialize_with = "repute_core::cache::entries::lenient_vec")]
    reviews: Vec<serde_json::Value>,
}

/// Pull a human-readable message out of an error body, falling back to the raw text.
pub fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => String::from_utf8_lossy(body).trim().chars().take(200).collect(),
    }
}

/// Locate the JSON object in model output that may be fenced or wrapped in prose.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn normalize_review(value: serde_json::Value) -> Option<Review> {
    let mut review: Review = serde_json::from_value(value).ok()?;
    if !review.rating.is_finite() {
        return None;
    }
    review.rating = review.rating.clamp(0.0, 5.0);
    Some(review)
}

impl TryFrom<GenerateContentResponse> for LookupResponse {
    type Error = UpstreamError;

    /// Reviews missing a required field are dropped; a body with no candidate
    /// or no JSON object in the text is an error.
    fn try_from(raw: GenerateContentResponse) -> Result<Self, Self::Error> {
        let candidate = raw
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Parse("response has no candidates".into()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let json = extract_json(&text).ok_or_else(|| UpstreamError::Parse("model output contains no JSON object".into()))?;
        let payload: ReputationPayload =
            serde_json::from_str(json).map_err(|e| UpstreamError::Parse(e.to_string()))?;

        let reviews = payload.reviews.into_iter().filter_map(normalize_review).collect();

        Ok(LookupResponse { reviews, is_source: payload.is_source, grounding_metadata: candidate.grounding_metadata })
    }
}
