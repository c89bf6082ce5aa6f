//! Wire types for the external inference service.

use serde::{Deserialize, Serialize};

use crate::queue::{Variant, Verdict};

/// Generation parameters snapshot sent with every request and persisted
/// with each history record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    pub style: Option<String>,
    pub detail_level: Option<String>,
    /// Free-text context the model is primed with (project, shoot, brand).
    pub training_context: Option<String>,
}

/// One inference invocation: a stored asset plus the variant slices to
/// produce for it.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub asset_url: String,
    pub variant_selectors: Vec<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// One produced variant as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantResult {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub variants: Vec<VariantResult>,
}

impl From<VariantResult> for Variant {
    fn from(result: VariantResult) -> Self {
        Variant {
            target: result.name,
            title: result.title,
            description: result.description,
            keywords: result.keywords,
            prompt: result.prompt,
            negative_prompt: result.negative_prompt,
            verdict: result.verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_deserializes_with_sparse_fields() {
        let json = r#"{"variants": [{"name": "adobe", "title": "Sunset", "keywords": ["sky"]}]}"#;
        let response: InferenceResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.variants.len(), 1);
        let v = &response.variants[0];
        assert_eq!(v.name, "adobe");
        assert_eq!(v.title.as_deref(), Some("Sunset"));
        assert!(v.description.is_none());
        assert!(v.verdict.is_none());
    }

    #[test]
    fn variant_conversion_carries_all_fields() {
        let result = VariantResult {
            name: "shutterstock".into(),
            title: Some("t".into()),
            description: Some("d".into()),
            keywords: vec!["k".into()],
            prompt: Some("p".into()),
            negative_prompt: Some("n".into()),
            verdict: Some(Verdict::Pass),
        };

        let variant: Variant = result.into();
        assert_eq!(variant.target, "shutterstock");
        assert_eq!(variant.keywords, vec!["k".to_string()]);
        assert_eq!(variant.verdict, Some(Verdict::Pass));
    }

    #[test]
    fn request_flattens_params() {
        let request = InferenceRequest {
            asset_url: "https://assets.example/a.jpg".into(),
            variant_selectors: vec!["adobe".into()],
            params: GenerationParams {
                style: Some("editorial".into()),
                detail_level: None,
                training_context: None,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["style"], "editorial");
        assert_eq!(json["asset_url"], "https://assets.example/a.jpg");
    }
}
