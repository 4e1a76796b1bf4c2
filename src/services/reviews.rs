//! Review proxy: validates query parameters, fetches raw records through a
//! platform adapter and normalizes them into the front-end contract.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::services::platform::{ReviewPlatform, ReviewRequest};

pub const DEFAULT_LIMIT: u32 = 20;
const TEXT_PLACEHOLDER: &str = "Без текста";

/// Raw query parameters as they arrive from the HTTP layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQueryParams {
    pub filial_id: Option<String>,
    pub owner_id: Option<String>,
    pub limit: Option<u32>,
    pub offset_date: Option<String>,
    pub rating: Option<String>,
    pub without_answer: Option<String>,
    pub is_favorite: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedReview {
    pub id: Value,
    pub rating: Value,
    pub text: String,
    #[serde(rename = "dateCreated")]
    pub date_created: Value,
    pub name: Value,
    #[serde(rename = "commentsCount")]
    pub comments_count: Value,
    #[serde(rename = "likesCount")]
    pub likes_count: Value,
    pub photos: Option<Vec<String>>,
    pub is_favorite: Value,
}

#[derive(Debug, Serialize)]
pub struct ReviewPage {
    pub reviews: Vec<NormalizedReview>,
    /// Number of reviews in this page, not an upstream total.
    pub count: usize,
    pub filial_id: String,
}

pub struct ReviewService;

impl ReviewService {
    /// Check required parameters before any network call and produce the
    /// validated request for the adapter.
    pub fn validate(
        platform: &dyn ReviewPlatform,
        params: &ReviewQueryParams,
    ) -> AppResult<ReviewRequest> {
        let mut missing = Vec::new();
        if params.filial_id.as_deref().unwrap_or("").is_empty() {
            missing.push("filial_id".to_string());
        }
        if platform.requires_owner_id() && params.owner_id.as_deref().unwrap_or("").is_empty() {
            missing.push("owner_id".to_string());
        }
        if !missing.is_empty() {
            return Err(AppError::MissingParameters(missing));
        }

        Ok(ReviewRequest {
            filial_id: params.filial_id.clone().unwrap_or_default(),
            owner_id: params.owner_id.clone(),
            limit: params.limit.unwrap_or(DEFAULT_LIMIT),
            offset_date: params.offset_date.clone(),
            rating: params.rating.clone(),
            without_answer: params.without_answer.clone(),
            is_favorite: params.is_favorite.clone(),
        })
    }

    pub async fn fetch(
        platform: &dyn ReviewPlatform,
        params: &ReviewQueryParams,
    ) -> AppResult<ReviewPage> {
        let request = Self::validate(platform, params)?;

        let raw = platform.fetch_reviews(&request).await?;
        let reviews: Vec<NormalizedReview> = raw.iter().map(normalize_review).collect();

        Ok(ReviewPage {
            count: reviews.len(),
            filial_id: request.filial_id,
            reviews,
        })
    }
}

/// Photos arrive either as plain URL strings or as objects with a nested
/// preview URL. Anything else normalizes to null.
fn normalize_photos(photos: Option<&Value>) -> Option<Vec<String>> {
    let items = photos?.as_array()?;

    if items.iter().all(|p| p.is_string()) {
        return Some(
            items
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect(),
        );
    }

    if items.iter().any(|p| p.is_object()) {
        return Some(
            items
                .iter()
                .filter_map(|p| {
                    p.get("preview_urls")
                        .and_then(|u| u.get("url"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect(),
        );
    }

    None
}

pub fn normalize_review(review: &Value) -> NormalizedReview {
    NormalizedReview {
        id: review.get("id").cloned().unwrap_or(Value::Null),
        rating: review.get("rating").cloned().unwrap_or(json!(0)),
        text: review
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or(TEXT_PLACEHOLDER)
            .to_string(),
        date_created: review.get("created_at").cloned().unwrap_or(Value::Null),
        name: review.get("user_name").cloned().unwrap_or(Value::Null),
        comments_count: review.get("comments_count").cloned().unwrap_or(json!(0)),
        likes_count: review.get("likes_count").cloned().unwrap_or(json!(0)),
        photos: normalize_photos(review.get("photos")),
        is_favorite: review.get("is_favorite").cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_string_photos_as_is() {
        let review = json!({"id": 1, "photos": ["http://a/1.jpg", "http://a/2.jpg"]});
        let normalized = normalize_review(&review);
        assert_eq!(
            normalized.photos,
            Some(vec![
                "http://a/1.jpg".to_string(),
                "http://a/2.jpg".to_string()
            ])
        );
    }

    #[test]
    fn extracts_preview_urls_from_photo_objects() {
        let review = json!({
            "id": 1,
            "photos": [
                {"preview_urls": {"url": "http://a/p1.jpg"}},
                {"preview_urls": {}},
                {"no_preview": true}
            ]
        });
        let normalized = normalize_review(&review);
        assert_eq!(normalized.photos, Some(vec!["http://a/p1.jpg".to_string()]));
    }

    #[test]
    fn unrecognized_photo_shapes_become_null() {
        assert_eq!(normalize_review(&json!({"id": 1})).photos, None);
        assert_eq!(
            normalize_review(&json!({"id": 1, "photos": "oops"})).photos,
            None
        );
        assert_eq!(
            normalize_review(&json!({"id": 1, "photos": [1, 2]})).photos,
            None
        );
    }

    #[test]
    fn applies_defaults_for_missing_fields() {
        let normalized = normalize_review(&json!({"id": 7}));
        assert_eq!(normalized.text, "Без текста");
        assert_eq!(normalized.rating, json!(0));
        assert_eq!(normalized.comments_count, json!(0));
        assert_eq!(normalized.likes_count, json!(0));
        assert_eq!(normalized.date_created, Value::Null);
    }

    #[tokio::test]
    async fn missing_required_params_fail_before_any_call() {
        use crate::services::dgis::DgisService;
        use crate::services::gateway::GatewayClient;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reviews": []})))
            .expect(0)
            .mount(&server)
            .await;

        // dgis requires both filial_id and owner_id
        let svc = DgisService::new(GatewayClient::new(&server.uri(), 5).unwrap());
        let err = ReviewService::fetch(&svc, &ReviewQueryParams::default())
            .await
            .unwrap_err();
        match err {
            crate::error::AppError::MissingParameters(params) => {
                assert_eq!(params, vec!["filial_id".to_string(), "owner_id".to_string()]);
            }
            other => panic!("expected missing parameters, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn page_count_reflects_returned_reviews() {
        use crate::services::flamp::FlampService;
        use crate::services::gateway::GatewayClient;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/reviews/f-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}, {"id": 2, "text": "hello"}]
            })))
            .mount(&server)
            .await;

        let svc = FlampService::new(GatewayClient::new(&server.uri(), 5).unwrap());
        let page = ReviewService::fetch(
            &svc,
            &ReviewQueryParams {
                filial_id: Some("f-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.filial_id, "f-1");
        assert_eq!(page.reviews[0].text, "Без текста");
        assert_eq!(page.reviews[1].text, "hello");
    }

    #[test]
    fn passes_fields_through_under_contract_names() {
        let normalized = normalize_review(&json!({
            "id": "r-1",
            "rating": 4,
            "text": "good",
            "created_at": "2024-01-01",
            "user_name": "Ann",
            "is_favorite": true
        }));
        let value = serde_json::to_value(&normalized).unwrap();
        assert_eq!(value["dateCreated"], "2024-01-01");
        assert_eq!(value["name"], "Ann");
        assert_eq!(value["is_favorite"], true);
    }
}
