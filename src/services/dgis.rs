//! Adapter for the 2GIS review microservice.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::db::models::{NewBranch, Platform};
use crate::services::gateway::{GatewayClient, GatewayError};
use crate::services::platform::{ReviewPlatform, ReviewRequest, SyncRequest};

#[derive(Clone)]
pub struct DgisService {
    gateway: GatewayClient,
}

impl DgisService {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    /// Walk the nested sync response: branches live under
    /// `user_info_and_filials[].filials_info.{category}.items[]`. Missing
    /// keys and empty item lists are tolerated; a missing top-level key is a
    /// malformed body.
    fn parse_branches(body: &Value) -> Result<Vec<NewBranch>, GatewayError> {
        let groups = body
            .get("user_info_and_filials")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GatewayError::MalformedBody("missing user_info_and_filials".to_string())
            })?;

        let mut branches = Vec::new();
        for group in groups {
            let Some(categories) = group.get("filials_info").and_then(Value::as_object) else {
                continue;
            };
            for category in categories.values() {
                let Some(items) = category.get("items").and_then(Value::as_array) else {
                    continue;
                };
                for item in items {
                    let (Some(id), Some(name)) = (item.get("id"), item.get("name")) else {
                        continue;
                    };
                    let external_branch_id = match id {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let Some(name) = name.as_str() else { continue };
                    branches.push(NewBranch {
                        external_branch_id,
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(branches)
    }

    /// Kick off asynchronous stats collection for a branch upstream.
    pub async fn trigger_stats_collection(
        &self,
        main_user_id: &str,
        filial_id: &str,
    ) -> Result<Value, GatewayError> {
        self.gateway
            .post(
                "/api/start_stats_collection",
                &json!({
                    "main_user_id": main_user_id,
                    "filial_id": filial_id,
                }),
            )
            .await
    }

    /// Toggle the favorite flag on a review. Returns the new flag value as
    /// reported by the upstream.
    pub async fn toggle_favorite(&self, review_id: &str) -> Result<Option<bool>, GatewayError> {
        let body = self
            .gateway
            .post(
                &format!("/api/favorite/{}", review_id),
                &json!({"review_id": review_id}),
            )
            .await?;
        Ok(body.get("is_favorite").and_then(Value::as_bool))
    }

    pub async fn send_complaint(
        &self,
        review_id: &str,
        main_user_id: &str,
        text: &str,
        is_no_client_complaint: bool,
    ) -> Result<(), GatewayError> {
        self.gateway
            .post(
                &format!("/api/complaints/{}", review_id),
                &json!({
                    "text": text,
                    "main_user_id": main_user_id,
                    "is_no_client_complaint": is_no_client_complaint,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn post_reply(
        &self,
        review_id: &str,
        main_user_id: &str,
        text: &str,
        is_official: bool,
    ) -> Result<(), GatewayError> {
        self.gateway
            .post(
                &format!("/api/post_review_reply/{}", review_id),
                &json!({
                    "main_user_id": main_user_id,
                    "text": text,
                    "is_official": is_official,
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReviewPlatform for DgisService {
    fn platform(&self) -> Platform {
        Platform::Dgis
    }

    fn requires_owner_id(&self) -> bool {
        true
    }

    async fn sync_account(&self, request: &SyncRequest) -> Result<Vec<NewBranch>, GatewayError> {
        let body = self
            .gateway
            .post(
                "/api/create_or_update_user",
                &json!({
                    "main_user_id": request.external_user_id,
                    "username": request.username,
                    "hashed_password": request.credential,
                }),
            )
            .await?;

        Self::parse_branches(&body)
    }

    async fn fetch_reviews(&self, request: &ReviewRequest) -> Result<Vec<Value>, GatewayError> {
        let mut query: Vec<(&str, String)> = vec![
            ("filial_id", request.filial_id.clone()),
            ("limit", request.limit.to_string()),
        ];
        if let Some(owner_id) = &request.owner_id {
            query.push(("main_user_id", owner_id.clone()));
        }
        if let Some(offset_date) = &request.offset_date {
            query.push(("offset_date", offset_date.clone()));
        }
        if let Some(rating) = &request.rating {
            query.push(("rating", rating.clone()));
        }
        if let Some(without_answer) = &request.without_answer {
            query.push(("without_answer", without_answer.clone()));
        }
        if let Some(is_favorite) = &request.is_favorite {
            query.push(("is_favorite", is_favorite.clone()));
        }

        let body = self.gateway.get("/api/get_reviews", &query).await?;
        body.get("reviews")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| GatewayError::MalformedBody("missing reviews array".to_string()))
    }

    async fn fetch_stats(&self, filial_id: &str) -> Result<Value, GatewayError> {
        self.gateway
            .get(&format!("/api/stats/{}", filial_id), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> DgisService {
        DgisService::new(GatewayClient::new(&server.uri(), 5).unwrap())
    }

    #[test]
    fn parse_branches_flattens_categories() {
        let body = json!({
            "user_info_and_filials": [
                {
                    "filials_info": {
                        "cafe": {"items": [{"id": "11", "name": "Cafe One"}]},
                        "shop": {"items": [{"id": 22, "name": "Shop Two"}]}
                    }
                },
                {"no_filials_here": true},
                {"filials_info": {"empty": {"items": []}}}
            ]
        });

        let mut branches = DgisService::parse_branches(&body).unwrap();
        branches.sort_by(|a, b| a.external_branch_id.cmp(&b.external_branch_id));
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].external_branch_id, "11");
        assert_eq!(branches[0].name, "Cafe One");
        assert_eq!(branches[1].external_branch_id, "22");
    }

    #[test]
    fn parse_branches_requires_top_level_key() {
        let err = DgisService::parse_branches(&json!({"something": "else"})).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn sync_sends_upsert_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/create_or_update_user"))
            .and(body_json(json!({
                "main_user_id": "p-1",
                "username": "shop",
                "hashed_password": "cipher",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"user_info_and_filials": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server).await;
        let branches = svc
            .sync_account(&SyncRequest {
                external_user_id: "p-1".to_string(),
                username: "shop".to_string(),
                credential: "cipher".to_string(),
            })
            .await
            .unwrap();
        assert!(branches.is_empty());
    }

    #[tokio::test]
    async fn reviews_forwards_only_present_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get_reviews"))
            .and(query_param("filial_id", "f-1"))
            .and(query_param("main_user_id", "p-1"))
            .and(query_param("limit", "20"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"reviews": [{"id": 1}]})),
            )
            .mount(&server)
            .await;

        let svc = service(&server).await;
        let reviews = svc
            .fetch_reviews(&ReviewRequest {
                filial_id: "f-1".to_string(),
                owner_id: Some("p-1".to_string()),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reviews.len(), 1);
    }
}
