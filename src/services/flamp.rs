//! Adapter for the Flamp review microservice.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::db::models::{NewBranch, Platform};
use crate::services::gateway::{GatewayClient, GatewayError};
use crate::services::platform::{ReviewPlatform, ReviewRequest, SyncRequest};

#[derive(Clone)]
pub struct FlampService {
    gateway: GatewayClient,
}

impl FlampService {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    /// Branches live under `extras.filials[]` in the Flamp sync response.
    fn parse_branches(body: &Value) -> Result<Vec<NewBranch>, GatewayError> {
        let filials = body
            .get("extras")
            .and_then(|e| e.get("filials"))
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::MalformedBody("missing extras.filials".to_string()))?;

        let mut branches = Vec::new();
        for filial in filials {
            let (Some(id), Some(name)) = (filial.get("filial_id"), filial.get("name")) else {
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
        Ok(branches)
    }
}

#[async_trait]
impl ReviewPlatform for FlampService {
    fn platform(&self) -> Platform {
        Platform::Flamp
    }

    fn requires_owner_id(&self) -> bool {
        false
    }

    /// Update-then-create: PATCH the existing upstream user; a 404 means it
    /// does not exist yet, so fall back to creating it. Any other error
    /// status propagates unchanged.
    async fn sync_account(&self, request: &SyncRequest) -> Result<Vec<NewBranch>, GatewayError> {
        let update = json!({
            "username": request.username,
            "hashed_password": request.credential,
        });

        let body = match self
            .gateway
            .patch(
                &format!("/api/users/{}/update", request.external_user_id),
                &update,
            )
            .await
        {
            Ok(body) => body,
            Err(GatewayError::Status { code: 404, .. }) => {
                tracing::info!(
                    external_user_id = %request.external_user_id,
                    "Upstream user missing, creating"
                );
                self.gateway
                    .post(
                        "/api/users/create",
                        &json!({
                            "owner_id": request.external_user_id,
                            "username": request.username,
                            "hashed_password": request.credential,
                        }),
                    )
                    .await?
            }
            Err(e) => return Err(e),
        };

        Self::parse_branches(&body)
    }

    async fn fetch_reviews(&self, request: &ReviewRequest) -> Result<Vec<Value>, GatewayError> {
        let mut query: Vec<(&str, String)> = vec![("limit", request.limit.to_string())];
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

        let body = self
            .gateway
            .get(&format!("/api/reviews/{}", request.filial_id), &query)
            .await?;

        // "no reviews yet" arrives as a message instead of an array
        match body.get("data").and_then(Value::as_array) {
            Some(reviews) => Ok(reviews.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_stats(&self, filial_id: &str) -> Result<Value, GatewayError> {
        self.gateway
            .get(&format!("/api/stats/{}", filial_id), &[])
            .await
    }
}
