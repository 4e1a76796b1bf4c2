//! Stats proxy: translates upstream collection status and computes the
//! per-star percentage distribution.

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::services::gateway::GatewayError;
use crate::services::platform::ReviewPlatform;

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatsResult {
    /// Upstream has no stats for this branch yet (its 404).
    NoData,
    Pending,
    InProgress {
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_completion: Option<String>,
    },
    Collected { result: RatingStats },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingStats {
    pub one_star_count: i64,
    pub one_star_percent: i64,
    pub two_stars_count: i64,
    pub two_stars_percent: i64,
    pub three_stars_count: i64,
    pub three_stars_percent: i64,
    pub four_stars_count: i64,
    pub four_stars_percent: i64,
    pub five_stars_count: i64,
    pub five_stars_percent: i64,
    pub rating: Value,
    pub count_reviews: i64,
}

/// Percent of `count` against `count_reviews`, with a denominator floor of 1
/// so an empty branch yields zeros instead of dividing by zero. Rounds
/// half-away-from-zero.
fn percent(count: i64, count_reviews: i64) -> i64 {
    let denominator = count_reviews.max(1) as f64;
    ((count as f64 / denominator) * 100.0).round() as i64
}

fn star_count(body: &Value, key: &str) -> i64 {
    body.get(key).and_then(Value::as_i64).unwrap_or(0)
}

pub struct StatsService;

impl StatsService {
    pub async fn fetch(
        platform: &dyn ReviewPlatform,
        filial_id: Option<&str>,
    ) -> AppResult<StatsResult> {
        let filial_id = match filial_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(AppError::MissingParameters(vec!["filial_id".to_string()])),
        };

        let body = match platform.fetch_stats(filial_id).await {
            Ok(body) => body,
            Err(GatewayError::Status { code: 404, .. }) => return Ok(StatsResult::NoData),
            Err(e) => return Err(e.into()),
        };

        Ok(translate_stats(&body))
    }
}

pub fn translate_stats(body: &Value) -> StatsResult {
    match body.get("status").and_then(Value::as_str) {
        Some("pending") => return StatsResult::Pending,
        Some("in_progress") => {
            return StatsResult::InProgress {
                estimated_completion: body
                    .get("estimated_completion")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        }
        _ => {}
    }

    let count_reviews = star_count(body, "count_reviews");
    let stars = [
        star_count(body, "one_star"),
        star_count(body, "two_stars"),
        star_count(body, "three_stars"),
        star_count(body, "four_stars"),
        star_count(body, "five_stars"),
    ];

    StatsResult::Collected {
        result: RatingStats {
            one_star_count: stars[0],
            one_star_percent: percent(stars[0], count_reviews),
            two_stars_count: stars[1],
            two_stars_percent: percent(stars[1], count_reviews),
            three_stars_count: stars[2],
            three_stars_percent: percent(stars[2], count_reviews),
            four_stars_count: stars[3],
            four_stars_percent: percent(stars[3], count_reviews),
            five_stars_count: stars[4],
            five_stars_percent: percent(stars[4], count_reviews),
            rating: body.get("rating").cloned().unwrap_or(Value::Null),
            count_reviews,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn computes_percentages() {
        let result = translate_stats(&json!({
            "one_star": 1,
            "two_stars": 0,
            "three_stars": 1,
            "four_stars": 2,
            "five_stars": 4,
            "rating": 4.1,
            "count_reviews": 8
        }));

        let StatsResult::Collected { result } = result else {
            panic!("expected collected stats");
        };
        assert_eq!(result.one_star_percent, 13); // 12.5 rounds away from zero
        assert_eq!(result.two_stars_percent, 0);
        assert_eq!(result.five_stars_percent, 50);
        assert_eq!(result.count_reviews, 8);
        assert_eq!(result.rating, json!(4.1));
    }

    #[test]
    fn zero_reviews_does_not_divide_by_zero() {
        let result = translate_stats(&json!({"count_reviews": 0}));
        let StatsResult::Collected { result } = result else {
            panic!("expected collected stats");
        };
        assert_eq!(result.one_star_percent, 0);
        assert_eq!(result.count_reviews, 0);
    }

    #[test]
    fn pending_and_in_progress_pass_through() {
        assert_eq!(
            translate_stats(&json!({"status": "pending"})),
            StatsResult::Pending
        );
        assert_eq!(
            translate_stats(&json!({
                "status": "in_progress",
                "estimated_completion": "2024-05-01T10:00:00Z"
            })),
            StatsResult::InProgress {
                estimated_completion: Some("2024-05-01T10:00:00Z".to_string())
            }
        );
    }

    #[tokio::test]
    async fn upstream_404_means_no_data() {
        use crate::services::dgis::DgisService;
        use crate::services::gateway::GatewayClient;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats/f-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = DgisService::new(GatewayClient::new(&server.uri(), 5).unwrap());
        let result = StatsService::fetch(&svc, Some("f-1")).await.unwrap();
        assert_eq!(result, StatsResult::NoData);
    }

    #[tokio::test]
    async fn missing_filial_id_fails_before_any_call() {
        use crate::services::dgis::DgisService;
        use crate::services::gateway::GatewayClient;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let svc = DgisService::new(GatewayClient::new(&server.uri(), 5).unwrap());
        let err = StatsService::fetch(&svc, None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingParameters(_)));
    }

    #[test]
    fn serializes_with_status_tag() {
        let value = serde_json::to_value(StatsResult::NoData).unwrap();
        assert_eq!(value, json!({"status": "no_data"}));

        let value = serde_json::to_value(StatsResult::InProgress {
            estimated_completion: None,
        })
        .unwrap();
        assert_eq!(value, json!({"status": "in_progress"}));
    }
}
