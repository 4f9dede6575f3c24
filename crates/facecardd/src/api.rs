//! JSON routes.

use crate::engine::EngineHandle;
use crate::error::ApiError;
use crate::registration::{self, ImageStore, Registration};
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post},
    Json, Router,
};
use facecard_core::payload::decode_payload;
use facecard_store::{Catalog, LoyaltyCard, Profile, RewardsOverview, Store, StoreError, Tier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::instrument;

const NO_MATCH: &str = "No face found or face not recognized";

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub store: Store,
    pub images: ImageStore,
    pub catalog: Arc<Catalog>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/identify", post(identify))
        .route("/api/register", post(register))
        .route("/api/loyalty/add", post(add_card))
        .route("/api/loyalty/cards", get(list_cards))
        .route("/api/loyalty/rewards", get(rewards))
        .route("/api/loyalty/claim-reward", post(claim_reward))
        .route("/api/loyalty/points", post(earn_points))
        .route("/api/gallery/reload", post(reload_gallery))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Run a store operation on the blocking pool.
async fn blocking<T, F>(store: &Store, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- identify ---

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Undecodable payloads and extractor failures are reported as "no match".
#[instrument(skip_all)]
async fn identify(
    State(state): State<AppState>,
    Json(req): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let payload =
        non_blank(req.image).ok_or_else(|| ApiError::BadRequest("No image data provided".into()))?;

    let outcome = match tokio::task::spawn_blocking(move || decode_payload(&payload)).await? {
        Ok(image) => state.engine.identify(image).await,
        Err(err) => {
            tracing::warn!(error = %err, "identify: undecodable image");
            Ok(None)
        }
    };

    let hit = outcome.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "identify: extraction failed");
        None
    });

    Ok(Json(match hit {
        Some(hit) => {
            tracing::info!(id = hit.profile.id, distance = hit.distance, "identified");
            IdentifyResponse {
                success: true,
                user: Some(hit.profile),
                message: None,
            }
        }
        None => IdentifyResponse {
            success: false,
            user: None,
            message: Some(NO_MATCH),
        },
    }))
}

// --- register ---

/// Age as posted by forms (string) or JSON clients (number).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AgeField {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub age: Option<AgeField>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: &'static str,
    pub user_id: i64,
    pub image_path: String,
}

#[instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let name = non_blank(req.name);
    let image = non_blank(req.image);
    let mut missing = Vec::new();
    if name.is_none() {
        missing.push("name");
    }
    if req.age.is_none() {
        missing.push("age");
    }
    if image.is_none() {
        missing.push("image");
    }
    let (Some(name), Some(age), Some(image)) = (name, req.age, image) else {
        return Err(ApiError::MissingFields(missing));
    };

    let age = match age {
        AgeField::Number(n) => n,
        AgeField::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("age must be a whole number, got '{s}'")))?,
    };
    if age < 0 {
        return Err(ApiError::BadRequest("age must not be negative".into()));
    }

    let image = tokio::task::spawn_blocking(move || decode_payload(&image))
        .await?
        .map_err(|err| ApiError::BadRequest(format!("Invalid image data: {err}")))?;

    let registration = Registration {
        name,
        age,
        email: non_blank(req.email),
        phone: non_blank(req.phone),
        image,
    };
    let (user_id, path) =
        registration::register(&state.engine, &state.store, &state.images, registration).await?;

    Ok(Json(RegisterResponse {
        success: true,
        message: "User registered successfully",
        user_id,
        image_path: path.to_string_lossy().into_owned(),
    }))
}

// --- loyalty cards ---

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub user_id: Option<i64>,
    pub business_name: Option<String>,
    pub card_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub success: bool,
    pub message: &'static str,
    pub card: LoyaltyCard,
}

#[instrument(skip(state))]
async fn add_card(
    State(state): State<AppState>,
    Json(req): Json<AddCardRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    let business = non_blank(req.business_name);
    let number = non_blank(req.card_number);
    let (Some(user_id), Some(business), Some(number)) = (req.user_id, business, number) else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };

    let initial_points = state.catalog.initial_points(&business);
    let card = blocking(&state.store, move |store| {
        store.add_card(user_id, &business, &number, initial_points)
    })
    .await?;

    Ok(Json(CardResponse {
        success: true,
        message: "Loyalty card added successfully",
        card,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CardsResponse {
    pub success: bool,
    pub cards: Vec<LoyaltyCard>,
}

#[instrument(skip(state))]
async fn list_cards(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<CardsResponse>, ApiError> {
    let user_id = q
        .user_id
        .ok_or_else(|| ApiError::BadRequest("User ID required".into()))?;
    let cards = blocking(&state.store, move |store| store.list_cards(user_id)).await?;
    Ok(Json(CardsResponse {
        success: true,
        cards,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EarnRequest {
    pub user_id: Option<i64>,
    pub business_name: Option<String>,
    pub points: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EarnResponse {
    pub success: bool,
    pub card: LoyaltyCard,
    pub tier: Tier,
}

#[instrument(skip(state))]
async fn earn_points(
    State(state): State<AppState>,
    Json(req): Json<EarnRequest>,
) -> Result<Json<EarnResponse>, ApiError> {
    let business = non_blank(req.business_name);
    let (Some(user_id), Some(business), Some(points)) = (req.user_id, business, req.points) else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };
    let description = non_blank(req.description);

    let (card, tier) = blocking(&state.store, move |store| {
        store.earn_points(user_id, &business, points, description.as_deref())
    })
    .await?;

    Ok(Json(EarnResponse {
        success: true,
        card,
        tier,
    }))
}

// --- rewards ---

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub overview: RewardsOverview,
}

#[instrument(skip(state))]
async fn rewards(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<RewardsResponse>, ApiError> {
    let user_id = q
        .user_id
        .ok_or_else(|| ApiError::BadRequest("User ID required".into()))?;
    let overview = blocking(&state.store, move |store| store.rewards_overview(user_id)).await?;
    Ok(Json(RewardsResponse {
        success: true,
        overview,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub user_id: Option<i64>,
    pub reward_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "expiryDate")]
    pub expiry_date: String,
}

#[instrument(skip(state))]
async fn claim_reward(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let (Some(user_id), Some(reward_id)) = (req.user_id, req.reward_id) else {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };
    let claim = blocking(&state.store, move |store| store.claim_reward(user_id, reward_id)).await?;
    Ok(Json(ClaimResponse {
        success: true,
        message: "Reward claimed successfully",
        expiry_date: claim.expiry_date,
    }))
}

// --- gallery ---

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub identities: usize,
}

#[instrument(skip(state))]
async fn reload_gallery(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let identities = state.engine.reload().await?;
    tracing::info!(identities, "gallery reloaded");
    Ok(Json(ReloadResponse {
        success: true,
        identities,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::testing::{self, SolidColorExtractor};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use facecard_core::FirstMatchMatcher;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        store: Store,
        images: ImageStore,
        app: Router,
    }

    fn test_app() -> TestApp {
        let (dir, store) = testing::store();
        store.seed_rewards(&Catalog::builtin().unwrap()).unwrap();
        let images = ImageStore::new(dir.path().join("images"));
        let engine = spawn_engine(
            Box::new(SolidColorExtractor),
            Box::new(FirstMatchMatcher),
            store.clone(),
            0.6,
        )
        .unwrap();
        let state = AppState {
            engine,
            store: store.clone(),
            images: images.clone(),
            catalog: Arc::new(Catalog::builtin().unwrap()),
        };
        TestApp {
            _dir: dir,
            store,
            images,
            app: router(state, 20 * 1024 * 1024),
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_app();
        let response = t
            .app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_reload_identify() {
        let t = test_app();
        let image = testing::data_url(&testing::solid_image([0.2, 0.6]));

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/register",
            Some(json!({ "name": "Ada", "age": "36", "email": "ada@example.com", "image": image })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        let user_id = body["user_id"].as_i64().unwrap();
        assert!(body["image_path"].as_str().unwrap().ends_with(".jpg"));

        // Invisible until the gallery is reloaded.
        let (_, body) = send(&t.app, "POST", "/api/identify", Some(json!({ "image": image }))).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], NO_MATCH);

        let (status, body) = send(&t.app, "POST", "/api/gallery/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identities"], 1);

        let (status, body) = send(&t.app, "POST", "/api/identify", Some(json!({ "image": image }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["id"], user_id);
        assert_eq!(body["user"]["name"], "Ada");
        assert_eq!(body["user"]["age"], 36);
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let t = test_app();
        let (status, body) = send(&t.app, "POST", "/api/register", Some(json!({ "name": "Ada" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing required fields: age, image");
    }

    #[tokio::test]
    async fn test_register_without_face() {
        let t = test_app();
        let image = testing::data_url(&testing::faceless_image());
        let (status, body) = send(
            &t.app,
            "POST",
            "/api/register",
            Some(json!({ "name": "Ada", "age": 36, "image": image })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No face detected in the image");
        assert!(t.store.list_profiles().unwrap().is_empty());
        let files = std::fs::read_dir(t.images.dir()).map(|d| d.count()).unwrap_or(0);
        assert_eq!(files, 0);
    }

    #[tokio::test]
    async fn test_identify_bad_payloads() {
        let t = test_app();
        let (status, _) = send(&t.app, "POST", "/api/identify", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/identify",
            Some(json!({ "image": "data:image/jpeg;base64,!!!not-base64!!!" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);

        let faceless = testing::data_url(&testing::faceless_image());
        let (_, body) = send(&t.app, "POST", "/api/identify", Some(json!({ "image": faceless }))).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_cards_flow() {
        let t = test_app();
        let ada = testing::register(&t.store, "Ada", [0.1, 0.1]);

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/loyalty/add",
            Some(json!({ "user_id": ada, "business_name": "TechHub", "card_number": "TH-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["card"]["points"], 200);
        assert_eq!(body["card"]["tier_status"], "Bronze");

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/loyalty/add",
            Some(json!({ "user_id": ada, "business_name": "FitLife", "card_number": "TH-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "This card number is already registered");

        let (status, _) = send(
            &t.app,
            "POST",
            "/api/loyalty/add",
            Some(json!({ "user_id": 9999, "business_name": "FitLife", "card_number": "F-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/loyalty/points",
            Some(json!({ "user_id": ada, "business_name": "TechHub", "points": 800 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["card"]["points"], 1000);
        assert_eq!(body["tier"], "Silver");

        let (status, body) = send(&t.app, "GET", &format!("/api/loyalty/cards?user_id={ada}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cards"].as_array().unwrap().len(), 1);
        assert_eq!(body["cards"][0]["card_number"], "TH-1");

        let (status, _) = send(&t.app, "GET", "/api/loyalty/cards", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rewards_and_claim() {
        let t = test_app();
        let ada = testing::register(&t.store, "Ada", [0.1, 0.1]);
        t.store.add_card(ada, "FreshMart", "FM-1", 50).unwrap();

        let (status, body) = send(&t.app, "GET", &format!("/api/loyalty/rewards?user_id={ada}"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["total_points"], 50);
        assert_eq!(body["current_tier"], "Bronze");
        assert_eq!(body["points_value"], 0.5);
        let rewards = body["rewards"].as_array().unwrap();
        assert!(rewards.iter().all(|r| r["tier_required"] != "Gold"));
        let bonus = rewards
            .iter()
            .find(|r| r["name"] == "First Purchase Bonus")
            .unwrap();
        assert_eq!(bonus["icon"], "🎯");
        assert_eq!(bonus["status"], "available");
        let reward_id = bonus["id"].as_i64().unwrap();

        let claim = json!({ "user_id": ada, "reward_id": reward_id });
        let (status, body) = send(&t.app, "POST", "/api/loyalty/claim-reward", Some(claim.clone())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Reward claimed successfully");
        assert!(body["expiryDate"].is_string());

        let (status, body) = send(&t.app, "POST", "/api/loyalty/claim-reward", Some(claim)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Reward already claimed");

        let (status, _) = send(
            &t.app,
            "POST",
            "/api/loyalty/claim-reward",
            Some(json!({ "user_id": ada, "reward_id": 123456 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
