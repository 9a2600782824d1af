//! HTTP API routes
//!
//! Defines all REST API endpoints for the server.

use crate::auth::{IdentityProvider, Viewer};
use crate::coord::{distance_km, is_nearby, parse_location_string, Coordinates};
use crate::error::Error;
use crate::feed::{FeedPhase, FeedState};
use crate::listing::{Listing, NewListing};
use crate::server::state::AppState;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/feed", get(feed_handler))
        .route("/api/feed/refresh", post(refresh_handler))
        .route("/api/session", put(sign_in_handler).delete(sign_out_handler))
        .route("/api/distance", get(distance_handler))
        .route("/api/listings", get(own_listings_handler).post(create_listing_handler))
        .route("/api/listings/:id", delete(delete_listing_handler))
        .with_state(state)
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidCoordinates(_) => "INVALID_COORDINATES",
            Error::InvalidListing(_) => "INVALID_LISTING",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Store(_) => "STORE_ERROR",
            _ => "INTERNAL_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

/// Status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server is running
    pub running: bool,
    /// Server version
    pub version: String,
    /// Listing store backend
    pub store: String,
    /// Positioning capability
    pub positioning: String,
    /// Signed-in viewer, if any
    pub viewer: Option<String>,
    /// Phase of the viewer's feed
    pub phase: FeedPhase,
    /// Uptime in seconds
    pub uptime_secs: u64,
}

/// Server status endpoint
///
/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store_name().to_string(),
        positioning: state.positioning_name().to_string(),
        viewer: state.session.current_user_id(),
        phase: state.supervisor.phase(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Current feed state
///
/// GET /api/feed
async fn feed_handler(State(state): State<Arc<AppState>>) -> Json<FeedState> {
    Json(state.supervisor.current())
}

/// Start a new feed round (also the retry after an error)
///
/// POST /api/feed/refresh
async fn refresh_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, Rejection> {
    signed_in_user(&state)?;
    state.supervisor.refresh();
    Ok(StatusCode::ACCEPTED)
}

type Rejection = (StatusCode, Json<ApiError>);

fn signed_in_user(state: &AppState) -> Result<String, Rejection> {
    state.session.current_user_id().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(ApiError::new("NOT_SIGNED_IN", "No viewer is signed in")),
        )
    })
}

fn store_rejection(err: Error) -> Rejection {
    let status = match err {
        Error::InvalidListing(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ApiError::from(err)))
}

/// The signed-in viewer's own listings
///
/// GET /api/listings
async fn own_listings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Listing>>, Rejection> {
    let user_id = signed_in_user(&state)?;
    let listings = state
        .store
        .listings_by_owner(&user_id)
        .await
        .map_err(store_rejection)?;
    Ok(Json(listings))
}

/// Post a listing owned by the signed-in viewer
///
/// POST /api/listings
async fn create_listing_handler(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<NewListing>,
) -> Result<(StatusCode, Json<Listing>), Rejection> {
    let user_id = signed_in_user(&state)?;
    let draft = NewListing { user_id, ..draft };

    let listing = state
        .store
        .create_listing(draft)
        .await
        .map_err(store_rejection)?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// Delete one of the signed-in viewer's listings
///
/// DELETE /api/listings/:id
async fn delete_listing_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Rejection> {
    let user_id = signed_in_user(&state)?;

    let removed = state
        .store
        .delete_listing(&user_id, &id)
        .await
        .map_err(store_rejection)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new("NOT_FOUND", format!("No listing {} of yours", id))),
        ))
    }
}

/// Sign a viewer in; their feed starts immediately
///
/// PUT /api/session
async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(viewer): Json<Viewer>,
) -> Result<Json<Viewer>, ApiError> {
    if viewer.user_id.trim().is_empty() {
        return Err(ApiError::new("INVALID_VIEWER", "user_id must not be empty"));
    }

    state.session.sign_in(viewer.clone());
    Ok(Json(viewer))
}

/// Sign the viewer out and tear the feed down
///
/// DELETE /api/session
async fn sign_out_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.sign_out();
    StatusCode::NO_CONTENT
}

/// Distance query parameters
#[derive(Debug, Deserialize)]
pub struct DistanceQuery {
    /// `"<lat>, <lng>"`
    pub from: String,
    /// `"<lat>, <lng>"`
    pub to: String,
    /// Optional radius to test against, in kilometers
    pub radius: Option<f64>,
}

/// Distance response
#[derive(Debug, Serialize, Deserialize)]
pub struct DistanceResponse {
    pub from: Coordinates,
    pub to: Coordinates,
    pub distance_km: f64,
    /// Whether `to` is strictly inside `radius` of `from`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby: Option<bool>,
}

/// Great-circle distance between two coordinate strings
///
/// GET /api/distance?from=&to=[&radius=]
async fn distance_handler(
    Query(query): Query<DistanceQuery>,
) -> Result<Json<DistanceResponse>, ApiError> {
    let parse = |s: &str| {
        parse_location_string(Some(s)).ok_or_else(|| {
            ApiError::from(Error::InvalidCoordinates(format!(
                "Expected \"<lat>, <lng>\", got \"{}\"",
                s
            )))
        })
    };
    let from = parse(&query.from)?;
    let to = parse(&query.to)?;

    if let Some(radius) = query.radius {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ApiError::new("INVALID_RADIUS", "Radius must be positive"));
        }
    }

    let distance_km = distance_km(from, to);
    Ok(Json(DistanceResponse {
        from,
        to,
        distance_km,
        nearby: query.radius.map(|r| is_nearby(distance_km, r)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geo::StaticPositioning;
    use crate::listing::tests::listing_at;
    use crate::store::MemoryListingStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn create_test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.geolocation.timeout_secs = 1;

        let store = Arc::new(MemoryListingStore::with_listings(vec![
            listing_at("alice-1", "alice", Some("9.02, 38.76")),
            listing_at("bob-1", "bob", Some("9.03, 38.76")),
            listing_at("bob-2", "bob", Some("Kazanchis")),
        ]));
        let positioning = Arc::new(StaticPositioning::new(Coordinates::new(9.0105, 38.7645)));

        Arc::new(AppState::new(config, store, positioning))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn sign_in_request(user_id: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/api/session")
            .header("Content-Type", "application/json")
            .body(Body::from(
                serde_json::json!({ "user_id": user_id }).to_string(),
            ))
            .unwrap()
    }

    async fn wait_live(state: &AppState) {
        let mut rx = state.supervisor.state();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.phase == FeedPhase::Live),
        )
        .await
        .expect("timed out waiting for live feed")
        .expect("feed state channel closed");
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let status: StatusResponse = body_json(response).await;
        assert!(status.running);
        assert_eq!(status.store, "memory");
        assert_eq!(status.positioning, "static");
        assert_eq!(status.viewer, None);
        assert_eq!(status.phase, FeedPhase::Idle);
    }

    #[tokio::test]
    async fn test_feed_follows_session() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app.clone().oneshot(sign_in_request("alice")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        wait_live(&state).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let feed: FeedState = body_json(response).await;
        let ids: Vec<_> = feed.listings.iter().map(|e| e.listing.id.as_str()).collect();
        assert_eq!(ids, vec!["bob-1"]);
        assert_eq!(feed.round, 1);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let mut rx = state.supervisor.state();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.phase == FeedPhase::Idle),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(state.session.current_user_id(), None);
    }

    #[tokio::test]
    async fn test_refresh_requires_viewer() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let refresh = || {
            Request::builder()
                .method("POST")
                .uri("/api/feed/refresh")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(refresh()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, "NOT_SIGNED_IN");

        app.clone().oneshot(sign_in_request("bob")).await.unwrap();
        wait_live(&state).await;

        let response = app.clone().oneshot(refresh()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let mut rx = state.supervisor.state();
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.round == 2 && s.phase == FeedPhase::Live),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.listings.len(), 1);
        assert_eq!(state.listings[0].listing.id, "alice-1");
    }

    #[tokio::test]
    async fn test_sign_in_rejects_blank_user() {
        let state = create_test_state();
        let app = create_router(state);

        let response = app.oneshot(sign_in_request("  ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, "INVALID_VIEWER");
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_own_listings_require_viewer() {
        let state = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(empty_request("GET", "/api/listings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, "NOT_SIGNED_IN");
    }

    #[tokio::test]
    async fn test_post_and_delete_own_listing() {
        let state = create_test_state();
        let app = create_router(state.clone());
        app.clone().oneshot(sign_in_request("bob")).await.unwrap();

        // The owner always comes from the session
        let body = serde_json::json!({
            "user_id": "alice",
            "category": "car",
            "title": "Toyota Vitz 2012",
            "price": 1200000.0,
            "location": "9.02, 38.75"
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/listings", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Listing = body_json(response).await;
        assert_eq!(created.user_id, "bob");

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/listings"))
            .await
            .unwrap();
        let own: Vec<Listing> = body_json(response).await;
        assert_eq!(own.len(), 3);
        assert!(own.iter().all(|l| l.user_id == "bob"));

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/listings/alice-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let uri = format!("/api/listings/{}", created.id);
        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_post_rejects_invalid_listing() {
        let state = create_test_state();
        let app = create_router(state);
        app.clone().oneshot(sign_in_request("bob")).await.unwrap();

        let body = serde_json::json!({ "category": "product", "title": " " });
        let response = app
            .oneshot(json_request("POST", "/api/listings", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, "INVALID_LISTING");
    }

    #[tokio::test]
    async fn test_distance_endpoint() {
        let state = create_test_state();
        let app = create_router(state);

        let uri = format!(
            "/api/distance?from={}&to={}&radius=5",
            urlencoding::encode("9.0105, 38.7645"),
            urlencoding::encode("9.02, 38.76")
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let distance: DistanceResponse = body_json(response).await;
        assert!(distance.distance_km > 1.0 && distance.distance_km < 1.3);
        assert_eq!(distance.nearby, Some(true));
    }

    #[tokio::test]
    async fn test_distance_invalid_coordinates() {
        let state = create_test_state();
        let app = create_router(state);

        let uri = format!(
            "/api/distance?from={}&to={}",
            urlencoding::encode("Bole, Addis Ababa"),
            urlencoding::encode("9.02, 38.76")
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, "INVALID_COORDINATES");
    }
}
