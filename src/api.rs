// 🌐 HTTP surface - axum routes over the orchestrators
//
// Every body is decoded once into a typed request; anything that does not
// match, including axum's own extractor rejections, is rejected as an
// invalid argument. Responses are
// `{ success: true, data }` or `{ success: false, error, category }`.

use axum::{
    async_trait,
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, info_span, Level};
use uuid::Uuid;

use crate::app::Bff;
use crate::entities::{Billing, CheckoutLink, Comment, Item, Tag, VoteType};
use crate::error::{BffError, BffResult};
use crate::identity::Caller;
use crate::items::ItemRequest;
use crate::payment::PaymentConfirmation;
use crate::repository::RecordId;
use crate::toggle::{Relation, ToggleOutcome};
use crate::uploads::UploadFile;
use crate::vote::{VoteOutcome, VoteRequest, DEFAULT_TOP_TAGS};

// ============================================================================
// ENVELOPES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    category: &'static str,
}

impl IntoResponse for BffError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, category = self.category(), "request failed");
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            category: self.category(),
        };
        (status, Json(body)).into_response()
    }
}

/// Extractor rejections become structured failures; an over-limit body is
/// reported as such rather than as a malformed one
fn rejected(status: StatusCode, detail: String) -> BffError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        BffError::payload_too_large(detail)
    } else {
        BffError::invalid_argument(detail)
    }
}

impl From<JsonRejection> for BffError {
    fn from(rejection: JsonRejection) -> Self {
        rejected(
            rejection.status(),
            format!("malformed request body: {}", rejection.body_text()),
        )
    }
}

impl From<PathRejection> for BffError {
    fn from(rejection: PathRejection) -> Self {
        rejected(
            rejection.status(),
            format!("malformed path: {}", rejection.body_text()),
        )
    }
}

impl From<QueryRejection> for BffError {
    fn from(rejection: QueryRejection) -> Self {
        rejected(
            rejection.status(),
            format!("malformed query: {}", rejection.body_text()),
        )
    }
}

impl From<MultipartRejection> for BffError {
    fn from(rejection: MultipartRejection) -> Self {
        rejected(
            rejection.status(),
            format!("invalid multipart payload: {}", rejection.body_text()),
        )
    }
}

impl From<MultipartError> for BffError {
    fn from(err: MultipartError) -> Self {
        rejected(
            err.status(),
            format!("invalid multipart payload: {}", err.body_text()),
        )
    }
}

fn decode<T: DeserializeOwned>(body: Result<Json<Value>, JsonRejection>) -> BffResult<T> {
    let Json(body) = body?;
    serde_json::from_value(body)
        .map_err(|e| BffError::invalid_argument(format!("malformed request body: {e}")))
}

/// Caller resolved from the `Authorization` header
pub struct AuthCaller(pub Caller);

#[async_trait]
impl FromRequestParts<Bff> for AuthCaller {
    type Rejection = BffError;

    async fn from_request_parts(parts: &mut Parts, state: &Bff) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        state.identity.resolve(header).map(AuthCaller)
    }
}

// ============================================================================
// REQUEST / RESPONSE SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct CommentBody {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SortedQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CheckoutBody {
    plan: String,
    billing: Billing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    checkout_session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FollowStatus {
    is_following: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteStatus {
    tag_id: RecordId,
    user_vote_status: Option<VoteType>,
}

#[derive(Debug, Serialize)]
struct Deleted {
    id: RecordId,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health
async fn health_check() -> Json<ApiResponse<&'static str>> {
    ApiResponse::ok("OK")
}

/// POST /api/items (multipart: text fields + image files)
async fn create_item(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    multipart: Result<Multipart, MultipartRejection>,
) -> BffResult<(StatusCode, Json<ApiResponse<Item>>)> {
    let mut multipart = multipart?;
    let mut form = HashMap::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                files.push(UploadFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field.text().await?;
                form.insert(name, text);
            }
        }
    }

    let request = ItemRequest::from_form(&form)?;
    let item = bff.items.create_item(caller.user_id, &request, files).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(item)))
}

/// PUT /api/items/:id
async fn update_item(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> BffResult<Json<ApiResponse<Item>>> {
    let Path(id) = id?;
    let request: ItemRequest = decode(body)?;
    let item = bff.items.update_item(caller.user_id, RecordId(id), &request).await?;
    Ok(ApiResponse::ok(item))
}

/// DELETE /api/items/:id
async fn delete_item(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
) -> BffResult<Json<ApiResponse<Deleted>>> {
    let Path(id) = id?;
    bff.items.delete_item(caller.user_id, RecordId(id)).await?;
    Ok(ApiResponse::ok(Deleted { id: RecordId(id) }))
}

/// POST /api/items/:id/like
async fn like_item(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
) -> BffResult<Json<ApiResponse<ToggleOutcome>>> {
    let Path(id) = id?;
    let outcome = bff
        .toggles
        .toggle(caller.user_id, RecordId(id), Relation::Like)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// POST /api/items/:id/comments
async fn post_comment(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> BffResult<(StatusCode, Json<ApiResponse<Comment>>)> {
    let Path(id) = id?;
    let body: CommentBody = decode(body)?;
    let comment = bff
        .items
        .post_comment(caller.user_id, RecordId(id), &body.content)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(comment)))
}

/// POST /api/users/:id/follow
async fn follow_user(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
) -> BffResult<Json<ApiResponse<ToggleOutcome>>> {
    let Path(id) = id?;
    let outcome = bff
        .toggles
        .toggle(caller.user_id, RecordId(id), Relation::Follow)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// GET /api/users/:id/follow
async fn follow_status(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
) -> BffResult<Json<ApiResponse<FollowStatus>>> {
    let Path(id) = id?;
    let is_following = bff
        .toggles
        .is_active(caller.user_id, RecordId(id), Relation::Follow)
        .await;
    Ok(ApiResponse::ok(FollowStatus { is_following }))
}

/// POST /api/tags/vote
async fn vote(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    body: Result<Json<Value>, JsonRejection>,
) -> BffResult<Json<ApiResponse<VoteOutcome>>> {
    let request: VoteRequest = decode(body)?;
    let outcome = bff.votes.vote(caller.user_id, &request).await?;
    Ok(ApiResponse::ok(outcome))
}

/// GET /api/tags/:id/vote
async fn vote_status(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    id: Result<Path<u64>, PathRejection>,
) -> BffResult<Json<ApiResponse<VoteStatus>>> {
    let Path(id) = id?;
    let tag_id = RecordId(id);
    let user_vote_status = bff.votes.vote_status(caller.user_id, tag_id).await;
    Ok(ApiResponse::ok(VoteStatus {
        tag_id,
        user_vote_status,
    }))
}

/// GET /api/tags/sorted?limit=N
async fn sorted_tags(
    State(bff): State<Bff>,
    query: Result<Query<SortedQuery>, QueryRejection>,
) -> BffResult<Json<ApiResponse<Vec<Tag>>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_TAGS);
    let tags = bff.votes.top_tags(limit).await?;
    Ok(ApiResponse::ok(tags))
}

/// POST /api/payments/checkout
async fn create_checkout(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    body: Result<Json<Value>, JsonRejection>,
) -> BffResult<Json<ApiResponse<CheckoutLink>>> {
    let body: CheckoutBody = decode(body)?;
    let link = bff
        .payments
        .create_checkout(caller.user_id, &body.billing, &body.plan)
        .await?;
    Ok(ApiResponse::ok(link))
}

/// POST /api/payments/verify
async fn verify_payment(
    State(bff): State<Bff>,
    AuthCaller(caller): AuthCaller,
    body: Result<Json<Value>, JsonRejection>,
) -> BffResult<Json<ApiResponse<PaymentConfirmation>>> {
    let body: VerifyBody = decode(body)?;
    let confirmation = bff
        .payments
        .confirm_payment(caller.user_id, &body.checkout_session_id)
        .await?;
    Ok(ApiResponse::ok(confirmation))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(bff: Bff) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/items",
            post(create_item).layer(DefaultBodyLimit::max(bff.max_upload_bytes)),
        )
        .route("/items/:id", put(update_item).delete(delete_item))
        .route("/items/:id/like", post(like_item))
        .route("/items/:id/comments", post(post_comment))
        .route("/users/:id/follow", post(follow_user).get(follow_status))
        .route("/tags/vote", post(vote))
        .route("/tags/sorted", get(sorted_tags))
        .route("/tags/:id/vote", get(vote_status))
        .route("/payments/checkout", post(create_checkout))
        .route("/payments/verify", post(verify_payment))
        .with_state(bff);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            })
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================
