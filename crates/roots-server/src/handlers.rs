//! HTTP request handlers for the family graph.
//!
//! Every route except `/health` requires `Authorization: Bearer <jwt>`.
//! Profile and relationship writes are admin-only, except that owners may
//! edit their own profile and creators may edit their own relationships.

use crate::config::ServerConfig;
use crate::session::{SessionClaims, SessionError, SessionManager};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use roots_domain::{
    NewProfile, Profile, ProfileId, ProfileUpdate, RelatedProfile, Relationship, RelationshipId,
    RelationshipKind, RelationshipMetadata, RelationshipUpdate,
};
use roots_graph::{FamilyExport, FamilyTreeNode, GraphError, ReconcileReport, RelationshipGraph};
use roots_store::{StoreBackend, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Profiles and relationships
    pub graph: Arc<RelationshipGraph<StoreBackend>>,
    /// Session manager for JWT token operations
    pub session_manager: Arc<SessionManager>,
    /// Name of the active storage backend
    pub storage_backend: &'static str,
    /// Tree depth when the request gives none
    pub default_tree_depth: usize,
    /// Cap applied to every requested tree depth
    pub max_tree_depth: usize,
    /// List size when the request gives none
    pub default_list_limit: usize,
}

impl AppState {
    /// Build state around an already opened store
    pub fn new(store: StoreBackend, config: &ServerConfig) -> Self {
        Self {
            storage_backend: store.name(),
            graph: Arc::new(RelationshipGraph::new(Arc::new(store))),
            session_manager: Arc::new(SessionManager::new(
                &config.jwt_secret,
                config.token_expiry_secs,
            )),
            default_tree_depth: config.default_tree_depth,
            max_tree_depth: config.max_tree_depth,
            default_list_limit: config.default_list_limit,
        }
    }

    /// Open the configured store and build state around it
    pub fn from_config(config: &ServerConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config.storage.open()?, config))
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Always "ok" when the server answers
    pub status: String,
    /// Active storage backend ("memory" or "sqlite")
    pub storage_backend: String,
}

/// List envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    /// Result items
    pub data: T,
}

/// Freshly issued invitation
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationResponse {
    /// One-time claim token
    pub token: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Profile claim request
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// Invitation token
    pub token: String,
    /// Profile the caller expects to claim (optional cross-check)
    #[serde(rename = "profileId", default)]
    pub profile_id: Option<ProfileId>,
}

/// Relationship creation request
#[derive(Debug, Deserialize)]
pub struct CreateRelationshipRequest {
    /// First endpoint (the parent for parent edges)
    #[serde(rename = "profileId1", default)]
    pub profile_id_1: Option<ProfileId>,
    /// Second endpoint (the child for parent edges)
    #[serde(rename = "profileId2", default)]
    pub profile_id_2: Option<ProfileId>,
    /// Relationship kind name
    #[serde(rename = "relationType", alias = "type", default)]
    pub relation_type: Option<String>,
    /// Marriage details and notes
    #[serde(flatten)]
    pub metadata: RelationshipMetadata,
}

/// `?limit=` for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Maximum number of items
    pub limit: Option<usize>,
}

/// `?type=` for a profile's relationships
#[derive(Debug, Default, Deserialize)]
pub struct RelationsQuery {
    /// Relationship kind filter
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `?max_depth=` for the family tree
#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    /// Levels expanded below the root
    pub max_depth: Option<usize>,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Graph operation failed
    Graph(GraphError),
    /// Authentication failed
    Session(SessionError),
    /// Authenticated, but not allowed
    Forbidden(String),
    /// Request is missing or malformed input
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Graph(GraphError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            AppError::Graph(GraphError::InvalidArgument(msg)) => (StatusCode::BAD_REQUEST, msg),
            AppError::Graph(GraphError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
            AppError::Graph(GraphError::Unauthorized(msg)) => (StatusCode::FORBIDDEN, msg),
            AppError::Graph(e) => {
                error!(error = %e, "graph operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Session(SessionError::JwtEncode(e)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Session(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<GraphError> for AppError {
    fn from(e: GraphError) -> Self {
        AppError::Graph(e)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

/// Claims of the authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let claims = state.session_manager.validate_bearer(header)?;
        Ok(AuthUser(claims))
    }
}

impl AuthUser {
    fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }
}

/// GET /health - Liveness check
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        storage_backend: state.storage_backend.to_string(),
    })
}

/// GET /profiles
async fn list_profiles(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DataResponse<Vec<Profile>>>, AppError> {
    let limit = query.limit.unwrap_or(state.default_list_limit);
    let data = state.graph.profiles().list_profiles(Some(limit)).await?;
    Ok(Json(DataResponse { data }))
}

/// POST /profiles (admin)
async fn create_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    auth.require_admin()?;
    let profile = state.graph.profiles().create_profile(input, &auth.0.sub).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /profiles/:id
async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.graph.profiles().require_profile(&id).await?))
}

/// PUT /profiles/:id (owner or admin)
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<ProfileId>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let directory = state.graph.profiles();
    let profile = directory.require_profile(&id).await?;
    let is_owner = profile.user_id.as_deref() == Some(auth.0.sub.as_str());
    if !is_owner && !auth.0.is_admin() {
        return Err(AppError::Forbidden(
            "Only the profile owner or an admin can edit this profile".to_string(),
        ));
    }
    Ok(Json(directory.update_profile(&id, update).await?))
}

/// POST /profiles/:id/invitation (admin)
async fn issue_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<InvitationResponse>, AppError> {
    auth.require_admin()?;
    let token = state.graph.profiles().issue_invitation(&id).await?;
    Ok(Json(InvitationResponse { token }))
}

/// POST /profiles/claim - Bind a profile to the caller
async fn claim_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .graph
        .profiles()
        .claim_profile(&request.token, request.profile_id.as_ref(), &auth.0.sub)
        .await?;
    Ok(Json(profile))
}

/// GET /profiles/:id/relations?type=
async fn profile_relations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
    Query(query): Query<RelationsQuery>,
) -> Result<Json<DataResponse<Vec<Relationship>>>, AppError> {
    let data = match query.kind {
        Some(kind) => {
            let kind = parse_kind(&kind)?;
            state.graph.get_profile_relationships_by_type(&id, kind).await?
        }
        None => state.graph.get_profile_relationships(&id).await?,
    };
    Ok(Json(DataResponse { data }))
}

/// GET /profiles/:id/spouses
async fn spouses(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<DataResponse<Vec<RelatedProfile>>>, AppError> {
    let data = state.graph.get_spouses(&id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /profiles/:id/parents
async fn parents(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<DataResponse<Vec<RelatedProfile>>>, AppError> {
    let data = state.graph.get_parents(&id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /profiles/:id/children
async fn children(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<DataResponse<Vec<RelatedProfile>>>, AppError> {
    let data = state.graph.get_children(&id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /profiles/:id/siblings
async fn siblings(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
) -> Result<Json<DataResponse<Vec<RelatedProfile>>>, AppError> {
    let data = state.graph.get_siblings(&id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /profiles/:id/tree?max_depth=
///
/// The requested depth is capped at the configured `max_tree_depth`.
async fn family_tree(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<ProfileId>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<FamilyTreeNode>, AppError> {
    let max_depth = query
        .max_depth
        .unwrap_or(state.default_tree_depth)
        .min(state.max_tree_depth);
    let tree = state
        .graph
        .get_family_tree(&id, max_depth)
        .await?
        .ok_or_else(|| GraphError::NotFound(format!("Profile {} not found", id)))?;
    Ok(Json(tree))
}

/// GET /relations
async fn list_relations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DataResponse<Vec<Relationship>>>, AppError> {
    let mut data = state.graph.get_all_relationships().await?;
    data.truncate(query.limit.unwrap_or(state.default_list_limit));
    Ok(Json(DataResponse { data }))
}

/// POST /relations (admin)
async fn create_relation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateRelationshipRequest>,
) -> Result<(StatusCode, Json<Relationship>), AppError> {
    auth.require_admin()?;

    let (Some(profile_id_1), Some(profile_id_2), Some(relation_type)) = (
        request.profile_id_1,
        request.profile_id_2,
        request.relation_type,
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: profileId1, profileId2, relationType".to_string(),
        ));
    };
    let kind = parse_kind(&relation_type)?;
    let metadata = (!request.metadata.is_empty()).then_some(request.metadata);

    let relationship = state
        .graph
        .create_relationship(&profile_id_1, &profile_id_2, kind, &auth.0.sub, metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(relationship)))
}

/// GET /relations/:id
async fn get_relation(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<RelationshipId>,
) -> Result<Json<Relationship>, AppError> {
    let relationship = state
        .graph
        .get_relationship(&id)
        .await?
        .ok_or_else(|| GraphError::NotFound(format!("Relationship {} not found", id)))?;
    Ok(Json(relationship))
}

/// PUT /relations/:id (creator or admin)
async fn update_relation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<RelationshipId>,
    Json(update): Json<RelationshipUpdate>,
) -> Result<Json<Relationship>, AppError> {
    let existing = state
        .graph
        .get_relationship(&id)
        .await?
        .ok_or_else(|| GraphError::NotFound(format!("Relationship {} not found", id)))?;
    if existing.created_by != auth.0.sub && !auth.0.is_admin() {
        return Err(AppError::Forbidden(
            "Only the creator or an admin can edit this relationship".to_string(),
        ));
    }

    let relationship = state
        .graph
        .update_relationship(&id, update, &auth.0.sub)
        .await?;
    Ok(Json(relationship))
}

/// DELETE /relations/:id (admin)
async fn delete_relation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<RelationshipId>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;
    state.graph.delete_relationship(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /export
async fn export(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<FamilyExport>, AppError> {
    Ok(Json(state.graph.export().await?))
}

/// POST /admin/reconcile (admin)
async fn reconcile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ReconcileReport>, AppError> {
    auth.require_admin()?;
    Ok(Json(state.graph.reconcile().await?))
}

fn parse_kind(value: &str) -> Result<RelationshipKind, AppError> {
    value.parse().map_err(AppError::BadRequest)
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/profiles", get(list_profiles).post(create_profile))
        .route("/profiles/claim", post(claim_profile))
        .route("/profiles/:id", get(get_profile).put(update_profile))
        .route("/profiles/:id/invitation", post(issue_invitation))
        .route("/profiles/:id/relations", get(profile_relations))
        .route("/profiles/:id/spouses", get(spouses))
        .route("/profiles/:id/parents", get(parents))
        .route("/profiles/:id/children", get(children))
        .route("/profiles/:id/siblings", get(siblings))
        .route("/profiles/:id/tree", get(family_tree))
        .route("/relations", get(list_relations).post(create_relation))
        .route(
            "/relations/:id",
            get(get_relation).put(update_relation).delete(delete_relation),
        )
        .route("/export", get(export))
        .route("/admin/reconcile", post(reconcile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use axum::body::Body;
    use axum::http::Request;
    use roots_store::MemoryStore;
    use tower::ServiceExt; // for oneshot

    fn create_test_state() -> AppState {
        AppState::new(
            StoreBackend::Memory(MemoryStore::new()),
            &ServerConfig::default_test_config(),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = create_test_state();
        let app = create_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/profiles")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_member_cannot_create_profile() {
        let state = create_test_state();
        let token = state
            .session_manager
            .generate_token("user-1", Role::Member)
            .unwrap();
        let app = create_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/profiles")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Ama"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_graph_errors_map_to_status() {
        let cases = [
            (GraphError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GraphError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (GraphError::Conflict("x".into()), StatusCode::CONFLICT),
            (GraphError::Unauthorized("x".into()), StatusCode::FORBIDDEN),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).into_response().status(), status);
        }
        assert_eq!(
            AppError::from(SessionError::TokenExpired).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_parse_kind_accepts_legacy_name() {
        assert_eq!(parse_kind("parent-child").unwrap(), RelationshipKind::Parent);
        assert!(matches!(parse_kind("cousin"), Err(AppError::BadRequest(_))));
    }
}
