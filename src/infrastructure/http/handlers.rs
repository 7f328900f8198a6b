//! Route handlers for the inbound HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::domain::errors::QueryError;
use crate::domain::models::query::{InvalidQueryInput, QueryInput, QueryResult};
use crate::domain::ports::{NotificationSender, TripleStoreClient};
use crate::services::index_store::IndexStore;
use crate::services::query_planner::QueryPlanner;

/// Shared application state handed to every handler.
pub struct AppState<T: TripleStoreClient> {
    pub query_planner: Arc<QueryPlanner<T>>,
    pub index_store: Arc<IndexStore<T>>,
    pub notifier: Arc<dyn NotificationSender>,
    pub max_related_depth: u32,
}

#[derive(Debug, Serialize)]
struct SuccessEnvelope<D: Serialize> {
    status: &'static str,
    data: D,
}

impl<D: Serialize> SuccessEnvelope<D> {
    fn new(data: D) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    errors: Vec<InvalidQueryInput>,
}

#[derive(Debug, Deserialize)]
struct RelatedDepthParams {
    related_depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    id: String,
}

#[derive(Debug, Serialize)]
struct NotificationResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct Banner {
    service: &'static str,
    version: &'static str,
}

pub fn build_router<T: TripleStoreClient + 'static>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route(
            "/entity-types/:entity_type/id-types/:source_id_type/ids/:source_id/repositories",
            get(get_repositories_for_id::<T>),
        )
        .route(
            "/entity-types/:entity_type/repositories",
            post(bulk_query::<T>),
        )
        .route(
            "/entity-types/:entity_type/id-types/:source_id_type/ids/:source_id/repositories/:repository_id",
            delete(delete_entity::<T>),
        )
        .route("/notifications", post(post_notification::<T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn banner() -> Json<Banner> {
    Json(Banner {
        service: "chubindex",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_repositories_for_id<T: TripleStoreClient + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path((_entity_type, source_id_type, source_id)): Path<(String, String, String)>,
    Query(params): Query<RelatedDepthParams>,
) -> Result<Json<SuccessEnvelope<QueryResult>>, (StatusCode, Json<ErrorEnvelope>)> {
    let related_depth = params
        .related_depth
        .unwrap_or(0)
        .min(state.max_related_depth);

    let input = QueryInput {
        source_id,
        source_id_type,
    };

    let mut results = run_query(&state, vec![input], related_depth).await?;
    let result = results.remove(0);

    if result.repositories.is_empty() && result.relations.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorEnvelope {
                status: "error",
                errors: vec![InvalidQueryInput {
                    source_id: Some(result.source_id),
                    source_id_type: Some(result.source_id_type),
                    reason: "no matching entity".to_string(),
                }],
            }),
        ));
    }

    Ok(Json(SuccessEnvelope::new(result)))
}

async fn bulk_query<T: TripleStoreClient + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(_entity_type): Path<String>,
    Query(params): Query<RelatedDepthParams>,
    Json(inputs): Json<Vec<QueryInput>>,
) -> Result<Json<SuccessEnvelope<Vec<QueryResult>>>, (StatusCode, Json<ErrorEnvelope>)> {
    let related_depth = params
        .related_depth
        .unwrap_or(0)
        .min(state.max_related_depth);

    let results = run_query(&state, inputs, related_depth).await?;
    Ok(Json(SuccessEnvelope::new(results)))
}

async fn run_query<T: TripleStoreClient + 'static>(
    state: &AppState<T>,
    inputs: Vec<QueryInput>,
    related_depth: u32,
) -> Result<Vec<QueryResult>, (StatusCode, Json<ErrorEnvelope>)> {
    state
        .query_planner
        .query(inputs, related_depth)
        .await
        .map_err(|err| match err {
            QueryError::BadRequest(errors) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope {
                    status: "error",
                    errors,
                }),
            ),
            other => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorEnvelope {
                    status: "error",
                    errors: vec![InvalidQueryInput {
                        source_id: None,
                        source_id_type: None,
                        reason: other.to_string(),
                    }],
                }),
            ),
        })
}

async fn delete_entity<T: TripleStoreClient + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path((entity_type, source_id_type, source_id, repository_id)): Path<(
        String,
        String,
        String,
        String,
    )>,
) -> StatusCode {
    let id_types: Vec<&str> = source_id_type.split(',').collect();
    let values: Vec<&str> = source_id.split(',').collect();

    if id_types.len() != values.len() || id_types.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    let ids: Vec<(String, String)> = id_types
        .into_iter()
        .zip(values)
        .map(|(t, v)| (t.to_string(), v.to_string()))
        .collect();

    match state
        .index_store
        .delete_entity_by_ids(&entity_type, &ids, &repository_id)
        .await
    {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn post_notification<T: TripleStoreClient + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Json(body): Json<NotificationBody>,
) -> Json<NotificationResponse> {
    state.notifier.try_notify(body.id);
    Json(NotificationResponse { status: "ok" })
}
