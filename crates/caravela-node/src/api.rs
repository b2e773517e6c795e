//! The node's HTTP surfaces.
//!
//! One axum router serves both the user-facing REST API and the
//! node-to-node RPC endpoints under `/node/...`. Errors leave as an
//! [`ErrorResponse`] with a machine-readable code; message detail is kept
//! operator-safe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use caravela_discovery::DiscoveryError;
use caravela_proto::{
    ContainerConfig, ContainerStatus, CreateOfferRequest, ErrorCode, ErrorResponse,
    GetOffersRequest, GetOffersResponse, LaunchContainersRequest, NeighbourOffersRequest,
    RefreshOfferRequest, RefreshOfferResponse, RemoveOfferRequest, StopLocalContainerRequest,
    UpdateOfferRequest,
};
use caravela_scheduler::SchedulerError;

use crate::error::Result;
use crate::node::Node;

/// Paths of the node-to-node RPC surface, shared with the HTTP client.
pub mod routes {
    /// Supplier → trader: publish an offer.
    pub const CREATE_OFFER: &str = "/node/discovery/offers/create";
    /// Trader → supplier: liveness handshake.
    pub const REFRESH_OFFER: &str = "/node/discovery/offers/refresh";
    /// Supplier → trader: mutate a held offer.
    pub const UPDATE_OFFER: &str = "/node/discovery/offers/update";
    /// Supplier → trader: withdraw an offer.
    pub const REMOVE_OFFER: &str = "/node/discovery/offers/remove";
    /// Any node → trader: query offers.
    pub const GET_OFFERS: &str = "/node/discovery/offers/get";
    /// Trader → trader: relay hint.
    pub const NEIGHBOUR_OFFERS: &str = "/node/discovery/neighbour";
    /// Scheduler → supplier: reserve and run.
    pub const LAUNCH: &str = "/node/scheduler/launch";
    /// Scheduler → supplier: stop a local container.
    pub const STOP_LOCAL: &str = "/node/scheduler/stop";
}

/// Builds the node's router.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        // User surface
        .route(
            "/containers",
            post(submit_containers)
                .delete(stop_containers)
                .get(list_containers),
        )
        .route("/exit", get(exit))
        // Node-to-node surface
        .route(routes::CREATE_OFFER, post(create_offer))
        .route(routes::REFRESH_OFFER, post(refresh_offer))
        .route(routes::UPDATE_OFFER, post(update_offer))
        .route(routes::REMOVE_OFFER, post(remove_offer))
        .route(routes::GET_OFFERS, post(get_offers))
        .route(routes::NEIGHBOUR_OFFERS, post(neighbour_offers))
        .route(routes::LAUNCH, post(launch))
        .route(routes::STOP_LOCAL, post(stop_local))
        .with_state(node)
}

/// Serves the router until the node's shutdown token fires.
pub async fn serve(node: Arc<Node>, listener: tokio::net::TcpListener) -> Result<()> {
    let shutdown = node.shutdown_token();
    let app = router(node);
    info!("node API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

// User surface

async fn submit_containers(
    State(node): State<Arc<Node>>,
    Json(configs): Json<Vec<ContainerConfig>>,
) -> std::result::Result<Json<Vec<ContainerStatus>>, ApiError> {
    let statuses = node.scheduler().submit(configs).await?;
    node.record_submission(&statuses);
    Ok(Json(statuses))
}

async fn stop_containers(
    State(node): State<Arc<Node>>,
    Json(container_ids): Json<Vec<String>>,
) -> std::result::Result<StatusCode, ApiError> {
    node.stop_submitted(&container_ids).await?;
    Ok(StatusCode::OK)
}

async fn list_containers(State(node): State<Arc<Node>>) -> Json<Vec<ContainerStatus>> {
    Json(node.submitted_containers())
}

async fn exit(State(node): State<Arc<Node>>) -> StatusCode {
    info!("shutdown requested through the API");
    node.stop().await;
    StatusCode::OK
}

// Node-to-node surface

async fn create_offer(
    State(node): State<Arc<Node>>,
    Json(request): Json<CreateOfferRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    node.discovery()
        .create_offer(&request.from_supplier, &request.to_trader, &request.offer)
        .await?;
    Ok(StatusCode::OK)
}

async fn refresh_offer(
    State(node): State<Arc<Node>>,
    Json(request): Json<RefreshOfferRequest>,
) -> Json<RefreshOfferResponse> {
    let refreshed = node
        .discovery()
        .refresh_offer(&request.from_trader, request.offer.id);
    Json(RefreshOfferResponse { refreshed })
}

async fn update_offer(
    State(node): State<Arc<Node>>,
    Json(request): Json<UpdateOfferRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    node.discovery()
        .update_offer(&request.from_supplier, &request.to_trader, &request.offer)?;
    Ok(StatusCode::OK)
}

async fn remove_offer(
    State(node): State<Arc<Node>>,
    Json(request): Json<RemoveOfferRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    node.discovery()
        .remove_offer(&request.from_supplier, &request.to_trader, request.offer.id)?;
    Ok(StatusCode::OK)
}

async fn get_offers(
    State(node): State<Arc<Node>>,
    Json(request): Json<GetOffersRequest>,
) -> std::result::Result<Json<GetOffersResponse>, ApiError> {
    let response = node
        .discovery()
        .get_offers(&request.to_trader, request.relay)
        .await?;
    Ok(Json(response))
}

async fn neighbour_offers(
    State(node): State<Arc<Node>>,
    Json(request): Json<NeighbourOffersRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    node.discovery()
        .advertise_offers_neighbour(&request.to_neighbour, request.offering)?;
    Ok(StatusCode::OK)
}

async fn launch(
    State(node): State<Arc<Node>>,
    Json(request): Json<LaunchContainersRequest>,
) -> std::result::Result<Json<Vec<ContainerStatus>>, ApiError> {
    let statuses = node
        .scheduler()
        .launch(&request.from_buyer, &request.offer, &request.configs)
        .await?;
    Ok(Json(statuses))
}

async fn stop_local(
    State(node): State<Arc<Node>>,
    Json(request): Json<StopLocalContainerRequest>,
) -> std::result::Result<StatusCode, ApiError> {
    node.containers()
        .stop_containers(std::slice::from_ref(&request.container_id))
        .await?;
    Ok(StatusCode::OK)
}

/// API-layer error: a status code plus a wire error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(code, message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(error: DiscoveryError) -> Self {
        match &error {
            DiscoveryError::UnknownTrader(guid) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorCode::UnknownTrader,
                format!("no trader for GUID {guid}"),
            ),
            DiscoveryError::StaleOffer(id) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorCode::StaleOffer,
                format!("offer {id} is not held here"),
            ),
            DiscoveryError::InvalidResources => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "resources do not match the target partition",
            ),
            DiscoveryError::NoSuppliersAvailable | DiscoveryError::NoOffersAvailable => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ResourcesUnavailable,
                error.to_string(),
            ),
            DiscoveryError::Core(_)
            | DiscoveryError::Client(_)
            | DiscoveryError::Overlay(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "internal error",
            ),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(error: SchedulerError) -> Self {
        match &error {
            SchedulerError::EmptySubmission => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                error.to_string(),
            ),
            SchedulerError::NoOffersFound | SchedulerError::AllOffersRejected(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ResourcesUnavailable,
                error.to_string(),
            ),
            SchedulerError::ReservationFailed(id) => Self::new(
                StatusCode::CONFLICT,
                ErrorCode::StaleOffer,
                format!("offer {id} could not be reserved"),
            ),
            SchedulerError::UnknownContainer(id) => Self::new(
                StatusCode::NOT_FOUND,
                ErrorCode::InvalidRequest,
                format!("unknown container {id}"),
            ),
            SchedulerError::Runtime(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::RuntimeFailure,
                "container engine failure",
            ),
            SchedulerError::Client(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                ErrorCode::Internal,
                "remote node failure",
            ),
        }
    }
}
