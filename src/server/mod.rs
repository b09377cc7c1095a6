//! Thin HTTP front end over [`ResolutionService`].

use crate::core::{MediaType, ResolveError};
use crate::service::{
    ErrorResponse, FetchResponse, ResolutionService, ResolveResponse, SearchResponse,
};
use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

type SharedService = Arc<ResolutionService>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/download", get(download))
        .route("/fetch", get(fetch))
        .with_state(service)
}

pub async fn serve(service: SharedService, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, service).await
}

pub async fn serve_on(listener: TcpListener, service: SharedService) -> Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

fn status_for(err: &ResolveError) -> StatusCode {
    match err {
        ResolveError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ResolveError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn parse_media_type(raw: Option<&str>) -> Result<Option<MediaType>, ResolveError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(str::parse::<MediaType>)
        .transpose()
        .map_err(ResolveError::InvalidInput)
}

async fn search(
    State(service): State<SharedService>,
    Query(params): Query<SearchParams>,
) -> Response {
    let term = params.query.unwrap_or_default();
    match service.search(&term).await {
        Ok(results) => Json(SearchResponse { results }).into_response(),
        Err(err) => (status_for(&err), Json(ErrorResponse::from(&err))).into_response(),
    }
}

async fn download(
    State(service): State<SharedService>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let resolved = match parse_media_type(params.media_type.as_deref()) {
        Ok(wanted) => {
            let target = params.url.unwrap_or_default();
            service.resolve(&target, wanted).await
        }
        Err(err) => Err(err),
    };

    match resolved {
        Ok(outcome) => Json(ResolveResponse::from(outcome)).into_response(),
        Err(err) => (status_for(&err), Json(ResolveResponse::from_error(&err))).into_response(),
    }
}

async fn fetch(
    State(service): State<SharedService>,
    Query(params): Query<FetchParams>,
) -> Response {
    let resolved = match parse_media_type(params.media_type.as_deref()) {
        Ok(wanted) => {
            let term = params.query.unwrap_or_default();
            service.search_and_resolve(&term, wanted).await
        }
        Err(err) => Err(err),
    };

    match resolved {
        Ok(resolution) => Json(FetchResponse {
            video: resolution.video,
            resolution: ResolveResponse::from(resolution.outcome),
        })
        .into_response(),
        Err(err) => (status_for(&err), Json(ErrorResponse::from(&err))).into_response(),
    }
}
