//! HTTP handlers for the tile surface.
//!
//! - `GET /`: liveness (`OPTIONS` is answered by the CORS layer)
//! - `HEAD /{source}/{z}/{x}/{y}.png`: cache probe, never fetches
//! - `GET /{source}/{z}/{x}/{y}.png`: read-through tile

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use tile_common::{TileCoord, TileError, TileResult, TileSource};

use crate::metrics::{record_tile_request, TileOutcome};
use crate::state::AppState;

pub const LIVENESS_BODY: &str = "Tile cache proxy is running";
pub const TILE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
pub const X_TILE_CACHE: &str = "x-tile-cache";

static TILE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/([^/]+)/(\d+)/(\d+)/(\d+)\.png$").expect("tile path pattern is valid")
});

/// A parsed `/{source}/{z}/{x}/{y}.png` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub source: String,
    pub coord: TileCoord,
}

impl TileRequest {
    /// Match a request path against the strict tile grammar.
    pub fn parse(path: &str) -> TileResult<Self> {
        let caps = TILE_PATH
            .captures(path)
            .ok_or_else(|| TileError::InvalidRequest(path.to_string()))?;

        let number = |i: usize| -> TileResult<u32> {
            caps[i]
                .parse()
                .map_err(|_| TileError::InvalidRequest(path.to_string()))
        };

        Ok(Self {
            source: caps[1].to_string(),
            coord: TileCoord::new(number(2)?, number(3)?, number(4)?),
        })
    }

    /// Cache key used for per-tile locking.
    pub fn key(&self) -> String {
        format!("{}/{}", self.source, self.coord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn header_value(self) -> HeaderValue {
        match self {
            CacheStatus::Hit => HeaderValue::from_static("HIT"),
            CacheStatus::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

/// `GET /`
pub async fn liveness() -> &'static str {
    LIVENESS_BODY
}

/// Everything that is not `/` lands here and must look like a tile.
pub async fn tile_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let request = match TileRequest::parse(uri.path()) {
        Ok(request) => request,
        Err(e) => {
            debug!(path = %uri.path(), "Rejected malformed tile path");
            return error_response(&e);
        }
    };

    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let source = match resolve_source(&state, &request) {
        Ok(source) => source,
        Err(e) => {
            record_tile_request(&request.source, TileOutcome::Error);
            return error_response(&e);
        }
    };

    if method == Method::HEAD {
        return probe_tile(&state, source, &request.coord).await;
    }

    match serve_tile(&state, source, &request).await {
        Ok((data, status)) => {
            let outcome = match status {
                CacheStatus::Hit => TileOutcome::Hit,
                CacheStatus::Miss => TileOutcome::Miss,
            };
            record_tile_request(&source.key, outcome);
            tile_response(status, Body::from(data))
        }
        Err(e) => {
            record_tile_request(&source.key, TileOutcome::Error);
            error!(
                source = %source.key,
                tile = %request.coord,
                error = %e,
                "Failed to serve tile"
            );
            error_response(&e)
        }
    }
}

fn resolve_source<'a>(state: &'a AppState, request: &TileRequest) -> TileResult<&'a TileSource> {
    let source = state
        .sources
        .get(&request.source)
        .ok_or_else(|| TileError::UnknownSource(request.source.clone()))?;

    if !source.supports(&request.coord) {
        let TileCoord { z, x, y } = request.coord;
        return Err(TileError::OutOfRange { z, x, y });
    }

    Ok(source)
}

/// HEAD: report presence without touching upstream or the store contents.
async fn probe_tile(state: &AppState, source: &TileSource, coord: &TileCoord) -> Response {
    if state.store.has(&source.key, coord).await {
        record_tile_request(&source.key, TileOutcome::ProbeHit);
        tile_response(CacheStatus::Hit, Body::empty())
    } else {
        record_tile_request(&source.key, TileOutcome::ProbeMiss);
        StatusCode::NOT_FOUND.into_response()
    }
}

/// GET: serve from the store, or fetch once per key and write through.
async fn serve_tile(
    state: &AppState,
    source: &TileSource,
    request: &TileRequest,
) -> TileResult<(Bytes, CacheStatus)> {
    let coord = &request.coord;

    if let Some(data) = read_cached(state, &source.key, coord).await? {
        debug!(source = %source.key, tile = %coord, "Serving cached tile");
        return Ok((data, CacheStatus::Hit));
    }

    let _guard = state.inflight.lock(&request.key()).await;

    // Another request may have stored the tile while we waited.
    if let Some(data) = read_cached(state, &source.key, coord).await? {
        debug!(source = %source.key, tile = %coord, "Tile stored by concurrent request");
        return Ok((data, CacheStatus::Hit));
    }

    info!(source = %source.key, tile = %coord, "Cache miss, fetching upstream");
    let data = state.fetcher.fetch(source, coord).await?;

    if let Err(e) = state.store.write(&source.key, coord, &data).await {
        // The bytes are good; the client still gets them.
        warn!(
            source = %source.key,
            tile = %coord,
            error = %e,
            "Failed to cache tile"
        );
    }

    Ok((data, CacheStatus::Miss))
}

async fn read_cached(
    state: &AppState,
    source: &str,
    coord: &TileCoord,
) -> TileResult<Option<Bytes>> {
    match state.store.read(source, coord).await {
        Ok(data) => Ok(Some(data)),
        Err(TileError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn tile_response(status: CacheStatus, body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static(TILE_CACHE_CONTROL),
            ),
            (header::HeaderName::from_static(X_TILE_CACHE), status.header_value()),
        ],
        body,
    )
        .into_response()
}

/// Map an error onto a status code and a short diagnostic body.
pub fn error_response(err: &TileError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match err {
        TileError::InvalidRequest(_) => "Invalid tile request",
        TileError::UnknownSource(_) => "Unknown tile source",
        TileError::OutOfRange { .. } => "Tile coordinates out of range",
        TileError::NotFound(_) => "Tile not found",
        TileError::Upstream { .. } | TileError::Transport(_) => "Error downloading tile",
        TileError::Storage(_) => "Error reading tile cache",
        TileError::CacheServerUnavailable(_) | TileError::Config(_) => "Internal error",
    };

    (status, body).into_response()
}
