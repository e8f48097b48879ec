//! HTTP surface for the ChainMix beacon.
//!
//! Routes mirror the draw lifecycle: trigger a draw, watch its events live
//! over SSE, submit user entropy while the window is open, then fetch the
//! persisted record from history. Range sampling and bit-stream downloads
//! operate on any hex seed, independent of a running draw.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use chainmix_core::{
    BeaconError, BeaconPipeline, BitChunks, BitFormat, BlockRecord, CollectConfig, DrawEvent,
    DrawRequest, DrawStore, EntropyStore, EventSink, HttpSlotRpc, RANGE_LABEL, ScanConfig,
    parse_seed_hex, sample_range,
};

pub mod error;
pub mod hub;
pub mod scheduler;
pub mod settings;
pub mod store;

pub use error::ApiError;
pub use hub::{CURRENT_CHANNEL, StreamHub};
pub use scheduler::AutoDraw;
pub use settings::Settings;
pub use store::FileDrawStore;

/// Shared server state.
pub struct AppState {
    pub pipeline: Arc<BeaconPipeline>,
    pub hub: Arc<StreamHub>,
    pub store: Arc<FileDrawStore>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> chainmix_core::Result<Self> {
        let rpc = Arc::new(HttpSlotRpc::new(settings.rpc_url.clone()));
        let hub = Arc::new(StreamHub::new());
        let store = Arc::new(FileDrawStore::new(&settings.store_dir)?);
        let pipeline = Arc::new(BeaconPipeline::new(
            rpc,
            ScanConfig::default(),
            EntropyStore::new(),
            hub.clone(),
            store.clone(),
        ));
        Ok(Self {
            pipeline,
            hub,
            store,
            settings,
        })
    }
}

/// Draw ids end up in event channels and file names; keep them boring.
fn validate_draw_id(draw_id: &str) -> Result<(), BeaconError> {
    let ok = !draw_id.is_empty()
        && draw_id.len() <= 128
        && draw_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(BeaconError::InvalidInput(
            "draw_id must be 1-128 chars of [A-Za-z0-9._-]".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Draws
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DrawBody {
    draw_id: String,
    blocks: Option<usize>,
    collect_ms: Option<u64>,
    srv_jitter: Option<bool>,
    srv_jitter_samples: Option<usize>,
    srv_urandom_bytes: Option<usize>,
    require_loc: Option<bool>,
    min_loc_bytes: Option<usize>,
}

#[derive(Serialize)]
struct DrawResponse {
    draw_id: String,
    seed_hex: String,
    number_u64: String,
    beacon_hex: String,
    solana: Vec<BlockRecord>,
}

async fn handle_draw(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DrawBody>,
) -> Result<Json<DrawResponse>, ApiError> {
    validate_draw_id(&body.draw_id)?;
    let defaults = CollectConfig::default();
    let request = DrawRequest {
        draw_id: body.draw_id,
        blocks: body
            .blocks
            .unwrap_or(state.settings.default_blocks)
            .clamp(1, 12),
        collect: CollectConfig {
            window_ms: body.collect_ms.unwrap_or(defaults.window_ms),
            jitter: body.srv_jitter.unwrap_or(defaults.jitter),
            jitter_samples: body
                .srv_jitter_samples
                .unwrap_or(defaults.jitter_samples)
                .max(1),
            urandom_bytes: body.srv_urandom_bytes.unwrap_or(defaults.urandom_bytes),
            require_local: body.require_loc.unwrap_or(defaults.require_local),
            min_local_bytes: body.min_loc_bytes.unwrap_or(defaults.min_local_bytes),
        },
    };

    let record = state.pipeline.run_draw(&request).await?;
    state.store.set_current(&record.draw_id);

    Ok(Json(DrawResponse {
        draw_id: record.draw_id,
        seed_hex: record.result.seed_hex,
        number_u64: record.result.value_u64,
        beacon_hex: record.sources.sol.beacon_hex,
        solana: record.sources.sol.blocks,
    }))
}

async fn handle_current(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "drawId": state.store.current() }))
}

async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.hub.subscribe(&draw_id);
    let stream = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(value) => Some(Event::default().json_data(&value)),
            // A lagged subscriber lost old events; keep the stream alive.
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Entropy submission
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UserEntropyBody {
    payload_hex: String,
}

fn emit_progress(state: &AppState, draw_id: &str, source: &str) -> String {
    let snap = state.pipeline.entropy().snapshot(draw_id);
    let root_hex = snap.root_hex();
    state.hub.emit(
        draw_id,
        &DrawEvent::LocProgress {
            source: source.to_string(),
            bytes_total: snap.total_bytes,
            packets: snap.packets,
            root_hex: root_hex.clone(),
        },
    );
    root_hex
}

async fn handle_user_entropy(
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
    Json(body): Json<UserEntropyBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draw_id(&draw_id)?;
    let data = hex::decode(&body.payload_hex)
        .map_err(|_| BeaconError::InvalidInput("payload_hex must be hex".into()))?;
    state.pipeline.entropy().add(&draw_id, data);
    let root_hex = emit_progress(&state, &draw_id, "USER");
    Ok(Json(json!({ "ok": true, "root_hex": root_hex })))
}

#[derive(Deserialize)]
struct JitterParams {
    samples: Option<usize>,
}

async fn handle_server_jitter(
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
    Query(params): Query<JitterParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draw_id(&draw_id)?;
    let samples = params.samples.unwrap_or(20_000).clamp(1, 1_000_000);
    let data = chainmix_core::cpu_jitter_bytes(samples);
    let added = data.len();
    state.pipeline.entropy().add(&draw_id, data);
    let root_hex = emit_progress(&state, &draw_id, "SRV");
    Ok(Json(
        json!({ "ok": true, "added_bytes": added, "root_hex": root_hex }),
    ))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PageParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn handle_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let items = state
        .store
        .list(params.limit.unwrap_or(50).min(500), params.offset.unwrap_or(0))?;
    Ok(Json(json!({ "items": items })))
}

async fn handle_history_item(
    State(state): State<Arc<AppState>>,
    Path(draw_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.load(&draw_id)? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()),
    }
}

// ---------------------------------------------------------------------------
// Range sampling & bit streams (seed-addressed, no draw required)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RangeBody {
    seed_hex: String,
    n1: i128,
    n2: i128,
    label: Option<String>,
    /// Optionally also publish the sample on this draw's event feed.
    draw_id: Option<String>,
}

async fn handle_range(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RangeBody>,
) -> Result<Json<chainmix_core::SampleResult>, ApiError> {
    let seed = parse_seed_hex(&body.seed_hex)?;
    let label = body.label.as_deref().unwrap_or(RANGE_LABEL);
    let result = sample_range(&seed, body.n1, body.n2, label)?;

    if let Some(draw_id) = &body.draw_id {
        state.hub.emit(
            draw_id,
            &DrawEvent::RangeSample {
                n1: result.lo,
                n2: result.hi,
                label: result.label.clone(),
                subseed_hex: result.subseed_hex.clone(),
                attempts: result.attempts,
                rejected: result.rejected,
                value: result.value.to_string(),
            },
        );
    }
    Ok(Json(result))
}

#[derive(Deserialize)]
struct BitsBody {
    seed_hex: String,
    bits: u64,
    /// `txt` for ASCII '0'/'1', `bin` for raw bytes.
    fmt: String,
    /// `none` or `newline`; txt only.
    sep: Option<String>,
}

async fn handle_bitstream(
    Json(body): Json<BitsBody>,
) -> Result<Response, ApiError> {
    let seed = parse_seed_hex(&body.seed_hex)?;
    let (format, media, ext) = match body.fmt.as_str() {
        "txt" => {
            let newline = body.sep.as_deref() == Some("newline");
            (
                BitFormat::Ascii { newline },
                "text/plain; charset=utf-8",
                "txt",
            )
        }
        "bin" => (BitFormat::Binary, "application/octet-stream", "bin"),
        other => {
            return Err(BeaconError::InvalidInput(format!(
                "fmt must be txt or bin, got {other}"
            ))
            .into());
        }
    };

    let filename = format!("bits_{}_{}.{ext}", body.bits, body.fmt);
    let chunks = BitChunks::new(&seed, body.bits, format)
        .map(Ok::<Vec<u8>, std::convert::Infallible>);
    let body = axum::body::Body::from_stream(futures::stream::iter(chunks));

    Ok((
        [
            (header::CONTENT_TYPE, media.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router & entry point
// ---------------------------------------------------------------------------

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "ChainMix RNG",
        "version": chainmix_core::VERSION,
        "endpoints": {
            "/health": "Liveness check",
            "/draws/solana": "POST — run a draw (scan, collect, mix, persist)",
            "/draws/current": "Latest generated draw id",
            "/draws/{draw_id}/stream": "SSE event feed for one draw",
            "/entropy/{draw_id}/user": "POST — submit hex entropy into an open draw",
            "/entropy/{draw_id}/server-jitter": "POST — append a server jitter batch",
            "/history": "Reverse-chronological draw listing (limit/offset)",
            "/history/{draw_id}": "Full persisted draw record",
            "/range/by-seed": "POST — unbiased integer from a seeded range",
            "/tests/bitstream/by-seed": "POST — download a seeded bit stream",
        },
        "defaultBlocks": state.settings.default_blocks,
    }))
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/draws/solana", post(handle_draw))
        .route("/draws/current", get(handle_current))
        .route("/draws/{draw_id}/stream", get(handle_stream))
        .route("/entropy/{draw_id}/user", post(handle_user_entropy))
        .route("/entropy/{draw_id}/server-jitter", post(handle_server_jitter))
        .route("/history", get(handle_history))
        .route("/history/{draw_id}", get(handle_history_item))
        .route("/range/by-seed", post(handle_range))
        .route("/tests/bitstream/by-seed", post(handle_bitstream))
        .with_state(state)
}

/// Run the HTTP server, including the auto-draw task when enabled.
pub async fn run_server(settings: Settings, host: &str, port: u16) -> std::io::Result<()> {
    let state = Arc::new(AppState::new(settings.clone()).map_err(|e| match e {
        BeaconError::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    })?);

    let _auto = settings.auto_draw.then(|| {
        AutoDraw::spawn(
            state.pipeline.clone(),
            state.hub.clone(),
            state.store.clone(),
            settings.default_blocks,
            settings.auto_draw_interval,
            settings.pool_idle,
        )
    });

    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_id_validation() {
        assert!(validate_draw_id("auto-1700000000000").is_ok());
        assert!(validate_draw_id("user.draw_01").is_ok());
        assert!(validate_draw_id("").is_err());
        assert!(validate_draw_id("../escape").is_err());
        assert!(validate_draw_id("has space").is_err());
        assert!(validate_draw_id(&"x".repeat(129)).is_err());
    }
}
