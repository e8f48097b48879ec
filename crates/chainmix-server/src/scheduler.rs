//! Periodic auto-draw task.
//!
//! An explicit object owned by the server, never assumed by the core
//! pipeline. Each round: announce the new current draw id on the global
//! channel (so subscribers can attach before the first event), run a full
//! draw with a short collection window, evict stale entropy pools, sleep.
//! Failures are logged and the loop continues. The task aborts when its
//! handle is dropped.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;

use chainmix_core::{BeaconPipeline, CollectConfig, DrawRequest};

use crate::hub::StreamHub;
use crate::store::FileDrawStore;

/// Collection window used by automatic draws, milliseconds.
const AUTO_COLLECT_MS: u64 = 1_200;

pub struct AutoDraw {
    handle: JoinHandle<()>,
}

impl AutoDraw {
    pub fn spawn(
        pipeline: Arc<BeaconPipeline>,
        hub: Arc<StreamHub>,
        store: Arc<FileDrawStore>,
        blocks: usize,
        interval: Duration,
        pool_idle: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let draw_id = format!("auto-{}", unix_millis());
                store.set_current(&draw_id);
                hub.announce_current(&draw_id);

                let request = DrawRequest {
                    draw_id: draw_id.clone(),
                    blocks,
                    collect: CollectConfig {
                        window_ms: AUTO_COLLECT_MS,
                        require_local: false,
                        min_local_bytes: 0,
                        ..CollectConfig::default()
                    },
                };
                match pipeline.run_draw(&request).await {
                    Ok(record) => {
                        log::info!("[{draw_id}] auto draw finished: {}", record.result.value_u64)
                    }
                    Err(e) => log::warn!("[{draw_id}] auto draw failed: {e}"),
                }

                pipeline.entropy().evict_idle(pool_idle);
                tokio::time::sleep(interval).await;
            }
        });
        Self { handle }
    }
}

impl Drop for AutoDraw {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
