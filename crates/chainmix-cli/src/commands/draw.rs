use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chainmix_core::{
    BeaconPipeline, CollectConfig, DrawEvent, DrawRequest, EntropyStore, EventSink, HttpSlotRpc,
    NullSink, ScanConfig,
};
use chainmix_server::{FileDrawStore, Settings};

/// Prints each pipeline event as one JSON line.
struct PrintSink;

impl EventSink for PrintSink {
    fn emit(&self, draw_id: &str, event: &DrawEvent) {
        println!("{}", event.to_json(draw_id));
    }
}

pub fn run(
    draw_id: Option<String>,
    blocks: usize,
    collect_ms: u64,
    min_loc_bytes: Option<usize>,
    rpc_url: Option<String>,
    events: bool,
) -> i32 {
    let mut settings = Settings::from_env();
    if let Some(url) = rpc_url {
        settings.rpc_url = url;
    }

    let store = match FileDrawStore::new(&settings.store_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("cannot open history store: {e}");
            return 1;
        }
    };

    let sink: Arc<dyn EventSink> = if events {
        Arc::new(PrintSink)
    } else {
        Arc::new(NullSink)
    };
    let pipeline = BeaconPipeline::new(
        Arc::new(HttpSlotRpc::new(settings.rpc_url.clone())),
        ScanConfig::default(),
        EntropyStore::new(),
        sink,
        store,
    );

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let request = DrawRequest {
        draw_id: draw_id.unwrap_or_else(|| format!("cli-{millis}")),
        blocks: blocks.clamp(1, 12),
        collect: CollectConfig {
            window_ms: collect_ms,
            require_local: min_loc_bytes.is_some(),
            min_local_bytes: min_loc_bytes.unwrap_or(0),
            ..CollectConfig::default()
        },
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    match rt.block_on(pipeline.run_draw(&request)) {
        Ok(record) => {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("cannot render record: {e}");
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            eprintln!("draw failed: {e}");
            1
        }
    }
}
