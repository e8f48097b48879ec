//! Concurrent backward scan for finalized block hashes.
//!
//! The scanner walks the chain tip backward in fixed windows, fetching the
//! slots of each window with bounded concurrency while preserving slot
//! order — the beacon byte string is the raw hash bytes concatenated in
//! discovery (descending-slot) order, and that ordering is a protocol
//! contract: altering it changes every downstream seed.
//!
//! A missing, failed, or malformed-hash slot is a skip, never an error.
//! Only a scan that finds zero blocks within the depth budget fails.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{BeaconError, Result};

/// Upstream blockchain RPC, narrowed to the two calls the scanner needs.
///
/// `block_hash` returns `None` for anything that is not a usable finalized
/// block — skipped slot, RPC error, malformed response. Transport-level
/// failure of the endpoint itself belongs to `latest_finalized_slot`,
/// which is fatal.
pub trait SlotRpc: Send + Sync {
    fn latest_finalized_slot(&self) -> BoxFuture<'_, Result<u64>>;

    /// Base58 block hash for a finalized slot, or `None` to skip it.
    fn block_hash(&self, slot: u64) -> BoxFuture<'_, Option<String>>;
}

// ---------------------------------------------------------------------------
// JSON-RPC client
// ---------------------------------------------------------------------------

/// Solana JSON-RPC 2.0 client over HTTP.
pub struct HttpSlotRpc {
    url: String,
    client: reqwest::Client,
}

impl HttpSlotRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> std::result::Result<Value, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let envelope: Value = response.json().await.map_err(|e| e.to_string())?;
        if let Some(err) = envelope.get("error") {
            return Err(err.to_string());
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

impl SlotRpc for HttpSlotRpc {
    fn latest_finalized_slot(&self) -> BoxFuture<'_, Result<u64>> {
        async move {
            let result = self
                .call(
                    "getSlot",
                    json!([{ "commitment": "finalized" }]),
                    Duration::from_secs(20),
                )
                .await
                .map_err(BeaconError::UpstreamUnavailable)?;
            result
                .as_u64()
                .ok_or_else(|| BeaconError::UpstreamUnavailable("malformed getSlot response".into()))
        }
        .boxed()
    }

    fn block_hash(&self, slot: u64) -> BoxFuture<'_, Option<String>> {
        async move {
            let params = json!([slot, {
                "transactionDetails": "none",
                "rewards": false,
                "commitment": "finalized",
                "maxSupportedTransactionVersion": 0,
            }]);
            match self.call("getBlock", params, Duration::from_secs(15)).await {
                Ok(block) => block
                    .get("blockhash")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Err(e) => {
                    log::debug!("slot {slot} skipped: {e}");
                    None
                }
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Scan shape: window size, in-flight request cap, backward depth budget.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Slots checked per backward window.
    pub batch_size: usize,
    /// Concurrent block lookups in flight within a window.
    pub concurrency: usize,
    /// Maximum slots scanned backward before giving up.
    pub max_scan: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            concurrency: 6,
            max_scan: 400,
        }
    }
}

/// One discovered finalized block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub slot: u64,
    /// Base58 hash as reported by the chain (display form).
    pub blockhash: String,
    /// Explorer link, display only.
    pub explorer_url: String,
}

/// Result of a scan: the beacon byte string plus per-block metadata, both
/// in discovery order.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub beacon: Vec<u8>,
    pub blocks: Vec<BlockRecord>,
}

/// Backward scanner over a [`SlotRpc`].
pub struct BeaconScanner<R: SlotRpc + ?Sized> {
    rpc: std::sync::Arc<R>,
    config: ScanConfig,
}

impl<R: SlotRpc + ?Sized> BeaconScanner<R> {
    pub fn new(rpc: std::sync::Arc<R>, config: ScanConfig) -> Self {
        Self { rpc, config }
    }

    /// Find at least one and at most `want` finalized blocks.
    ///
    /// Succeeds with a partial set when the depth budget runs out after the
    /// first find; fails with [`BeaconError::ExhaustedScan`] only when zero
    /// blocks were found.
    pub async fn scan(&self, want: usize) -> Result<ScanOutcome> {
        if want == 0 {
            return Err(BeaconError::InvalidInput("blocks must be >= 1".into()));
        }
        let latest = self.rpc.latest_finalized_slot().await?;
        log::debug!("scan start: latest finalized slot {latest}, want {want}");

        let mut beacon = Vec::new();
        let mut blocks: Vec<BlockRecord> = Vec::new();
        let mut scanned = 0u64;
        let mut cursor = latest;

        while blocks.len() < want && cursor > 0 && scanned < self.config.max_scan {
            // Window [cursor .. cursor-batch_size+1], descending, floored at slot 1.
            let stop = cursor.saturating_sub(self.config.batch_size as u64);
            let window: Vec<u64> = (stop + 1..=cursor).rev().collect();
            scanned += window.len() as u64;

            let hashes: Vec<Option<String>> =
                stream::iter(window.iter().copied().map(|slot| self.rpc.block_hash(slot)))
                    .buffered(self.config.concurrency.max(1))
                    .collect()
                    .await;

            for (&slot, hash) in window.iter().zip(hashes) {
                let Some(b58) = hash else { continue };
                let raw = match bs58::decode(&b58).into_vec() {
                    Ok(raw) => raw,
                    Err(_) => {
                        log::debug!("slot {slot} skipped: malformed base58 hash");
                        continue;
                    }
                };
                beacon.extend_from_slice(&raw);
                blocks.push(BlockRecord {
                    slot,
                    blockhash: b58,
                    explorer_url: format!("https://solscan.io/block/{slot}"),
                });
                if blocks.len() >= want {
                    break;
                }
            }

            cursor = window.last().copied().unwrap_or(0).saturating_sub(1);
        }

        if blocks.is_empty() {
            return Err(BeaconError::ExhaustedScan);
        }
        if blocks.len() < want {
            log::warn!(
                "partial beacon: found {}/{} blocks within {} scanned slots",
                blocks.len(),
                want,
                scanned
            );
        }
        Ok(ScanOutcome { beacon, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Simulated chain: a latest slot plus the hashes that exist.
    struct FakeChain {
        latest: Result<u64>,
        hashes: HashMap<u64, String>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl FakeChain {
        fn new(latest: u64, hashes: HashMap<u64, String>) -> Self {
            Self {
                latest: Ok(latest),
                hashes,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn unavailable() -> Self {
            Self {
                latest: Err(BeaconError::UpstreamUnavailable("connection refused".into())),
                hashes: HashMap::new(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SlotRpc for FakeChain {
        fn latest_finalized_slot(&self) -> BoxFuture<'_, Result<u64>> {
            let out = match &self.latest {
                Ok(slot) => Ok(*slot),
                Err(_) => Err(BeaconError::UpstreamUnavailable("connection refused".into())),
            };
            futures::future::ready(out).boxed()
        }

        fn block_hash(&self, slot: u64) -> BoxFuture<'_, Option<String>> {
            let hash = self.hashes.get(&slot).cloned();
            let in_flight = self.in_flight.clone();
            let max_in_flight = self.max_in_flight.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                hash
            }
            .boxed()
        }
    }

    fn b58(slot: u64) -> String {
        // Distinct, decodable base58 per slot.
        bs58::encode(format!("blockhash-{slot:04}")).into_string()
    }

    fn chain_with(slots: &[u64], latest: u64) -> FakeChain {
        FakeChain::new(latest, slots.iter().map(|&s| (s, b58(s))).collect())
    }

    #[tokio::test]
    async fn test_finds_requested_blocks_in_descending_order() {
        let chain = chain_with(&[100, 99, 98, 97], 100);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        let outcome = scanner.scan(3).await.unwrap();
        let slots: Vec<u64> = outcome.blocks.iter().map(|b| b.slot).collect();
        assert_eq!(slots, vec![100, 99, 98]);
    }

    #[tokio::test]
    async fn test_beacon_is_hash_concatenation_in_discovery_order() {
        let chain = chain_with(&[50, 48], 50);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        let outcome = scanner.scan(2).await.unwrap();

        let mut want = Vec::new();
        want.extend_from_slice(&bs58::decode(b58(50)).into_vec().unwrap());
        want.extend_from_slice(&bs58::decode(b58(48)).into_vec().unwrap());
        assert_eq!(outcome.beacon, want);
    }

    #[tokio::test]
    async fn test_gaps_are_skipped() {
        // Only two reachable slots within the budget; want 3 -> partial set.
        let chain = chain_with(&[395, 290], 400);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        let outcome = scanner.scan(3).await.unwrap();
        let slots: Vec<u64> = outcome.blocks.iter().map(|b| b.slot).collect();
        assert_eq!(slots, vec![395, 290]);
    }

    #[tokio::test]
    async fn test_zero_blocks_is_exhausted_scan() {
        let chain = chain_with(&[], 10_000);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        let err = scanner.scan(3).await.unwrap_err();
        assert!(matches!(err, BeaconError::ExhaustedScan));
    }

    #[tokio::test]
    async fn test_malformed_hash_is_skipped() {
        let mut hashes = HashMap::new();
        hashes.insert(100u64, "0OIl-not-base58".to_string());
        hashes.insert(99u64, b58(99));
        let chain = FakeChain::new(100, hashes);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        let outcome = scanner.scan(1).await.unwrap();
        assert_eq!(outcome.blocks[0].slot, 99);
    }

    #[tokio::test]
    async fn test_endpoint_failure_is_fatal() {
        let scanner = BeaconScanner::new(Arc::new(FakeChain::unavailable()), ScanConfig::default());
        let err = scanner.scan(3).await.unwrap_err();
        assert!(matches!(err, BeaconError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_depth_budget_is_respected() {
        // A block exists, but only past the budget horizon.
        let chain = chain_with(&[400], 1_000);
        let config = ScanConfig {
            max_scan: 400,
            ..ScanConfig::default()
        };
        let scanner = BeaconScanner::new(Arc::new(chain), config);
        assert!(matches!(
            scanner.scan(1).await.unwrap_err(),
            BeaconError::ExhaustedScan
        ));
    }

    #[tokio::test]
    async fn test_concurrency_stays_bounded() {
        let chain = chain_with(&(1..=100).collect::<Vec<_>>(), 100);
        let max = chain.max_in_flight.clone();
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        scanner.scan(40).await.unwrap();
        assert!(max.load(Ordering::SeqCst) <= 6, "in-flight exceeded limit");
    }

    #[tokio::test]
    async fn test_zero_want_is_invalid() {
        let chain = chain_with(&[10], 10);
        let scanner = BeaconScanner::new(Arc::new(chain), ScanConfig::default());
        assert!(matches!(
            scanner.scan(0).await.unwrap_err(),
            BeaconError::InvalidInput(_)
        ));
    }
}
