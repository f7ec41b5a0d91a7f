//! Deterministic Simulation Testing for Per-Stream Buffering
//!
//! Shadow-state harness that drives a `LineProcessor` with a seeded
//! multi-stream workload against a fault-injecting object store, then
//! compares what landed in the bucket with what was sent.
//!
//! ## Design (FoundationDB-style DST with shadow state)
//!
//! ```text
//! for seed in 0..1000 {
//!     let mut harness = BufferDSTHarness::new(BufferDSTConfig::calm(seed));
//!     harness.run(500).await;
//!     harness.check_invariants();  // Violations carry the seed
//! }
//! ```
//!
//! ## Checked invariants
//!
//! - Objects of a stream, read in key order, replay its records in input order
//! - No object is empty and none holds more than `buffer_size` records
//! - Every object but a stream's last holds exactly `buffer_size` records
//! - STATE counts per stream strictly increase and end at the durable total
//! - A run that reached end of input leaves nothing pending

use crate::streaming::{
    InMemoryObjectStore, LineProcessor, SimulatedClock, SimulatedObjectStore,
    SimulatedStoreConfig, SimulatedStoreStats, TargetConfig,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

const DST_BUCKET: &str = "dst";
// 2024-01-01T00:00:00Z
const DST_START_US: u64 = 1_704_067_200_000_000;

/// Configuration for buffering DST
#[derive(Debug, Clone)]
pub struct BufferDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Object store fault configuration
    pub store_config: SimulatedStoreConfig,
    /// Flush threshold under test
    pub buffer_size: usize,
    /// Number of distinct streams in the workload
    pub stream_count: usize,
}

impl Default for BufferDSTConfig {
    fn default() -> Self {
        BufferDSTConfig {
            seed: 0,
            store_config: SimulatedStoreConfig::default(),
            buffer_size: 7,
            stream_count: 4,
        }
    }
}

impl BufferDSTConfig {
    /// Seeded config with a seed-derived threshold and stream count
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        BufferDSTConfig {
            seed,
            buffer_size: rng.gen_range(1..=16),
            stream_count: rng.gen_range(1..=6),
            ..Default::default()
        }
    }

    /// Calm mode - no fault injection
    pub fn calm(seed: u64) -> Self {
        BufferDSTConfig {
            store_config: SimulatedStoreConfig::no_faults(),
            ..Self::new(seed)
        }
    }

    /// Moderate fault injection
    pub fn moderate(seed: u64) -> Self {
        BufferDSTConfig {
            store_config: SimulatedStoreConfig::flaky(0.02),
            ..Self::new(seed)
        }
    }

    /// Chaos mode - aggressive fault injection
    pub fn chaos(seed: u64) -> Self {
        BufferDSTConfig {
            store_config: SimulatedStoreConfig::flaky(0.25),
            ..Self::new(seed)
        }
    }
}

/// Workload generator: Singer RECORD lines spread over a few streams
pub struct BufferWorkload {
    rng: ChaCha8Rng,
    stream_count: usize,
    sequence: u64,
}

impl BufferWorkload {
    pub fn new(config: &BufferDSTConfig) -> Self {
        BufferWorkload {
            rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            stream_count: config.stream_count.max(1),
            sequence: 0,
        }
    }

    /// Next record as `(stream, payload, line)`
    pub fn next_record(&mut self) -> (String, String, String) {
        self.sequence += 1;
        let stream = format!("stream_{}", self.rng.gen_range(0..self.stream_count));

        let record = match self.rng.gen_range(0..4) {
            0 => serde_json::json!({ "seq": self.sequence }),
            1 => serde_json::json!({
                "seq": self.sequence,
                "name": format!("名前-{}", self.rng.gen::<u16>()),
                "active": self.rng.gen_bool(0.5),
            }),
            2 => serde_json::json!({
                "seq": self.sequence,
                "tags": ["a", "b"],
                "address": { "zip": self.rng.gen_range(10_000..99_999), "city": "Oslo" },
            }),
            _ => serde_json::json!({ "seq": self.sequence, "note": null, "line": "x\ny" }),
        };

        let payload = record.to_string();
        let line = serde_json::json!({
            "type": "RECORD",
            "stream": stream,
            "record": record,
        })
        .to_string();
        (stream, payload, line)
    }
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct BufferDSTResult {
    /// Seed used
    pub seed: u64,
    /// Records handed to the processor
    pub records_sent: u64,
    /// Objects found in the bucket
    pub objects_written: u64,
    /// STATE lines emitted
    pub state_messages: u64,
    /// Error that ended the run early, if any
    pub aborted: Option<String>,
    /// Store fault statistics
    pub store_stats: SimulatedStoreStats,
    /// Invariant violations found
    pub invariant_violations: Vec<String>,
}

impl BufferDSTResult {
    pub fn new(seed: u64) -> Self {
        BufferDSTResult {
            seed,
            records_sent: 0,
            objects_written: 0,
            state_messages: 0,
            aborted: None,
            store_stats: SimulatedStoreStats::default(),
            invariant_violations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} records, {} objects, {} STATE lines, {} put failures, {}, {} violations",
            self.seed,
            self.records_sent,
            self.objects_written,
            self.state_messages,
            self.store_stats.put_failures,
            if self.aborted.is_some() { "aborted" } else { "completed" },
            self.invariant_violations.len()
        )
    }
}

type DSTStore = SimulatedObjectStore<InMemoryObjectStore>;

/// Main DST harness for per-stream buffering
pub struct BufferDSTHarness {
    config: BufferDSTConfig,
    inner_store: InMemoryObjectStore,
    processor: LineProcessor<DSTStore, SimulatedClock, Vec<u8>>,
    workload: BufferWorkload,
    /// Shadow state: every payload accepted, per stream, in input order
    sent: BTreeMap<String, Vec<String>>,
    finished: bool,
    result: BufferDSTResult,
}

impl BufferDSTHarness {
    pub fn new(config: BufferDSTConfig) -> Self {
        let inner_store = InMemoryObjectStore::with_bucket(DST_BUCKET);
        let store = SimulatedObjectStore::new(
            inner_store.clone(),
            config.seed.wrapping_add(2),
            config.store_config.clone(),
        );
        // One microsecond per read keeps every flush key distinct
        let clock = SimulatedClock::ticking(DST_START_US, 1);
        let processor = LineProcessor::from_config(
            &TargetConfig::test(DST_BUCKET, config.buffer_size),
            store,
            clock,
            Vec::new(),
        );

        BufferDSTHarness {
            workload: BufferWorkload::new(&config),
            result: BufferDSTResult::new(config.seed),
            config,
            inner_store,
            processor,
            sent: BTreeMap::new(),
            finished: false,
        }
    }

    /// Feed `records` lines, stopping at the first fatal error like the binary does
    pub async fn run(&mut self, records: usize) {
        for _ in 0..records {
            if self.result.aborted.is_some() {
                return;
            }
            let (stream, payload, line) = self.workload.next_record();
            self.sent.entry(stream).or_default().push(payload.clone());
            self.result.records_sent += 1;

            match self.processor.process_line(&line).await {
                Ok(echoed) if echoed != payload => {
                    self.result.invariant_violations.push(format!(
                        "Payload re-serialized differently: sent {} got {}",
                        payload, echoed
                    ));
                }
                Ok(_) => {}
                Err(e) => self.result.aborted = Some(e.to_string()),
            }
        }
    }

    /// End of input: drain every buffer unless the run already aborted
    pub async fn finish(&mut self) {
        if self.result.aborted.is_some() || self.finished {
            return;
        }
        match self.processor.finish().await {
            Ok(_) => self.finished = true,
            Err(e) => self.result.aborted = Some(e.to_string()),
        }
    }

    /// Compare the bucket and the STATE output against the shadow state
    pub fn check_invariants(&mut self) {
        let durable = self.check_objects();
        self.check_state_lines(&durable);

        if self.finished {
            if self.processor.manager().total_pending() != 0 {
                self.result.invariant_violations.push(format!(
                    "{} records still pending after a completed run",
                    self.processor.manager().total_pending()
                ));
            }
            for (stream, sent) in &self.sent {
                let written = durable.get(stream).copied().unwrap_or(0);
                if written != sent.len() as u64 {
                    self.result.invariant_violations.push(format!(
                        "Stream {}: sent {} records, {} durable after completed run",
                        stream,
                        sent.len(),
                        written
                    ));
                }
            }
        }

        self.result.store_stats = self.processor.manager().store().stats();
    }

    /// Objects per stream must replay a prefix of the sent records in order.
    /// Returns durable record counts per stream.
    fn check_objects(&mut self) -> BTreeMap<String, u64> {
        let buffer_size = self.config.buffer_size;
        let mut batches: BTreeMap<String, Vec<Vec<String>>> = BTreeMap::new();

        for key in self.inner_store.keys(DST_BUCKET) {
            self.result.objects_written += 1;
            let Some((stream, _)) = key.split_once('/') else {
                self.result
                    .invariant_violations
                    .push(format!("Key {} has no stream prefix", key));
                continue;
            };
            let body = self.inner_store.get(DST_BUCKET, &key).unwrap_or_default();
            if body.is_empty() {
                self.result
                    .invariant_violations
                    .push(format!("Object {} is empty", key));
                continue;
            }
            let text = String::from_utf8_lossy(&body).into_owned();
            let records: Vec<String> = text.split('\n').map(str::to_string).collect();
            if records.len() > buffer_size {
                self.result.invariant_violations.push(format!(
                    "Object {} holds {} records, threshold is {}",
                    key,
                    records.len(),
                    buffer_size
                ));
            }
            batches.entry(stream.to_string()).or_default().push(records);
        }

        let mut durable = BTreeMap::new();
        for (stream, objects) in &batches {
            for (i, records) in objects.iter().enumerate() {
                if i + 1 < objects.len() && records.len() != buffer_size {
                    self.result.invariant_violations.push(format!(
                        "Stream {} object #{} holds {} records, expected {}",
                        stream,
                        i,
                        records.len(),
                        buffer_size
                    ));
                }
            }

            let replayed: Vec<&String> = objects.iter().flatten().collect();
            let sent = self.sent.get(stream).map(Vec::as_slice).unwrap_or(&[]);
            let is_prefix = replayed.len() <= sent.len()
                && replayed.iter().zip(sent.iter()).all(|(a, b)| *a == b);
            if !is_prefix {
                self.result.invariant_violations.push(format!(
                    "Stream {}: stored records are not the input order prefix",
                    stream
                ));
            }
            durable.insert(stream.clone(), replayed.len() as u64);
        }
        durable
    }

    fn check_state_lines(&mut self, durable: &BTreeMap<String, u64>) {
        let sink = self.processor.manager().emitter().sink();
        let mut last: BTreeMap<String, u64> = BTreeMap::new();

        for line in String::from_utf8_lossy(sink).lines() {
            self.result.state_messages += 1;
            let parsed: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    self.result
                        .invariant_violations
                        .push(format!("Unparseable STATE line {}: {}", line, e));
                    continue;
                }
            };
            let stream = parsed["value"]["stream"].as_str().unwrap_or_default();
            let count = parsed["value"]["count"].as_u64().unwrap_or(0);
            if parsed["type"] != "STATE" {
                self.result
                    .invariant_violations
                    .push(format!("Output line is not STATE: {}", line));
            }
            if let Some(prev) = last.get(stream) {
                if count <= *prev {
                    self.result.invariant_violations.push(format!(
                        "Stream {}: STATE count went from {} to {}",
                        stream, prev, count
                    ));
                }
            }
            last.insert(stream.to_string(), count);
        }

        for (stream, count) in &last {
            let written = durable.get(stream).copied().unwrap_or(0);
            if *count != written {
                self.result.invariant_violations.push(format!(
                    "Stream {}: last STATE count {} but {} records durable",
                    stream, count, written
                ));
            }
        }
        for (stream, written) in durable {
            if *written > 0 && !last.contains_key(stream) {
                self.result.invariant_violations.push(format!(
                    "Stream {}: {} records durable but never acknowledged",
                    stream, written
                ));
            }
        }
    }

    pub fn result(&self) -> &BufferDSTResult {
        &self.result
    }

    pub fn into_result(self) -> BufferDSTResult {
        self.result
    }
}

/// Run a batch of DST tests with different seeds
pub async fn run_dst_batch(
    base_seed: u64,
    count: usize,
    records_per_run: usize,
    config_fn: impl Fn(u64) -> BufferDSTConfig,
) -> Vec<BufferDSTResult> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = BufferDSTHarness::new(config_fn(seed));
        harness.run(records_per_run).await;
        harness.finish().await;
        harness.check_invariants();
        results.push(harness.into_result());
    }

    results
}

/// Summary of batch results
pub fn summarize_batch(results: &[BufferDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let aborted = results.iter().filter(|r| r.aborted.is_some()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let total_records: u64 = results.iter().map(|r| r.records_sent).sum();
    let total_objects: u64 = results.iter().map(|r| r.objects_written).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} aborted, {} records, {} objects",
        passed, total, aborted, total_records, total_objects
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}
