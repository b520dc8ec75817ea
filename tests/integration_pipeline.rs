//! Integration tests for the signing pipeline.
//!
//! These tests verify end-to-end behavior including:
//! - The reference digest for the Fibonacci input
//! - Free flow of items between stages
//! - Mutual exclusion of the throttled primitive
//! - Hash call counts and overall latency

use hash_signer::core::guard::ResourceGuard;
use hash_signer::core::hasher::{Crc32Hasher, DataHasher, HashPrimitives, HasherConfig, Md5Hasher};
use hash_signer::core::pipeline::{execute_pipeline, stage_fn, Item, Pipeline, Stage};
use hash_signer::core::signer::{Signer, REFERENCE_INPUT};
use hash_signer::core::stages::{CombineResults, SourceStage};
use hash_signer::error::{PipelineError, SignerError, StageError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const REFERENCE_DIGEST: &str = "1173136728138862632818075107442090076184424490584241521304_1696913515191343735512658979631549563179965036907783101867_27225454331033649287118297354036464389062965355426795162684_29568666068035183841425683795340791879727309630931025356555_3994492081516972096677631278379039212655368881548151736_4958044192186797981418233587017209679042592862002427381542_4958044192186797981418233587017209679042592862002427381542";

/// Wraps a hasher, counting calls and tracking how many run at once
struct Instrumented<H> {
    inner: H,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl<H> Instrumented<H> {
    fn new(inner: H) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }
}

impl<H: DataHasher> DataHasher for Instrumented<H> {
    fn hash(&self, data: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let digest = self.inner.hash(data);
        self.active.fetch_sub(1, Ordering::SeqCst);
        digest
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

fn fast_signer() -> Signer {
    Signer::builder()
        .hasher(HasherConfig::new().without_latency())
        .build()
        .unwrap()
}

#[test]
fn reference_input_produces_reference_digest_in_time() {
    let md5 = Instrumented::new(Md5Hasher::new("", Duration::from_millis(10)));
    let crc32 = Instrumented::new(Crc32Hasher::new("", Duration::from_secs(1)));
    let guard = Arc::new(ResourceGuard::new());

    let signer = Signer::builder()
        .primitives(HashPrimitives::new(
            md5.clone(),
            crc32.clone(),
            Arc::clone(&guard),
        ))
        .build()
        .unwrap();

    let start = Instant::now();
    let combined = signer.sign(REFERENCE_INPUT.to_vec()).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(combined, REFERENCE_DIGEST);
    assert!(
        elapsed < Duration::from_secs(3),
        "execution too long: {elapsed:?}"
    );

    let items = REFERENCE_INPUT.len();
    let stats = guard.stats();
    assert_eq!(stats.acquisitions as usize, items);
    assert_eq!(stats.releases as usize, items);
    assert_eq!(md5.calls.load(Ordering::SeqCst), items);
    // 2 in SingleHash, 6 in MultiHash
    assert_eq!(crc32.calls.load(Ordering::SeqCst), items * 8);
    assert_eq!(md5.max_active.load(Ordering::SeqCst), 1);
    assert!(crc32.max_active.load(Ordering::SeqCst) > 1);
}

#[test]
fn items_flow_before_the_producing_stage_returns() {
    let received = Arc::new(AtomicUsize::new(0));
    let flowed = Arc::new(AtomicBool::new(false));

    let seen = Arc::clone(&received);
    let ok = Arc::clone(&flowed);
    let counter = Arc::clone(&received);

    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(stage_fn("producer", move |_input, output| {
            output.send(1_i64)?;
            thread::sleep(Duration::from_millis(10));
            ok.store(seen.load(Ordering::SeqCst) != 0, Ordering::SeqCst);
            Ok(())
        })),
        Box::new(stage_fn("counter", move |input, _output| {
            for _ in input {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })),
    ];

    execute_pipeline(stages).unwrap();

    assert!(flowed.load(Ordering::SeqCst), "values were batched, not streamed");
    assert_ne!(received.load(Ordering::SeqCst), 0);
}

#[test]
fn signing_is_deterministic() {
    let signer = fast_signer();
    let first = signer.sign(REFERENCE_INPUT.to_vec()).unwrap();
    let second = signer.sign(REFERENCE_INPUT.to_vec()).unwrap();

    assert_eq!(first, REFERENCE_DIGEST);
    assert_eq!(first, second);
    assert_eq!(signer.guard().stats().acquisitions, 14);
}

#[test]
fn salt_changes_the_digest() {
    let salted = Signer::builder()
        .hasher(HasherConfig::new().without_latency())
        .salt("pepper")
        .build()
        .unwrap();

    let combined = salted.sign(REFERENCE_INPUT.to_vec()).unwrap();
    assert_ne!(combined, REFERENCE_DIGEST);
    assert_eq!(combined.split('_').count(), REFERENCE_INPUT.len());
}

#[test]
fn fan_out_and_separator_are_configurable() {
    let signer = Signer::builder()
        .hasher(HasherConfig::new().without_latency())
        .fan_out(2)
        .separator("|")
        .build()
        .unwrap();

    let combined = signer.sign(vec![0, 1]).unwrap();
    let parts: Vec<&str> = combined.split('|').collect();
    assert_eq!(parts.len(), 2);
    let mut sorted = parts.clone();
    sorted.sort();
    assert_eq!(parts, sorted);
}

#[test]
fn buffered_streams_give_the_same_result() {
    let signer = Signer::builder()
        .hasher(HasherConfig::new().without_latency())
        .stream_capacity(16)
        .build()
        .unwrap();

    assert_eq!(
        signer.sign(REFERENCE_INPUT.to_vec()).unwrap(),
        REFERENCE_DIGEST
    );
}

#[test]
fn shape_mismatch_fails_instead_of_hanging() {
    let pipeline = Pipeline::builder()
        .stage(SourceStage::from_fn(|| 0_i64..))
        .stage(CombineResults::new())
        .build();

    match pipeline.run() {
        Err(PipelineError::Stage { name, source, .. }) => {
            assert_eq!(name, "combine_results");
            assert!(matches!(source, StageError::UnexpectedItem { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn signer_pipeline_emits_one_combined_item() {
    let signer = fast_signer();
    let pipeline = signer.pipeline(SourceStage::from_values(vec![1, 2, 3]));
    let output = pipeline.run().unwrap();
    assert_eq!(output.items.len(), 1);
    assert!(matches!(&output.items[0], Item::Text(_)));

    let err = Signer::builder().fan_out(0).build().unwrap_err();
    assert!(matches!(err, SignerError::Config(_)));
}

#[test]
fn unbounded_source_can_be_cut_short_downstream() {
    let pipeline = Pipeline::builder()
        .stage(SourceStage::from_fn(|| 0_i64..))
        .stage(stage_fn("take_three", |input, output| {
            for item in input.iter().take(3) {
                output.send(item)?;
            }
            Ok(())
        }))
        .build();

    let output = pipeline.run().unwrap();
    assert_eq!(
        output.items,
        vec![Item::Number(0), Item::Number(1), Item::Number(2)]
    );
}

#[test]
fn in_flight_cap_bounds_concurrent_hash_calls() {
    let md5 = Instrumented::new(Md5Hasher::default());
    let crc32 = Instrumented::new(Crc32Hasher::new("", Duration::from_millis(5)));

    let signer = Signer::builder()
        .primitives(HashPrimitives::new(
            md5.clone(),
            crc32.clone(),
            Arc::new(ResourceGuard::new()),
        ))
        .max_in_flight(4)
        .build()
        .unwrap();

    let values: Vec<i64> = (0..100).collect();
    let combined = signer.sign(values).unwrap();

    assert_eq!(combined.split('_').count(), 100);
    assert_eq!(crc32.calls.load(Ordering::SeqCst), 100 * 8);
    // SingleHash: 2 calls per item, MultiHash: 6 per item, 4 items each
    assert!(crc32.max_active.load(Ordering::SeqCst) <= 4 * 2 + 4 * 6);
    assert_eq!(md5.max_active.load(Ordering::SeqCst), 1);
}
