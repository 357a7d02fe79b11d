//! Staged streaming pipeline engine.
//!
//! A pipeline processes records of a single type through a chain of
//! concurrent stages connected by bounded channels:
//!
//! - `map` - one record in, one record out
//! - `fan_out` - one record in, zero or more records out (worker pool)
//! - `filter` - keep a record iff a predicate holds
//! - `batch` - accumulate records into slices before processing
//! - `shuffle` - bounded priority reorder buffer
//! - `channel` - the stage streams its own outputs and observes stop
//!
//! Every stage runs on its own task(s); backpressure is implicit through
//! the bounded channels. A single stop token is broadcast to all tasks:
//! every send, receive and long wait is selectable against it. The first
//! error reported by any stage is latched and stops the pipeline; a stop
//! requested by the sink is a clean termination and `run` returns `Ok`.
//!
//! Records dropped while stopping are lost by design. The pipeline is a
//! processing engine, not a reliable queue.

mod batch;
mod shuffle;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default worker count for fan-out, channel and batch stages
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default reorder buffer capacity
pub const DEFAULT_SHUFFLE_CAPACITY: usize = 200;

// tokio's mpsc has no zero-capacity rendezvous channel; capacity one is
// the closest bounded equivalent.
const DEFAULT_BUFFER: usize = 1;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type StageFn<R> = Arc<dyn Fn(R) -> BoxFuture<Result<Vec<R>>> + Send + Sync>;
type BatchFn<R> = Arc<dyn Fn(Vec<R>) -> BoxFuture<Result<Vec<R>>> + Send + Sync>;
type ChannelFn<R> =
    Arc<dyn Fn(R, CancellationToken, mpsc::Sender<R>) -> BoxFuture<Result<()>> + Send + Sync>;
type HigherFn<R> = Arc<dyn Fn(&R, &R) -> bool + Send + Sync>;
type SourceFn<R> = Box<dyn FnOnce() -> BoxFuture<Result<Vec<R>>> + Send>;

/// Options for fan-out style stages
#[derive(Debug, Clone, Copy)]
pub struct StageOptions {
    /// Worker pool size
    pub concurrency: usize,
    /// Capacity of the stage's input channel
    pub buffer: usize,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            buffer: DEFAULT_BUFFER,
        }
    }
}

/// Options for batch stages
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Number of records accumulated before a batch is forced out
    pub batch_size: usize,
    /// Worker pool size consuming completed batches
    pub workers: usize,
    /// Capacity of the stage's input channel
    pub buffer: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_CONCURRENCY,
            buffer: DEFAULT_BUFFER,
        }
    }
}

/// Options for shuffle stages
#[derive(Debug, Clone, Copy)]
pub struct ShuffleOptions {
    /// Reorder buffer capacity
    pub capacity: usize,
    /// Capacity of the stage's input channel
    pub buffer: usize,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SHUFFLE_CAPACITY,
            buffer: DEFAULT_BUFFER,
        }
    }
}

enum Stage<R> {
    FanOut { f: StageFn<R>, opts: StageOptions },
    Batch { f: BatchFn<R>, opts: BatchOptions },
    Shuffle { higher: HigherFn<R>, opts: ShuffleOptions },
    Channel { f: ChannelFn<R>, opts: StageOptions },
}

/// Handle for requesting an early, clean stop of a running pipeline.
///
/// Typically captured by the sink to short-circuit once enough results
/// have been collected. Stopping is idempotent.
#[derive(Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Broadcast the stop signal to every stage task
    pub fn stop(&self) {
        self.token.cancel();
    }
}

/// A staged record processor. Append stages, then call [`Pipeline::run`].
pub struct Pipeline<R> {
    source: SourceFn<R>,
    stages: Vec<Stage<R>>,
    token: CancellationToken,
    latch: Arc<Mutex<Option<anyhow::Error>>>,
}

impl<R: Send + 'static> Pipeline<R> {
    /// Create a pipeline fed by `source`, which is called exactly once
    pub fn new<F, Fut>(source: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        Self {
            source: Box::new(move || Box::pin(source())),
            stages: Vec::new(),
            token: CancellationToken::new(),
            latch: Arc::new(Mutex::new(None)),
        }
    }

    /// Handle that stops the pipeline cleanly
    pub fn handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
        }
    }

    /// One record in, one record out. An error latches and stops.
    pub fn map<F, Fut>(&mut self, f: F)
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.fan_out(move |record| {
            let fut = f(record);
            async move { fut.await.map(|out| vec![out]) }
        });
    }

    /// One record in, zero or more records out, with default options
    pub fn fan_out<F, Fut>(&mut self, f: F)
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        self.fan_out_opts(f, StageOptions::default());
    }

    /// One record in, zero or more records out
    pub fn fan_out_opts<F, Fut>(&mut self, f: F, opts: StageOptions)
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        self.stages.push(Stage::FanOut {
            f: Arc::new(move |record| Box::pin(f(record))),
            opts,
        });
    }

    /// Keep records for which the predicate returns true
    pub fn filter<F>(&mut self, predicate: F)
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.fan_out(move |record| {
            let keep = predicate(&record);
            async move {
                if keep {
                    Ok(vec![record])
                } else {
                    Ok(Vec::new())
                }
            }
        });
    }

    /// Accumulate records into slices of up to `batch_size` and process
    /// them together, with default options
    pub fn batch<F, Fut>(&mut self, f: F)
    where
        F: Fn(Vec<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        self.batch_opts(f, BatchOptions::default());
    }

    /// Accumulate records into slices and process them together.
    ///
    /// Batching never blocks the producer waiting for a full batch: a
    /// partial batch is flushed as soon as no record is immediately
    /// available and a worker can accept it.
    pub fn batch_opts<F, Fut>(&mut self, f: F, opts: BatchOptions)
    where
        F: Fn(Vec<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
    {
        self.stages.push(Stage::Batch {
            f: Arc::new(move |records| Box::pin(f(records))),
            opts,
        });
    }

    /// Reorder records through a bounded priority buffer, with default
    /// options. `higher(a, b)` returns true when `a` should be emitted
    /// before `b`.
    pub fn shuffle<F>(&mut self, higher: F)
    where
        F: Fn(&R, &R) -> bool + Send + Sync + 'static,
    {
        self.shuffle_opts(higher, ShuffleOptions::default());
    }

    /// Reorder records through a bounded priority buffer
    pub fn shuffle_opts<F>(&mut self, higher: F, opts: ShuffleOptions)
    where
        F: Fn(&R, &R) -> bool + Send + Sync + 'static,
    {
        self.stages.push(Stage::Shuffle {
            higher: Arc::new(higher),
            opts,
        });
    }

    /// A stage that streams its own outputs. The function receives the
    /// record, the stop token and the output sender, and may emit zero
    /// or more records while observing cancellation itself.
    pub fn channel<F, Fut>(&mut self, f: F)
    where
        F: Fn(R, CancellationToken, mpsc::Sender<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.channel_opts(f, StageOptions::default());
    }

    /// A stage that streams its own outputs, with explicit options
    pub fn channel_opts<F, Fut>(&mut self, f: F, opts: StageOptions)
    where
        F: Fn(R, CancellationToken, mpsc::Sender<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.stages.push(Stage::Channel {
            f: Arc::new(move |record, token, out| Box::pin(f(record, token, out))),
            opts,
        });
    }

    /// Run the pipeline to completion.
    ///
    /// The sink is called once per record, serially, in no particular
    /// order. A sink error latches and stops the pipeline. Returns the
    /// first latched error, or `Ok` on normal completion or clean stop.
    pub async fn run<S>(self, mut sink: S) -> Result<()>
    where
        S: FnMut(R) -> Result<()>,
    {
        let Pipeline {
            source,
            stages,
            token,
            latch,
        } = self;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let first_buffer = stages
            .first()
            .map(stage_buffer)
            .unwrap_or(DEFAULT_BUFFER);
        let mut rx = start_source(source, first_buffer, &token, &latch, &mut tasks);

        let mut stages = stages.into_iter().peekable();
        while let Some(stage) = stages.next() {
            let out_buffer = stages
                .peek()
                .map(stage_buffer)
                .unwrap_or(DEFAULT_BUFFER);
            rx = start_stage(stage, rx, out_buffer, &token, &latch, &mut tasks);
        }

        // The sink runs on the caller's task and drains until the last
        // channel closes.
        while let Some(record) = rx.recv().await {
            if let Err(err) = sink(record) {
                report_error(&latch, &token, err);
                break;
            }
        }
        drop(rx);

        token.cancel();
        for task in tasks {
            let _ = task.await;
        }

        let result = match latch.lock().expect("error latch poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        result
    }
}

fn stage_buffer<R>(stage: &Stage<R>) -> usize {
    match stage {
        Stage::FanOut { opts, .. } => opts.buffer,
        Stage::Batch { opts, .. } => opts.buffer,
        Stage::Shuffle { opts, .. } => opts.buffer,
        Stage::Channel { opts, .. } => opts.buffer,
    }
}

fn start_source<R: Send + 'static>(
    source: SourceFn<R>,
    buffer: usize,
    token: &CancellationToken,
    latch: &Arc<Mutex<Option<anyhow::Error>>>,
    tasks: &mut Vec<JoinHandle<()>>,
) -> mpsc::Receiver<R> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let token = token.clone();
    let latch = latch.clone();

    tasks.push(tokio::spawn(async move {
        match source().await {
            Ok(records) => {
                send_records(records, &tx, &token).await;
            }
            Err(err) => report_error(&latch, &token, err),
        }
    }));

    rx
}

fn start_stage<R: Send + 'static>(
    stage: Stage<R>,
    rx: mpsc::Receiver<R>,
    out_buffer: usize,
    token: &CancellationToken,
    latch: &Arc<Mutex<Option<anyhow::Error>>>,
    tasks: &mut Vec<JoinHandle<()>>,
) -> mpsc::Receiver<R> {
    let (tx, next_rx) = mpsc::channel(out_buffer.max(1));

    match stage {
        Stage::FanOut { f, opts } => {
            let shared_rx = Arc::new(tokio::sync::Mutex::new(rx));
            for _ in 0..opts.concurrency.max(1) {
                let f = f.clone();
                let shared_rx = shared_rx.clone();
                let tx = tx.clone();
                let token = token.clone();
                let latch = latch.clone();

                tasks.push(tokio::spawn(async move {
                    loop {
                        let Some(record) = next_record(&shared_rx, &token).await else {
                            return;
                        };
                        match f(record).await {
                            Ok(outs) => {
                                if !send_records(outs, &tx, &token).await {
                                    return;
                                }
                            }
                            Err(err) => {
                                report_error(&latch, &token, err);
                                return;
                            }
                        }
                    }
                }));
            }
        }
        Stage::Batch { f, opts } => {
            batch::start(f, opts, rx, tx, token, latch, tasks);
        }
        Stage::Shuffle { higher, opts } => {
            shuffle::start(higher, opts, rx, tx, token.clone(), tasks);
        }
        Stage::Channel { f, opts } => {
            let shared_rx = Arc::new(tokio::sync::Mutex::new(rx));
            for _ in 0..opts.concurrency.max(1) {
                let f = f.clone();
                let shared_rx = shared_rx.clone();
                let tx = tx.clone();
                let token = token.clone();
                let latch = latch.clone();

                tasks.push(tokio::spawn(async move {
                    loop {
                        let Some(record) = next_record(&shared_rx, &token).await else {
                            return;
                        };
                        if let Err(err) = f(record, token.clone(), tx.clone()).await {
                            report_error(&latch, &token, err);
                            return;
                        }
                    }
                }));
            }
        }
    }

    next_rx
}

/// Receive the next record from a worker-shared channel, observing stop
async fn next_record<R>(
    shared_rx: &Arc<tokio::sync::Mutex<mpsc::Receiver<R>>>,
    token: &CancellationToken,
) -> Option<R> {
    let mut rx = shared_rx.lock().await;
    tokio::select! {
        _ = token.cancelled() => None,
        record = rx.recv() => record,
    }
}

/// Send records downstream; returns false when the pipeline stopped or
/// the downstream is gone
pub(crate) async fn send_records<R>(
    records: Vec<R>,
    tx: &mpsc::Sender<R>,
    token: &CancellationToken,
) -> bool {
    for record in records {
        tokio::select! {
            _ = token.cancelled() => return false,
            sent = tx.send(record) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}

/// Latch the first error and trigger stop; later errors are discarded
pub(crate) fn report_error(
    latch: &Arc<Mutex<Option<anyhow::Error>>>,
    token: &CancellationToken,
    err: anyhow::Error,
) {
    if token.is_cancelled() {
        return;
    }
    {
        let mut slot = latch.lock().expect("error latch poisoned");
        if slot.is_none() {
            *slot = Some(err);
        }
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_source(n: u32) -> impl FnOnce() -> BoxFuture<Result<Vec<u32>>> + Send {
        move || Box::pin(async move { Ok((0..n).collect()) })
    }

    #[tokio::test]
    async fn test_map_and_sink() {
        let mut p = Pipeline::new(counting_source(10));
        p.map(|r| async move { Ok(r * 2) });

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_out = collected.clone();
        let result = p
            .run(move |r| {
                sink_out.lock().unwrap().push(r);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        let mut out = collected.lock().unwrap().clone();
        out.sort_unstable();
        assert_eq!(out, (0..10).map(|r| r * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_short_circuit_stop_returns_ok() {
        let mut p = Pipeline::new(counting_source(100));
        p.fan_out(|r| async move { Ok(vec![r, r, r]) });

        let handle = p.handle();
        let count = Arc::new(AtomicUsize::new(0));
        let sink_count = count.clone();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            p.run(move |_r| {
                let seen = sink_count.fetch_add(1, Ordering::SeqCst) + 1;
                if seen == 5 {
                    handle.stop();
                }
                Ok(())
            }),
        )
        .await
        .expect("pipeline failed to terminate after stop");

        assert!(result.is_ok());
        // the sink saw its five records before the stop took effect
        assert!(count.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test]
    async fn test_source_error_latches() {
        let p: Pipeline<u32> = Pipeline::new(|| async { Err(anyhow!("source exploded")) });
        let result = p.run(|_r| Ok(())).await;
        assert_eq!(result.unwrap_err().to_string(), "source exploded");
    }

    #[tokio::test]
    async fn test_stage_error_latches_first_only() {
        let mut p = Pipeline::new(counting_source(10));
        p.map(|r| async move {
            if r == 3 {
                Err(anyhow!("record {} is cursed", r))
            } else {
                Ok(r)
            }
        });

        let result = p.run(|_r| Ok(())).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cursed"));
    }

    #[tokio::test]
    async fn test_sink_error_latches() {
        let p = Pipeline::new(counting_source(10));
        let result = p.run(|_r| Err(anyhow!("sink rejected"))).await;
        assert_eq!(result.unwrap_err().to_string(), "sink rejected");
    }

    #[tokio::test]
    async fn test_empty_fan_out_drops_silently() {
        let mut p = Pipeline::new(counting_source(10));
        p.fan_out(|r| async move {
            if r % 2 == 0 {
                Ok(vec![r])
            } else {
                Ok(Vec::new())
            }
        });

        let count = Arc::new(AtomicUsize::new(0));
        let sink_count = count.clone();
        let result = p
            .run(move |_r| {
                sink_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_filter() {
        let mut p = Pipeline::new(counting_source(20));
        p.filter(|r| *r < 5);

        let count = Arc::new(AtomicUsize::new(0));
        let sink_count = count.clone();
        let result = p
            .run(move |_r| {
                sink_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_batch_re_emits_every_record() {
        let mut p = Pipeline::new(counting_source(25));
        let max_batch = Arc::new(AtomicUsize::new(0));
        let observed = max_batch.clone();
        p.batch(move |records| {
            observed.fetch_max(records.len(), Ordering::SeqCst);
            async move { Ok(records) }
        });

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_out = collected.clone();
        let result = p
            .run(move |r| {
                sink_out.lock().unwrap().push(r);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        let mut out = collected.lock().unwrap().clone();
        out.sort_unstable();
        assert_eq!(out, (0..25).collect::<Vec<_>>());
        assert!(max_batch.load(Ordering::SeqCst) <= DEFAULT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn test_channel_stage_streams_outputs() {
        let mut p = Pipeline::new(counting_source(5));
        p.channel(|record, token, out| async move {
            // emit the record twice, observing stop between sends
            for _ in 0..2 {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    sent = out.send(record) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            Ok(())
        });

        let count = Arc::new(AtomicUsize::new(0));
        let sink_count = count.clone();
        let result = p
            .run(move |_r| {
                sink_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_shuffle_output_is_permutation() {
        let input = vec![3u32, 1, 4, 1, 5, 9, 2, 6];
        let expected = {
            let mut sorted = input.clone();
            sorted.sort_unstable();
            sorted
        };

        let source_input = input.clone();
        let mut p = Pipeline::new(move || async move { Ok(source_input) });
        p.shuffle_opts(
            |a, b| a < b,
            ShuffleOptions {
                capacity: 3,
                ..Default::default()
            },
        );

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_out = collected.clone();
        let result = p
            .run(move |r| {
                sink_out.lock().unwrap().push(r);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        let mut out = collected.lock().unwrap().clone();
        out.sort_unstable();
        assert_eq!(out, expected);
    }
}
