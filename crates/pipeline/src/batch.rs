//! Batch stage.
//!
//! A single batcher task accumulates records from the input channel into
//! slices of up to `batch_size`, and a worker pool consumes completed
//! batches. The batcher never waits for a full batch while the upstream
//! is quiet: a partial batch is flushed the moment no record is
//! immediately available and a worker has capacity for it. Reserving a
//! downstream slot before handing the batch over is what makes the
//! flush race cancel-safe.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{report_error, send_records, BatchFn, BatchOptions};

pub(crate) fn start<R: Send + 'static>(
    f: BatchFn<R>,
    opts: BatchOptions,
    rx: mpsc::Receiver<R>,
    tx: mpsc::Sender<R>,
    token: &CancellationToken,
    latch: &Arc<Mutex<Option<anyhow::Error>>>,
    tasks: &mut Vec<JoinHandle<()>>,
) {
    let (batch_tx, batch_rx) = mpsc::channel::<Vec<R>>(1);
    let shared_batch_rx = Arc::new(tokio::sync::Mutex::new(batch_rx));

    for _ in 0..opts.workers.max(1) {
        let f = f.clone();
        let shared_batch_rx = shared_batch_rx.clone();
        let tx = tx.clone();
        let token = token.clone();
        let latch = latch.clone();

        tasks.push(tokio::spawn(async move {
            loop {
                let batch = {
                    let mut batch_rx = shared_batch_rx.lock().await;
                    tokio::select! {
                        _ = token.cancelled() => return,
                        batch = batch_rx.recv() => match batch {
                            Some(batch) => batch,
                            None => return,
                        },
                    }
                };

                match f(batch).await {
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

    let token = token.clone();
    tasks.push(tokio::spawn(run_batcher(
        rx,
        batch_tx,
        token,
        opts.batch_size.max(1),
    )));
}

async fn run_batcher<R: Send>(
    mut rx: mpsc::Receiver<R>,
    batch_tx: mpsc::Sender<Vec<R>>,
    token: CancellationToken,
    batch_size: usize,
) {
    'next_batch: loop {
        // Wait for the first record of a batch
        let first = tokio::select! {
            _ = token.cancelled() => return,
            record = rx.recv() => match record {
                Some(record) => record,
                None => return,
            },
        };

        let mut batch = Vec::with_capacity(batch_size);
        batch.push(first);

        loop {
            if batch.len() == batch_size {
                if !flush(batch, &batch_tx, &token).await {
                    return;
                }
                continue 'next_batch;
            }

            match rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(TryRecvError::Disconnected) => {
                    flush(batch, &batch_tx, &token).await;
                    return;
                }
                Err(TryRecvError::Empty) => {
                    // Nothing immediately available: race filling the
                    // batch further against handing it to a worker.
                    tokio::select! {
                        _ = token.cancelled() => return,
                        record = rx.recv() => match record {
                            Some(record) => batch.push(record),
                            None => {
                                flush(batch, &batch_tx, &token).await;
                                return;
                            }
                        },
                        permit = batch_tx.reserve() => match permit {
                            Ok(permit) => {
                                permit.send(batch);
                                continue 'next_batch;
                            }
                            Err(_) => return,
                        },
                    }
                }
            }
        }
    }
}

/// Hand a completed batch to the worker pool, observing stop
async fn flush<R>(
    batch: Vec<R>,
    batch_tx: &mpsc::Sender<Vec<R>>,
    token: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        sent = batch_tx.send(batch) => sent.is_ok(),
    }
}
