//! Shuffle stage: a bounded priority reorder buffer.
//!
//! Records are buffered in a bounded max-heap keyed by a caller-supplied
//! ordering. While records keep arriving the buffer fills and behaves
//! like a priority queue; whenever the upstream pauses, or the buffer is
//! full, the current best record is emitted. On upstream close the
//! buffer drains in heap order. The stage never blocks on an emit while
//! an upstream record is ready, and every wait observes the stop token.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{HigherFn, ShuffleOptions};

/// Bounded max-heap over a caller-supplied strict ordering.
///
/// `BinaryHeap` requires `Ord` on the element type, which a closure-keyed
/// buffer cannot provide, so the sift operations are spelled out here.
pub(crate) struct BoundedHeap<R> {
    data: Vec<R>,
    capacity: usize,
    higher: HigherFn<R>,
}

impl<R> BoundedHeap<R> {
    pub(crate) fn new(capacity: usize, higher: HigherFn<R>) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            higher,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Push a record and restore the heap property
    pub(crate) fn push(&mut self, record: R) {
        self.data.push(record);
        let mut i = self.data.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if (self.higher)(&self.data[i], &self.data[parent]) {
                self.data.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    /// Remove and return the highest-priority record
    pub(crate) fn pop(&mut self) -> Option<R> {
        if self.data.is_empty() {
            return None;
        }

        let last = self.data.len() - 1;
        self.data.swap(0, last);
        let top = self.data.pop();

        let mut i = 0;
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut best = i;
            if left < self.data.len() && (self.higher)(&self.data[left], &self.data[best]) {
                best = left;
            }
            if right < self.data.len() && (self.higher)(&self.data[right], &self.data[best]) {
                best = right;
            }
            if best == i {
                break;
            }
            self.data.swap(i, best);
            i = best;
        }

        top
    }
}

pub(crate) fn start<R: Send + 'static>(
    higher: HigherFn<R>,
    opts: ShuffleOptions,
    rx: mpsc::Receiver<R>,
    tx: mpsc::Sender<R>,
    token: CancellationToken,
    tasks: &mut Vec<JoinHandle<()>>,
) {
    let heap = BoundedHeap::new(opts.capacity.max(1), higher);
    tasks.push(tokio::spawn(run_shuffle(heap, rx, tx, token)));
}

async fn run_shuffle<R: Send>(
    mut heap: BoundedHeap<R>,
    mut rx: mpsc::Receiver<R>,
    tx: mpsc::Sender<R>,
    token: CancellationToken,
) {
    let mut draining = false;

    loop {
        if heap.is_full() || (draining && !heap.is_empty()) {
            // Emit the current best, observing stop
            tokio::select! {
                _ = token.cancelled() => return,
                permit = tx.reserve() => match permit {
                    Ok(permit) => {
                        if let Some(top) = heap.pop() {
                            permit.send(top);
                        }
                    }
                    Err(_) => return,
                },
            }
        } else if !heap.is_empty() {
            match rx.try_recv() {
                // An input is immediately available; buffer it first
                Ok(record) => heap.push(record),
                Err(TryRecvError::Disconnected) => draining = true,
                Err(TryRecvError::Empty) => {
                    // Upstream paused: race emitting the best against
                    // accepting the next record.
                    tokio::select! {
                        _ = token.cancelled() => return,
                        record = rx.recv() => match record {
                            Some(record) => heap.push(record),
                            None => draining = true,
                        },
                        permit = tx.reserve() => match permit {
                            Ok(permit) => {
                                if let Some(top) = heap.pop() {
                                    permit.send(top);
                                }
                            }
                            Err(_) => return,
                        },
                    }
                }
            }
        } else {
            if draining {
                return;
            }
            tokio::select! {
                _ = token.cancelled() => return,
                record = rx.recv() => match record {
                    Some(record) => heap.push(record),
                    None => return,
                },
            }
        }
    }
}
