// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The two worker-pool shapes every pipeline stage is built from.
//!
//! Neither reaches for an external pool crate: workers are plain
//! `std::thread::spawn` loops draining a `crossbeam_channel`, and
//! `complete()` hands back a `tokio::sync::oneshot::Receiver<()>` fulfilled
//! once every worker has observed the closed channel and joined. Both
//! types take `&self` throughout (the sender and worker list live behind a
//! mutex) so a stage can be shared via `Arc` between a front-end stage's
//! worker closures and the pipeline that owns it.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// A fixed-size worker pool draining a bounded channel.
///
/// Used for a pipeline's `bytes`/`file` ports and the texture pipeline's
/// slot-loader stage, where the spec calls for a configured maximum
/// parallelism (default 6 per port) and backpressure on `post`.
pub struct BoundedPool<Req: Send + 'static> {
    sender: Mutex<Option<crossbeam_channel::Sender<Req>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<Req: Send + 'static> BoundedPool<Req> {
    /// Spawns `parallelism` workers, each looping `process` over requests
    /// pulled from a channel bounded at `capacity`.
    pub fn new<F>(parallelism: usize, capacity: usize, process: F) -> Self
    where
        F: Fn(Req) + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let process = Arc::new(process);
        let workers = (0..parallelism.max(1))
            .map(|_| {
                let rx = rx.clone();
                let process = process.clone();
                thread::spawn(move || {
                    while let Ok(req) = rx.recv() {
                        process(req);
                    }
                })
            })
            .collect();
        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Posts a request, blocking if the channel is at capacity.
    ///
    /// Returns `false` if the pool has already been closed by `complete()`.
    pub fn post(&self, req: Req) -> bool {
        let guard = self.sender.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(req).is_ok(),
            None => false,
        }
    }

    /// Closes the port (no further `post` is accepted) and returns a
    /// receiver that fires once every worker has drained and exited.
    pub fn complete(&self) -> oneshot::Receiver<()> {
        self.sender.lock().unwrap().take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        let (done_tx, done_rx) = oneshot::channel();
        thread::spawn(move || {
            for w in workers {
                let _ = w.join();
            }
            let _ = done_tx.send(());
        });
        done_rx
    }
}

/// An unbounded-parallelism stage: every request that arrives is handed its
/// own worker thread rather than queueing behind a fixed pool.
///
/// Used for archive expansion and texture-container expansion, per the
/// spec's "unbounded parallelism" front-end stages.
pub struct UnboundedStage<Req: Send + 'static> {
    sender: Mutex<Option<crossbeam_channel::Sender<Req>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<Req: Send + 'static> UnboundedStage<Req> {
    /// Starts the dispatcher thread, which spawns one worker per request.
    pub fn new<F>(process: F) -> Self
    where
        F: Fn(Req) + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<Req>();
        let process = Arc::new(process);
        let dispatcher = thread::spawn(move || {
            let mut workers = Vec::new();
            while let Ok(req) = rx.recv() {
                let process = process.clone();
                workers.push(thread::spawn(move || process(req)));
            }
            for w in workers {
                let _ = w.join();
            }
        });
        Self {
            sender: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Posts a request. Returns `false` if the stage has already been
    /// closed by `complete()`.
    pub fn post(&self, req: Req) -> bool {
        let guard = self.sender.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(req).is_ok(),
            None => false,
        }
    }

    /// Closes the stage and returns a receiver that fires once every
    /// spawned worker (including ones spawned after the close was
    /// requested but before the channel drained) has joined.
    pub fn complete(&self) -> oneshot::Receiver<()> {
        self.sender.lock().unwrap().take();
        let dispatcher = self.dispatcher.lock().unwrap().take();
        let (done_tx, done_rx) = oneshot::channel();
        thread::spawn(move || {
            if let Some(d) = dispatcher {
                let _ = d.join();
            }
            let _ = done_tx.send(());
        });
        done_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bounded_pool_processes_every_request() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let pool = BoundedPool::new(2, 4, move |_req: u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        for i in 0..10 {
            assert!(pool.post(i));
        }
        let rx = pool.complete();
        rx.blocking_recv().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(!pool.post(999), "post after complete must be rejected");
    }

    #[test]
    fn unbounded_stage_processes_every_request() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let stage = UnboundedStage::new(move |_req: u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        for i in 0..25 {
            assert!(stage.post(i));
        }
        let rx = stage.complete();
        rx.blocking_recv().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 25);
    }
}
