// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited FIFO of work items processed by a single worker.
//!
//! An item equal to one still waiting in the queue is coalesced into it.
//! Items already handed to the worker do not count, so a change observed
//! mid-sync is always followed by another pass.
//!
//! A failed item is retried after [`RETRY_INTERVAL`], by default
//! [`RETRY_FOREVER`] until it succeeds or the queue closes. There is no
//! exponential backoff and no dead-lettering: every sync rebuilds the full
//! state from the caches, so any successful retry converges regardless of
//! which item triggered it.

use crate::constants::queue::{
    MAX_RETRIES, RATE_LIMIT_BURST, RATE_LIMIT_QPS, RETRY_FOREVER, RETRY_INTERVAL,
};
use crate::error::Result;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Work item handler driven by [`WorkQueue::run`]
pub trait Process<T> {
    fn process(&mut self, item: &T) -> impl Future<Output = Result<()>> + Send;
}

struct State<T> {
    items: VecDeque<T>,
    closing: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    retry_limit: Option<u32>,
}

pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::with_retry_limit(MAX_RETRIES)
    }

    /// Queue dropping an item after `retry_limit` failed retries;
    /// [`RETRY_FOREVER`] never drops
    pub fn with_retry_limit(retry_limit: Option<u32>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closing: false,
                }),
                notify: Notify::new(),
                retry_limit,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an item; dropped silently once the queue is closing or when
    /// an equal item is already pending
    pub fn enqueue(&self, item: T)
    where
        T: PartialEq,
    {
        let mut state = self.lock();
        if state.closing || state.items.contains(&item) {
            return;
        }
        state.items.push_back(item);
        drop(state);
        self.inner.notify.notify_one();
    }

    pub fn close(&self) {
        self.lock().closing = true;
        self.inner.notify.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().items.iter().cloned().collect()
    }

    async fn next(&self) -> Option<T> {
        loop {
            {
                let mut state = self.lock();
                if state.closing {
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Process items one at a time until `shutdown` fires. The item being
    /// processed when the signal arrives is finished first.
    pub async fn run<P: Process<T>>(&self, processor: &mut P, shutdown: CancellationToken) {
        let mut limiter = TokenBucket::new(RATE_LIMIT_QPS, RATE_LIMIT_BURST);

        loop {
            let item = tokio::select! {
                item = self.next() => item,
                _ = shutdown.cancelled() => None,
            };
            let Some(item) = item else {
                break;
            };

            limiter.acquire().await;
            let mut retries = 0;
            while let Err(e) = processor.process(&item).await {
                if self.is_closing() || shutdown.is_cancelled() {
                    break;
                }
                if self.inner.retry_limit.is_some_and(|limit| retries >= limit) {
                    error!("Work item failed after {} retries, dropping it: {}", retries, e);
                    break;
                }
                retries += 1;
                warn!("Work item failed, repeating after {:?}: {}", RETRY_INTERVAL, e);
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_INTERVAL) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }

        self.close();
        debug!("Work queue stopped with {} pending items", self.len());
    }
}

/// Token bucket pacing a single consumer
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(refill_rate: f64, burst: u32) -> Self {
        Self {
            capacity: f64::from(burst),
            tokens: f64::from(burst),
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token, waiting for it to be refilled when the bucket is empty
    pub async fn acquire(&mut self) {
        self.refill();
        if self.tokens < 1.0 {
            let missing = 1.0 - self.tokens;
            tokio::time::sleep(Duration::from_secs_f64(missing / self.refill_rate)).await;
            self.refill();
        }
        self.tokens = (self.tokens - 1.0).max(0.0);
    }
}
