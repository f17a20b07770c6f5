//! Four-class strict-priority scheduler with token-bucket shaping (§4.5).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use nexdigi_core::{Environment, Priority};
use serde::Serialize;

use crate::token_bucket::TokenBucket;

/// Default per-class queue capacity, indexed by [`Priority::class_index`]:
/// Emergency=100, High=200, Normal=500, Low=1000.
pub const DEFAULT_CLASS_LIMITS: [usize; 4] = [100, 200, 500, 1000];

/// Exponential smoothing factor applied to the rolling-average wait time,
/// matching the 0.8/0.2 EMA convention used for route latency (§4.6).
const WAIT_EMA_ALPHA: f64 = 0.2;

/// A packet admitted to the scheduler, tagged with its serialized size and
/// enqueue time (for wait-time accounting).
#[derive(Debug, Clone)]
pub struct QueuedPacket<I> {
    /// Wire bytes to transmit.
    pub payload: Bytes,
    /// Serialized size in bytes; consumes that many tokens to send.
    pub size: usize,
    enqueued_at: I,
}

/// Outcome of [`QosScheduler::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The packet was accepted into its class queue.
    Queued,
    /// The class queue was at capacity; the packet was dropped.
    Dropped,
}

/// Point-in-time snapshot of per-class counters, for the observability
/// surface (§10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassSnapshot {
    /// Packets currently queued.
    pub queued: u64,
    /// Packets successfully serviced.
    pub processed: u64,
    /// Packets dropped due to queue-full.
    pub dropped: u64,
    /// Rolling average wait time, in milliseconds.
    pub avg_wait_ms: f64,
}

#[derive(Debug, Default)]
struct ClassMetrics {
    processed: AtomicU64,
    dropped: AtomicU64,
    avg_wait_ms: Mutex<f64>,
}

impl ClassMetrics {
    fn record_service(&self, wait_ms: f64) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let mut avg = self.avg_wait_ms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *avg = if self.processed.load(Ordering::Relaxed) == 1 {
            wait_ms
        } else {
            WAIT_EMA_ALPHA * wait_ms + (1.0 - WAIT_EMA_ALPHA) * *avg
        };
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Strict-priority scheduler over four FIFO class queues, shaped by a
/// shared token bucket.
///
/// Not `Send`-shared directly; the owning backbone task holds exclusive
/// access and drives [`QosScheduler::tick`] (§9 "QoS queues have one owner,
/// the scheduler task").
pub struct QosScheduler<E: Environment> {
    env: E,
    queues: [VecDeque<QueuedPacket<E::Instant>>; 4],
    limits: [usize; 4],
    bucket: TokenBucket<E>,
    metrics: [ClassMetrics; 4],
}

impl<E: Environment> QosScheduler<E> {
    /// Builds a scheduler with the default per-class limits and the given
    /// bandwidth shaping parameters (`rate_bytes_per_sec == 0` disables
    /// shaping).
    #[must_use]
    pub fn new(env: E, capacity_bytes: u64, rate_bytes_per_sec: u64) -> Self {
        Self::with_limits(env, capacity_bytes, rate_bytes_per_sec, DEFAULT_CLASS_LIMITS)
    }

    /// Builds a scheduler with explicit per-class queue limits.
    #[must_use]
    pub fn with_limits(env: E, capacity_bytes: u64, rate_bytes_per_sec: u64, limits: [usize; 4]) -> Self {
        let bucket = TokenBucket::new(env.clone(), capacity_bytes, rate_bytes_per_sec);
        Self {
            env,
            queues: [VecDeque::new(), VecDeque::new(), VecDeque::new(), VecDeque::new()],
            limits,
            bucket,
            metrics: Default::default(),
        }
    }

    /// Enqueues a packet of `priority`, dropping it if the class queue is
    /// at capacity.
    pub fn enqueue(&mut self, priority: Priority, payload: Bytes, size: usize) -> EnqueueOutcome {
        let idx = priority.class_index();
        if self.queues[idx].len() >= self.limits[idx] {
            self.metrics[idx].record_drop();
            return EnqueueOutcome::Dropped;
        }
        self.queues[idx].push_back(QueuedPacket { payload, size, enqueued_at: self.env.now() });
        EnqueueOutcome::Queued
    }

    /// Services as many packets as the token bucket admits this tick,
    /// draining strictly in priority order: a lower-numbered (higher
    /// priority) non-empty queue is always drained before a
    /// higher-numbered one is touched.
    pub fn tick(&mut self) -> Vec<Bytes> {
        let mut serviced = Vec::new();
        loop {
            let Some(idx) = Priority::ALL.iter().map(|p| p.class_index()).find(|&idx| !self.queues[idx].is_empty())
            else {
                break;
            };

            let Some(size) = self.queues[idx].front().map(|p| p.size) else { break };
            if !self.bucket.try_admit(size) {
                break;
            }

            let Some(packet) = self.queues[idx].pop_front() else { break };
            let wait = (self.env.now() - packet.enqueued_at).as_secs_f64() * 1000.0;
            self.metrics[idx].record_service(wait);
            serviced.push(packet.payload);
        }
        serviced
    }

    /// Snapshot of a single class's counters.
    #[must_use]
    pub fn class_snapshot(&self, priority: Priority) -> ClassSnapshot {
        let idx = priority.class_index();
        let metrics = &self.metrics[idx];
        ClassSnapshot {
            queued: self.queues[idx].len() as u64,
            processed: metrics.processed.load(Ordering::Relaxed),
            dropped: metrics.dropped.load(Ordering::Relaxed),
            avg_wait_ms: *metrics.avg_wait_ms.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;

    fn scheduler(rate: u64) -> QosScheduler<ManualClock> {
        QosScheduler::new(ManualClock::new(), rate.max(1) * 10, rate)
    }

    #[test]
    fn strict_priority_drains_emergency_before_normal() {
        let mut sched = scheduler(0);
        sched.enqueue(Priority::Normal, Bytes::from_static(b"n1"), 2);
        sched.enqueue(Priority::Normal, Bytes::from_static(b"n2"), 2);
        sched.enqueue(Priority::High, Bytes::from_static(b"h1"), 2);

        let serviced = sched.tick();
        assert_eq!(serviced, vec![Bytes::from_static(b"h1"), Bytes::from_static(b"n1"), Bytes::from_static(b"n2")]);
    }

    #[test]
    fn overflow_drops_and_increments_dropped_counter() {
        let mut sched = QosScheduler::with_limits(ManualClock::new(), 0, 0, [1, 1, 1, 1]);
        assert_eq!(sched.enqueue(Priority::Low, Bytes::from_static(b"a"), 1), EnqueueOutcome::Queued);
        assert_eq!(sched.enqueue(Priority::Low, Bytes::from_static(b"b"), 1), EnqueueOutcome::Dropped);
        assert_eq!(sched.class_snapshot(Priority::Low).dropped, 1);
    }

    #[test]
    fn token_bucket_blocks_and_leaves_packet_queued() {
        let mut sched = QosScheduler::new(ManualClock::new(), 5, 5);
        sched.enqueue(Priority::Normal, Bytes::from_static(b"big"), 100);
        let serviced = sched.tick();
        assert!(serviced.is_empty());
        assert_eq!(sched.class_snapshot(Priority::Normal).queued, 1);
    }

    #[test]
    fn unlimited_rate_services_everything_in_one_tick() {
        let mut sched = scheduler(0);
        for _ in 0..50 {
            sched.enqueue(Priority::Low, Bytes::from_static(b"x"), 10);
        }
        let serviced = sched.tick();
        assert_eq!(serviced.len(), 50);
    }
}
