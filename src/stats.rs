//! Session statistics and latency estimation
//!
//! [`StreamMonitor`] is a passive observer: the network loop and the audio
//! callback bump its atomic counters, the statistics tick reads them. The
//! latency estimate is a one-way heuristic with no clock-sync dependency:
//! any inter-arrival gap beyond the nominal frame cadence is attributed to
//! network delay, and buffered frames add one frame interval each of
//! queueing delay. Approximate by design.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::config::StreamConfig;

const NO_ARRIVAL: u64 = u64::MAX;

struct TimeBase {
    start: Instant,
    /// Set at session stop; the snapshot keeps reporting the final elapsed
    frozen: Option<Duration>,
}

/// Monotonic session counters plus the latency estimator
pub struct StreamMonitor {
    transferred: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_transport: AtomicU64,
    /// Micros since session start of the previous successful transfer
    last_arrival_us: AtomicU64,
    /// Latest observed excess over the nominal inter-packet gap, in micros
    network_delay_us: AtomicU64,
    /// Nominal inter-packet gap in micros, fixed at reset
    expected_gap_us: AtomicU64,
    /// f32 bits of the most recent frame's peak level
    peak_bits: AtomicU32,
    time: RwLock<TimeBase>,
}

impl StreamMonitor {
    pub fn new() -> Self {
        Self {
            transferred: AtomicU64::new(0),
            dropped_malformed: AtomicU64::new(0),
            dropped_overflow: AtomicU64::new(0),
            dropped_transport: AtomicU64::new(0),
            last_arrival_us: AtomicU64::new(NO_ARRIVAL),
            network_delay_us: AtomicU64::new(0),
            expected_gap_us: AtomicU64::new(0),
            peak_bits: AtomicU32::new(0),
            time: RwLock::new(TimeBase {
                start: Instant::now(),
                frozen: None,
            }),
        }
    }

    /// Zero all counters and rearm the clock. Called once per session, at
    /// start; the only operation allowed to lower a counter.
    pub fn reset(&self, config: &StreamConfig) {
        self.transferred.store(0, Ordering::Relaxed);
        self.dropped_malformed.store(0, Ordering::Relaxed);
        self.dropped_overflow.store(0, Ordering::Relaxed);
        self.dropped_transport.store(0, Ordering::Relaxed);
        self.last_arrival_us.store(NO_ARRIVAL, Ordering::Relaxed);
        self.network_delay_us.store(0, Ordering::Relaxed);
        self.expected_gap_us.store(
            config.frame_interval().as_micros() as u64,
            Ordering::Relaxed,
        );
        self.peak_bits.store(0f32.to_bits(), Ordering::Relaxed);
        let mut time = self.time.write();
        time.start = Instant::now();
        time.frozen = None;
    }

    /// Pin the elapsed time at session stop; counters stay readable
    pub fn freeze(&self) {
        let mut time = self.time.write();
        if time.frozen.is_none() {
            time.frozen = Some(time.start.elapsed());
        }
    }

    /// One frame successfully moved across the wire. Updates the
    /// inter-arrival latency estimate as a side effect.
    pub fn on_transferred(&self) {
        self.transferred.fetch_add(1, Ordering::Relaxed);

        let now_us = self.time.read().start.elapsed().as_micros() as u64;
        let prev = self.last_arrival_us.swap(now_us, Ordering::Relaxed);
        if prev == NO_ARRIVAL {
            return;
        }
        let gap = now_us.saturating_sub(prev);
        let expected = self.expected_gap_us.load(Ordering::Relaxed);
        let excess = gap.saturating_sub(expected);
        if excess > 0 {
            self.network_delay_us.store(excess, Ordering::Relaxed);
        }
    }

    /// Datagram rejected for wrong size
    pub fn on_malformed(&self) {
        self.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame evicted from a full queue
    pub fn on_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    /// One send or receive call failed; the session keeps running
    pub fn on_transport_error(&self) {
        self.dropped_transport.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest frame peak level from the audio path, in [0, 1]
    pub fn record_peak(&self, peak: f32) {
        self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_malformed.load(Ordering::Relaxed)
            + self.dropped_overflow.load(Ordering::Relaxed)
            + self.dropped_transport.load(Ordering::Relaxed)
    }

    fn elapsed(&self) -> Duration {
        let time = self.time.read();
        time.frozen.unwrap_or_else(|| time.start.elapsed())
    }

    /// Assemble a snapshot, folding in the jitter buffer occupancy for the
    /// queueing-delay share of the latency estimate
    pub fn snapshot(&self, buffer_level: usize, buffer_capacity: usize) -> StatsSnapshot {
        let transferred = self.transferred();
        let malformed = self.dropped_malformed.load(Ordering::Relaxed);
        let overflow = self.dropped_overflow.load(Ordering::Relaxed);
        let transport = self.dropped_transport.load(Ordering::Relaxed);
        let dropped = malformed + overflow + transport;

        let expected_us = self.expected_gap_us.load(Ordering::Relaxed);
        let network_ms = self.network_delay_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let queueing_ms = buffer_level as f64 * expected_us as f64 / 1000.0;

        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();

        StatsSnapshot {
            packets_transferred: transferred,
            packets_dropped: dropped,
            dropped_malformed: malformed,
            dropped_overflow: overflow,
            dropped_transport: transport,
            elapsed,
            packets_per_sec: if secs > 0.0 {
                transferred as f64 / secs
            } else {
                0.0
            },
            loss_rate: loss_rate(transferred, dropped),
            estimated_latency_ms: network_ms + queueing_ms,
            peak_amplitude: f32::from_bits(self.peak_bits.load(Ordering::Relaxed)),
            buffer_level,
            buffer_capacity,
        }
    }
}

impl Default for StreamMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of observed packets that were dropped, 0 when nothing has been
/// observed yet
pub fn loss_rate(transferred: u64, dropped: u64) -> f64 {
    let total = transferred + dropped;
    if total == 0 {
        0.0
    } else {
        dropped as f64 / total as f64
    }
}

/// Point-in-time view of a session's counters, published on the statistics
/// tick and readable after stop
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub packets_transferred: u64,
    pub packets_dropped: u64,
    pub dropped_malformed: u64,
    pub dropped_overflow: u64,
    pub dropped_transport: u64,
    pub elapsed: Duration,
    pub packets_per_sec: f64,
    /// dropped / (transferred + dropped)
    pub loss_rate: f64,
    /// Network excess delay plus jitter-buffer queueing delay
    pub estimated_latency_ms: f64,
    /// Most recent frame peak level in [0, 1]
    pub peak_amplitude: f32,
    pub buffer_level: usize,
    pub buffer_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_config() -> StreamConfig {
        StreamConfig {
            sample_rate: 44_100,
            channels: 2,
            frame_size: 256,
        }
    }

    #[test]
    fn loss_rate_guards_divide_by_zero() {
        assert_eq!(loss_rate(0, 0), 0.0);
        assert_eq!(loss_rate(10, 0), 0.0);
        assert!((loss_rate(3, 1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn counters_accumulate_by_cause() {
        let monitor = StreamMonitor::new();
        monitor.reset(&test_config());

        monitor.on_transferred();
        monitor.on_transferred();
        monitor.on_malformed();
        monitor.on_overflow();
        monitor.on_overflow();
        monitor.on_transport_error();

        let snap = monitor.snapshot(0, 2);
        assert_eq!(snap.packets_transferred, 2);
        assert_eq!(snap.dropped_malformed, 1);
        assert_eq!(snap.dropped_overflow, 2);
        assert_eq!(snap.dropped_transport, 1);
        assert_eq!(snap.packets_dropped, 4);
        assert!((snap.loss_rate - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn reset_zeroes_everything() {
        let monitor = StreamMonitor::new();
        monitor.reset(&test_config());
        monitor.on_transferred();
        monitor.on_overflow();
        monitor.record_peak(0.8);

        monitor.reset(&test_config());
        let snap = monitor.snapshot(0, 2);
        assert_eq!(snap.packets_transferred, 0);
        assert_eq!(snap.packets_dropped, 0);
        assert_eq!(snap.loss_rate, 0.0);
        assert_eq!(snap.peak_amplitude, 0.0);
    }

    #[test]
    fn queueing_delay_scales_with_occupancy() {
        let monitor = StreamMonitor::new();
        let config = test_config();
        monitor.reset(&config);

        let per_frame_ms = config.frame_interval().as_micros() as f64 / 1000.0;
        let empty = monitor.snapshot(0, 2);
        let two = monitor.snapshot(2, 2);
        assert!((two.estimated_latency_ms - empty.estimated_latency_ms
            - 2.0 * per_frame_ms)
            .abs()
            < 0.01);
    }

    #[test]
    fn freeze_pins_elapsed() {
        let monitor = StreamMonitor::new();
        monitor.reset(&test_config());
        monitor.freeze();
        let first = monitor.snapshot(0, 2).elapsed;
        std::thread::sleep(Duration::from_millis(5));
        let second = monitor.snapshot(0, 2).elapsed;
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn loss_rate_formula(transferred in 0u64..1_000_000, dropped in 0u64..1_000_000) {
            let rate = loss_rate(transferred, dropped);
            prop_assert!((0.0..=1.0).contains(&rate));
            if transferred + dropped > 0 {
                let expected = dropped as f64 / (transferred + dropped) as f64;
                prop_assert!((rate - expected).abs() < 1e-12);
            } else {
                prop_assert_eq!(rate, 0.0);
            }
        }
    }
}
