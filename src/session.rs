//! Streaming session state machine and control surface
//!
//! One [`Session`] owns one direction of the pipeline:
//!
//! - sender: capture callback -> outbound queue -> send loop -> multicast
//! - receiver: receive loop -> jitter buffer -> playback callback
//!
//! The front end (GUI, CLI, test harness) only ever calls `start`, `stop`
//! and `set_profile`, and reads [`StatsSnapshot`]s. Cancellation is
//! cooperative: `stop` clears the running flag and joins the loops, each of
//! which re-checks the flag within its own bounded wait (socket timeout,
//! idle poll, tick interval).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::audio::buffer::JitterBuffer;
use crate::audio::capture::CaptureStream;
use crate::audio::device::DeviceSelector;
use crate::audio::frame::AudioFrame;
use crate::audio::playback::PlaybackStream;
use crate::audio::AudioEndpoint;
use crate::config::{Direction, LatencyProfile, SessionConfig};
use crate::constants::{MAX_DATAGRAM_SIZE, SEND_POLL_MS, STATS_INTERVAL_MS};
use crate::error::{DeviceError, Result, SessionError};
use crate::network::transport::{MulticastReceiver, MulticastSender, Recv};
use crate::network::{depacketize, packetize};
use crate::stats::{StatsSnapshot, StreamMonitor};

/// Session lifecycle states. `Idle` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Producer end of the frame queue, handed to the capture callback (or any
/// external audio layer pushing captured frames)
#[derive(Clone)]
pub struct FrameInlet {
    queue: Arc<JitterBuffer>,
    monitor: Arc<StreamMonitor>,
}

impl FrameInlet {
    /// Non-blocking enqueue with drop-oldest overflow
    pub fn offer(&self, frame: AudioFrame) {
        self.monitor.record_peak(frame.peak_amplitude());
        if self.queue.push(frame).is_some() {
            self.monitor.on_overflow();
        }
    }
}

/// Consumer end of the frame queue, handed to the playback callback (or any
/// external audio layer pulling playable frames)
#[derive(Clone)]
pub struct FrameOutlet {
    queue: Arc<JitterBuffer>,
    monitor: Arc<StreamMonitor>,
    frame_bytes: usize,
}

impl FrameOutlet {
    /// Non-blocking dequeue; `None` means underrun and the caller must
    /// substitute silence
    pub fn take(&self) -> Option<AudioFrame> {
        match self.queue.pop() {
            Some(frame) => {
                self.monitor.record_peak(frame.peak_amplitude());
                Some(frame)
            }
            None => {
                self.monitor.record_peak(0.0);
                None
            }
        }
    }

    /// Dequeue, substituting a zero-filled frame on underrun
    pub fn take_or_silence(&self) -> AudioFrame {
        self.take()
            .unwrap_or_else(|| AudioFrame::silence(self.frame_bytes))
    }

    /// Wire size of the frames this outlet yields
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

/// Per-start resources, torn down on stop
struct Runtime {
    running: Arc<AtomicBool>,
    queue: Arc<JitterBuffer>,
    threads: Vec<JoinHandle<()>>,
}

/// One streaming session, parameterized by direction
pub struct Session {
    config: Mutex<SessionConfig>,
    state: Mutex<SessionState>,
    monitor: Arc<StreamMonitor>,
    runtime: Mutex<Option<Runtime>>,
    subscribers: Arc<Mutex<Vec<Sender<StatsSnapshot>>>>,
    fault: Arc<Mutex<Option<DeviceError>>>,
}

impl Session {
    /// Create an idle session. The configuration is validated at `start`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            state: Mutex::new(SessionState::Idle),
            monitor: Arc::new(StreamMonitor::new()),
            runtime: Mutex::new(None),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn config(&self) -> SessionConfig {
        self.config.lock().clone()
    }

    /// Swap the latency profile. Only legal while idle; the state machine,
    /// not the front end, enforces this.
    pub fn set_profile(&self, profile: LatencyProfile) -> Result<()> {
        let state = self.state.lock();
        if *state != SessionState::Idle {
            return Err(SessionError::ConfigLocked.into());
        }
        let mut config = self.config.lock();
        let channels = config.stream.channels;
        config.stream = profile.stream_config(channels);
        Ok(())
    }

    /// Start streaming with the given device. Network resources open before
    /// the device so a transport failure never leaves a device hanging; any
    /// failure rolls back and returns the session to idle.
    pub fn start(&self, selector: &DeviceSelector) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Idle {
                return Err(SessionError::AlreadyActive.into());
            }
            *state = SessionState::Starting;
        }
        // Reap anything a fatal fault left behind
        self.teardown();
        *self.fault.lock() = None;

        match self.start_inner(selector) {
            Ok(runtime) => {
                *self.runtime.lock() = Some(runtime);
                *self.state.lock() = SessionState::Running;
                tracing::info!("session running");
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = SessionState::Idle;
                Err(e)
            }
        }
    }

    fn start_inner(&self, selector: &DeviceSelector) -> Result<Runtime> {
        let config = self.config.lock().clone();
        config.validate()?;

        let stream = config.stream;
        let frame_bytes = stream.frame_bytes();
        self.monitor.reset(&stream);

        let queue = Arc::new(JitterBuffer::new(config.network.jitter_capacity));
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::with_capacity(2);

        let endpoint: Option<Box<dyn AudioEndpoint>> = match config.direction {
            Direction::Send => {
                let transport = MulticastSender::open(&config.network)?;
                tracing::info!(dest = %transport.destination(), "multicast sender open");

                let endpoint = match selector {
                    DeviceSelector::Disabled => None,
                    _ => {
                        let inlet = FrameInlet {
                            queue: queue.clone(),
                            monitor: self.monitor.clone(),
                        };
                        Some(Box::new(CaptureStream::spawn(selector, stream, inlet)?)
                            as Box<dyn AudioEndpoint>)
                    }
                };

                let loop_queue = queue.clone();
                let loop_monitor = self.monitor.clone();
                let loop_running = running.clone();
                threads.push(
                    thread::Builder::new()
                        .name("net-send".into())
                        .spawn(move || {
                            send_loop(transport, loop_queue, loop_monitor, loop_running)
                        })?,
                );
                endpoint
            }
            Direction::Receive => {
                let transport = MulticastReceiver::open(&config.network)?;
                tracing::info!(
                    group = %config.network.group,
                    port = config.network.port,
                    "multicast receiver open"
                );

                let endpoint = match selector {
                    DeviceSelector::Disabled => None,
                    _ => {
                        let outlet = FrameOutlet {
                            queue: queue.clone(),
                            monitor: self.monitor.clone(),
                            frame_bytes,
                        };
                        Some(Box::new(PlaybackStream::spawn(selector, stream, outlet)?)
                            as Box<dyn AudioEndpoint>)
                    }
                };

                let loop_queue = queue.clone();
                let loop_monitor = self.monitor.clone();
                let loop_running = running.clone();
                threads.push(
                    thread::Builder::new()
                        .name("net-recv".into())
                        .spawn(move || {
                            receive_loop(
                                transport,
                                loop_queue,
                                loop_monitor,
                                loop_running,
                                frame_bytes,
                            )
                        })?,
                );
                endpoint
            }
        };

        // Statistics tick: publishes snapshots and owns the audio endpoint
        // so a mid-session device error can halt everything from one place
        let tick_queue = queue.clone();
        let tick_monitor = self.monitor.clone();
        let tick_running = running.clone();
        let tick_subscribers = self.subscribers.clone();
        let tick_fault = self.fault.clone();
        threads.push(
            thread::Builder::new()
                .name("stats-tick".into())
                .spawn(move || {
                    stats_loop(
                        endpoint,
                        tick_queue,
                        tick_monitor,
                        tick_running,
                        tick_subscribers,
                        tick_fault,
                    )
                })?,
        );

        Ok(Runtime {
            running,
            queue,
            threads,
        })
    }

    /// Stop streaming. Safe no-op when nothing is running; always leaves the
    /// session idle with resources released.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Idle => {
                    // A fatal fault may have gone straight to idle with the
                    // runtime still allocated; reap it either way
                }
                SessionState::Stopping => return,
                _ => *state = SessionState::Stopping,
            }
        }
        self.teardown();
        *self.state.lock() = SessionState::Idle;
    }

    fn teardown(&self) {
        let runtime = self.runtime.lock().take();
        let Some(runtime) = runtime else {
            return;
        };
        runtime.running.store(false, Ordering::SeqCst);
        for handle in runtime.threads {
            let _ = handle.join();
        }
        let drained = runtime.queue.drain();
        if drained > 0 {
            tracing::debug!(frames = drained, "drained jitter buffer on stop");
        }
        self.monitor.freeze();
        tracing::info!("session stopped");
    }

    /// Current statistics. Readable in every state; frozen after stop.
    pub fn stats(&self) -> StatsSnapshot {
        let (level, capacity) = match self.runtime.lock().as_ref() {
            Some(rt) => (rt.queue.len(), rt.queue.capacity()),
            None => (0, self.config.lock().network.jitter_capacity),
        };
        self.monitor.snapshot(level, capacity)
    }

    /// Receive a snapshot on every statistics tick. Slow consumers miss
    /// ticks rather than stalling the publisher.
    pub fn subscribe(&self) -> Receiver<StatsSnapshot> {
        let (tx, rx) = bounded(8);
        self.subscribers.lock().push(tx);
        rx
    }

    /// The fatal device error that ended the session, if one did
    pub fn take_fault(&self) -> Option<DeviceError> {
        self.fault.lock().take()
    }

    /// Producer endpoint of the running session's frame queue, for callers
    /// integrating their own audio layer. `None` unless running.
    pub fn inlet(&self) -> Option<FrameInlet> {
        self.runtime.lock().as_ref().map(|rt| FrameInlet {
            queue: rt.queue.clone(),
            monitor: self.monitor.clone(),
        })
    }

    /// Consumer endpoint of the running session's frame queue. `None`
    /// unless running.
    pub fn outlet(&self) -> Option<FrameOutlet> {
        let frame_bytes = self.config.lock().stream.frame_bytes();
        self.runtime.lock().as_ref().map(|rt| FrameOutlet {
            queue: rt.queue.clone(),
            monitor: self.monitor.clone(),
            frame_bytes,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    transport: MulticastReceiver,
    queue: Arc<JitterBuffer>,
    monitor: Arc<StreamMonitor>,
    running: Arc<AtomicBool>,
    frame_bytes: usize,
) {
    tracing::info!("receive loop started");
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while running.load(Ordering::Relaxed) {
        match transport.recv(&mut buf) {
            Ok(Recv::Packet { len, .. }) => match depacketize(&buf[..len], frame_bytes) {
                Ok(frame) => {
                    monitor.on_transferred();
                    if queue.push(frame).is_some() {
                        monitor.on_overflow();
                    }
                }
                Err(e) => {
                    monitor.on_malformed();
                    tracing::trace!("dropped datagram: {e}");
                }
            },
            Ok(Recv::TimedOut) => continue,
            Err(e) => {
                monitor.on_transport_error();
                tracing::warn!("receive failed: {e}");
                // A dead socket would otherwise spin this loop hot
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
    tracing::info!("receive loop stopped");
}

fn send_loop(
    transport: MulticastSender,
    queue: Arc<JitterBuffer>,
    monitor: Arc<StreamMonitor>,
    running: Arc<AtomicBool>,
) {
    tracing::info!("send loop started");
    let poll = Duration::from_millis(SEND_POLL_MS);

    while running.load(Ordering::Relaxed) {
        match queue.pop() {
            Some(frame) => {
                let payload = packetize(frame);
                match transport.send(&payload) {
                    Ok(_) => monitor.on_transferred(),
                    Err(e) => {
                        monitor.on_transport_error();
                        tracing::warn!("send failed: {e}");
                    }
                }
            }
            None => thread::sleep(poll),
        }
    }
    tracing::info!("send loop stopped");
}

fn stats_loop(
    mut endpoint: Option<Box<dyn AudioEndpoint>>,
    queue: Arc<JitterBuffer>,
    monitor: Arc<StreamMonitor>,
    running: Arc<AtomicBool>,
    subscribers: Arc<Mutex<Vec<Sender<StatsSnapshot>>>>,
    fault: Arc<Mutex<Option<DeviceError>>>,
) {
    let interval = Duration::from_millis(STATS_INTERVAL_MS);

    while running.load(Ordering::Relaxed) {
        thread::sleep(interval);

        let snapshot = monitor.snapshot(queue.len(), queue.capacity());
        subscribers.lock().retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            // A full mailbox just misses this tick
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });

        if let Some(ref endpoint) = endpoint {
            if let Some(e) = endpoint.take_error() {
                // Device errors mid-session are fatal: halt the loops and
                // surface the reason
                tracing::error!("fatal device error: {e}");
                *fault.lock() = Some(e);
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    if let Some(ref mut endpoint) = endpoint {
        endpoint.stop();
    }
}
