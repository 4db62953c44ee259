//! # Multicast Audio Streamer
//!
//! Low-latency streaming of raw PCM audio over multicast UDP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── SENDER ─────────────────────────────┐
//! │                                                                 │
//! │  ┌──────────────┐     ┌────────────────┐     ┌──────────────┐   │
//! │  │ Audio Device │────▶│ Outbound Queue │────▶│  Packetizer  │   │
//! │  │ (cpal input  │     │ (drop-oldest,  │     │ (raw frame   │   │
//! │  │  callback)   │     │  capacity 2)   │     │  bytes)      │   │
//! │  └──────────────┘     └────────────────┘     └──────┬───────┘   │
//! │                                                     │           │
//! │                                      ┌──────────────▼───────┐   │
//! │                                      │  Multicast Sender    │   │
//! │                                      │  (UDP, TTL 2)        │   │
//! │                                      └──────────────┬───────┘   │
//! └─────────────────────────────────────────────────────┼───────────┘
//!                                                       │ 224.1.1.1:5007
//! ┌─────────────────────────────────────────────────────┼───────────┐
//! │                                      ┌──────────────▼───────┐   │
//! │                                      │  Multicast Receiver  │   │
//! │                                      │  (group membership,  │   │
//! │                                      │   10 ms recv timeout)│   │
//! │                                      └──────────────┬───────┘   │
//! │  ┌──────────────┐     ┌────────────────┐     ┌──────▼───────┐   │
//! │  │ Audio Device │◀────│  Jitter Buffer │◀────│ Depacketizer │   │
//! │  │ (cpal output │     │ (drop-oldest,  │     │ (length      │   │
//! │  │  callback)   │     │  capacity 2)   │     │  check)      │   │
//! │  └──────────────┘     └────────────────┘     └──────────────┘   │
//! │                                                                 │
//! └──────────────────────────── RECEIVER ───────────────────────────┘
//! ```
//!
//! Both roles share one [`session::Session`] parameterized by
//! [`config::Direction`]. The audio callback and the network loop are the
//! only two tasks touching the frame queue, which is a lock-free bounded
//! queue with drop-oldest overflow: for live audio, stale frames are worse
//! than silence. A statistics tick publishes a [`stats::StatsSnapshot`]
//! every 100 ms for whatever front end drives the session.

pub mod audio;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod stats;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::net::Ipv4Addr;

    /// Default multicast group address
    pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 1, 1, 1);

    /// Default UDP port for audio streaming
    pub const DEFAULT_PORT: u16 = 5007;

    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Bytes per sample (16-bit signed PCM)
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Default jitter buffer capacity in frames
    pub const DEFAULT_JITTER_CAPACITY: usize = 2;

    /// Default multicast TTL (crosses at most one router hop)
    pub const DEFAULT_MULTICAST_TTL: u32 = 2;

    /// Default blocking-receive timeout in milliseconds
    pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 10;

    /// Socket send/receive buffer size, kept small to favor freshness
    pub const SOCKET_BUFFER_BYTES: usize = 32 * 1024;

    /// Largest datagram the receive loop will accept
    pub const MAX_DATAGRAM_SIZE: usize = 65_536;

    /// Statistics snapshot cadence in milliseconds
    pub const STATS_INTERVAL_MS: u64 = 100;

    /// Idle poll interval for the outbound send loop in milliseconds
    pub const SEND_POLL_MS: u64 = 1;
}
