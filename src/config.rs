//! Stream, network and application configuration
//!
//! A session owns an immutable copy of its configuration for its whole
//! lifetime; the sender and receiver must be configured identically for the
//! raw PCM wire format to be meaningful. Nothing on the wire negotiates or
//! checks this.

use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Which half of the pipeline a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Capture from a device, packetize, send to the group
    Send,
    /// Join the group, depacketize, play back
    Receive,
}

/// Named (frame size, sample rate) pairs trading delay against robustness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyProfile {
    /// 128 samples per frame
    Minimal,
    /// 256 samples per frame (default)
    Low,
    /// 512 samples per frame
    Medium,
    /// 1024 samples per frame
    High,
}

impl LatencyProfile {
    /// Samples per channel per frame
    pub fn frame_size(&self) -> u32 {
        match self {
            LatencyProfile::Minimal => 128,
            LatencyProfile::Low => 256,
            LatencyProfile::Medium => 512,
            LatencyProfile::High => 1024,
        }
    }

    /// Sample rate in Hz (all profiles run at 44.1 kHz)
    pub fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    /// Build a stream configuration from this profile
    pub fn stream_config(&self, channels: u16) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate(),
            channels,
            frame_size: self.frame_size(),
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        LatencyProfile::Low
    }
}

impl FromStr for LatencyProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(LatencyProfile::Minimal),
            "low" => Ok(LatencyProfile::Low),
            "medium" => Ok(LatencyProfile::Medium),
            "high" => Ok(LatencyProfile::High),
            other => Err(format!("unknown latency profile: {other}")),
        }
    }
}

/// PCM stream parameters, fixed for the lifetime of a session
///
/// Samples are 16-bit signed little-endian, interleaved by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Samples per channel per frame
    pub frame_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        LatencyProfile::default().stream_config(DEFAULT_CHANNELS)
    }
}

impl StreamConfig {
    /// Wire size of one frame in bytes
    pub fn frame_bytes(&self) -> usize {
        self.frame_size as usize * self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Total interleaved samples in one frame
    pub fn frame_samples(&self) -> usize {
        self.frame_size as usize * self.channels as usize
    }

    /// Nominal time between frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if self.channels == 0 {
            return Err(ConfigError::InvalidChannels);
        }
        if self.frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize);
        }
        Ok(())
    }
}

/// Multicast transport parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Multicast group address (class D)
    pub group: Ipv4Addr,
    /// UDP port, user/ephemeral range
    pub port: u16,
    /// Hop-count limit for outgoing datagrams
    pub multicast_ttl: u32,
    /// Whether sent datagrams loop back to the local host. Enable for
    /// same-host testing, disable for cross-host production use.
    pub multicast_loopback: bool,
    /// Blocking-receive timeout; also bounds how quickly the receive loop
    /// observes a stop signal
    pub recv_timeout_ms: u64,
    /// Jitter buffer capacity in frames
    pub jitter_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_MULTICAST_GROUP,
            port: DEFAULT_PORT,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            multicast_loopback: true,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
            jitter_capacity: DEFAULT_JITTER_CAPACITY,
        }
    }
}

impl NetworkConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.group.is_multicast() {
            return Err(ConfigError::InvalidGroup(self.group.to_string()));
        }
        if self.port < 1024 {
            return Err(ConfigError::PortOutOfRange(self.port));
        }
        if self.recv_timeout_ms == 0 {
            return Err(ConfigError::InvalidRecvTimeout);
        }
        if self.jitter_capacity == 0 {
            return Err(ConfigError::InvalidJitterCapacity);
        }
        Ok(())
    }
}

/// Everything one streaming session needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub direction: Direction,
    pub stream: StreamConfig,
    pub network: NetworkConfig,
}

impl SessionConfig {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            stream: StreamConfig::default(),
            network: NetworkConfig::default(),
        }
    }

    pub fn with_profile(mut self, profile: LatencyProfile) -> Self {
        let channels = self.stream.channels;
        self.stream = profile.stream_config(channels);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        self.network.validate()
    }
}

/// On-disk application configuration for the driver binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub network: NetworkConfig,
}

impl AppConfig {
    /// Load from an explicit TOML file path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| ConfigError::FileParse(e.to_string()))
    }

    /// Load from the platform config directory, falling back to defaults
    /// when no file exists
    pub fn load_default() -> Result<Self, ConfigError> {
        let Some(dirs) = directories::ProjectDirs::from("", "", "multicast-audio-streamer")
        else {
            return Ok(Self::default());
        };
        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_arithmetic() {
        let config = StreamConfig {
            sample_rate: 44_100,
            channels: 2,
            frame_size: 256,
        };
        assert_eq!(config.frame_bytes(), 256 * 2 * 2);
        assert_eq!(config.frame_samples(), 512);
    }

    #[test]
    fn profiles_match_advertised_sizes() {
        assert_eq!(LatencyProfile::Minimal.frame_size(), 128);
        assert_eq!(LatencyProfile::Low.frame_size(), 256);
        assert_eq!(LatencyProfile::Medium.frame_size(), 512);
        assert_eq!(LatencyProfile::High.frame_size(), 1024);
        for p in [
            LatencyProfile::Minimal,
            LatencyProfile::Low,
            LatencyProfile::Medium,
            LatencyProfile::High,
        ] {
            assert_eq!(p.sample_rate(), 44_100);
        }
    }

    #[test]
    fn frame_interval_for_low_profile() {
        let config = LatencyProfile::Low.stream_config(2);
        let interval = config.frame_interval();
        assert!((interval.as_secs_f64() - 256.0 / 44_100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_multicast_group() {
        let config = NetworkConfig {
            group: "192.168.1.10".parse().unwrap(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidGroup(_))
        ));
    }

    #[test]
    fn rejects_privileged_port() {
        let config = NetworkConfig {
            port: 80,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PortOutOfRange(80))
        ));
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut stream = StreamConfig::default();
        stream.frame_size = 0;
        assert!(matches!(
            stream.validate(),
            Err(ConfigError::InvalidFrameSize)
        ));

        let mut network = NetworkConfig::default();
        network.jitter_capacity = 0;
        assert!(matches!(
            network.validate(),
            Err(ConfigError::InvalidJitterCapacity)
        ));
    }

    #[test]
    fn profile_from_str() {
        assert_eq!(
            "medium".parse::<LatencyProfile>().unwrap(),
            LatencyProfile::Medium
        );
        assert!("ultra".parse::<LatencyProfile>().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        SessionConfig::new(Direction::Receive).validate().unwrap();
    }
}
