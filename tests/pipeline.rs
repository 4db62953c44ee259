//! End-to-end pipeline scenarios over loopback multicast
//!
//! Multicast delivery needs a multicast-capable interface and route; CI
//! sandboxes often have neither. Every network-touching test therefore
//! bails out with a notice instead of failing when the group cannot be
//! joined or reached.

use std::time::{Duration, Instant};

use multicast_audio_streamer::audio::buffer::JitterBuffer;
use multicast_audio_streamer::audio::device::DeviceSelector;
use multicast_audio_streamer::audio::frame::AudioFrame;
use multicast_audio_streamer::config::{
    Direction, LatencyProfile, NetworkConfig, SessionConfig, StreamConfig,
};
use multicast_audio_streamer::error::Error;
use multicast_audio_streamer::network::transport::MulticastSender;
use multicast_audio_streamer::session::{Session, SessionState};
use multicast_audio_streamer::stats::StreamMonitor;

fn receiver_config(port: u16) -> SessionConfig {
    SessionConfig {
        direction: Direction::Receive,
        stream: LatencyProfile::Low.stream_config(2),
        network: NetworkConfig {
            port,
            multicast_loopback: true,
            ..Default::default()
        },
    }
}

/// Start a network-only receiver session, or skip the test when the host
/// cannot join the group
fn start_receiver(config: SessionConfig) -> Option<Session> {
    let session = Session::new(config);
    match session.start(&DeviceSelector::Disabled) {
        Ok(()) => Some(session),
        Err(Error::Transport(e)) => {
            eprintln!("skipping multicast test: {e}");
            None
        }
        Err(e) => panic!("unexpected start failure: {e}"),
    }
}

fn tagged_frame(stream: &StreamConfig, tag: i16) -> AudioFrame {
    AudioFrame::from_samples(&vec![tag; stream.frame_samples()])
}

#[test]
fn ten_frames_no_loss() {
    let config = receiver_config(48_201);
    let stream = config.stream;
    let network = config.network.clone();
    let Some(session) = start_receiver(config) else {
        return;
    };
    assert_eq!(session.state(), SessionState::Running);

    let sender = MulticastSender::open(&network).expect("sender open");
    let outlet = session.outlet().expect("running session has an outlet");

    // Drain as we go so the capacity-2 buffer never overflows
    let mut received = Vec::new();
    for tag in 0..10i16 {
        let frame = tagged_frame(&stream, tag);
        if sender.send(frame.as_bytes()).is_err() {
            eprintln!("skipping multicast test: send unreachable");
            return;
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(frame) = outlet.take() {
                received.push(frame);
                break;
            }
            if Instant::now() > deadline {
                eprintln!("skipping multicast test: loopback delivery unavailable");
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    assert_eq!(received.len(), 10);
    for (tag, frame) in received.iter().enumerate() {
        assert_eq!(frame.len(), stream.frame_bytes());
        assert_eq!(frame.to_samples()[0], tag as i16);
    }

    let stats = session.stats();
    assert_eq!(stats.packets_transferred, 10);
    assert_eq!(stats.packets_dropped, 0);
    assert_eq!(stats.loss_rate, 0.0);

    // Empty buffer now: pulls substitute silence, never block
    let silence = outlet.take_or_silence();
    assert_eq!(silence.len(), stream.frame_bytes());
    assert!(silence.as_bytes().iter().all(|&b| b == 0));

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn undersized_datagrams_counted_as_malformed() {
    let config = receiver_config(48_202);
    let stream = config.stream;
    let network = config.network.clone();
    let Some(session) = start_receiver(config) else {
        return;
    };

    let sender = MulticastSender::open(&network).expect("sender open");
    if sender.send(&[0u8; 16]).is_err() {
        eprintln!("skipping multicast test: send unreachable");
        return;
    }
    // One valid frame after the runt proves the loop survived it
    let frame = tagged_frame(&stream, 42);
    let _ = sender.send(frame.as_bytes());

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let stats = session.stats();
        if stats.dropped_malformed == 1 && stats.packets_transferred == 1 {
            break;
        }
        if Instant::now() > deadline {
            eprintln!("skipping multicast test: loopback delivery unavailable");
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let stats = session.stats();
    assert_eq!(stats.dropped_malformed, 1);
    assert_eq!(stats.packets_dropped, 1);
    assert_eq!(stats.packets_transferred, 1);
    assert!((stats.loss_rate - 0.5).abs() < 1e-12);

    session.stop();
}

#[test]
fn overflow_keeps_newest_two_frames() {
    // Capacity 2, five pushes, no pulls: frames 4 and 5 survive and three
    // evictions are counted as overflow drops
    let stream = LatencyProfile::Low.stream_config(2);
    let monitor = StreamMonitor::new();
    monitor.reset(&stream);
    let buffer = JitterBuffer::new(2);

    for tag in 1..=5i16 {
        monitor.on_transferred();
        if buffer.push(tagged_frame(&stream, tag)).is_some() {
            monitor.on_overflow();
        }
    }

    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.pop().unwrap().to_samples()[0], 4);
    assert_eq!(buffer.pop().unwrap().to_samples()[0], 5);

    let stats = monitor.snapshot(0, 2);
    assert_eq!(stats.packets_transferred, 5);
    assert_eq!(stats.dropped_overflow, 3);
    assert_eq!(stats.packets_dropped, 3);
}

#[test]
fn stop_then_restart_with_different_profile() {
    let Some(session) = start_receiver(receiver_config(48_203)) else {
        return;
    };
    assert_eq!(session.state(), SessionState::Running);

    // Config changes are rejected while running
    assert!(session.set_profile(LatencyProfile::High).is_err());
    // As is a second start
    assert!(session.start(&DeviceSelector::Disabled).is_err());

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
    // Stop is idempotent
    session.stop();

    // Statistics survive the stop, frozen
    let frozen = session.stats();
    let later = session.stats();
    assert_eq!(frozen.elapsed, later.elapsed);

    // A new profile takes and the session starts cleanly again, proving the
    // first run released its port and device resources
    session.set_profile(LatencyProfile::High).unwrap();
    assert_eq!(session.config().stream.frame_size, 1024);
    session
        .start(&DeviceSelector::Disabled)
        .expect("restart after stop");
    assert_eq!(session.state(), SessionState::Running);

    // Counters were reset for the new session
    assert_eq!(session.stats().packets_transferred, 0);

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
}
