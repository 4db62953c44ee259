//! Audio playback fed from the jitter buffer
//!
//! Mirror image of capture: a dedicated thread owns the cpal output stream,
//! and the output callback pulls frames from the [`FrameOutlet`]. When the
//! buffer is empty the callback writes silence; playback runs on a hardware
//! clock and can never wait for the network.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{self, DeviceSelector};
use crate::audio::AudioEndpoint;
use crate::config::StreamConfig;
use crate::error::DeviceError;
use crate::session::FrameOutlet;

const READY_WAIT: Duration = Duration::from_secs(2);

/// Running playback stream draining a [`FrameOutlet`]
pub struct PlaybackStream {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Receiver<DeviceError>,
}

impl PlaybackStream {
    /// Open the selected output device and start playing. Returns once the
    /// stream is live, or with the device error that prevented it.
    pub fn spawn(
        selector: &DeviceSelector,
        config: StreamConfig,
        outlet: FrameOutlet,
    ) -> Result<Self, DeviceError> {
        let cpal_device = device::resolve_output(selector)?;

        let (error_tx, error_rx) = bounded::<DeviceError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let cpal_config = cpal::StreamConfig {
                    channels: config.channels,
                    sample_rate: cpal::SampleRate(config.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                // Partial frame carried between callbacks when the device
                // buffer size does not divide the frame size
                let mut leftover: Vec<i16> = Vec::new();
                let cb_error_tx = error_tx.clone();

                let stream = cpal_device.build_output_stream(
                    &cpal_config,
                    move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let mut filled = 0;
                        while filled < out.len() {
                            if leftover.is_empty() {
                                match outlet.take() {
                                    Some(frame) => leftover = frame.to_samples(),
                                    None => {
                                        // Underrun: silence, never block
                                        out[filled..].fill(0);
                                        break;
                                    }
                                }
                            }
                            let n = leftover.len().min(out.len() - filled);
                            out[filled..filled + n].copy_from_slice(&leftover[..n]);
                            leftover.drain(..n);
                            filled += n;
                        }
                    },
                    move |err| {
                        let _ = cb_error_tx
                            .try_send(DeviceError::StreamError(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ =
                            ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        let mut playback = Self {
            running,
            thread_handle: Some(handle),
            error_rx,
        };

        match ready_rx.recv_timeout(READY_WAIT) {
            Ok(Ok(())) => {
                tracing::info!("audio playback started");
                Ok(playback)
            }
            Ok(Err(e)) => {
                playback.stop();
                Err(e)
            }
            Err(_) => {
                playback.stop();
                Err(DeviceError::Stalled("playback stream never became ready".into()))
            }
        }
    }
}

impl AudioEndpoint for PlaybackStream {
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn take_error(&self) -> Option<DeviceError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        self.stop();
    }
}
