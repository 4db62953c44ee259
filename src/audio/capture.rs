//! Audio capture into the outbound frame queue
//!
//! The cpal stream lives on a dedicated thread (the stream handle is not
//! `Send` on every backend) that parks until the session stops. The input
//! callback regroups whatever buffer sizes the platform delivers into
//! fixed-size frames and offers them to the outbound queue; everything it
//! does is bounded and non-blocking.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{self, DeviceSelector};
use crate::audio::frame::AudioFrame;
use crate::audio::AudioEndpoint;
use crate::config::StreamConfig;
use crate::error::DeviceError;
use crate::session::FrameInlet;

const READY_WAIT: Duration = Duration::from_secs(2);

/// Running capture stream feeding a [`FrameInlet`]
pub struct CaptureStream {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Receiver<DeviceError>,
}

impl CaptureStream {
    /// Open the selected input device and start capturing. Returns once the
    /// stream is actually playing, or with the device error that prevented
    /// it.
    pub fn spawn(
        selector: &DeviceSelector,
        config: StreamConfig,
        inlet: FrameInlet,
    ) -> Result<Self, DeviceError> {
        let cpal_device = device::resolve_input(selector)?;

        let (error_tx, error_rx) = bounded::<DeviceError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let cpal_config = cpal::StreamConfig {
                    channels: config.channels,
                    sample_rate: cpal::SampleRate(config.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let frame_samples = config.frame_samples();
                let mut pending: Vec<i16> = Vec::with_capacity(frame_samples * 2);
                let cb_error_tx = error_tx.clone();

                let stream = cpal_device.build_input_stream(
                    &cpal_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        // Regroup device buffers into wire-sized frames
                        pending.extend_from_slice(data);
                        while pending.len() >= frame_samples {
                            let samples: Vec<i16> =
                                pending.drain(..frame_samples).collect();
                            inlet.offer(AudioFrame::from_samples(&samples));
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
                // Stream drops here, stopping capture
            })
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        let mut capture = Self {
            running,
            thread_handle: Some(handle),
            error_rx,
        };

        match ready_rx.recv_timeout(READY_WAIT) {
            Ok(Ok(())) => {
                tracing::info!("audio capture started");
                Ok(capture)
            }
            Ok(Err(e)) => {
                capture.stop();
                Err(e)
            }
            Err(_) => {
                capture.stop();
                Err(DeviceError::Stalled("capture stream never became ready".into()))
            }
        }
    }
}

impl AudioEndpoint for CaptureStream {
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

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}
