//! One dedicated thread per camera.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::alert::AlertSink;
use crate::integration::detector::FrameSource;
use crate::integration::pipeline::CameraPipeline;

/// Counters returned when a worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub camera_id: String,
    pub frames: u64,
    pub alerts: u64,
    pub dropped_observations: u64,
    /// Last source error, if the stream ended because of one.
    pub source_error: Option<String>,
}

/// Drives a [`CameraPipeline`] from a [`FrameSource`] until the source ends
/// or the stop signal is raised. The signal is checked once per frame
/// boundary; a frame already being processed runs to completion.
pub struct CameraWorker<S: FrameSource, K: AlertSink> {
    pipeline: CameraPipeline,
    source: S,
    sink: K,
    stop: Arc<AtomicBool>,
}

impl<S, K> CameraWorker<S, K>
where
    S: FrameSource + Send + 'static,
    K: AlertSink + 'static,
{
    /// Worker that stops once `stop` is raised.
    pub fn new(pipeline: CameraPipeline, source: S, sink: K, stop: Arc<AtomicBool>) -> Self {
        Self {
            pipeline,
            source,
            sink,
            stop,
        }
    }

    /// Run on the calling thread.
    pub fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport {
            camera_id: self.pipeline.camera_id().to_string(),
            ..WorkerReport::default()
        };
        info!(camera = %report.camera_id, "camera worker started");

        while !self.stop.load(Ordering::Relaxed) {
            let persons = match self.source.next_frame() {
                Ok(Some(persons)) => persons,
                Ok(None) => break,
                Err(err) => {
                    warn!(camera = %report.camera_id, error = %err, "frame source failed, stopping worker");
                    report.source_error = Some(err.to_string());
                    break;
                }
            };

            let outcome = self.pipeline.process_frame(&persons);
            report.frames += 1;
            report.dropped_observations += outcome.dropped as u64;
            for alert in outcome.alerts {
                report.alerts += 1;
                self.sink.deliver(alert);
            }
        }

        info!(
            camera = %report.camera_id,
            frames = report.frames,
            alerts = report.alerts,
            "camera worker stopped"
        );
        report
    }

    /// Run on a named thread of its own.
    pub fn spawn(self) -> io::Result<JoinHandle<WorkerReport>> {
        let name = format!("camera-{}", self.pipeline.camera_id());
        thread::Builder::new().name(name).spawn(move || self.run())
    }
}
