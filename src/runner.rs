//! Background detection runs that report back over a channel.

use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::Arc;

use crate::detection::ObjectDetector;
use crate::error::{DetectError, Result};
use crate::models::DetectionOutput;
use crate::report::Reporter;
use crate::settings::Settings;

/// Events queued before the worker waits for the receiver
const DEFAULT_BACKLOG: usize = 256;

/// What a background run sends back, in order: any number of status and
/// progress events, then exactly one `Finished`
#[derive(Debug)]
pub enum RunEvent {
    Status(String),
    Progress(f64),
    Finished(Result<DetectionOutput>),
}

/// Runs detections on a worker thread, one at a time
pub struct DetectionRunner {
    detector: Arc<ObjectDetector>,
    running: Arc<AtomicBool>,
    backlog: usize,
}

/// Clears the running flag when the worker ends, even by panic
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DetectionRunner {
    pub fn new(detector: ObjectDetector) -> Self {
        Self {
            detector: Arc::new(detector),
            running: Arc::new(AtomicBool::new(false)),
            backlog: DEFAULT_BACKLOG,
        }
    }

    /// Number of events buffered before the worker blocks on the receiver.
    /// Zero makes every event a hand-off.
    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a run in the background. Fails with [`DetectError::AlreadyRunning`]
    /// while a previous run has not finished.
    pub fn start(
        &self,
        object1: DynamicImage,
        object2: DynamicImage,
        scene: DynamicImage,
        settings: Settings,
    ) -> Result<Receiver<RunEvent>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Detection requested while a run is in progress");
            return Err(DetectError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        let (tx, rx) = sync_channel(self.backlog);
        let detector = Arc::clone(&self.detector);

        std::thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                let reporter = channel_reporter(&tx);
                let result = detector.detect(&object1, &object2, &scene, &settings, &reporter);
                drop(guard);
                // The receiver may be gone; nothing left to tell
                let _ = tx.send(RunEvent::Finished(result));
            })?;

        Ok(rx)
    }
}

fn channel_reporter(tx: &SyncSender<RunEvent>) -> Reporter {
    let status_tx = tx.clone();
    let progress_tx = tx.clone();
    Reporter::new(
        move |text| {
            let _ = status_tx.send(RunEvent::Status(text.to_string()));
        },
        move |percent| {
            let _ = progress_tx.send(RunEvent::Progress(percent));
        },
    )
}
