//! Status and progress sinks for a detection run.

use std::sync::Mutex;

type StatusSink = Box<dyn Fn(&str) + Send + Sync>;
type ProgressSink = Box<dyn Fn(f64) + Send + Sync>;

/// Forwards human-readable status lines and a progress percentage to the caller.
///
/// Progress is clamped to `[0, 100]` and never goes backwards: a value lower
/// than the last one reported is raised to it.
pub struct Reporter {
    status: StatusSink,
    progress: ProgressSink,
    last: Mutex<f64>,
}

impl Reporter {
    pub fn new<S, P>(status: S, progress: P) -> Self
    where
        S: Fn(&str) + Send + Sync + 'static,
        P: Fn(f64) + Send + Sync + 'static,
    {
        Self {
            status: Box::new(status),
            progress: Box::new(progress),
            last: Mutex::new(0.0),
        }
    }

    /// Reporter that only logs
    pub fn silent() -> Self {
        Self::new(|_| {}, |_| {})
    }

    pub fn status(&self, text: &str) {
        log::info!("{}", text);
        (self.status)(text);
    }

    pub fn progress(&self, percent: f64) {
        let value = {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let clamped = if percent.is_nan() { *last } else { percent.clamp(0.0, 100.0) };
            *last = last.max(clamped);
            *last
        };
        (self.progress)(value);
    }

    /// Last progress value reported
    pub fn current(&self) -> f64 {
        match self.last.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::silent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = Reporter::new(|_| {}, move |p| sink.lock().unwrap().push(p));

        for p in [10.0, 5.0, 150.0, 99.0, -3.0, f64::NAN] {
            reporter.progress(p);
        }

        assert_eq!(*seen.lock().unwrap(), vec![10.0, 10.0, 100.0, 100.0, 100.0, 100.0]);
        assert_eq!(reporter.current(), 100.0);
    }

    #[test]
    fn status_lines_reach_sink_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = Reporter::new(move |s| sink.lock().unwrap().push(s.to_string()), |_| {});

        reporter.status("one");
        reporter.status("two");

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }
}
