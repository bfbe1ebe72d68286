use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Measures one pipeline step and logs its duration when stopped.
pub struct Timer {
    name: String,
    started: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("{}: starting", name);

        Timer {
            name: name.to_owned(),
            started: Some(Utc::now()),
            elapsed: None,
        }
    }

    /// Stop the timer and return the elapsed milliseconds.
    ///
    /// Stopping twice keeps the first measurement.
    pub fn stop(&mut self) -> i64 {
        match self.started.take() {
            None => debug!("{}: not running", self.name),
            Some(started) => {
                let d = Utc::now() - started;
                info!("{} took {} msec", self.name, d.num_milliseconds());
                self.elapsed = Some(d);
            }
        }

        self.elapsed_ms()
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed.map(|d| d.num_milliseconds()).unwrap_or(0)
    }
}
