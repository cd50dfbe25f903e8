use std::time::{Duration, Instant};

use super::{FrameTicket, PlaybackController, TickOutcome};
use crate::PlaybackConfig;

/// Drives [`PlaybackController::tick`] at a fixed frame interval on the
/// calling thread. Frame timestamps are milliseconds since the pacer was
/// created, so `play` and `tick` must both be fed from [`Self::now_ms`].
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    origin: Instant,
    next_deadline: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let origin = Instant::now();
        Self {
            interval,
            origin,
            next_deadline: origin + interval,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(Duration::from_millis(config.frame_interval_ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Sleeps until the next frame deadline and returns its timestamp. A late
    /// caller skips the missed frames instead of bursting through them.
    pub fn wait_next_frame(&mut self) -> f64 {
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        }
        let now = Instant::now();
        self.next_deadline += self.interval;
        if self.next_deadline <= now {
            self.next_deadline = now + self.interval;
        }
        self.now_ms()
    }

    /// Ticks `controller` with `ticket` every frame until playback finishes or
    /// the ticket goes stale. `on_frame` sees the controller after each tick.
    pub fn run<F>(
        &mut self,
        controller: &mut PlaybackController,
        ticket: FrameTicket,
        mut on_frame: F,
    ) -> TickOutcome
    where
        F: FnMut(&PlaybackController, &TickOutcome),
    {
        loop {
            let now = self.wait_next_frame();
            let outcome = controller.tick(ticket, now);
            on_frame(controller, &outcome);
            match outcome {
                TickOutcome::Rendered { .. } | TickOutcome::AwaitingDevice => continue,
                TickOutcome::Finished { .. } | TickOutcome::Stale => return outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_spaced_by_the_interval() {
        let mut pacer = FramePacer::new(Duration::from_millis(2));
        let first = pacer.wait_next_frame();
        let second = pacer.wait_next_frame();
        assert!(first >= 2.0);
        assert!(second > first);
    }

    #[test]
    fn zero_interval_is_raised_to_one_millisecond() {
        let pacer = FramePacer::new(Duration::ZERO);
        assert_eq!(pacer.interval(), Duration::from_millis(1));
    }
}
