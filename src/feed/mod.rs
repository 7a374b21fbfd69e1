//! Periodic polling of the parking prediction feed.
//!
//! A [`SpotFeed`] runs on the calling thread: one cycle right away, then one
//! per interval. A cycle always finishes (callback included) before the
//! next wait begins, so responses can never arrive out of order.

pub mod parser;

use std::io::BufRead;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::domain::{Coordinate, ParkingSpot};

pub use parser::{FieldAliases, parse_response, parse_value};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response is neither a list nor an object with `predictions`")]
    UnexpectedShape,
}

/// Anything that can produce the current spot list around a point
pub trait SpotSource {
    fn fetch(&self, center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError>;
}

impl<S: SpotSource + ?Sized> SpotSource for &S {
    fn fetch(&self, center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError> {
        (**self).fetch(center)
    }
}

/// Handle that ends a running [`SpotFeed`] from any thread
#[derive(Debug, Clone)]
pub struct FeedStopper {
    tx: Sender<()>,
}

impl FeedStopper {
    pub fn stop(&self) {
        // The feed may already be gone; nothing to do then
        let _ = self.tx.send(());
    }

    /// Stop the feed once a line equal to `command` is read from `input`.
    /// Reaching end of input leaves the feed running.
    pub fn stop_on_command<R>(self, input: R, command: &'static str) -> thread::JoinHandle<()>
    where
        R: BufRead + Send + 'static,
    {
        thread::spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) if line.trim() == command => {
                        debug!(command, "stop requested");
                        self.stop();
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "stopped reading commands");
                        return;
                    }
                }
            }
        })
    }
}

pub struct SpotFeed<S> {
    source: S,
    max_cycles: Option<u64>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl<S: SpotSource> SpotFeed<S> {
    pub fn new(source: S) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        Self {
            source,
            max_cycles: None,
            stop_tx,
            stop_rx,
        }
    }

    /// Stop after `cycles` fetches instead of running until stopped
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn stopper(&self) -> FeedStopper {
        FeedStopper {
            tx: self.stop_tx.clone(),
        }
    }

    /// Poll the source until stopped, handing every outcome to `on_update`.
    ///
    /// # Arguments
    /// * `center` - Point the feed is queried for; also used to fill in missing distances
    /// * `interval` - Pause between the end of one cycle and the start of the next
    /// * `on_update` - Receives each cycle's result; `ControlFlow::Break` ends the feed
    ///
    /// # Returns
    /// * Number of cycles run
    pub fn start<F>(&self, center: Coordinate, interval: Duration, mut on_update: F) -> u64
    where
        F: FnMut(Result<Vec<ParkingSpot>, FeedError>) -> ControlFlow<()>,
    {
        let mut cycles = 0u64;

        loop {
            if self.stop_rx.try_recv().is_ok() {
                info!(cycles, "feed stopped");
                break;
            }
            if self.limit_reached(cycles) {
                break;
            }

            cycles += 1;
            let outcome = {
                let _span = info_span!("poll", cycle = cycles).entered();
                self.run_cycle(center)
            };

            if on_update(outcome).is_break() {
                debug!(cycles, "feed ended by callback");
                break;
            }

            if self.limit_reached(cycles) {
                debug!(cycles, "feed reached its cycle limit");
                break;
            }

            match self.stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!(cycles, "feed stopped");
                    break;
                }
            }
        }

        cycles
    }

    fn limit_reached(&self, cycles: u64) -> bool {
        self.max_cycles.is_some_and(|max| cycles >= max)
    }

    fn run_cycle(&self, center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError> {
        match self.source.fetch(center) {
            Ok(spots) => {
                info!(spots = spots.len(), "fetched parking predictions");
                Ok(spots
                    .into_iter()
                    .map(|spot| spot.with_distance_from(&center))
                    .collect())
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Replays queued outcomes, then keeps returning an empty list
    struct Scripted {
        outcomes: RefCell<VecDeque<Result<Vec<ParkingSpot>, FeedError>>>,
        calls: RefCell<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Vec<ParkingSpot>, FeedError>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl SpotSource for Scripted {
        fn fetch(&self, _center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError> {
            *self.calls.borrow_mut() += 1;
            self.outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn center() -> Coordinate {
        Coordinate::new(26.14, 91.64)
    }

    #[test]
    fn test_first_cycle_runs_immediately() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source).with_max_cycles(1);

        // An hour-long interval would hang the test if the first fetch waited
        let cycles = feed.start(center(), Duration::from_secs(3600), |_| ControlFlow::Continue(()));

        assert_eq!(cycles, 1);
        assert_eq!(*source.calls.borrow(), 1);
    }

    #[test]
    fn test_zero_cycle_limit_fetches_nothing() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source).with_max_cycles(0);

        let cycles = feed.start(center(), Duration::from_millis(1), |_| ControlFlow::Continue(()));

        assert_eq!(cycles, 0);
        assert_eq!(*source.calls.borrow(), 0);
    }

    #[test]
    fn test_outcomes_arrive_in_order() {
        let spot = ParkingSpot::new("A", Coordinate::new(26.15, 91.65), 12, 20.0);
        let source = Scripted::new(vec![
            Ok(vec![spot.clone()]),
            Err(FeedError::Status(500)),
            Ok(vec![spot.clone(), spot]),
        ]);
        let feed = SpotFeed::new(&source).with_max_cycles(3);

        let mut seen = Vec::new();
        feed.start(center(), Duration::from_millis(1), |outcome| {
            seen.push(outcome.map(|spots| spots.len()).map_err(|e| e.to_string()));
            ControlFlow::Continue(())
        });

        assert_eq!(
            seen,
            vec![
                Ok(1),
                Err("HTTP error! status: 500".to_string()),
                Ok(2)
            ]
        );
    }

    #[test]
    fn test_distance_filled_from_center() {
        let spot = ParkingSpot::new("A", Coordinate::new(26.15, 91.64), 12, 20.0);
        let source = Scripted::new(vec![Ok(vec![spot])]);
        let feed = SpotFeed::new(&source).with_max_cycles(1);

        let mut distance = None;
        feed.start(center(), Duration::from_millis(1), |outcome| {
            distance = outcome.unwrap()[0].distance_km;
            ControlFlow::Continue(())
        });

        assert!(distance.is_some_and(|d| (d - 1.11).abs() < 0.05));
    }

    #[test]
    fn test_callback_break_stops_feed() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source);

        let cycles = feed.start(center(), Duration::from_millis(1), |_| ControlFlow::Break(()));

        assert_eq!(cycles, 1);
    }

    #[test]
    fn test_stopper_interrupts_wait() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source);
        let stopper = feed.stopper();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.stop();
        });

        // Without the stopper this would wait an hour before the second cycle
        let cycles = feed.start(center(), Duration::from_secs(3600), |_| ControlFlow::Continue(()));
        handle.join().unwrap();

        assert_eq!(cycles, 1);
    }

    #[test]
    fn test_stop_command_ends_feed() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source);
        feed.stopper()
            .stop_on_command(Cursor::new("status\n  q \n"), "q")
            .join()
            .unwrap();

        let cycles = feed.start(center(), Duration::from_secs(3600), |_| ControlFlow::Continue(()));

        assert_eq!(cycles, 0);
    }

    #[test]
    fn test_input_without_command_keeps_feed_running() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source).with_max_cycles(2);
        feed.stopper()
            .stop_on_command(Cursor::new("quit\n"), "q")
            .join()
            .unwrap();

        let cycles = feed.start(center(), Duration::from_millis(1), |_| ControlFlow::Continue(()));

        assert_eq!(cycles, 2);
    }

    #[test]
    fn test_stop_before_start_runs_nothing() {
        let source = Scripted::new(vec![]);
        let feed = SpotFeed::new(&source);
        feed.stopper().stop();

        let cycles = feed.start(center(), Duration::from_millis(1), |_| ControlFlow::Continue(()));

        assert_eq!(cycles, 0);
        assert_eq!(*source.calls.borrow(), 0);
    }
}
