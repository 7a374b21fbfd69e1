//! Glue between the feed and the map: applies poll outcomes and keeps the
//! status lines current.

use std::ops::ControlFlow;

use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::domain::ParkingSpot;
use crate::feed::FeedError;
use crate::location::Resolution;
use crate::map::{MapBackend, MapView};

pub const API_ERROR_TEXT: &str = "API Error: Check Backend.";

/// Destination for one line of UI text
pub trait TextSink {
    fn set_text(&mut self, text: &str);
}

/// Writes each update to stdout, prefixed with a label
pub struct ConsoleSink {
    label: &'static str,
}

impl ConsoleSink {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl TextSink for ConsoleSink {
    fn set_text(&mut self, text: &str) {
        println!("[{}] {}", self.label, text);
    }
}

/// Optional status and last-refresh lines; updates to a missing line are dropped
#[derive(Default)]
pub struct StatusBoard {
    status: Option<Box<dyn TextSink>>,
    last_refresh: Option<Box<dyn TextSink>>,
}

impl StatusBoard {
    pub fn new(
        status: Option<Box<dyn TextSink>>,
        last_refresh: Option<Box<dyn TextSink>>,
    ) -> Self {
        Self {
            status,
            last_refresh,
        }
    }

    pub fn set_status(&mut self, text: &str) {
        if let Some(sink) = self.status.as_mut() {
            sink.set_text(text);
        }
    }

    pub fn set_refreshed(&mut self, at: DateTime<Local>) {
        if let Some(sink) = self.last_refresh.as_mut() {
            sink.set_text(&refresh_text(at));
        }
    }
}

pub fn refresh_text(at: DateTime<Local>) -> String {
    format!("Last refresh: {}", at.format("%H:%M:%S"))
}

/// Called after every successful redraw with the spots now on the map
pub type RedrawHook<'a, B> = Box<dyn FnMut(&MapView<B>, &[ParkingSpot], DateTime<Local>) + 'a>;

/// One running view: the map, its status lines, and what to do after a redraw
pub struct Session<'a, B: MapBackend> {
    view: MapView<B>,
    board: StatusBoard,
    on_redraw: Option<RedrawHook<'a, B>>,
    last_refresh: Option<DateTime<Local>>,
}

impl<'a, B: MapBackend> Session<'a, B> {
    pub fn new(view: MapView<B>, board: StatusBoard) -> Self {
        Self {
            view,
            board,
            on_redraw: None,
            last_refresh: None,
        }
    }

    pub fn on_redraw(mut self, hook: RedrawHook<'a, B>) -> Self {
        self.on_redraw = Some(hook);
        self
    }

    pub fn status_board(&mut self) -> &mut StatusBoard {
        &mut self.board
    }

    /// Report the location outcome and build the map around it
    pub fn open(&mut self, resolution: &Resolution) {
        self.board.set_status(resolution.status.message());
        self.view.initialize(resolution.coordinate, resolution.marker_label());
    }

    /// Apply one poll outcome. Failures leave the markers as they are.
    pub fn apply(&mut self, outcome: Result<Vec<ParkingSpot>, FeedError>) -> ControlFlow<()> {
        match outcome {
            Ok(spots) => match self.view.replace_markers(&spots) {
                Ok(shown) => {
                    let now = Local::now();
                    self.last_refresh = Some(now);
                    self.board.set_refreshed(now);
                    info!(shown, "markers redrawn");
                    if let Some(hook) = self.on_redraw.as_mut() {
                        hook(&self.view, &spots, now);
                    }
                }
                Err(e) => {
                    // Nothing can be drawn without a map; stop polling
                    error!(error = %e, "cannot draw markers");
                    return ControlFlow::Break(());
                }
            },
            Err(e) => {
                error!(error = %e, "fetch error");
                self.board.set_status(API_ERROR_TEXT);
            }
        }
        ControlFlow::Continue(())
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn view(&self) -> &MapView<B> {
        &self.view
    }

    /// Tear the map down and hand back the view
    pub fn close(mut self) -> MapView<B> {
        self.view.teardown();
        self.view
    }
}
