use log::debug;
use opencv::core::Point2f;

use crate::{
    frame::Frame,
    models::Settings,
    quad::Quadrilateral,
    selection::{PointerEvent, Selection, SelectionStatus},
    tracker::{RegionTracker, TrackUpdate},
    vision::Vision,
};

/// What a renderer needs to draw for one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// The status observed this tick.
    pub status: SelectionStatus,
    /// The tracked region, or the candidate region while selecting.
    pub quad: Option<Quadrilateral>,
    /// Currently tracked points, empty while selecting.
    pub points: Vec<Point2f>,
    /// The tracker update this tick, if a tracker was ticked.
    pub update: Option<TrackUpdate>,
}

/// Connects a [`Selection`] to a [`RegionTracker`] and drives both once per frame.
#[derive(Debug)]
pub struct Session {
    selection: Selection,
    tracker: Option<RegionTracker>,
    vision: Box<dyn Vision>,
    settings: Settings,
}

impl Session {
    pub fn new(vision: Box<dyn Vision>, settings: Settings) -> Self {
        Self {
            selection: Selection::default(),
            tracker: None,
            vision,
            settings,
        }
    }

    /// Forwards a pointer event to the selection.
    ///
    /// Events must be delivered one at a time between ticks.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.selection.handle(event);
    }

    /// Processes one frame.
    pub fn tick(&mut self, frame: &Frame) -> Snapshot {
        let status = self.selection.consume_status();
        match status {
            SelectionStatus::Idle | SelectionStatus::JustCleared | SelectionStatus::Selecting => {
                if self.tracker.take().is_some() {
                    debug!(target: "session", "tracker discarded on {status}");
                }
                Snapshot {
                    status,
                    quad: self.selection.quad().copied(),
                    points: Vec::new(),
                    update: None,
                }
            }
            SelectionStatus::JustFinished => {
                self.tracker = self.selection.quad().map(|quad| {
                    RegionTracker::new(self.vision.as_ref(), frame, *quad, &self.settings)
                });
                self.snapshot(status, None)
            }
            SelectionStatus::Held => {
                let update = self
                    .tracker
                    .as_mut()
                    .map(|tracker| tracker.tick(self.vision.as_ref(), frame));
                self.snapshot(status, update)
            }
        }
    }

    #[inline]
    pub fn tracker(&self) -> Option<&RegionTracker> {
        self.tracker.as_ref()
    }

    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    fn snapshot(&self, status: SelectionStatus, update: Option<TrackUpdate>) -> Snapshot {
        match self.tracker.as_ref() {
            Some(tracker) => Snapshot {
                status,
                quad: Some(*tracker.quad()),
                points: tracker.points().to_vec(),
                update,
            },
            None => Snapshot {
                status,
                quad: self.selection.quad().copied(),
                points: Vec::new(),
                update,
            },
        }
    }
}
