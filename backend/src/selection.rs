use log::debug;
use opencv::core::Point2f;
use strum::{Display, EnumIter};

use crate::quad::Quadrilateral;

/// A normalized pointer event in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Press(Point2f),
    Move(Point2f),
    Release(Point2f),
}

/// Lifecycle of a region selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumIter)]
pub enum SelectionStatus {
    /// No region is committed or being drawn.
    #[default]
    Idle,
    /// The button was just pressed and the region has zero size.
    JustCleared,
    /// The button is held and the region is being dragged.
    Selecting,
    /// The button was just released.
    JustFinished,
    /// A finalized region exists and is not being redrawn.
    Held,
}

impl SelectionStatus {
    /// The status after it has been observed once.
    ///
    /// Transitional statuses decay to their steady form, all others are kept as is.
    #[inline]
    pub fn decayed(self) -> SelectionStatus {
        match self {
            SelectionStatus::JustFinished => SelectionStatus::Held,
            SelectionStatus::JustCleared => SelectionStatus::Selecting,
            SelectionStatus::Idle | SelectionStatus::Selecting | SelectionStatus::Held => self,
        }
    }

    /// Whether the region is still being drawn.
    #[inline]
    pub fn is_drawing(self) -> bool {
        matches!(
            self,
            SelectionStatus::JustCleared | SelectionStatus::Selecting
        )
    }
}

/// Drives a rectangle selection from pointer events.
#[derive(Debug, Default)]
pub struct Selection {
    status: SelectionStatus,
    anchor: Option<Point2f>,
    quad: Option<Quadrilateral>,
}

impl Selection {
    pub fn handle(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Press(point) => {
                if self.status == SelectionStatus::Held {
                    debug!(target: "selection", "discarding held region {:?}", self.quad);
                }
                self.anchor = Some(point);
                self.quad = Some(Quadrilateral::from_opposite_corners(point, point));
                self.status = SelectionStatus::JustCleared;
            }
            PointerEvent::Move(point) => {
                if self.status.is_drawing() {
                    self.update_quad(point);
                }
            }
            PointerEvent::Release(point) => {
                if self.status.is_drawing() {
                    self.update_quad(point);
                    self.status = SelectionStatus::JustFinished;
                    debug!(target: "selection", "region finished {:?}", self.quad);
                }
            }
        }
    }

    /// Returns the current status and decays it with [`SelectionStatus::decayed`].
    ///
    /// Each transitional status is observed exactly once.
    pub fn consume_status(&mut self) -> SelectionStatus {
        let status = self.status;
        self.status = status.decayed();
        status
    }

    /// Returns the current status without decaying it.
    #[inline]
    pub fn status(&self) -> SelectionStatus {
        self.status
    }

    /// The candidate or finalized region, if any.
    #[inline]
    pub fn quad(&self) -> Option<&Quadrilateral> {
        self.quad.as_ref()
    }

    fn update_quad(&mut self, point: Point2f) {
        if let Some(anchor) = self.anchor {
            self.quad = Some(Quadrilateral::from_opposite_corners(anchor, point));
        }
    }
}
