use anyhow::Result;
use backend::PointerEvent;
use log::debug;
use opencv::{
    core::{Mat, Point2f},
    highgui::{
        EVENT_LBUTTONDOWN, EVENT_LBUTTONUP, EVENT_MOUSEMOVE, WINDOW_AUTOSIZE, WND_PROP_VISIBLE,
        destroy_window, get_window_property, imshow, named_window, set_mouse_callback, wait_key,
    },
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// A preview window that reports pointer events in frame coordinates.
pub struct Window {
    name: String,
    events: UnboundedReceiver<PointerEvent>,
}

impl Window {
    pub fn open(name: &str) -> Result<Self> {
        named_window(name, WINDOW_AUTOSIZE)?;

        let (tx, rx) = mpsc::unbounded_channel();
        set_mouse_callback(
            name,
            Some(Box::new(move |event, x, y, _| {
                if let Some(event) = pointer_event(event, x, y) {
                    let _ = tx.send(event);
                }
            })),
        )?;

        Ok(Self {
            name: name.to_string(),
            events: rx,
        })
    }

    /// Drains the pointer events received since the last call, in arrival order.
    pub fn pointer_events(&mut self) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Shows `mat` and waits up to `wait_millis` for a key.
    ///
    /// Returns `false` once the user asked to quit with `q` or by closing the window.
    pub fn present(&self, mat: &Mat, wait_millis: i32) -> Result<bool> {
        imshow(&self.name, mat)?;
        let key = wait_key(wait_millis.max(1))?;
        if key == 'q' as i32 {
            debug!(target: "window", "quit requested");
            return Ok(false);
        }

        Ok(get_window_property(&self.name, WND_PROP_VISIBLE)? >= 1.0)
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        let _ = destroy_window(&self.name);
    }
}

/// Maps a raw mouse callback event to a [`PointerEvent`].
///
/// Only the left button and plain movement are relevant.
fn pointer_event(event: i32, x: i32, y: i32) -> Option<PointerEvent> {
    let point = Point2f::new(x as f32, y as f32);
    match event {
        EVENT_LBUTTONDOWN => Some(PointerEvent::Press(point)),
        EVENT_MOUSEMOVE => Some(PointerEvent::Move(point)),
        EVENT_LBUTTONUP => Some(PointerEvent::Release(point)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use opencv::highgui::{EVENT_LBUTTONDBLCLK, EVENT_RBUTTONDOWN};

    use super::*;

    #[test]
    fn maps_left_button_and_movement() {
        assert_eq!(
            pointer_event(EVENT_LBUTTONDOWN, 10, 20),
            Some(PointerEvent::Press(Point2f::new(10.0, 20.0)))
        );
        assert_eq!(
            pointer_event(EVENT_MOUSEMOVE, 11, 21),
            Some(PointerEvent::Move(Point2f::new(11.0, 21.0)))
        );
        assert_eq!(
            pointer_event(EVENT_LBUTTONUP, 12, 22),
            Some(PointerEvent::Release(Point2f::new(12.0, 22.0)))
        );
    }

    #[test]
    fn ignores_other_buttons() {
        assert_eq!(pointer_event(EVENT_RBUTTONDOWN, 1, 1), None);
        assert_eq!(pointer_event(EVENT_LBUTTONDBLCLK, 1, 1), None);
    }
}
