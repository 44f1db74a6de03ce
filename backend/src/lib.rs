mod config;
mod frame;
mod models;
mod quad;
mod selection;
mod session;
mod tracker;
mod vision;

pub use {
    config::{default_settings_path, load_settings, save_settings},
    frame::Frame,
    models::*,
    quad::Quadrilateral,
    selection::{PointerEvent, Selection, SelectionStatus},
    session::{Session, Snapshot},
    strum::IntoEnumIterator,
    tracker::{Motion, RegionTracker, TrackUpdate, estimate_motion, region_mask},
    vision::{DefaultVision, Vision},
};
