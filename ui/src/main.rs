use std::{env::current_exe, io::stdout};

use anyhow::{Result, anyhow};
use backend::{DefaultVision, Session, default_settings_path, load_settings};
use capture::Camera;
use fern::Dispatch;
use log::{LevelFilter, info, warn};
use window::Window;

mod capture;
mod draw;
mod window;

const WINDOW_NAME: &str = "Region Tracker";

fn main() -> Result<()> {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_dir = current_exe()?
        .parent()
        .ok_or(anyhow!("executable has no parent directory"))?
        .to_path_buf();
    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(stdout())
        .chain(fern::log_file(log_dir.join("log.txt"))?)
        .apply()?;
    log_panics::init();

    let settings = load_settings(&default_settings_path()?)?;
    let vision = DefaultVision::new(&settings.detection, &settings.optical_flow)?;
    let overlay = settings.overlay;
    let mut camera = Camera::open(&settings.capture)?;
    let mut window = Window::open(WINDOW_NAME)?;
    let mut session = Session::new(Box::new(vision), settings);

    info!(target: "ui", "drag with the left button to select a region, press q to quit");
    loop {
        let Some(frame) = camera.read()? else {
            warn!(target: "ui", "camera returned an empty frame");
            break;
        };
        for event in window.pointer_events() {
            session.handle_pointer(event);
        }
        let snapshot = session.tick(&frame);
        let mat = draw::draw_snapshot(frame.mat(), &snapshot, &overlay)?;
        if !window.present(&mat, overlay.wait_key_millis)? {
            break;
        }
    }

    info!(target: "ui", "exiting");
    Ok(())
}
