use anyhow::Result;
use backend::{Overlay, SelectionStatus, Snapshot, TrackUpdate};
use opencv::{
    core::{Mat, MatTraitConst, Point, Scalar},
    imgproc::{FILLED, FONT_HERSHEY_SIMPLEX, LINE_8, circle, polylines, put_text_def},
};

const LABEL_ORIGIN: (i32, i32) = (10, 24);

/// Draws `snapshot` on a copy of `mat`.
pub fn draw_snapshot(mat: &Mat, snapshot: &Snapshot, overlay: &Overlay) -> Result<Mat> {
    let mut mat = mat.try_clone()?;
    let color = status_color(snapshot);

    if let Some(quad) = snapshot.quad.as_ref() {
        polylines(&mut mat, &quad.polygon(), true, color, 2, LINE_8, 0)?;
    }
    for point in snapshot.points.iter() {
        let center = Point::new(point.x.round() as i32, point.y.round() as i32);
        circle(
            &mut mat,
            center,
            overlay.point_radius,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            FILLED,
            LINE_8,
            0,
        )?;
    }
    put_text_def(
        &mut mat,
        &label(snapshot),
        Point::new(LABEL_ORIGIN.0, LABEL_ORIGIN.1),
        FONT_HERSHEY_SIMPLEX,
        0.6,
        color,
    )?;

    Ok(mat)
}

fn label(snapshot: &Snapshot) -> String {
    let mut label = format!("{} | {} points", snapshot.status, snapshot.points.len());
    match snapshot.update {
        Some(TrackUpdate::Reseeded) => label.push_str(" | reseeded"),
        Some(TrackUpdate::Lost) => label.push_str(" | lost"),
        Some(TrackUpdate::Moved(_)) | None => (),
    }
    label
}

fn status_color(snapshot: &Snapshot) -> Scalar {
    match (snapshot.status, snapshot.update) {
        (_, Some(TrackUpdate::Lost)) => Scalar::new(0.0, 0.0, 255.0, 0.0),
        (SelectionStatus::JustCleared | SelectionStatus::Selecting, _) => {
            Scalar::new(0.0, 255.0, 255.0, 0.0)
        }
        _ => Scalar::new(0.0, 255.0, 0.0, 0.0),
    }
}
