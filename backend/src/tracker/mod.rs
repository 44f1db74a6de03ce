use anyhow::Result;
use log::{debug, info, warn};
use opencv::{
    core::{
        CV_8U, Mat, MatExprTraitConst, MatTraitConst, Point2f, Scalar, Size, Vector,
        count_non_zero,
    },
    imgproc::fill_poly_def,
};

use crate::{
    frame::Frame,
    models::{Detection, Settings},
    quad::Quadrilateral,
    vision::Vision,
};

mod motion;

pub use motion::{Motion, estimate_motion};

/// Outcome of a single [`RegionTracker::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackUpdate {
    /// Points were followed and the region was moved.
    Moved(Motion),
    /// Too few points were followed so the point set was detected again.
    ///
    /// The region is left where it was for this tick.
    Reseeded,
    /// No point could be detected in the region.
    ///
    /// The region is held at its last position and detection is attempted again next tick.
    Lost,
}

/// Follows a [`Quadrilateral`] region across frames using a sparse point set.
#[derive(Debug)]
pub struct RegionTracker {
    quad: Quadrilateral,
    points: Vec<Point2f>,
    /// Number of points at the last (re-)seed.
    original_count: usize,
    previous_gray: Mat,
    detection: Detection,
    reload_threshold: f32,
}

impl RegionTracker {
    /// Creates a tracker for `quad` and seeds its points from `frame`.
    pub fn new(
        vision: &dyn Vision,
        frame: &Frame,
        quad: Quadrilateral,
        settings: &Settings,
    ) -> Self {
        let mut tracker = Self {
            quad,
            points: Vec::new(),
            original_count: 0,
            previous_gray: frame.grayscale().clone(),
            detection: settings.detection,
            reload_threshold: settings.reload_threshold,
        };
        tracker.seed(vision, frame.grayscale());
        info!(
            target: "tracker",
            "tracking {:?} with {} points",
            tracker.quad.corners(),
            tracker.original_count
        );

        tracker
    }

    /// Advances the tracker by one frame.
    ///
    /// This never fails. Vision errors are logged and handled as if no point was followed or
    /// detected.
    pub fn tick(&mut self, vision: &dyn Vision, frame: &Frame) -> TrackUpdate {
        let grayscale = frame.grayscale();
        let (old, new) = self.follow(vision, grayscale);
        let motion = if self.should_reseed(old.len()) {
            debug!(
                target: "tracker",
                "{} of {} points followed, reseeding",
                old.len(),
                self.original_count
            );
            None
        } else {
            estimate_motion(&old, &new)
        };

        let update = match motion {
            Some(motion) => {
                self.quad.translate(motion.translation);
                if let Some(linear) = motion.linear.as_ref() {
                    self.quad.transform(linear);
                }
                self.points = new;
                TrackUpdate::Moved(motion)
            }
            None => {
                self.seed(vision, grayscale);
                if self.points.is_empty() {
                    warn!(target: "tracker", "no points detected in {:?}", self.quad.corners());
                    TrackUpdate::Lost
                } else {
                    info!(target: "tracker", "reseeded with {} points", self.points.len());
                    TrackUpdate::Reseeded
                }
            }
        };
        self.previous_gray = grayscale.clone();

        update
    }

    #[inline]
    pub fn quad(&self) -> &Quadrilateral {
        &self.quad
    }

    /// The currently tracked points, empty when no motion update is available.
    #[inline]
    pub fn points(&self) -> &[Point2f] {
        &self.points
    }

    #[inline]
    pub fn original_count(&self) -> usize {
        self.original_count
    }

    /// Follows the points into `grayscale`, returning the successfully followed
    /// `(old, new)` pairs.
    fn follow(&self, vision: &dyn Vision, grayscale: &Mat) -> (Vec<Point2f>, Vec<Point2f>) {
        if self.points.is_empty() {
            return (Vec::new(), Vec::new());
        }

        match vision.track_points(&self.previous_gray, grayscale, &self.points) {
            Ok((tracked, flags)) => self
                .points
                .iter()
                .zip(tracked)
                .zip(flags)
                .filter_map(|((old, new), followed)| followed.then_some((*old, new)))
                .unzip(),
            Err(err) => {
                warn!(target: "tracker", "failed to track points {err}");
                (Vec::new(), Vec::new())
            }
        }
    }

    fn should_reseed(&self, followed: usize) -> bool {
        followed < 2 || (followed as f32) < self.reload_threshold * self.original_count as f32
    }

    /// Replaces the point set with points detected inside the current region.
    fn seed(&mut self, vision: &dyn Vision, grayscale: &Mat) {
        self.points = detect_in_region(vision, grayscale, &self.quad, &self.detection)
            .unwrap_or_else(|err| {
                warn!(target: "tracker", "failed to detect points {err}");
                Vec::new()
            });
        self.original_count = self.points.len();
    }
}

fn detect_in_region(
    vision: &dyn Vision,
    grayscale: &Mat,
    quad: &Quadrilateral,
    detection: &Detection,
) -> Result<Vec<Point2f>> {
    let mask = region_mask(grayscale.size()?, quad)?;
    if count_non_zero(&mask)? == 0 {
        return Ok(Vec::new());
    }

    vision.detect_points(
        grayscale,
        &mask,
        detection.max_points,
        detection.quality_level,
        detection.min_distance,
    )
}

/// Builds an 8-bit mask of `size` covering exactly the interior of `quad`.
///
/// A zero-area `quad` produces an all-zero mask.
pub fn region_mask(size: Size, quad: &Quadrilateral) -> Result<Mat> {
    let mut mask = Mat::zeros_size(size, CV_8U)?.to_mat()?;
    if quad.area() > 0.0 {
        let polygons = Vector::<Vector<_>>::from_iter([quad.polygon()]);
        fill_poly_def(&mut mask, &polygons, Scalar::all(255.0))?;
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use nalgebra::Matrix2;
    use opencv::core::{CV_8UC1, Mat};

    use super::*;
    use crate::vision::MockVision;

    fn shift() -> Point2f {
        Point2f::new(3.0, 2.0)
    }

    fn frame() -> Frame {
        Frame::new(Mat::zeros(240, 320, CV_8UC1).unwrap().to_mat().unwrap()).unwrap()
    }

    fn region() -> Quadrilateral {
        Quadrilateral::from_opposite_corners(Point2f::new(100.0, 80.0), Point2f::new(200.0, 160.0))
    }

    fn grid(origin: Point2f, columns: usize, rows: usize, step: f32) -> Vec<Point2f> {
        (0..rows)
            .flat_map(|row| {
                (0..columns).map(move |col| {
                    Point2f::new(origin.x + col as f32 * step, origin.y + row as f32 * step)
                })
            })
            .collect()
    }

    fn assert_point_near(actual: Point2f, expected: Point2f) {
        assert!(
            (actual.x - expected.x).abs() < 1e-2 && (actual.y - expected.y).abs() < 1e-2,
            "{actual:?} != {expected:?}"
        );
    }

    /// Detects `first` on the first call and `rest` on every later call.
    fn expect_detections(vision: &mut MockVision, first: Vec<Point2f>, rest: Vec<Point2f>) {
        let mut calls = 0;
        vision
            .expect_detect_points()
            .returning(move |_, _, _, _, _| {
                calls += 1;
                Ok(if calls == 1 { first.clone() } else { rest.clone() })
            });
    }

    fn expect_tracking(vision: &mut MockVision, followed: fn(usize) -> bool, shift: Point2f) {
        vision
            .expect_track_points()
            .returning(move |_, _, points| {
                Ok((
                    points.iter().map(|point| *point + shift).collect(),
                    (0..points.len()).map(followed).collect(),
                ))
            });
    }

    #[test]
    fn new_seeds_points_with_detection_settings() {
        let mut vision = MockVision::new();
        let seeded = grid(Point2f::new(110.0, 90.0), 5, 4, 15.0);
        let expected = seeded.clone();
        vision
            .expect_detect_points()
            .withf(|_, mask, max_points, quality_level, min_distance| {
                *mask.at_2d::<u8>(120, 150).unwrap() == 255
                    && *mask.at_2d::<u8>(10, 10).unwrap() == 0
                    && *max_points == 100
                    && *quality_level == 0.1
                    && *min_distance == 7.0
            })
            .once()
            .returning(move |_, _, _, _, _| Ok(seeded.clone()));

        let tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());

        assert_eq!(tracker.points(), expected.as_slice());
        assert_eq!(tracker.original_count(), 20);
        assert_eq!(tracker.quad(), &region());
    }

    #[test]
    fn uniform_translation_moves_centroid_and_keeps_shape() {
        let mut vision = MockVision::new();
        expect_detections(
            &mut vision,
            grid(Point2f::new(110.0, 90.0), 5, 4, 15.0),
            Vec::new(),
        );
        expect_tracking(&mut vision, |_| true, shift());
        let start = region();
        let mut tracker = RegionTracker::new(&vision, &frame(), start, &Settings::default());

        for _ in 0..5 {
            let update = tracker.tick(&vision, &frame());

            let TrackUpdate::Moved(motion) = update else {
                panic!("expected motion, got {update:?}");
            };
            assert_point_near(motion.translation, shift());
            let linear = motion.linear.unwrap();
            assert!((linear - Matrix2::identity()).abs().max() < 1e-4);
        }

        let moved = tracker.quad().centroid() - start.centroid();
        assert_point_near(moved, Point2f::new(15.0, 10.0));
        for (actual, expected) in tracker
            .quad()
            .side_lengths()
            .into_iter()
            .zip(start.side_lengths())
        {
            assert!((actual - expected).abs() < 1e-2);
        }
        assert_eq!(tracker.original_count(), 20);
        assert_point_near(tracker.points()[0], Point2f::new(125.0, 100.0));
    }

    #[test]
    fn rotation_is_applied_about_centroid() {
        let mut vision = MockVision::new();
        let start = region();
        let center = start.centroid();
        let (sin, cos) = 0.1_f32.sin_cos();
        expect_detections(
            &mut vision,
            grid(Point2f::new(120.0, 97.5), 5, 4, 15.0),
            Vec::new(),
        );
        vision.expect_track_points().returning(move |_, _, points| {
            let rotated = points
                .iter()
                .map(|point| {
                    let offset = *point - center;
                    Point2f::new(
                        center.x + cos * offset.x - sin * offset.y,
                        center.y + sin * offset.x + cos * offset.y,
                    )
                })
                .collect();
            Ok((rotated, vec![true; points.len()]))
        });
        let mut tracker = RegionTracker::new(&vision, &frame(), start, &Settings::default());

        tracker.tick(&vision, &frame());

        for (actual, corner) in tracker.quad().corners().into_iter().zip(start.corners()) {
            let offset = corner - center;
            let expected = Point2f::new(
                center.x + cos * offset.x - sin * offset.y,
                center.y + sin * offset.x + cos * offset.y,
            );
            assert_point_near(actual, expected);
        }
    }

    #[test]
    fn reseeds_below_reload_threshold() {
        let mut vision = MockVision::new();
        let reseeded = grid(Point2f::new(120.0, 100.0), 3, 2, 20.0);
        let expected = reseeded.clone();
        expect_detections(
            &mut vision,
            grid(Point2f::new(110.0, 90.0), 5, 4, 15.0),
            reseeded,
        );
        expect_tracking(&mut vision, |index| index < 9, shift());
        let mut tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());
        assert_eq!(tracker.original_count(), 20);

        let update = tracker.tick(&vision, &frame());

        assert_eq!(update, TrackUpdate::Reseeded);
        assert_eq!(tracker.original_count(), 6);
        assert_eq!(tracker.points(), expected.as_slice());
        assert_eq!(tracker.quad(), &region());
    }

    #[test]
    fn keeps_followed_subset_at_reload_threshold() {
        let mut vision = MockVision::new();
        expect_detections(
            &mut vision,
            grid(Point2f::new(110.0, 90.0), 5, 4, 15.0),
            Vec::new(),
        );
        expect_tracking(&mut vision, |index| index % 2 == 0, shift());
        let mut tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());

        let update = tracker.tick(&vision, &frame());

        assert!(matches!(update, TrackUpdate::Moved(_)));
        assert_eq!(tracker.points().len(), 10);
        assert_eq!(tracker.original_count(), 20);
        assert_point_near(tracker.points()[1], Point2f::new(143.0, 92.0));
    }

    #[test]
    fn lost_when_nothing_followed_and_nothing_detected() {
        let mut vision = MockVision::new();
        expect_detections(
            &mut vision,
            grid(Point2f::new(110.0, 90.0), 5, 4, 15.0),
            Vec::new(),
        );
        expect_tracking(&mut vision, |_| false, shift());
        let mut tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());

        let update = tracker.tick(&vision, &frame());

        assert_eq!(update, TrackUpdate::Lost);
        assert_eq!(tracker.quad(), &region());
        assert!(tracker.points().is_empty());
        assert_eq!(tracker.original_count(), 0);

        assert_eq!(tracker.tick(&vision, &frame()), TrackUpdate::Lost);
        assert_eq!(tracker.quad(), &region());
    }

    #[test]
    fn tracking_error_reseeds() {
        let mut vision = MockVision::new();
        expect_detections(
            &mut vision,
            grid(Point2f::new(110.0, 90.0), 5, 4, 15.0),
            grid(Point2f::new(130.0, 95.0), 2, 2, 10.0),
        );
        vision
            .expect_track_points()
            .returning(|_, _, _| Err(anyhow!("flow failed")));
        let mut tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());

        assert_eq!(tracker.tick(&vision, &frame()), TrackUpdate::Reseeded);
        assert_eq!(tracker.original_count(), 4);
    }

    #[test]
    fn detection_error_is_empty_point_set() {
        let mut vision = MockVision::new();
        vision
            .expect_detect_points()
            .returning(|_, _, _, _, _| Err(anyhow!("detection failed")));
        vision.expect_track_points().never();

        let mut tracker = RegionTracker::new(&vision, &frame(), region(), &Settings::default());

        assert!(tracker.points().is_empty());
        assert_eq!(tracker.tick(&vision, &frame()), TrackUpdate::Lost);
    }

    #[test]
    fn zero_area_region_never_detects() {
        let mut vision = MockVision::new();
        vision.expect_detect_points().never();
        vision.expect_track_points().never();
        let point = Point2f::new(50.0, 50.0);
        let quad = Quadrilateral::from_opposite_corners(point, point);

        let mut tracker = RegionTracker::new(&vision, &frame(), quad, &Settings::default());

        assert!(tracker.points().is_empty());
        assert_eq!(tracker.tick(&vision, &frame()), TrackUpdate::Lost);
        assert_eq!(tracker.quad(), &quad);
    }

    #[test]
    fn collinear_points_only_translate() {
        let mut vision = MockVision::new();
        let line = (0..6)
            .map(|i| Point2f::new(110.0 + i as f32 * 10.0, 120.0))
            .collect::<Vec<_>>();
        expect_detections(&mut vision, line, Vec::new());
        expect_tracking(&mut vision, |_| true, shift());
        let start = region();
        let mut tracker = RegionTracker::new(&vision, &frame(), start, &Settings::default());

        let update = tracker.tick(&vision, &frame());

        let TrackUpdate::Moved(motion) = update else {
            panic!("expected motion, got {update:?}");
        };
        assert!(motion.linear.is_none());
        let mut expected = start;
        expected.translate(shift());
        assert_eq!(tracker.quad(), &expected);
    }

    #[test]
    fn region_mask_covers_axis_aligned_interior() {
        let quad =
            Quadrilateral::from_opposite_corners(Point2f::new(10.0, 10.0), Point2f::new(30.0, 20.0));

        let mask = region_mask(Size::new(100, 100), &quad).unwrap();

        assert_eq!(mask.size().unwrap(), Size::new(100, 100));
        assert_eq!(mask.typ(), CV_8U);
        assert_eq!(*mask.at_2d::<u8>(15, 20).unwrap(), 255);
        assert_eq!(*mask.at_2d::<u8>(5, 5).unwrap(), 0);
        assert_eq!(*mask.at_2d::<u8>(15, 35).unwrap(), 0);
        let count = count_non_zero(&mask).unwrap();
        assert!((200..=260).contains(&count), "{count}");
    }

    #[test]
    fn region_mask_follows_rotated_quad_not_bounding_box() {
        let diamond = Quadrilateral::new(
            Point2f::new(50.0, 20.0),
            Point2f::new(50.0, 80.0),
            Point2f::new(20.0, 50.0),
            Point2f::new(80.0, 50.0),
        );

        let mask = region_mask(Size::new(100, 100), &diamond).unwrap();

        assert_eq!(*mask.at_2d::<u8>(50, 50).unwrap(), 255);
        assert_eq!(*mask.at_2d::<u8>(22, 22).unwrap(), 0);
        assert_eq!(*mask.at_2d::<u8>(78, 78).unwrap(), 0);
        let count = count_non_zero(&mask).unwrap();
        assert!(count < 2400, "{count}");
    }

    #[test]
    fn region_mask_empty_for_zero_area() {
        let point = Point2f::new(40.0, 40.0);
        let line =
            Quadrilateral::from_opposite_corners(Point2f::new(10.0, 40.0), Point2f::new(60.0, 40.0));

        for quad in [Quadrilateral::from_opposite_corners(point, point), line] {
            let mask = region_mask(Size::new(100, 100), &quad).unwrap();
            assert_eq!(count_non_zero(&mask).unwrap(), 0);
        }
    }
}
