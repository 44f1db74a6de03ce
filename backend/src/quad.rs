use nalgebra::{Matrix2, Vector2};
use opencv::core::{Point, Point2f, Rect, Vector};

/// Relative tolerance between opposite sides for [`Quadrilateral::is_approx_rectangle`].
const RECTANGLE_SIDE_TOLERANCE: f32 = 0.02;

/// A four-corner region being selected or tracked.
///
/// Corners are stored as `[p1, p2, p3, p4]` where `p1`/`p2` are diagonally opposite and so are
/// `p3`/`p4`. The boundary polygon is therefore `p1 -> p3 -> p2 -> p4`. No operation permutes
/// this order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrilateral {
    corners: [Point2f; 4],
}

impl Quadrilateral {
    /// Creates an axis-aligned [`Quadrilateral`] from two opposite corners `a` and `b`.
    ///
    /// The other two corners are `(a.x, b.y)` and `(b.x, a.y)`.
    pub fn from_opposite_corners(a: Point2f, b: Point2f) -> Self {
        Self {
            corners: [a, b, Point2f::new(a.x, b.y), Point2f::new(b.x, a.y)],
        }
    }

    /// Creates a general [`Quadrilateral`] from four explicit corners.
    ///
    /// `p1`/`p2` and `p3`/`p4` must be the two diagonals. Construction never fails, use
    /// [`Self::is_approx_rectangle`] to check the shape.
    pub fn new(p1: Point2f, p2: Point2f, p3: Point2f, p4: Point2f) -> Self {
        Self {
            corners: [p1, p2, p3, p4],
        }
    }

    #[inline]
    pub fn corners(&self) -> [Point2f; 4] {
        self.corners
    }

    /// Corners in boundary order `p1 -> p3 -> p2 -> p4`.
    #[inline]
    pub fn boundary(&self) -> [Point2f; 4] {
        let [p1, p2, p3, p4] = self.corners;
        [p1, p3, p2, p4]
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Point2f {
        let sum = self
            .corners
            .iter()
            .fold(Point2f::new(0.0, 0.0), |acc, corner| acc + *corner);
        Point2f::new(sum.x / 4.0, sum.y / 4.0)
    }

    /// Side lengths in boundary order: `p1p3`, `p3p2`, `p2p4` and `p4p1`.
    pub fn side_lengths(&self) -> [f32; 4] {
        let boundary = self.boundary();
        std::array::from_fn(|i| {
            let from = boundary[i];
            let to = boundary[(i + 1) % 4];
            (to - from).norm() as f32
        })
    }

    /// Unsigned area of the boundary polygon using the shoelace formula.
    pub fn area(&self) -> f32 {
        let boundary = self.boundary();
        let twice_area = (0..4)
            .map(|i| {
                let a = boundary[i];
                let b = boundary[(i + 1) % 4];
                a.x * b.y - b.x * a.y
            })
            .sum::<f32>();
        twice_area.abs() / 2.0
    }

    /// Whether opposite sides are equal within a relative tolerance of 2%.
    ///
    /// This is advisory only. A degenerate quadrilateral with all sides of zero length is
    /// considered a rectangle.
    pub fn is_approx_rectangle(&self) -> bool {
        fn approx_equal(a: f32, b: f32) -> bool {
            let max = a.max(b);
            max == 0.0 || (a - b).abs() <= RECTANGLE_SIDE_TOLERANCE * max
        }

        let [a, b, c, d] = self.side_lengths();
        approx_equal(a, c) && approx_equal(b, d)
    }

    /// Shifts all four corners by `delta`.
    pub fn translate(&mut self, delta: Point2f) {
        for corner in &mut self.corners {
            *corner = *corner + delta;
        }
    }

    /// Applies the linear map `linear` about this quadrilateral's centroid.
    ///
    /// `linear` acts on column vectors. The centroid is preserved.
    pub fn transform(&mut self, linear: &Matrix2<f64>) {
        let centroid = self.centroid();
        let origin = Vector2::new(centroid.x as f64, centroid.y as f64);
        for corner in &mut self.corners {
            let centered = Vector2::new(corner.x as f64, corner.y as f64) - origin;
            let mapped = linear * centered + origin;
            *corner = Point2f::new(mapped.x as f32, mapped.y as f32);
        }
    }

    /// Integer boundary polygon for masks and rendering.
    ///
    /// This is the only place corners are rounded to pixels.
    pub fn polygon(&self) -> Vector<Point> {
        self.boundary()
            .into_iter()
            .map(|corner| Point::new(corner.x.round() as i32, corner.y.round() as i32))
            .collect()
    }

    /// Smallest integer [`Rect`] containing all four corners.
    pub fn bounding_rect(&self) -> Rect {
        let (min, max) = self.bounds();
        let x = min.x.floor() as i32;
        let y = min.y.floor() as i32;
        Rect::new(x, y, max.x.ceil() as i32 - x, max.y.ceil() as i32 - y)
    }

    /// The `(min, max)` corners of the exact axis-aligned bounding box.
    pub fn bounds(&self) -> (Point2f, Point2f) {
        self.corners.iter().skip(1).fold(
            (self.corners[0], self.corners[0]),
            |(min, max), corner| {
                (
                    Point2f::new(min.x.min(corner.x), min.y.min(corner.y)),
                    Point2f::new(max.x.max(corner.x), max.y.max(corner.y)),
                )
            },
        )
    }
}
