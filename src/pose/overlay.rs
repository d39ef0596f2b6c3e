//! Skeleton overlay drawn in place onto RGB frames

use image::{Rgb, RgbImage};

use super::Pose;

/// COCO skeleton as pairs of indices into [`super::KeypointName::ALL`]
pub const SKELETON_EDGES: [(usize, usize); 16] = [
    // face
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    // arms
    (5, 6),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    // torso
    (5, 11),
    (6, 12),
    (11, 12),
    // legs
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

/// Draws keypoints as dots and connects them along [`SKELETON_EDGES`]
#[derive(Debug, Clone)]
pub struct PoseOverlay {
    /// Keypoints below this score are not drawn
    pub score_threshold: f32,
    pub color: Rgb<u8>,
    pub point_radius: i32,
    pub line_thickness: i32,
}

impl Default for PoseOverlay {
    fn default() -> Self {
        Self {
            score_threshold: 0.2,
            color: Rgb([0, 255, 0]),
            point_radius: 4,
            line_thickness: 2,
        }
    }
}

impl PoseOverlay {
    #[must_use]
    pub fn with_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    /// Draw every pose onto `frame`
    pub fn draw(&self, frame: &mut RgbImage, poses: &[Pose]) {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        for pose in poses {
            let mut points: [Option<(i32, i32)>; 17] = [None; 17];

            for (i, keypoint) in pose.keypoints.iter().enumerate().take(17) {
                if keypoint.score < self.score_threshold {
                    continue;
                }

                // model output can sit exactly on 1.0
                let px = ((keypoint.point.x * width as f32) as i32).clamp(0, width as i32 - 1);
                let py = ((keypoint.point.y * height as f32) as i32).clamp(0, height as i32 - 1);

                points[i] = Some((px, py));
                self.fill_circle(frame, px, py, self.point_radius);
            }

            for (start, end) in SKELETON_EDGES {
                if let (Some(a), Some(b)) = (points[start], points[end]) {
                    self.draw_line(frame, a, b);
                }
            }
        }
    }

    fn put(&self, frame: &mut RgbImage, x: i32, y: i32) {
        if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
            frame.put_pixel(x as u32, y as u32, self.color);
        }
    }

    fn fill_circle(&self, frame: &mut RgbImage, cx: i32, cy: i32, radius: i32) {
        let r2 = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= r2 {
                    self.put(frame, cx + dx, cy + dy);
                }
            }
        }
    }

    /// Bresenham line stamped with a square brush of `line_thickness`
    fn draw_line(&self, frame: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) {
        let half = self.line_thickness / 2;
        let lo = -half;
        let hi = (self.line_thickness - 1 - half).max(lo);

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            for oy in lo..=hi {
                for ox in lo..=hi {
                    self.put(frame, x + ox, y + oy);
                }
            }

            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}
