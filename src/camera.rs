use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Perspective projection intrinsics without distortion.
///
/// `px`, `py` are the ratios between focal length and pixel size, `u0`, `v0`
/// the principal point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    pub px: f64,
    pub py: f64,
    pub u0: f64,
    pub v0: f64,
}

impl Default for CameraParameters {
    fn default() -> Self {
        Self {
            px: 600.0,
            py: 600.0,
            u0: 192.0,
            v0: 144.0,
        }
    }
}

impl CameraParameters {
    pub fn new(px: f64, py: f64, u0: f64, v0: f64) -> CameraParameters {
        CameraParameters { px, py, u0, v0 }
    }

    /// Normalized coordinates (meter) to pixel coordinates `(u, v)`.
    pub fn meter_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (self.u0 + x * self.px, self.v0 + y * self.py)
    }

    /// Pixel coordinates `(u, v)` to normalized coordinates `(x, y)`.
    pub fn pixel_to_meter(&self, u: f64, v: f64) -> (f64, f64) {
        ((u - self.u0) / self.px, (v - self.v0) / self.py)
    }

    /// Projects a point expressed in the camera frame. Points on the image
    /// plane of the optical center have no projection.
    pub fn project(&self, p: &na::Point3<f64>) -> Option<(f64, f64)> {
        if p.z == 0.0 {
            return None;
        }
        Some(self.meter_to_pixel(p.x / p.z, p.y / p.z))
    }
}
