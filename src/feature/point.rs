use std::fmt;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use super::{BasicFeature, Selection, selected_components};
use crate::camera::CameraParameters;
use crate::display::{self, Color};
use crate::error::{DisplayError, FeatureError};
use crate::img::{DisplayPixel, Image};

const CROSS_SIZE: u32 = 15;

/// 2D image point visual feature with cartesian coordinates `(x, y)`.
///
/// `(x, y)` are the normalized coordinates of the perspective projection,
/// `Z` the depth of the point in the camera frame, required by the
/// interaction matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    x: f64,
    y: f64,
    z: f64,
}

impl Default for PointFeature {
    fn default() -> Self {
        PointFeature {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        }
    }
}

impl PointFeature {
    pub fn new() -> PointFeature {
        Self::default()
    }

    pub fn build_from(x: f64, y: f64, z: f64) -> PointFeature {
        let mut p = PointFeature::new();
        p.set_xyz(x, y, z);
        p
    }

    pub fn select_x() -> Selection {
        Selection::line(0)
    }

    pub fn select_y() -> Selection {
        Selection::line(1)
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }

    pub fn set_y(&mut self, y: f64) {
        self.y = y;
    }

    /// Zero depth is accepted here and rejected by [`PointFeature::interaction`].
    pub fn set_z(&mut self, z: f64) {
        if z == 0.0 {
            log::warn!("point depth set to zero, interaction matrix is undefined");
        }
        self.z = z;
    }

    pub fn set_xyz(&mut self, x: f64, y: f64, z: f64) {
        self.set_x(x);
        self.set_y(y);
        self.set_z(z);
    }

    /// Interaction matrix `L` of the selected coordinates.
    ///
    /// ```text
    /// Lx = [ -1/Z   0    x/Z   x*y    -(1+x²)   y ]
    /// Ly = [  0    -1/Z  y/Z   1+y²   -x*y     -x ]
    /// ```
    pub fn interaction(&self, select: Selection) -> Result<na::DMatrix<f64>, FeatureError> {
        let n = select.count(2);
        if n == 0 {
            return Err(FeatureError::EmptySelection(select.bits()));
        }
        if self.z == 0.0 {
            log::error!("cannot compute the interaction matrix of a point with Z = 0");
            return Err(FeatureError::ZeroDepth);
        }
        let (x, y, z) = (self.x, self.y, self.z);
        let mut data = Vec::with_capacity(n * 6);
        if select.contains(0) {
            data.extend_from_slice(&[-1.0 / z, 0.0, x / z, x * y, -(1.0 + x * x), y]);
        }
        if select.contains(1) {
            data.extend_from_slice(&[0.0, -1.0 / z, y / z, 1.0 + y * y, -x * y, -x]);
        }
        Ok(na::DMatrix::from_row_slice(n, 6, &data))
    }

    /// `s - s*` for the selected coordinates, in `[x, y]` order.
    pub fn error(
        &self,
        desired: &PointFeature,
        select: Selection,
    ) -> Result<na::DVector<f64>, FeatureError> {
        BasicFeature::error(self, desired, select)
    }

    /// Error with respect to the zero feature.
    pub fn error_to_zero(&self, select: Selection) -> Result<na::DVector<f64>, FeatureError> {
        selected_components(&self.values(), select)
    }

    pub fn print(&self, select: Selection) {
        let mut s = String::from("Point:");
        if select.contains(0) {
            s += format!(" x={}", self.x).as_str();
        }
        if select.contains(1) {
            s += format!(" y={}", self.y).as_str();
        }
        s += format!(" Z={}", self.z).as_str();
        log::info!("{}", s);
    }

    /// Draws a cross where the point projects in `image`.
    pub fn display<P: DisplayPixel>(
        &self,
        cam: &CameraParameters,
        image: &Image<P>,
        color: Color,
    ) -> Result<(), DisplayError> {
        let (u, v) = cam.meter_to_pixel(self.x, self.y);
        display::display_cross_uv(
            image,
            u.round() as i32,
            v.round() as i32,
            CROSS_SIZE,
            color,
        )
    }
}

impl BasicFeature for PointFeature {
    fn dimension(&self) -> usize {
        2
    }

    fn values(&self) -> na::DVector<f64> {
        na::dvector![self.x, self.y]
    }

    fn interaction(&self, select: Selection) -> Result<na::DMatrix<f64>, FeatureError> {
        PointFeature::interaction(self, select)
    }
}

impl fmt::Display for PointFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointFeature: x={}, y={}, Z={}", self.x, self.y, self.z)
    }
}
