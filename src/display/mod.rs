//! Drawing facade over the display attached to an image.
//!
//! Every function forwards to the backend referenced by the image and is a
//! silent no-op when none is attached, except [`display`] and [`get_image`]
//! which fail with [`DisplayError::NotInitialized`]. Backend errors are
//! returned unchanged.
//!
//! Coordinates are `(i, j)` = (row, column). The `_uv` variants take
//! `(u, v)` = (column, row) and transpose before forwarding.

pub mod canvas;
pub mod recording;

pub use canvas::CanvasDisplay;
pub use recording::RerunDisplay;

use std::cell::RefCell;
use std::rc::Rc;

use image::{Pixel, Rgba, RgbaImage};
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::camera::CameraParameters;
use crate::error::DisplayError;
use crate::img::{ColorImage, DisplayPixel, Image, ImageView, SharedBackend};

pub const DEFAULT_ARROW_LENGTH: u32 = 4;
pub const DEFAULT_ARROW_WIDTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    Blue,
    Cyan,
    Green,
    Orange,
    Purple,
    Red,
    White,
    Yellow,
    None,
}

impl Color {
    /// `None` has no pixel value.
    pub fn to_rgba(self) -> Option<Rgba<u8>> {
        let rgb = match self {
            Color::Black => [0, 0, 0],
            Color::Blue => [0, 0, 255],
            Color::Cyan => [0, 255, 255],
            Color::Green => [0, 255, 0],
            Color::Orange => [255, 165, 0],
            Color::Purple => [128, 0, 128],
            Color::Red => [255, 0, 0],
            Color::White => [255, 255, 255],
            Color::Yellow => [255, 255, 0],
            Color::None => return None,
        };
        Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Button1,
    Button2,
    Button3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(top: i32, left: i32, width: u32, height: u32) -> Rect {
        Rect {
            top,
            left,
            width,
            height,
        }
    }
}

/// Mouse event in (row, column) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub i: u32,
    pub j: u32,
    pub button: MouseButton,
}

/// Mouse event in (column, row) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickUv {
    pub u: u32,
    pub v: u32,
    pub button: MouseButton,
}

impl From<Click> for ClickUv {
    fn from(c: Click) -> Self {
        ClickUv {
            u: c.j,
            v: c.i,
            button: c.button,
        }
    }
}

/// Capabilities a display backend provides. All coordinates are
/// (row, column).
pub trait DisplayBackend {
    fn display_image(&mut self, image: ImageView<'_>) -> Result<(), DisplayError>;
    fn flush_title(&mut self, title: &str) -> Result<(), DisplayError>;
    /// Content of the display, overlays included when the backend can
    /// rasterize them.
    fn get_image(&mut self) -> Result<RgbaImage, DisplayError>;
    fn display_point(&mut self, i: i32, j: i32, color: Color) -> Result<(), DisplayError>;
    fn display_cross(&mut self, i: i32, j: i32, size: u32, color: Color)
    -> Result<(), DisplayError>;
    fn display_cross_large(
        &mut self,
        i: i32,
        j: i32,
        size: u32,
        color: Color,
    ) -> Result<(), DisplayError>;
    fn display_circle(&mut self, i: i32, j: i32, r: u32, color: Color)
    -> Result<(), DisplayError>;
    fn display_line(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        thickness: u32,
    ) -> Result<(), DisplayError>;
    fn display_dot_line(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        thickness: u32,
    ) -> Result<(), DisplayError>;
    #[allow(clippy::too_many_arguments)]
    fn display_arrow(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        length: u32,
        width: u32,
    ) -> Result<(), DisplayError>;
    #[allow(clippy::too_many_arguments)]
    fn display_rectangle(
        &mut self,
        i: i32,
        j: i32,
        width: u32,
        height: u32,
        color: Color,
        fill: bool,
        thickness: u32,
    ) -> Result<(), DisplayError>;
    fn display_rect(
        &mut self,
        rect: &Rect,
        color: Color,
        fill: bool,
        thickness: u32,
    ) -> Result<(), DisplayError> {
        self.display_rectangle(
            rect.top,
            rect.left,
            rect.width,
            rect.height,
            color,
            fill,
            thickness,
        )
    }
    fn display_char_string(
        &mut self,
        i: i32,
        j: i32,
        text: &str,
        color: Color,
    ) -> Result<(), DisplayError>;
    fn flush_display(&mut self) -> Result<(), DisplayError>;
    fn close_display(&mut self) -> Result<(), DisplayError>;
    /// Button press. A non-blocking call returns `None` when no event is
    /// pending.
    fn get_click(&mut self, blocking: bool) -> Result<Option<Click>, DisplayError>;
    /// Button release.
    fn get_click_up(&mut self, blocking: bool) -> Result<Option<Click>, DisplayError>;
}

/// Segments `(i, j) -> (i, j)` of an arrow from `(i1, j1)` to `(i2, j2)`:
/// the shaft then the two barbs of the head. Empty for a null arrow.
pub fn arrow_segments(
    i1: i32,
    j1: i32,
    i2: i32,
    j2: i32,
    length: u32,
    width: u32,
) -> Vec<((f64, f64), (f64, f64))> {
    let a = (i2 - i1) as f64;
    let b = (j2 - j1) as f64;
    let lg = (a * a + b * b).sqrt();
    if lg == 0.0 {
        return Vec::new();
    }
    let (a, b) = (a / lg, b / lg);
    let (tip_i, tip_j) = (i2 as f64, j2 as f64);
    let i3 = tip_i - length as f64 * a;
    let j3 = tip_j - length as f64 * b;
    let l = width as f64;
    vec![
        ((i1 as f64, j1 as f64), (tip_i, tip_j)),
        ((tip_i, tip_j), (i3 + l * b, j3 - l * a)),
        ((tip_i, tip_j), (i3 - l * b, j3 + l * a)),
    ]
}

/// Attaches `backend` to `image`. The caller owns the returned display, the
/// image only keeps a weak reference to it.
pub fn attach<B, P>(image: &mut Image<P>, backend: B) -> Rc<RefCell<B>>
where
    B: DisplayBackend + 'static,
    P: Pixel<Subpixel = u8>,
{
    let backend = Rc::new(RefCell::new(backend));
    let shared: SharedBackend = backend.clone();
    image.attach_display(&shared);
    backend
}

fn forward<P, R>(
    image: &Image<P>,
    call: impl FnOnce(&mut dyn DisplayBackend) -> Result<R, DisplayError>,
) -> Result<Option<R>, DisplayError>
where
    P: Pixel<Subpixel = u8>,
{
    let Some(backend) = image.display_backend() else {
        return Ok(None);
    };
    let mut backend = backend.borrow_mut();
    let result = call(&mut *backend).inspect_err(|e| log::error!("display error: {}", e));
    result.map(Some)
}

fn require<P, R>(
    image: &Image<P>,
    call: impl FnOnce(&mut dyn DisplayBackend) -> Result<R, DisplayError>,
) -> Result<R, DisplayError>
where
    P: Pixel<Subpixel = u8>,
{
    forward(image, call)?.ok_or_else(|| {
        log::error!("display not initialized");
        DisplayError::NotInitialized
    })
}

/// Shows `image` in its display.
pub fn display<P: DisplayPixel>(image: &Image<P>) -> Result<(), DisplayError> {
    require(image, |b| b.display_image(image.view()))
}

/// Reads back the content of the display attached to `image`.
pub fn get_image<P: DisplayPixel>(image: &Image<P>) -> Result<ColorImage, DisplayError> {
    require(image, |b| b.get_image()).map(ColorImage::from_buffer)
}

pub fn display_title<P: DisplayPixel>(image: &Image<P>, title: &str) -> Result<(), DisplayError> {
    forward(image, |b| b.flush_title(title)).map(drop)
}

pub fn display_point<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    color: Color,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_point(i, j, color)).map(drop)
}

pub fn display_cross<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    size: u32,
    color: Color,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_cross(i, j, size, color)).map(drop)
}

pub fn display_cross_large<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    size: u32,
    color: Color,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_cross_large(i, j, size, color)).map(drop)
}

pub fn display_circle<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    r: u32,
    color: Color,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_circle(i, j, r, color)).map(drop)
}

pub fn display_line<P: DisplayPixel>(
    image: &Image<P>,
    i1: i32,
    j1: i32,
    i2: i32,
    j2: i32,
    color: Color,
    thickness: u32,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_line(i1, j1, i2, j2, color, thickness)).map(drop)
}

pub fn display_dot_line<P: DisplayPixel>(
    image: &Image<P>,
    i1: i32,
    j1: i32,
    i2: i32,
    j2: i32,
    color: Color,
    thickness: u32,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_dot_line(i1, j1, i2, j2, color, thickness)).map(drop)
}

#[allow(clippy::too_many_arguments)]
pub fn display_arrow<P: DisplayPixel>(
    image: &Image<P>,
    i1: i32,
    j1: i32,
    i2: i32,
    j2: i32,
    color: Color,
    length: u32,
    width: u32,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_arrow(i1, j1, i2, j2, color, length, width)).map(drop)
}

#[allow(clippy::too_many_arguments)]
pub fn display_rectangle<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    width: u32,
    height: u32,
    color: Color,
    fill: bool,
    thickness: u32,
) -> Result<(), DisplayError> {
    forward(image, |b| {
        b.display_rectangle(i, j, width, height, color, fill, thickness)
    })
    .map(drop)
}

pub fn display_rect<P: DisplayPixel>(
    image: &Image<P>,
    rect: &Rect,
    color: Color,
    fill: bool,
    thickness: u32,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_rect(rect, color, fill, thickness)).map(drop)
}

pub fn display_char_string<P: DisplayPixel>(
    image: &Image<P>,
    i: i32,
    j: i32,
    text: &str,
    color: Color,
) -> Result<(), DisplayError> {
    forward(image, |b| b.display_char_string(i, j, text, color)).map(drop)
}

/// Draws the three axes of the object frame `c_m_o` (pose of the object in
/// the camera frame) as arrows of `size` meters. `Color::None` draws x, y, z
/// in green, blue and red.
pub fn display_frame<P: DisplayPixel>(
    image: &Image<P>,
    c_m_o: &na::Isometry3<f64>,
    cam: &CameraParameters,
    size: f64,
    color: Color,
) -> Result<(), DisplayError> {
    let to_pixel = |p: na::Point3<f64>| cam.project(&(c_m_o * p));
    let Some((ou, ov)) = to_pixel(na::Point3::origin()) else {
        log::warn!("frame origin lies in the camera plane, nothing drawn");
        return Ok(());
    };
    let axes = [
        (na::Point3::new(size, 0.0, 0.0), Color::Green),
        (na::Point3::new(0.0, size, 0.0), Color::Blue),
        (na::Point3::new(0.0, 0.0, size), Color::Red),
    ];
    for (tip, default_color) in axes {
        let Some((u, v)) = to_pixel(tip) else {
            continue;
        };
        let c = if color == Color::None {
            default_color
        } else {
            color
        };
        display_arrow(
            image,
            ov.round() as i32,
            ou.round() as i32,
            v.round() as i32,
            u.round() as i32,
            c,
            DEFAULT_ARROW_LENGTH,
            DEFAULT_ARROW_WIDTH,
        )?;
    }
    Ok(())
}

/// Flushes the overlay; some backends show nothing before this call.
pub fn flush<P: DisplayPixel>(image: &Image<P>) -> Result<(), DisplayError> {
    forward(image, |b| b.flush_display()).map(drop)
}

pub fn close<P: DisplayPixel>(image: &Image<P>) -> Result<(), DisplayError> {
    forward(image, |b| b.close_display()).map(drop)
}

pub fn get_click<P: DisplayPixel>(
    image: &Image<P>,
    blocking: bool,
) -> Result<Option<Click>, DisplayError> {
    forward(image, |b| b.get_click(blocking)).map(Option::flatten)
}

/// `true` when a button was pressed.
pub fn wait_click<P: DisplayPixel>(image: &Image<P>, blocking: bool) -> Result<bool, DisplayError> {
    get_click(image, blocking).map(|c| c.is_some())
}

pub fn get_click_up<P: DisplayPixel>(
    image: &Image<P>,
    blocking: bool,
) -> Result<Option<Click>, DisplayError> {
    forward(image, |b| b.get_click_up(blocking)).map(Option::flatten)
}

pub fn display_point_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    color: Color,
) -> Result<(), DisplayError> {
    display_point(image, v, u, color)
}

pub fn display_cross_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    size: u32,
    color: Color,
) -> Result<(), DisplayError> {
    display_cross(image, v, u, size, color)
}

pub fn display_cross_large_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    size: u32,
    color: Color,
) -> Result<(), DisplayError> {
    display_cross_large(image, v, u, size, color)
}

pub fn display_circle_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    r: u32,
    color: Color,
) -> Result<(), DisplayError> {
    display_circle(image, v, u, r, color)
}

pub fn display_line_uv<P: DisplayPixel>(
    image: &Image<P>,
    u1: i32,
    v1: i32,
    u2: i32,
    v2: i32,
    color: Color,
    thickness: u32,
) -> Result<(), DisplayError> {
    display_line(image, v1, u1, v2, u2, color, thickness)
}

pub fn display_dot_line_uv<P: DisplayPixel>(
    image: &Image<P>,
    u1: i32,
    v1: i32,
    u2: i32,
    v2: i32,
    color: Color,
    thickness: u32,
) -> Result<(), DisplayError> {
    display_dot_line(image, v1, u1, v2, u2, color, thickness)
}

#[allow(clippy::too_many_arguments)]
pub fn display_arrow_uv<P: DisplayPixel>(
    image: &Image<P>,
    u1: i32,
    v1: i32,
    u2: i32,
    v2: i32,
    color: Color,
    length: u32,
    width: u32,
) -> Result<(), DisplayError> {
    display_arrow(image, v1, u1, v2, u2, color, length, width)
}

#[allow(clippy::too_many_arguments)]
pub fn display_rectangle_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    width: u32,
    height: u32,
    color: Color,
    fill: bool,
    thickness: u32,
) -> Result<(), DisplayError> {
    display_rectangle(image, v, u, width, height, color, fill, thickness)
}

pub fn display_char_string_uv<P: DisplayPixel>(
    image: &Image<P>,
    u: i32,
    v: i32,
    text: &str,
    color: Color,
) -> Result<(), DisplayError> {
    display_char_string(image, v, u, text, color)
}

pub fn get_click_uv<P: DisplayPixel>(
    image: &Image<P>,
    blocking: bool,
) -> Result<Option<ClickUv>, DisplayError> {
    get_click(image, blocking).map(|c| c.map(ClickUv::from))
}

pub fn get_click_up_uv<P: DisplayPixel>(
    image: &Image<P>,
    blocking: bool,
) -> Result<Option<ClickUv>, DisplayError> {
    get_click_up(image, blocking).map(|c| c.map(ClickUv::from))
}
