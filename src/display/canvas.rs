use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use image::buffer::ConvertBuffer;
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};

use super::{Click, Color, DisplayBackend, arrow_segments};
use crate::error::DisplayError;
use crate::img::{Image, ImageView};

const DASH: f64 = 3.0;

/// Text drawn on the canvas. Strings are kept aside since the raster has no
/// font to render them with.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    pub i: i32,
    pub j: i32,
    pub text: String,
    pub color: Color,
}

/// Off-screen display rasterizing every overlay into an RGBA canvas.
///
/// Mouse events are replayed from queues filled with
/// [`CanvasDisplay::push_click`] and [`CanvasDisplay::push_click_up`].
#[derive(Debug, Default)]
pub struct CanvasDisplay {
    canvas: RgbaImage,
    title: String,
    texts: Vec<TextAnnotation>,
    clicks: VecDeque<Click>,
    releases: VecDeque<Click>,
    flush_count: usize,
    closed: bool,
}

impl CanvasDisplay {
    pub fn new(rows: u32, cols: u32) -> CanvasDisplay {
        CanvasDisplay {
            canvas: RgbaImage::new(cols, rows),
            ..Default::default()
        }
    }

    /// Creates a canvas the size of `image` and attaches it.
    pub fn attach<P: Pixel<Subpixel = u8>>(
        image: &mut Image<P>,
        title: &str,
    ) -> Rc<RefCell<CanvasDisplay>> {
        let mut display = CanvasDisplay::new(image.rows(), image.cols());
        display.title = title.to_string();
        super::attach(image, display)
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn texts(&self) -> &[TextAnnotation] {
        &self.texts
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn push_click(&mut self, click: Click) {
        self.clicks.push_back(click);
    }

    pub fn push_click_up(&mut self, click: Click) {
        self.releases.push_back(click);
    }

    fn segment(&mut self, from: (f64, f64), to: (f64, f64), rgba: Rgba<u8>, thickness: u32) {
        let t = thickness.max(1);
        let vertical = (to.0 - from.0).abs() > (to.1 - from.1).abs();
        for k in 0..t {
            let off = k as f64 - (t - 1) as f64 / 2.0;
            let (di, dj) = if vertical { (0.0, off) } else { (off, 0.0) };
            draw_line_segment_mut(
                &mut self.canvas,
                ((from.1 + dj) as f32, (from.0 + di) as f32),
                ((to.1 + dj) as f32, (to.0 + di) as f32),
                rgba,
            );
        }
    }

    fn cross(&mut self, i: i32, j: i32, size: u32, rgba: Rgba<u8>, thickness: u32) {
        let half = (size / 2) as f64;
        let (i, j) = (i as f64, j as f64);
        self.segment((i - half, j), (i + half, j), rgba, thickness);
        self.segment((i, j - half), (i, j + half), rgba, thickness);
    }
}

impl DisplayBackend for CanvasDisplay {
    fn display_image(&mut self, image: ImageView<'_>) -> Result<(), DisplayError> {
        self.canvas = match image {
            ImageView::Grey(buffer) => buffer.convert(),
            ImageView::Color(buffer) => buffer.clone(),
        };
        Ok(())
    }

    fn flush_title(&mut self, title: &str) -> Result<(), DisplayError> {
        self.title = title.to_string();
        Ok(())
    }

    fn get_image(&mut self) -> Result<RgbaImage, DisplayError> {
        Ok(self.canvas.clone())
    }

    fn display_point(&mut self, i: i32, j: i32, color: Color) -> Result<(), DisplayError> {
        let Some(rgba) = color.to_rgba() else {
            return Ok(());
        };
        if i >= 0 && j >= 0 && (j as u32) < self.canvas.width() && (i as u32) < self.canvas.height()
        {
            self.canvas.put_pixel(j as u32, i as u32, rgba);
        }
        Ok(())
    }

    fn display_cross(
        &mut self,
        i: i32,
        j: i32,
        size: u32,
        color: Color,
    ) -> Result<(), DisplayError> {
        if let Some(rgba) = color.to_rgba() {
            self.cross(i, j, size, rgba, 1);
        }
        Ok(())
    }

    fn display_cross_large(
        &mut self,
        i: i32,
        j: i32,
        size: u32,
        color: Color,
    ) -> Result<(), DisplayError> {
        if let Some(rgba) = color.to_rgba() {
            self.cross(i, j, size, rgba, 3);
        }
        Ok(())
    }

    fn display_circle(
        &mut self,
        i: i32,
        j: i32,
        r: u32,
        color: Color,
    ) -> Result<(), DisplayError> {
        if let Some(rgba) = color.to_rgba() {
            draw_hollow_circle_mut(&mut self.canvas, (j, i), r as i32, rgba);
        }
        Ok(())
    }

    fn display_line(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        thickness: u32,
    ) -> Result<(), DisplayError> {
        if let Some(rgba) = color.to_rgba() {
            self.segment(
                (i1 as f64, j1 as f64),
                (i2 as f64, j2 as f64),
                rgba,
                thickness,
            );
        }
        Ok(())
    }

    fn display_dot_line(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        thickness: u32,
    ) -> Result<(), DisplayError> {
        let Some(rgba) = color.to_rgba() else {
            return Ok(());
        };
        let (di, dj) = ((i2 - i1) as f64, (j2 - j1) as f64);
        let length = (di * di + dj * dj).sqrt();
        if length == 0.0 {
            return self.display_point(i1, j1, color);
        }
        let at = |s: f64| (i1 as f64 + di * s / length, j1 as f64 + dj * s / length);
        let mut s = 0.0;
        while s < length {
            let e = (s + DASH).min(length);
            self.segment(at(s), at(e), rgba, thickness);
            s += 2.0 * DASH;
        }
        Ok(())
    }

    fn display_arrow(
        &mut self,
        i1: i32,
        j1: i32,
        i2: i32,
        j2: i32,
        color: Color,
        length: u32,
        width: u32,
    ) -> Result<(), DisplayError> {
        if let Some(rgba) = color.to_rgba() {
            for (from, to) in arrow_segments(i1, j1, i2, j2, length, width) {
                self.segment(from, to, rgba, 1);
            }
        }
        Ok(())
    }

    fn display_rectangle(
        &mut self,
        i: i32,
        j: i32,
        width: u32,
        height: u32,
        color: Color,
        fill: bool,
        thickness: u32,
    ) -> Result<(), DisplayError> {
        let Some(rgba) = color.to_rgba() else {
            return Ok(());
        };
        if width == 0 || height == 0 {
            return Ok(());
        }
        if fill {
            let rect = imageproc::rect::Rect::at(j, i).of_size(width, height);
            draw_filled_rect_mut(&mut self.canvas, rect, rgba);
            return Ok(());
        }
        for k in 0..thickness.max(1) {
            if width <= 2 * k || height <= 2 * k {
                break;
            }
            let rect = imageproc::rect::Rect::at(j + k as i32, i + k as i32)
                .of_size(width - 2 * k, height - 2 * k);
            draw_hollow_rect_mut(&mut self.canvas, rect, rgba);
        }
        Ok(())
    }

    fn display_char_string(
        &mut self,
        i: i32,
        j: i32,
        text: &str,
        color: Color,
    ) -> Result<(), DisplayError> {
        log::debug!("text at ({}, {}): {}", i, j, text);
        self.texts.push(TextAnnotation {
            i,
            j,
            text: text.to_string(),
            color,
        });
        Ok(())
    }

    fn flush_display(&mut self) -> Result<(), DisplayError> {
        self.flush_count += 1;
        log::trace!("canvas '{}' flushed {} times", self.title, self.flush_count);
        Ok(())
    }

    fn close_display(&mut self) -> Result<(), DisplayError> {
        self.closed = true;
        Ok(())
    }

    fn get_click(&mut self, blocking: bool) -> Result<Option<Click>, DisplayError> {
        let click = self.clicks.pop_front();
        if click.is_none() && blocking {
            log::warn!("blocking click requested but no event is queued");
        }
        Ok(click)
    }

    fn get_click_up(&mut self, blocking: bool) -> Result<Option<Click>, DisplayError> {
        let click = self.releases.pop_front();
        if click.is_none() && blocking {
            log::warn!("blocking click release requested but no event is queued");
        }
        Ok(click)
    }
}
