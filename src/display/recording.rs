use std::f64::consts::TAU;
use std::io::Cursor;

use image::buffer::ConvertBuffer;
use image::RgbaImage;
use rerun::{RecordingStream, TimeCell};

use super::{Click, Color, DisplayBackend, arrow_segments};
use crate::error::DisplayError;
use crate::img::ImageView;

const CIRCLE_SEGMENTS: usize = 32;

/// rerun use top left corner as (0, 0)
fn rerun_shift(i: f64, j: f64) -> [f32; 2] {
    [j as f32 + 0.5, i as f32 + 0.5]
}

fn rerun_color(color: Color) -> Option<rerun::Color> {
    color
        .to_rgba()
        .map(|c| rerun::Color::from_unmultiplied_rgba(c[0], c[1], c[2], c[3]))
}

fn backend_error<E: std::fmt::Display>(e: E) -> DisplayError {
    DisplayError::Backend(e.to_string())
}

/// Display logging images and overlays to a rerun recording.
///
/// Overlays accumulate until the next image is displayed and are sent on
/// [`DisplayBackend::flush_display`]. The viewer is not interactive from
/// here, click queries always return `None`.
pub struct RerunDisplay {
    recording: RecordingStream,
    topic: String,
    frame: i64,
    last_image: RgbaImage,
    points: Vec<([f32; 2], rerun::Color)>,
    strips: Vec<(Vec<[f32; 2]>, rerun::Color)>,
    labels: Vec<([f32; 2], String, rerun::Color)>,
}

impl RerunDisplay {
    pub fn new(recording: RecordingStream, topic: &str) -> RerunDisplay {
        RerunDisplay {
            recording,
            topic: topic.to_string(),
            frame: 0,
            last_image: RgbaImage::default(),
            points: Vec::new(),
            strips: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Number of frames logged so far.
    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// Overlay items waiting for the next flush.
    pub fn pending_overlays(&self) -> usize {
        self.points.len() + self.strips.len() + self.labels.len()
    }

    fn push_segment(&mut self, from: (f64, f64), to: (f64, f64), color: rerun::Color) {
        self.strips.push((
            vec![rerun_shift(from.0, from.1), rerun_shift(to.0, to.1)],
            color,
        ));
    }

    fn log_overlay(&self) -> Result<(), DisplayError> {
        let (pts, colors): (Vec<_>, Vec<_>) = self.points.iter().cloned().unzip();
        self.recording
            .log(
                format!("{}/overlay/points", self.topic),
                &rerun::Points2D::new(pts)
                    .with_colors(colors)
                    .with_radii([rerun::Radius::new_ui_points(2.0)]),
            )
            .map_err(backend_error)?;

        let (strips, colors): (Vec<_>, Vec<_>) = self.strips.iter().cloned().unzip();
        self.recording
            .log(
                format!("{}/overlay/lines", self.topic),
                &rerun::LineStrips2D::new(strips).with_colors(colors),
            )
            .map_err(backend_error)?;

        let (pts, texts, colors) = self.labels.iter().cloned().fold(
            (Vec::new(), Vec::new(), Vec::new()),
            |(mut p, mut t, mut c), (pt, text, color)| {
                p.push(pt);
                t.push(text);
                c.push(color);
                (p, t, c)
            },
        );
        self.recording
            .log(
                format!("{}/overlay/labels", self.topic),
                &rerun::Points2D::new(pts)
                    .with_colors(colors)
                    .with_labels(texts)
                    .with_radii([rerun::Radius::new_ui_points(0.5)]),
            )
            .map_err(backend_error)
    }
}

impl DisplayBackend for RerunDisplay {
    fn display_image(&mut self, image: ImageView<'_>) -> Result<(), DisplayError> {
        let mut bytes: Vec<u8> = Vec::new();
        let format = image::ImageFormat::Png;
        self.last_image = match image {
            ImageView::Grey(buffer) => {
                buffer
                    .write_to(&mut Cursor::new(&mut bytes), format)
                    .map_err(backend_error)?;
                buffer.convert()
            }
            ImageView::Color(buffer) => {
                buffer
                    .write_to(&mut Cursor::new(&mut bytes), format)
                    .map_err(backend_error)?;
                buffer.clone()
            }
        };
        self.points.clear();
        self.strips.clear();
        self.labels.clear();

        self.frame += 1;
        self.recording
            .set_time("frame", TimeCell::from_sequence(self.frame));
        self.recording
            .log(
                format!("{}/image", self.topic),
                &rerun::EncodedImage::from_file_contents(bytes),
            )
            .map_err(backend_error)
    }

    fn flush_title(&mut self, title: &str) -> Result<(), DisplayError> {
        self.recording
            .log(format!("{}/title", self.topic), &rerun::TextLog::new(title))
            .map_err(backend_error)
    }

    fn get_image(&mut self) -> Result<RgbaImage, DisplayError> {
        Ok(self.last_image.clone())
    }

    fn display_point(&mut self, i: i32, j: i32, color: Color) -> Result<(), DisplayError> {
        if let Some(c) = rerun_color(color) {
            self.points.push((rerun_shift(i as f64, j as f64), c));
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
        if let Some(c) = rerun_color(color) {
            let half = (size / 2) as f64;
            let (i, j) = (i as f64, j as f64);
            self.push_segment((i - half, j), (i + half, j), c);
            self.push_segment((i, j - half), (i, j + half), c);
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
        self.display_cross(i, j, size, color)
    }

    fn display_circle(
        &mut self,
        i: i32,
        j: i32,
        r: u32,
        color: Color,
    ) -> Result<(), DisplayError> {
        if let Some(c) = rerun_color(color) {
            let r = r as f64;
            let strip = (0..=CIRCLE_SEGMENTS)
                .map(|k| {
                    let a = TAU * k as f64 / CIRCLE_SEGMENTS as f64;
                    rerun_shift(i as f64 + r * a.sin(), j as f64 + r * a.cos())
                })
                .collect();
            self.strips.push((strip, c));
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
        _thickness: u32,
    ) -> Result<(), DisplayError> {
        if let Some(c) = rerun_color(color) {
            self.push_segment((i1 as f64, j1 as f64), (i2 as f64, j2 as f64), c);
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
        // no dash pattern in the viewer
        self.display_line(i1, j1, i2, j2, color, thickness)
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
        if let Some(c) = rerun_color(color) {
            for (from, to) in arrow_segments(i1, j1, i2, j2, length, width) {
                self.push_segment(from, to, c);
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
        _thickness: u32,
    ) -> Result<(), DisplayError> {
        if fill {
            log::debug!("filled rectangles are drawn as outlines in rerun");
        }
        if let Some(c) = rerun_color(color) {
            let (top, left) = (i as f64, j as f64);
            let (bottom, right) = (top + height as f64, left + width as f64);
            let strip = vec![
                rerun_shift(top, left),
                rerun_shift(top, right),
                rerun_shift(bottom, right),
                rerun_shift(bottom, left),
                rerun_shift(top, left),
            ];
            self.strips.push((strip, c));
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
        let c = rerun_color(color).unwrap_or(rerun::Color::from_unmultiplied_rgba(0, 0, 0, 0));
        self.labels
            .push((rerun_shift(i as f64, j as f64), text.to_string(), c));
        Ok(())
    }

    fn flush_display(&mut self) -> Result<(), DisplayError> {
        log::trace!(
            "flushing {} points, {} lines, {} labels to {}",
            self.points.len(),
            self.strips.len(),
            self.labels.len(),
            self.topic
        );
        self.log_overlay()
    }

    fn close_display(&mut self) -> Result<(), DisplayError> {
        log::debug!("closing rerun display {}", self.topic);
        self.points.clear();
        self.strips.clear();
        self.labels.clear();
        Ok(())
    }

    fn get_click(&mut self, _blocking: bool) -> Result<Option<Click>, DisplayError> {
        Ok(None)
    }

    fn get_click_up(&mut self, _blocking: bool) -> Result<Option<Click>, DisplayError> {
        Ok(None)
    }
}
