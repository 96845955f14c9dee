use super::device::{CaptureDevice, ChromaOrder};
use crate::error::GrabberError;

/// Full frame size of a PAL capture card.
pub const PAL_WIDTH: u32 = 768;
pub const PAL_HEIGHT: u32 = 576;

/// Capture device generating a deterministic test pattern.
///
/// Fields are reported following a cyclic pattern, odd then even by default.
/// The grey pattern holds a bright square moving with the frame index, which
/// is convenient to track.
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    full_width: u32,
    full_height: u32,
    camera: u32,
    decimation: u32,
    buffers: u32,
    depth: u32,
    chroma_order: ChromaOrder,
    initialized: bool,
    fields: Vec<bool>,
    frame_index: u64,
    buffer: Vec<u8>,
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new(PAL_WIDTH, PAL_HEIGHT)
    }
}

impl SyntheticDevice {
    pub fn new(full_width: u32, full_height: u32) -> SyntheticDevice {
        SyntheticDevice {
            full_width,
            full_height,
            camera: 0,
            decimation: 1,
            buffers: 1,
            depth: 8,
            chroma_order: ChromaOrder::Normal,
            initialized: false,
            fields: vec![false, true],
            frame_index: 0,
            buffer: Vec::new(),
        }
    }

    /// Replaces the cyclic field pattern. An empty pattern reports odd fields
    /// only.
    pub fn with_fields(mut self, fields: Vec<bool>) -> SyntheticDevice {
        self.fields = fields;
        self
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    pub fn buffers(&self) -> u32 {
        self.buffers
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of frames acquired so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Grey level of pixel `(i, j)` in frame number `frame`.
    pub fn grey_level(&self, i: u32, j: u32, frame: u64) -> u8 {
        let side = (self.width() / 8).max(1);
        let top = (frame as u32 * 3) % self.height().max(1);
        let left = (frame as u32 * 5) % self.width().max(1);
        if (top..top + side).contains(&i) && (left..left + side).contains(&j) {
            255
        } else {
            ((i + j + self.camera * 16) % 128) as u8
        }
    }

    fn render(&mut self) {
        let (w, h) = (self.width(), self.height());
        let frame = self.frame_index;
        self.buffer = if self.depth == 8 {
            (0..h)
                .flat_map(|i| (0..w).map(move |j| (i, j)))
                .map(|(i, j)| self.grey_level(i, j, frame))
                .collect()
        } else {
            // YCbCr 4:2:2, chroma varies along rows and columns
            let mut buf = Vec::with_capacity((w * h * 2) as usize);
            for i in 0..h {
                for j in 0..w {
                    let chroma = if j % 2 == 0 {
                        (j * 255 / w.max(1)) as u8
                    } else {
                        (i * 255 / h.max(1)) as u8
                    };
                    let luma = 16 + ((i + j + frame as u32) % 220) as u8;
                    buf.extend_from_slice(&[chroma, luma]);
                }
            }
            buf
        };
    }
}

impl CaptureDevice for SyntheticDevice {
    fn set_camera(&mut self, input: u32) {
        self.camera = input;
    }

    fn set_decimation(&mut self, factor: u32) {
        self.decimation = factor.max(1);
    }

    fn decimation(&self) -> u32 {
        self.decimation
    }

    fn set_buffers(&mut self, count: u32) {
        self.buffers = count;
    }

    fn set_depth(&mut self, bits: u32) {
        self.depth = bits;
    }

    fn set_chroma_order(&mut self, order: ChromaOrder) {
        self.chroma_order = order;
    }

    fn chroma_order(&self) -> ChromaOrder {
        self.chroma_order
    }

    fn init(&mut self) -> Result<(), GrabberError> {
        if self.depth != 8 && self.depth != 16 {
            return Err(GrabberError::Setting(format!(
                "unsupported pixel depth {}",
                self.depth
            )));
        }
        self.initialized = true;
        Ok(())
    }

    fn width(&self) -> u32 {
        self.full_width / self.decimation
    }

    fn height(&self) -> u32 {
        self.full_height / self.decimation
    }

    fn acquire(&mut self) -> Result<bool, GrabberError> {
        if !self.initialized {
            return Err(GrabberError::Initialization(
                "synthetic device not initialized".to_string(),
            ));
        }
        self.render();
        let field = if self.fields.is_empty() {
            false
        } else {
            self.fields[(self.frame_index % self.fields.len() as u64) as usize]
        };
        self.frame_index += 1;
        Ok(field)
    }

    fn frame(&self) -> &[u8] {
        &self.buffer
    }
}
