use crate::error::GrabberError;

use super::convert;

/// Order of the chroma samples in a YCbCr 4:2:2 pixel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaOrder {
    /// Cb Y0 Cr Y1
    #[default]
    Normal,
    /// Cr Y0 Cb Y1
    Inverted,
}

/// Vendor SDK boundary of a capture card.
///
/// Dimensions reported by the device already account for the hardware
/// decimation. Grey frames hold one byte per pixel, color frames are
/// YCbCr 4:2:2 with two bytes per pixel.
pub trait CaptureDevice {
    /// Selects the video input port.
    fn set_camera(&mut self, input: u32);
    fn set_decimation(&mut self, factor: u32);
    fn decimation(&self) -> u32;
    fn set_buffers(&mut self, count: u32);
    /// Bits per pixel, 8 for grey and 16 for YCbCr.
    fn set_depth(&mut self, bits: u32);
    fn set_chroma_order(&mut self, order: ChromaOrder);
    fn chroma_order(&self) -> ChromaOrder;
    /// Applies the configuration. Must be called before acquiring.
    fn init(&mut self) -> Result<(), GrabberError>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Blocks until the next frame and returns its field, `true` for even.
    fn acquire(&mut self) -> Result<bool, GrabberError>;
    /// Raw content of the last acquired frame.
    fn frame(&self) -> &[u8];

    /// Converts a YCbCr 4:2:2 frame into BGRA.
    fn convert_to_bgra(
        &self,
        raw: &[u8],
        rows: usize,
        cols: usize,
        out: &mut [u8],
    ) -> Result<(), GrabberError> {
        convert::ycbcr422_to_bgra(raw, rows, cols, self.chroma_order(), out)
    }
}
