use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgba, RgbaImage};

use crate::display::DisplayBackend;

pub type GreyImage = Image<Luma<u8>>;
pub type ColorImage = Image<Rgba<u8>>;

/// A display backend shared between its owner and the images it is attached to.
pub type SharedBackend = Rc<RefCell<dyn DisplayBackend>>;

/// Borrowed view of an image in one of the two supported pixel formats.
pub enum ImageView<'a> {
    Grey(&'a GrayImage),
    Color(&'a RgbaImage),
}

/// Pixel formats that can be handed to a display backend.
pub trait DisplayPixel: Pixel<Subpixel = u8> + 'static {
    fn view(buffer: &ImageBuffer<Self, Vec<u8>>) -> ImageView<'_>;
}

impl DisplayPixel for Luma<u8> {
    fn view(buffer: &GrayImage) -> ImageView<'_> {
        ImageView::Grey(buffer)
    }
}

impl DisplayPixel for Rgba<u8> {
    fn view(buffer: &RgbaImage) -> ImageView<'_> {
        ImageView::Color(buffer)
    }
}

/// Image addressed by (row `i`, column `j`).
///
/// An image may carry a weak reference to the display it is shown in. The
/// image never keeps the display alive: once the owner drops the backend,
/// the image behaves as if nothing was attached.
#[derive(Clone)]
pub struct Image<P: Pixel<Subpixel = u8>> {
    buffer: ImageBuffer<P, Vec<u8>>,
    display: Option<Weak<RefCell<dyn DisplayBackend>>>,
}

impl<P: Pixel<Subpixel = u8>> Image<P> {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self::from_buffer(ImageBuffer::new(cols, rows))
    }

    pub fn from_buffer(buffer: ImageBuffer<P, Vec<u8>>) -> Self {
        Image {
            buffer,
            display: None,
        }
    }

    pub fn rows(&self) -> u32 {
        self.buffer.height()
    }

    pub fn cols(&self) -> u32 {
        self.buffer.width()
    }

    /// Reallocates a zero filled buffer when the size changes. The display
    /// attachment is kept.
    pub fn resize(&mut self, rows: u32, cols: u32) {
        if self.rows() != rows || self.cols() != cols {
            self.buffer = ImageBuffer::new(cols, rows);
        }
    }

    pub fn buffer(&self) -> &ImageBuffer<P, Vec<u8>> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ImageBuffer<P, Vec<u8>> {
        &mut self.buffer
    }

    /// Swaps in a new pixel buffer, keeping the display attachment.
    pub fn set_buffer(&mut self, buffer: ImageBuffer<P, Vec<u8>>) {
        self.buffer = buffer;
    }

    pub fn into_buffer(self) -> ImageBuffer<P, Vec<u8>> {
        self.buffer
    }

    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn pixel(&self, i: u32, j: u32) -> &P {
        self.buffer.get_pixel(j, i)
    }

    pub fn pixel_mut(&mut self, i: u32, j: u32) -> &mut P {
        self.buffer.get_pixel_mut(j, i)
    }

    pub fn attach_display(&mut self, backend: &SharedBackend) {
        self.display = Some(Rc::downgrade(backend));
    }

    pub fn detach_display(&mut self) {
        self.display = None;
    }

    /// The attached backend, if any and still alive.
    pub fn display_backend(&self) -> Option<SharedBackend> {
        self.display.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_display(&self) -> bool {
        self.display_backend().is_some()
    }
}

impl<P: DisplayPixel> Image<P> {
    pub fn view(&self) -> ImageView<'_> {
        P::view(&self.buffer)
    }
}

impl<P: Pixel<Subpixel = u8>> Default for Image<P> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<P: Pixel<Subpixel = u8>> fmt::Debug for Image<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("rows", &self.rows())
            .field("cols", &self.cols())
            .field("display", &self.has_display())
            .finish()
    }
}
