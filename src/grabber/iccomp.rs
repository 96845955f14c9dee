use super::convert;
use super::device::{CaptureDevice, ChromaOrder};
use super::{FrameGrabber, Framerate, GrabberConfig};
use crate::error::GrabberError;
use crate::img::{ColorImage, GreyImage};

pub const DEFAULT_INPUT: u32 = 2;
pub const DEFAULT_SCALE: u32 = 2;
const MAX_INPUT: u32 = 3;
const MAX_SCALE: u32 = 16;

fn not_initialized() -> GrabberError {
    log::error!("IC-Comp not initialized");
    GrabberError::Initialization("IC-Comp not initialized".to_string())
}

/// Driver of an IC-Comp frame grabber.
///
/// The device handle is created through `connect`, dropped on
/// [`IcCompGrabber::close`] and created again on the next open. Color
/// acquisition always starts from a fresh handle with hardware decimation
/// off; decimation is then applied in software.
pub struct IcCompGrabber<D: CaptureDevice> {
    connect: Box<dyn FnMut() -> D>,
    device: Option<D>,
    input: u32,
    scale: u32,
    framerate: Framerate,
    max_field_retries: u32,
    opened: bool,
    /// Software decimation applied by the color path, fixed at open.
    color_scale: u32,
    rows: u32,
    cols: u32,
    field: bool,
}

impl<D: CaptureDevice> IcCompGrabber<D> {
    /// Grabber on the default input and scale, at 25 fps.
    pub fn new(connect: impl FnMut() -> D + 'static) -> IcCompGrabber<D> {
        let mut connect: Box<dyn FnMut() -> D> = Box::new(connect);
        let mut device = connect();
        device.set_camera(DEFAULT_INPUT);
        device.set_decimation(DEFAULT_SCALE);
        IcCompGrabber {
            connect,
            device: Some(device),
            input: DEFAULT_INPUT,
            scale: DEFAULT_SCALE,
            framerate: Framerate::Fps25,
            max_field_retries: GrabberConfig::default().max_field_retries,
            opened: false,
            color_scale: DEFAULT_SCALE,
            rows: 0,
            cols: 0,
            field: false,
        }
    }

    pub fn with_settings(
        connect: impl FnMut() -> D + 'static,
        input: u32,
        scale: u32,
    ) -> Result<IcCompGrabber<D>, GrabberError> {
        let mut grabber = Self::new(connect);
        grabber.set_input(input)?;
        grabber.set_scale(scale)?;
        Ok(grabber)
    }

    pub fn from_config(
        connect: impl FnMut() -> D + 'static,
        config: &GrabberConfig,
    ) -> Result<IcCompGrabber<D>, GrabberError> {
        let mut grabber = Self::with_settings(connect, config.input, config.scale)?;
        grabber.set_framerate(config.framerate);
        grabber.max_field_retries = config.max_field_retries;
        Ok(grabber)
    }

    /// Selects the video port, between 0 and 3.
    pub fn set_input(&mut self, input: u32) -> Result<(), GrabberError> {
        if input > MAX_INPUT {
            log::error!(
                "wrong input {}, IC-Comp frame grabber has only {} input channels",
                input,
                MAX_INPUT + 1
            );
            return Err(GrabberError::Setting(format!("wrong input channel {}", input)));
        }
        self.input = input;
        if let Some(device) = self.device.as_mut() {
            device.set_camera(input);
        }
        Ok(())
    }

    pub fn input(&self) -> u32 {
        self.input
    }

    /// Sets the decimation factor, between 1 and 16.
    ///
    /// A new scale changes the frame size: an opened grabber has to be
    /// opened again before the next acquisition.
    pub fn set_scale(&mut self, scale: u32) -> Result<(), GrabberError> {
        if !(1..=MAX_SCALE).contains(&scale) {
            log::error!("wrong scale {}, scale should be between 1 and {}", scale, MAX_SCALE);
            return Err(GrabberError::Setting(format!("wrong scale {}", scale)));
        }
        if self.opened && scale != self.scale {
            log::warn!("scale changed from {} to {}, grabber must be opened again", self.scale, scale);
            self.opened = false;
        }
        self.scale = scale;
        if let Some(device) = self.device.as_mut() {
            device.set_decimation(scale);
        }
        Ok(())
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn set_framerate(&mut self, framerate: Framerate) {
        self.framerate = framerate;
    }

    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    pub fn set_max_field_retries(&mut self, retries: u32) {
        self.max_field_retries = retries;
    }

    /// Field of the last acquired frame, `true` for the even field. Only
    /// meaningful at 50 fps.
    pub fn get_field(&self) -> bool {
        self.field
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// The device handle, `None` once closed.
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    fn device_or_connect(&mut self) -> &mut D {
        let (input, scale) = (self.input, self.scale);
        let connect = &mut self.connect;
        self.device.get_or_insert_with(|| {
            log::debug!("creating IC-Comp handle on input {}", input);
            let mut device = connect();
            device.set_camera(input);
            device.set_decimation(scale);
            device
        })
    }

    fn opened_device(&mut self) -> Result<&mut D, GrabberError> {
        if !self.opened {
            return Err(not_initialized());
        }
        self.device.as_mut().ok_or_else(not_initialized)
    }
}

impl<D: CaptureDevice> FrameGrabber for IcCompGrabber<D> {
    fn open_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError> {
        self.opened = false;
        let scale = self.scale;
        let device = self.device_or_connect();
        device.set_decimation(scale);
        let buffers = if device.decimation() == 1 { 1 } else { 2 };
        device.set_buffers(buffers);
        device.set_depth(8);
        device.set_chroma_order(ChromaOrder::Normal);
        device.init()?;
        let (rows, cols) = (device.height(), device.width());

        log::debug!(
            "IC-Comp opened for grey images {}x{} ({} buffers)",
            cols,
            rows,
            buffers
        );
        self.rows = rows;
        self.cols = cols;
        image.resize(rows, cols);
        self.opened = true;
        Ok(())
    }

    fn open_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError> {
        self.device = None;
        self.opened = false;
        let device = self.device_or_connect();
        device.set_decimation(1);
        device.set_buffers(1);
        device.set_depth(16);
        device.set_chroma_order(ChromaOrder::Normal);
        device.init()?;
        let (height, width) = (device.height(), device.width());

        self.color_scale = self.scale;
        self.rows = height / self.color_scale;
        self.cols = width / self.color_scale;
        log::debug!(
            "IC-Comp opened for color images {}x{} (software scale {})",
            self.cols,
            self.rows,
            self.scale
        );
        image.resize(self.rows, self.cols);
        self.opened = true;
        Ok(())
    }

    fn acquire_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError> {
        let (rows, cols) = (self.rows, self.cols);
        let (framerate, max_retries) = (self.framerate, self.max_field_retries);
        let device = self.opened_device()?;

        let mut even = device.acquire()?;
        if framerate == Framerate::Fps25 && device.decimation() != 1 {
            // with decimation only the even field is kept
            let mut retries = 0;
            while !even {
                if retries >= max_retries {
                    log::error!("no even field after {} acquisitions", retries);
                    return Err(GrabberError::FieldSync { retries });
                }
                even = device.acquire()?;
                retries += 1;
            }
        }

        let len = rows as usize * cols as usize;
        let frame = device.frame();
        if frame.len() < len {
            return Err(GrabberError::FrameSize {
                expected: len,
                actual: frame.len(),
            });
        }
        image.resize(rows, cols);
        image.as_raw_mut().copy_from_slice(&frame[..len]);
        self.field = even;
        log::trace!("grey frame acquired, field {}", even as u8);
        Ok(())
    }

    fn acquire_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError> {
        let (rows, cols, scale) = (self.rows, self.cols, self.color_scale);
        let device = self.opened_device()?;

        let even = device.acquire()?;
        let (hw_rows, hw_cols) = (device.height() as usize, device.width() as usize);
        // freed on every exit path
        let mut bgra = vec![0u8; hw_rows * hw_cols * 4];
        device.convert_to_bgra(device.frame(), hw_rows, hw_cols, &mut bgra)?;

        image.set_buffer(convert::decimate_bgra(&bgra, hw_cols, rows, cols, scale)?);
        self.field = even;
        log::trace!("color frame acquired, field {}", even as u8);
        Ok(())
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            log::debug!("IC-Comp handle released");
        }
        self.opened = false;
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn cols(&self) -> u32 {
        self.cols
    }
}
