pub mod convert;
pub mod device;
pub mod disk;
pub mod iccomp;
pub mod synthetic;

pub use device::{CaptureDevice, ChromaOrder};
pub use disk::DiskGrabber;
pub use iccomp::IcCompGrabber;
pub use synthetic::SyntheticDevice;

use serde::{Deserialize, Serialize};

use crate::error::GrabberError;
use crate::img::{ColorImage, GreyImage};

/// Acquisition framerate of a field based device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Framerate {
    /// Full frames; with decimation only even fields are kept.
    #[default]
    #[serde(rename = "25fps")]
    #[value(name = "25fps")]
    Fps25,
    /// Every field is returned.
    #[serde(rename = "50fps")]
    #[value(name = "50fps")]
    Fps50,
}

/// Settings of a frame grabber, loadable from a json file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    pub input: u32,
    pub scale: u32,
    pub framerate: Framerate,
    /// Acquisitions allowed while waiting for an even field.
    pub max_field_retries: u32,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            input: iccomp::DEFAULT_INPUT,
            scale: iccomp::DEFAULT_SCALE,
            framerate: Framerate::Fps25,
            max_field_retries: 64,
        }
    }
}

/// Source of grey level or color frames.
pub trait FrameGrabber {
    /// Initializes the device for grey level acquisition and sizes `image`.
    fn open_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError>;
    /// Initializes the device for color acquisition and sizes `image`.
    fn open_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError>;
    fn acquire_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError>;
    fn acquire_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError>;
    fn close(&mut self);
    fn rows(&self) -> u32;
    fn cols(&self) -> u32;
}
