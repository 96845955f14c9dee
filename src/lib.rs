pub mod camera;
pub mod display;
pub mod error;
pub mod feature;
pub mod grabber;
pub mod img;
pub mod io;

pub use error::{Error, Result};
