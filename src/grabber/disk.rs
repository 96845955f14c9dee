use std::path::{Path, PathBuf};

use glob::glob;
use image::{DynamicImage, ImageReader};

use super::FrameGrabber;
use crate::error::GrabberError;
use crate::img::{ColorImage, GreyImage};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pgm"];

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    let p = rp.ok()?;
    let ext = p.extension()?.to_string_lossy().to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(p)
}

fn load(path: &Path) -> Result<DynamicImage, GrabberError> {
    log::trace!("reading {}", path.display());
    Ok(ImageReader::open(path)?.decode()?)
}

/// Replays a sequence of image files sorted by name as if they came from a
/// camera.
#[derive(Debug, Clone)]
pub struct DiskGrabber {
    paths: Vec<PathBuf>,
    next: usize,
    repeat: bool,
    opened: bool,
    rows: u32,
    cols: u32,
}

impl DiskGrabber {
    /// Collects the images found directly in `folder`.
    pub fn new(folder: &str) -> Result<DiskGrabber, GrabberError> {
        let img_paths = glob(format!("{}/*", folder).as_str())?;
        let mut sorted_path: Vec<PathBuf> = img_paths.into_iter().filter_map(img_filter).collect();
        sorted_path.sort();
        if sorted_path.is_empty() {
            return Err(GrabberError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no image found in {}", folder),
            )));
        }
        log::debug!("{} images found in {}", sorted_path.len(), folder);
        Ok(Self::from_paths(sorted_path))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> DiskGrabber {
        DiskGrabber {
            paths,
            next: 0,
            repeat: false,
            opened: false,
            rows: 0,
            cols: 0,
        }
    }

    /// Restart from the first image once the sequence is exhausted.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Index of the next image to be acquired.
    pub fn position(&self) -> usize {
        self.next
    }

    fn open_first(&mut self) -> Result<(u32, u32), GrabberError> {
        let first = self
            .paths
            .first()
            .ok_or_else(|| GrabberError::EndOfSequence("empty sequence".to_string()))?;
        let img = load(first)?;
        self.rows = img.height();
        self.cols = img.width();
        self.next = 0;
        self.opened = true;
        Ok((self.rows, self.cols))
    }

    fn next_image(&mut self) -> Result<DynamicImage, GrabberError> {
        if !self.opened {
            log::error!("disk grabber not initialized");
            return Err(GrabberError::Initialization(
                "disk grabber not initialized".to_string(),
            ));
        }
        if self.next >= self.paths.len() {
            if !self.repeat || self.paths.is_empty() {
                return Err(GrabberError::EndOfSequence(format!(
                    "{} images",
                    self.paths.len()
                )));
            }
            self.next = 0;
        }
        let img = load(&self.paths[self.next])?;
        self.next += 1;
        if img.height() != self.rows || img.width() != self.cols {
            log::warn!(
                "image size changed from {}x{} to {}x{}",
                self.cols,
                self.rows,
                img.width(),
                img.height()
            );
            self.rows = img.height();
            self.cols = img.width();
        }
        Ok(img)
    }
}

impl FrameGrabber for DiskGrabber {
    fn open_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError> {
        let (rows, cols) = self.open_first()?;
        image.resize(rows, cols);
        Ok(())
    }

    fn open_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError> {
        let (rows, cols) = self.open_first()?;
        image.resize(rows, cols);
        Ok(())
    }

    fn acquire_grey(&mut self, image: &mut GreyImage) -> Result<(), GrabberError> {
        let img = self.next_image()?;
        image.set_buffer(img.to_luma8());
        Ok(())
    }

    fn acquire_color(&mut self, image: &mut ColorImage) -> Result<(), GrabberError> {
        let img = self.next_image()?;
        image.set_buffer(img.to_rgba8());
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.next = 0;
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn cols(&self) -> u32 {
        self.cols
    }
}
