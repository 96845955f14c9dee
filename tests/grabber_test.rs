use std::cell::Cell;
use std::rc::Rc;

use image::Rgba;
use visual_servo::error::GrabberError;
use visual_servo::grabber::convert::ycbcr422_to_bgra;
use visual_servo::grabber::{
    CaptureDevice, ChromaOrder, FrameGrabber, Framerate, GrabberConfig, IcCompGrabber,
    SyntheticDevice,
};
use visual_servo::img::{ColorImage, GreyImage};

const W: u32 = 64;
const H: u32 = 48;

fn small_device() -> SyntheticDevice {
    SyntheticDevice::new(W, H)
}

fn counting_grabber() -> (IcCompGrabber<SyntheticDevice>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let grabber = IcCompGrabber::new(move || {
        c.set(c.get() + 1);
        small_device()
    });
    (grabber, count)
}

#[test]
fn test_set_input() {
    let mut grabber = IcCompGrabber::new(small_device);
    assert_eq!(grabber.input(), 2);
    assert!(matches!(grabber.set_input(4), Err(GrabberError::Setting(_))));
    assert_eq!(grabber.input(), 2);

    grabber.set_input(0).unwrap();
    assert_eq!(grabber.input(), 0);
    assert_eq!(grabber.device().unwrap().camera(), 0);

    // the channel survives the device recreation of the color path
    let mut image = ColorImage::default();
    grabber.open_color(&mut image).unwrap();
    assert_eq!(grabber.device().unwrap().camera(), 0);
}

#[test]
fn test_set_scale() {
    let mut grabber = IcCompGrabber::new(small_device);
    assert!(matches!(grabber.set_scale(0), Err(GrabberError::Setting(_))));
    assert!(matches!(grabber.set_scale(17), Err(GrabberError::Setting(_))));
    assert_eq!(grabber.scale(), 2);

    grabber.set_scale(1).unwrap();
    assert_eq!(grabber.device().unwrap().decimation(), 1);
    grabber.set_scale(16).unwrap();
    assert_eq!(grabber.scale(), 16);
    assert_eq!(grabber.device().unwrap().decimation(), 16);
}

#[test]
fn test_scale_change_requires_reopen() {
    let mut grabber = IcCompGrabber::new(small_device);
    let mut color = ColorImage::default();
    grabber.open_color(&mut color).unwrap();
    assert_eq!((color.rows(), color.cols()), (H / 2, W / 2));

    // same scale keeps the session
    grabber.set_scale(2).unwrap();
    assert!(grabber.is_open());
    grabber.acquire_color(&mut color).unwrap();

    grabber.set_scale(4).unwrap();
    assert!(!grabber.is_open());
    assert!(matches!(
        grabber.acquire_color(&mut color),
        Err(GrabberError::Initialization(_))
    ));
    assert_eq!((color.rows(), color.cols()), (H / 2, W / 2));

    grabber.open_color(&mut color).unwrap();
    grabber.acquire_color(&mut color).unwrap();
    assert_eq!((color.rows(), color.cols()), (H / 4, W / 4));

    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    grabber.set_scale(1).unwrap();
    assert!(matches!(
        grabber.acquire_grey(&mut grey),
        Err(GrabberError::Initialization(_))
    ));
    grabber.open_grey(&mut grey).unwrap();
    grabber.acquire_grey(&mut grey).unwrap();
    assert_eq!((grey.rows(), grey.cols()), (H, W));
}

#[test]
fn test_with_settings_rejects_bad_values() {
    assert!(IcCompGrabber::with_settings(small_device, 3, 4).is_ok());
    assert!(IcCompGrabber::with_settings(small_device, 5, 4).is_err());
    assert!(IcCompGrabber::with_settings(small_device, 0, 20).is_err());
}

#[test]
fn test_from_config() {
    let config: GrabberConfig =
        serde_json::from_str(r#"{"scale": 4, "framerate": "50fps"}"#).unwrap();
    assert_eq!(config.input, 2);
    assert_eq!(config.max_field_retries, 64);

    let grabber = IcCompGrabber::from_config(small_device, &config).unwrap();
    assert_eq!(grabber.scale(), 4);
    assert_eq!(grabber.framerate(), Framerate::Fps50);

    let bad = GrabberConfig {
        scale: 0,
        ..Default::default()
    };
    assert!(IcCompGrabber::from_config(small_device, &bad).is_err());
}

#[test]
fn test_acquire_before_open() {
    let mut grabber = IcCompGrabber::new(small_device);
    let mut grey = GreyImage::default();
    let mut color = ColorImage::default();
    assert!(matches!(
        grabber.acquire_grey(&mut grey),
        Err(GrabberError::Initialization(_))
    ));
    assert!(matches!(
        grabber.acquire_color(&mut color),
        Err(GrabberError::Initialization(_))
    ));
    assert!(!grabber.is_open());
}

#[test]
fn test_close_then_acquire() {
    let mut grabber = IcCompGrabber::new(small_device);
    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    grabber.acquire_grey(&mut grey).unwrap();
    grabber.close();
    assert!(grabber.device().is_none());
    assert!(matches!(
        grabber.acquire_grey(&mut grey),
        Err(GrabberError::Initialization(_))
    ));

    let mut color = ColorImage::default();
    grabber.open_color(&mut color).unwrap();
    grabber.close();
    assert!(matches!(
        grabber.acquire_color(&mut color),
        Err(GrabberError::Initialization(_))
    ));
}

#[test]
fn test_open_grey_configures_device() {
    let mut grabber = IcCompGrabber::new(small_device);
    let mut image = GreyImage::default();
    grabber.open_grey(&mut image).unwrap();
    assert_eq!((image.rows(), image.cols()), (H / 2, W / 2));
    assert_eq!((grabber.rows(), grabber.cols()), (H / 2, W / 2));
    let device = grabber.device().unwrap();
    assert_eq!(device.buffers(), 2);
    assert_eq!(device.depth(), 8);
    assert_eq!(device.chroma_order(), ChromaOrder::Normal);

    grabber.set_scale(1).unwrap();
    grabber.open_grey(&mut image).unwrap();
    assert_eq!((image.rows(), image.cols()), (H, W));
    assert_eq!(grabber.device().unwrap().buffers(), 1);
}

#[test]
fn test_color_open_recreates_device() {
    let (mut grabber, count) = counting_grabber();
    assert_eq!(count.get(), 1);

    let mut color = ColorImage::default();
    grabber.open_color(&mut color).unwrap();
    assert_eq!(count.get(), 2);
    grabber.open_color(&mut color).unwrap();
    assert_eq!(count.get(), 3);

    // grey open reuses the live handle
    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    assert_eq!(count.get(), 3);

    grabber.close();
    grabber.open_grey(&mut grey).unwrap();
    assert_eq!(count.get(), 4);
}

#[test]
fn test_open_color_configures_device() {
    let mut grabber = IcCompGrabber::with_settings(small_device, 1, 4).unwrap();
    let mut image = ColorImage::default();
    grabber.open_color(&mut image).unwrap();
    assert_eq!((image.rows(), image.cols()), (H / 4, W / 4));
    let device = grabber.device().unwrap();
    assert_eq!(device.decimation(), 1);
    assert_eq!(device.buffers(), 1);
    assert_eq!(device.depth(), 16);
    assert_eq!(device.camera(), 1);

    // grey open puts the hardware decimation back
    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    assert_eq!(grabber.device().unwrap().decimation(), 4);
    assert_eq!((grey.rows(), grey.cols()), (H / 4, W / 4));
}

#[test]
fn test_color_decimation() {
    for scale in [1, 2, 3, 4] {
        let mut grabber = IcCompGrabber::with_settings(small_device, 0, scale).unwrap();
        let mut image = ColorImage::default();
        grabber.open_color(&mut image).unwrap();
        grabber.acquire_color(&mut image).unwrap();
        assert_eq!((image.rows(), image.cols()), (H / scale, W / scale));

        let (hw_rows, hw_cols) = (H as usize, W as usize);
        let mut bgra = vec![0u8; hw_rows * hw_cols * 4];
        let device = grabber.device().unwrap();
        ycbcr422_to_bgra(device.frame(), hw_rows, hw_cols, ChromaOrder::Normal, &mut bgra)
            .unwrap();

        for i in 0..image.rows() {
            for j in 0..image.cols() {
                let idx = ((i * scale) as usize * hw_cols + (j * scale) as usize) * 4;
                assert_eq!(
                    image.pixel(i, j),
                    &Rgba([bgra[idx + 2], bgra[idx + 1], bgra[idx], 255]),
                    "scale {} pixel ({}, {})",
                    scale,
                    i,
                    j
                );
            }
        }
    }
}

#[test]
fn test_grey_acquire_keeps_even_field_at_25fps() {
    let mut grabber = IcCompGrabber::new(small_device);
    let mut image = GreyImage::default();
    grabber.open_grey(&mut image).unwrap();
    grabber.acquire_grey(&mut image).unwrap();
    assert!(grabber.get_field());
    let device = grabber.device().unwrap();
    // odd field of frame 0 was skipped
    assert_eq!(device.frame_count(), 2);
    let last = device.frame_count() - 1;
    for (i, j) in [(0, 0), (3, 7), (H / 2 - 1, W / 2 - 1)] {
        assert_eq!(image.pixel(i, j)[0], device.grey_level(i, j, last));
    }
}

#[test]
fn test_grey_acquire_at_50fps_keeps_first_field() {
    let mut grabber = IcCompGrabber::new(small_device);
    grabber.set_framerate(Framerate::Fps50);
    let mut image = GreyImage::default();
    grabber.open_grey(&mut image).unwrap();
    grabber.acquire_grey(&mut image).unwrap();
    assert!(!grabber.get_field());
    assert_eq!(grabber.device().unwrap().frame_count(), 1);
    grabber.acquire_grey(&mut image).unwrap();
    assert!(grabber.get_field());
}

#[test]
fn test_grey_acquire_without_decimation_keeps_first_field() {
    let mut grabber = IcCompGrabber::with_settings(small_device, 2, 1).unwrap();
    let mut image = GreyImage::default();
    grabber.open_grey(&mut image).unwrap();
    grabber.acquire_grey(&mut image).unwrap();
    assert!(!grabber.get_field());
    assert_eq!(grabber.device().unwrap().frame_count(), 1);
}

#[test]
fn test_field_sync_is_bounded() {
    let mut grabber =
        IcCompGrabber::new(|| SyntheticDevice::new(W, H).with_fields(vec![false]));
    grabber.set_max_field_retries(3);
    let mut image = GreyImage::default();
    grabber.open_grey(&mut image).unwrap();
    let err = grabber.acquire_grey(&mut image).unwrap_err();
    assert!(matches!(err, GrabberError::FieldSync { retries: 3 }));
    assert_eq!(grabber.device().unwrap().frame_count(), 4);
}

/// Device delivering frames shorter than announced.
struct TruncatedDevice {
    decimation: u32,
    buffer: Vec<u8>,
}

impl CaptureDevice for TruncatedDevice {
    fn set_camera(&mut self, _input: u32) {}
    fn set_decimation(&mut self, factor: u32) {
        self.decimation = factor;
    }
    fn decimation(&self) -> u32 {
        self.decimation
    }
    fn set_buffers(&mut self, _count: u32) {}
    fn set_depth(&mut self, _bits: u32) {}
    fn set_chroma_order(&mut self, _order: ChromaOrder) {}
    fn chroma_order(&self) -> ChromaOrder {
        ChromaOrder::Normal
    }
    fn init(&mut self) -> Result<(), GrabberError> {
        Ok(())
    }
    fn width(&self) -> u32 {
        8
    }
    fn height(&self) -> u32 {
        8
    }
    fn acquire(&mut self) -> Result<bool, GrabberError> {
        self.buffer = vec![0; 10];
        Ok(true)
    }
    fn frame(&self) -> &[u8] {
        &self.buffer
    }
}

#[test]
fn test_short_frame_is_reported() {
    let connect = || TruncatedDevice {
        decimation: 1,
        buffer: Vec::new(),
    };
    let mut grabber = IcCompGrabber::new(connect);
    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    assert!(matches!(
        grabber.acquire_grey(&mut grey),
        Err(GrabberError::FrameSize {
            expected: 64,
            actual: 10
        })
    ));

    let mut color = ColorImage::default();
    grabber.open_color(&mut color).unwrap();
    assert!(matches!(
        grabber.acquire_color(&mut color),
        Err(GrabberError::FrameSize {
            expected: 128,
            actual: 10
        })
    ));
}

/// Synthetic device whose `init` can be switched to fail.
struct FailingInitDevice {
    inner: SyntheticDevice,
    fail: Rc<Cell<bool>>,
}

impl CaptureDevice for FailingInitDevice {
    fn set_camera(&mut self, input: u32) {
        self.inner.set_camera(input)
    }
    fn set_decimation(&mut self, factor: u32) {
        self.inner.set_decimation(factor)
    }
    fn decimation(&self) -> u32 {
        self.inner.decimation()
    }
    fn set_buffers(&mut self, count: u32) {
        self.inner.set_buffers(count)
    }
    fn set_depth(&mut self, bits: u32) {
        self.inner.set_depth(bits)
    }
    fn set_chroma_order(&mut self, order: ChromaOrder) {
        self.inner.set_chroma_order(order)
    }
    fn chroma_order(&self) -> ChromaOrder {
        self.inner.chroma_order()
    }
    fn init(&mut self) -> Result<(), GrabberError> {
        if self.fail.get() {
            return Err(GrabberError::Initialization("board not responding".into()));
        }
        self.inner.init()
    }
    fn width(&self) -> u32 {
        self.inner.width()
    }
    fn height(&self) -> u32 {
        self.inner.height()
    }
    fn acquire(&mut self) -> Result<bool, GrabberError> {
        self.inner.acquire()
    }
    fn frame(&self) -> &[u8] {
        self.inner.frame()
    }
}

#[test]
fn test_failed_grey_reopen_closes_session() {
    let fail = Rc::new(Cell::new(false));
    let switch = fail.clone();
    let mut grabber = IcCompGrabber::new(move || FailingInitDevice {
        inner: small_device(),
        fail: switch.clone(),
    });
    let mut grey = GreyImage::default();
    grabber.open_grey(&mut grey).unwrap();
    grabber.acquire_grey(&mut grey).unwrap();

    fail.set(true);
    assert!(grabber.open_grey(&mut grey).is_err());
    assert!(!grabber.is_open());
    assert!(matches!(
        grabber.acquire_grey(&mut grey),
        Err(GrabberError::Initialization(_))
    ));

    fail.set(false);
    grabber.open_grey(&mut grey).unwrap();
    grabber.acquire_grey(&mut grey).unwrap();
}

#[test]
fn test_synthetic_device_requires_init() {
    let mut device = small_device();
    assert!(matches!(
        device.acquire(),
        Err(GrabberError::Initialization(_))
    ));
    device.set_depth(12);
    assert!(matches!(device.init(), Err(GrabberError::Setting(_))));
    device.set_depth(16);
    device.init().unwrap();
    assert!(device.acquire().is_ok());
    assert_eq!(device.frame().len(), (W * H * 2) as usize);
}
