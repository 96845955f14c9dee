use std::time::Instant;

use clap::Parser;
use image::{Luma, Pixel, Rgba};
use indicatif::ProgressBar;
use visual_servo::camera::CameraParameters;
use visual_servo::display::{self, CanvasDisplay, Color, RerunDisplay};
use visual_servo::error::GrabberError;
use visual_servo::feature::{self, FEATURE_ALL, PointFeature};
use visual_servo::grabber::{
    DiskGrabber, FrameGrabber, Framerate, GrabberConfig, IcCompGrabber, SyntheticDevice,
};
use visual_servo::img::{DisplayPixel, Image, SharedBackend};
use visual_servo::io::{self, FrameRecord};

#[derive(Parser)]
#[command(version, about, author)]
struct VsGrabCli {
    /// path to an image folder, frames come from the synthetic device when absent
    #[arg(long)]
    path: Option<String>,

    /// video input port of the grabber
    #[arg(long, default_value_t = 2)]
    input: u32,

    /// decimation factor
    #[arg(long, default_value_t = 2)]
    scale: u32,

    #[arg(long, value_enum, default_value = "25fps")]
    framerate: Framerate,

    /// grabber settings json, replaces input, scale and framerate
    #[arg(long)]
    config: Option<String>,

    /// camera parameters json
    #[arg(long)]
    camera: Option<String>,

    /// acquire color frames
    #[arg(long)]
    color: bool,

    #[arg(long, default_value_t = 50)]
    frames: usize,

    /// depth of the tracked point in meter
    #[arg(long, default_value_t = 1.0)]
    depth: f64,

    /// gain of the control law
    #[arg(long, default_value_t = 0.5)]
    gain: f64,

    /// rerun recording output
    #[arg(long, default_value = "vsgrab.rrd")]
    output: String,

    /// draw into an image and save the last annotated frame there instead of recording
    #[arg(long)]
    png: Option<String>,

    /// json report of the servo loop
    #[arg(long)]
    report: Option<String>,
}

/// Pixel formats the grabbers can fill.
trait Acquire: DisplayPixel {
    fn open(grabber: &mut dyn FrameGrabber, image: &mut Image<Self>) -> Result<(), GrabberError>;
    fn acquire(grabber: &mut dyn FrameGrabber, image: &mut Image<Self>)
    -> Result<(), GrabberError>;
}

impl Acquire for Luma<u8> {
    fn open(grabber: &mut dyn FrameGrabber, image: &mut Image<Self>) -> Result<(), GrabberError> {
        grabber.open_grey(image)
    }
    fn acquire(
        grabber: &mut dyn FrameGrabber,
        image: &mut Image<Self>,
    ) -> Result<(), GrabberError> {
        grabber.acquire_grey(image)
    }
}

impl Acquire for Rgba<u8> {
    fn open(grabber: &mut dyn FrameGrabber, image: &mut Image<Self>) -> Result<(), GrabberError> {
        grabber.open_color(image)
    }
    fn acquire(
        grabber: &mut dyn FrameGrabber,
        image: &mut Image<Self>,
    ) -> Result<(), GrabberError> {
        grabber.acquire_color(image)
    }
}

/// Pixel `(u, v)` of the brightest pixel, the first one found on ties.
fn brightest<P: DisplayPixel>(image: &Image<P>) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32, u8)> = None;
    for (u, v, p) in image.buffer().enumerate_pixels() {
        let l = p.to_luma()[0];
        if best.is_none_or(|(_, _, b)| l > b) {
            best = Some((u, v, l));
        }
    }
    best.map(|(u, v, _)| (u, v))
}

/// Where the annotated frames go.
enum Output {
    Rerun(rerun::RecordingStream),
    Png(String),
}

struct ServoLoop {
    cam: CameraParameters,
    desired: PointFeature,
    depth: f64,
    gain: f64,
}

impl ServoLoop {
    fn step<P: DisplayPixel>(
        &self,
        image: &Image<P>,
        frame: usize,
    ) -> visual_servo::Result<Option<FrameRecord>> {
        display::display(image)?;
        let Some((u, v)) = brightest(image) else {
            log::warn!("frame {} is empty", frame);
            return Ok(None);
        };
        let (x, y) = self.cam.pixel_to_meter(u as f64, v as f64);
        let current = PointFeature::build_from(x, y, self.depth);

        let l = current.interaction(FEATURE_ALL)?;
        let e = current.error(&self.desired, FEATURE_ALL)?;
        let velocity = feature::servo_velocity(&l, &e, self.gain);
        if velocity.is_none() {
            log::warn!("frame {}: interaction matrix not invertible", frame);
        }
        log::debug!("frame {}: {} |e|={:.5}", frame, current, e.norm());

        current.display(&self.cam, image, Color::Green)?;
        self.desired.display(&self.cam, image, Color::Red)?;
        let (du, dv) = self.cam.meter_to_pixel(self.desired.x(), self.desired.y());
        display::display_line_uv(
            image,
            u as i32,
            v as i32,
            du.round() as i32,
            dv.round() as i32,
            Color::Yellow,
            1,
        )?;
        display::display_char_string_uv(
            image,
            10,
            10,
            format!("frame {} |e| = {:.4}", frame, e.norm()).as_str(),
            Color::Yellow,
        )?;
        display::flush(image)?;

        Ok(Some(FrameRecord::new(
            frame,
            current,
            &e,
            velocity.as_ref(),
        )))
    }
}

fn run<P: Acquire>(
    grabber: &mut dyn FrameGrabber,
    servo: &ServoLoop,
    output: &Output,
    frames: usize,
) -> Result<Vec<FrameRecord>, Box<dyn std::error::Error>> {
    let mut image = Image::<P>::default();
    P::open(grabber, &mut image)?;
    log::info!("grabber opened, {}x{}", grabber.cols(), grabber.rows());

    // the image only keeps a weak reference to its display
    let _display: SharedBackend = match output {
        Output::Rerun(recording) => {
            display::attach(&mut image, RerunDisplay::new(recording.clone(), "/cam0"))
        }
        Output::Png(_) => CanvasDisplay::attach(&mut image, "vsgrab"),
    };
    display::display_title(&image, "vsgrab")?;

    let mut records = Vec::with_capacity(frames);
    let pb = ProgressBar::new(frames as u64);
    for frame in 0..frames {
        match P::acquire(grabber, &mut image) {
            Ok(()) => {}
            Err(GrabberError::EndOfSequence(s)) => {
                log::info!("end of sequence after {} frames ({})", frame, s);
                break;
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(record) = servo.step(&image, frame)? {
            records.push(record);
        }
        pb.inc(1);
    }
    pb.finish();
    grabber.close();
    if let Output::Png(path) = output {
        display::get_image(&image)?.buffer().save(path)?;
        log::info!("last frame saved to {}", path);
    }
    display::close(&image)?;
    Ok(records)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = VsGrabCli::parse();

    let config = match &cli.config {
        Some(path) => io::object_from_json::<GrabberConfig>(path)?,
        None => GrabberConfig {
            input: cli.input,
            scale: cli.scale,
            framerate: cli.framerate,
            ..Default::default()
        },
    };
    let cam = match &cli.camera {
        Some(path) => io::object_from_json::<CameraParameters>(path)?,
        None => CameraParameters::default(),
    };
    log::debug!("{:?} {:?}", config, cam);

    let mut grabber: Box<dyn FrameGrabber> = match &cli.path {
        Some(folder) => Box::new(DiskGrabber::new(folder)?),
        None => Box::new(IcCompGrabber::from_config(SyntheticDevice::default, &config)?),
    };

    let servo = ServoLoop {
        cam,
        // on the optical axis
        desired: PointFeature::build_from(0.0, 0.0, cli.depth),
        depth: cli.depth,
        gain: cli.gain,
    };

    let output = match &cli.png {
        Some(path) => Output::Png(path.clone()),
        None => Output::Rerun(rerun::RecordingStreamBuilder::new("vsgrab").save(&cli.output)?),
    };
    let now = Instant::now();
    let records = if cli.color {
        run::<Rgba<u8>>(grabber.as_mut(), &servo, &output, cli.frames)?
    } else {
        run::<Luma<u8>>(grabber.as_mut(), &servo, &output, cli.frames)?
    };
    let duration_sec = now.elapsed().as_secs_f64();
    println!("{} frames processed in {:.6} sec", records.len(), duration_sec);
    if let Some(last) = records.last() {
        println!("final error norm: {:.6}", last.error_norm);
    }

    if let Some(report) = &cli.report {
        io::write_servo_report(report, &records)?;
    }
    Ok(())
}
