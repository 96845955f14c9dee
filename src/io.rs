use std::io::Write;

use nalgebra as na;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;
use crate::feature::PointFeature;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// State of the control loop for one acquired frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: usize,
    pub feature: PointFeature,
    pub error: Vec<f64>,
    pub error_norm: f64,
    /// Camera velocity screw `(vx, vy, vz, wx, wy, wz)`, absent when the
    /// interaction matrix could not be inverted.
    pub velocity: Option<Vec<f64>>,
}

impl FrameRecord {
    pub fn new(
        frame: usize,
        feature: PointFeature,
        error: &na::DVector<f64>,
        velocity: Option<&na::DVector<f64>>,
    ) -> FrameRecord {
        FrameRecord {
            frame,
            feature,
            error: error.iter().copied().collect(),
            error_norm: error.norm(),
            velocity: velocity.map(|v| v.iter().copied().collect()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServoReport {
    pub frame_count: usize,
    pub final_error_norm: Option<f64>,
    pub records: Vec<FrameRecord>,
}

/// Writes the per frame servo records to a JSON file.
pub fn write_servo_report(output_path: &str, records: &[FrameRecord]) -> Result<()> {
    let report = ServoReport {
        frame_count: records.len(),
        final_error_norm: records.last().map(|r| r.error_norm),
        records: records.to_vec(),
    };
    object_to_json(output_path, &report)?;
    log::info!("servo report of {} frames written to {}", records.len(), output_path);
    Ok(())
}
