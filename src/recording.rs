use std::path::Path;

use anyhow::Result;
use ndarray as nd;
use opencv as cv2;
use opencv::prelude::*;
use rerun::{RecordingStream, RecordingStreamBuilder};

use crate::tracker::FrameReport;

trait AsArray {
    fn try_as_array(&self) -> Result<nd::Array3<u8>>;
}

impl AsArray for cv2::core::Mat {
    fn try_as_array(&self) -> Result<nd::Array3<u8>> {
        let bytes = self.data_bytes()?;
        let size = self.size()?;
        let a = nd::ArrayView3::from_shape((size.height as usize, size.width as usize, 3), bytes)?;
        Ok(a.to_owned())
    }
}

/// Session recording to a rerun `.rrd` file, on a `time` timeline in seconds.
pub struct Recorder {
    stream: RecordingStream,
}

impl Recorder {
    pub fn save(path: &Path) -> Result<Self> {
        let stream = RecordingStreamBuilder::new("marker_drift").save(path)?;
        Ok(Self { stream })
    }

    pub fn log_report(&self, report: &FrameReport) -> Result<()> {
        self.stream.set_time_seconds("time", report.time);
        self.stream.log("still_for", &rerun::Scalar::new(report.still_for))?;

        if let Some(d) = report.display_displacement() {
            self.stream.log("displacement/total", &rerun::Scalar::new(d.total))?;
            self.stream.log("displacement/x", &rerun::Scalar::new(d.dx))?;
            self.stream.log("displacement/y", &rerun::Scalar::new(d.dy))?;
        }
        if let Some(status) = report.status {
            self.stream.log("status", &rerun::TextLog::new(status.to_string()))?;
        }
        Ok(())
    }

    /// Log an annotated BGR frame.
    pub fn log_image(&self, image: &cv2::core::Mat) -> Result<()> {
        let mut rgb = cv2::core::Mat::default();
        cv2::imgproc::cvt_color(image, &mut rgb, cv2::imgproc::COLOR_BGR2RGB, 0)?;
        let array = rgb.try_as_array()?;
        self.stream.log("camera/image", &rerun::Image::try_from(array)?)?;
        Ok(())
    }
}
