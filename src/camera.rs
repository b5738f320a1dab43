use std::time::Instant;

use anyhow::{bail, Context as AnyhowContext, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::info;

use crate::frame::{Frame, FrameSource};

/// Live capture device. Frames are stamped with a monotonic clock started
/// when the device was opened.
pub struct CameraSource {
    capture: VideoCapture,
    clock: Instant,
}

impl CameraSource {
    pub fn open(index: i32) -> Result<Self> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open camera {index}"))?;
        if !capture.is_opened()? {
            bail!("Cannot open camera {index}");
        }
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        info!("camera {index} opened at {width}x{height}");

        Ok(Self {
            capture,
            clock: Instant::now(),
        })
    }
}

impl FrameSource for CameraSource {
    type Image = Mat;

    fn next_frame(&mut self) -> Result<Option<Frame<Mat>>> {
        let mut image = Mat::default();
        let ok = self.capture.read(&mut image).context("Failed to read frame")?;
        let size = image.size()?;
        if !ok || size.width <= 0 || size.height <= 0 {
            bail!("Can't receive frame from camera");
        }
        Ok(Some(Frame {
            time: self.clock.elapsed().as_secs_f64(),
            image,
        }))
    }
}
