use anyhow::Result;

use crate::my_types::*;

/// One unit of input: an image (or whatever the detector consumes) and the
/// monotonic time it was captured at.
#[derive(Clone, Debug)]
pub struct Frame<I> {
    pub time: Timestamp,
    pub image: I,
}

/// Blocking producer of frames.
pub trait FrameSource {
    type Image;

    /// `Ok(None)` marks a regular end of stream, `Err` an unreadable source.
    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>>;

    /// Number of frames left, when known up front.
    fn length(&self) -> Option<u64> {
        None
    }
}
