use std::sync::mpsc::Receiver;

use anyhow::Result;
use tracing::{info, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::Config;
use crate::detector::MarkerDetector;
use crate::frame::FrameSource;
use crate::status::Status;
use crate::tracker::{Command, Tracker};
use crate::visualization::Presenter;

#[derive(Debug, Default)]
pub struct SessionSummary {
    /// frames read from the source
    pub frames: u64,
    /// frames that produced a report
    pub reports: u64,
    pub last_status: Option<Status>,
    pub quit: bool,
}

/// Single-threaded monitoring loop: read, detect, track, present, then poll
/// one operator command.
pub struct Session<S, D, P> {
    source: S,
    detector: D,
    presenter: P,
    commands: Receiver<Command>,
    tracker: Tracker,
}

impl<S, D, P> Session<S, D, P>
where
    S: FrameSource,
    D: MarkerDetector<S::Image>,
    P: Presenter<S::Image>,
{
    pub fn new(config: &Config, source: S, detector: D, presenter: P, commands: Receiver<Command>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            detector,
            presenter,
            commands,
            tracker: Tracker::new(config),
        })
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Runs until the source ends or a quit command arrives. A failing source
    /// ends the session with its error.
    pub fn run(&mut self) -> Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        loop {
            let frame = match self.source.next_frame()? {
                Some(frame) => frame,
                None => {
                    info!("end of stream after {} frames", summary.frames);
                    break;
                }
            };
            summary.frames += 1;
            Span::current().pb_inc(1);

            let markers = self.detector.detect(&frame.image)?;
            if let Some(report) = self.tracker.process(frame.time, &markers) {
                summary.reports += 1;
                if report.status.is_some() {
                    summary.last_status = report.status;
                }
                self.presenter.present(frame, &report)?;
            }

            if let Ok(command) = self.commands.try_recv() {
                if !self.tracker.handle(command) {
                    info!("quit requested");
                    summary.quit = true;
                    break;
                }
            }
        }
        Ok(summary)
    }
}
