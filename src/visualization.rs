use std::io::BufRead;
use std::sync::mpsc::Sender;

use anyhow::Result;
use opencv::core::{Mat, Point, Scalar, Vector};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use tracing::{info, warn};

use crate::frame::Frame;
use crate::marker::DetectedMarker;
use crate::my_types::*;
use crate::recording::Recorder;
use crate::status::{Severity, Status};
use crate::tracker::{Command, FrameReport};

const ARROW_LENGTH: f64 = 40.;
const ARROW_OFFSET: f64 = 25.;

/// Consumer of per-frame results.
pub trait Presenter<I> {
    fn present(&mut self, frame: Frame<I>, report: &FrameReport) -> Result<()>;
}

// BGR
fn bgr(b: f64, g: f64, r: f64) -> Scalar {
    Scalar::new(b, g, r, 0.)
}

pub fn severity_color(severity: Severity) -> Scalar {
    match severity {
        Severity::Ok => bgr(0., 255., 0.),
        // orange
        Severity::Warning => bgr(0., 128., 255.),
        Severity::Alert => bgr(0., 0., 255.),
    }
}

fn to_point(v: Vector2d) -> Point {
    Point::new(v.x.round() as i32, v.y.round() as i32)
}

/// Label anchor up and left of a marker center.
fn label_at(center: Point) -> Point {
    Point::new(center.x - 30, center.y - 15)
}

fn put_text(image: &mut Mat, text: &str, org: Point, scale: f64, color: Scalar, thickness: i32) -> Result<()> {
    imgproc::put_text(
        image,
        text,
        org,
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        color,
        thickness,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_outline(image: &mut Mat, marker: &DetectedMarker, color: Scalar, thickness: i32) -> Result<()> {
    let quad: Vector<Point> = marker.corners.iter().map(|c| to_point(*c)).collect();
    let polygons: Vector<Vector<Point>> = std::iter::once(quad).collect();
    imgproc::polylines(image, &polygons, true, color, thickness, imgproc::LINE_8, 0)?;
    Ok(())
}

/// Short arrow beside the target pointing back towards the reference.
fn direction_arrow(target: Vector2d, reference: Vector2d) -> Option<(Point, Point)> {
    let towards = reference - target;
    let magnitude = towards.norm();
    if magnitude <= 0. {
        return None;
    }
    let unit = towards / magnitude;
    let perpendicular = Vector2d::new(-unit.y, unit.x);
    let start = target + perpendicular * ARROW_OFFSET;
    let end = start + unit * ARROW_LENGTH;
    Some((to_point(start), to_point(end)))
}

fn status_lines(report: &FrameReport, status: &Status) -> [String; 4] {
    let d = report.display_displacement().unwrap_or_default();
    let unit = report.unit.label();
    [
        format!("X: {:.2}{unit} | Y: {:.2}{unit}", d.dx, d.dy),
        format!("Total Disp: {:.2}{unit}", d.total),
        format!("Status: {status}"),
        format!("Still Time: {:.1}s", report.still_for),
    ]
}

fn prompt(report: &FrameReport) -> (&'static str, Scalar) {
    match (report.reference.is_some(), report.automatic, report.center_marker.is_some()) {
        (true, _, _) => ("Center Set. Tracking...", bgr(0., 180., 0.)),
        (false, true, true) => ("Center marker detected - setting reference...", bgr(180., 180., 0.)),
        (false, true, false) => ("Show CENTER marker to set reference", bgr(0., 255., 255.)),
        (false, false, _) => ("Press 'c' to set center", bgr(0., 255., 255.)),
    }
}

/// Paint markers, reference, displacement and status onto the frame.
pub fn draw_overlay(image: &mut Mat, report: &FrameReport) -> Result<()> {
    if let Some(center) = &report.center_marker {
        draw_outline(image, center, bgr(255., 0., 0.), 3)?;
        imgproc::circle(image, to_point(center.center), 8, bgr(255., 0., 0.), imgproc::FILLED, imgproc::LINE_8, 0)?;
        put_text(image, "CENTER", label_at(to_point(center.center)), 0.6, bgr(180., 180., 0.), 2)?;
    }

    if let Some(target) = &report.target {
        let center = to_point(target.center);
        draw_outline(image, target, bgr(0., 255., 0.), 2)?;
        imgproc::circle(image, center, 5, bgr(0., 0., 255.), imgproc::FILLED, imgproc::LINE_8, 0)?;
        put_text(image, "TARGET", label_at(center), 0.6, bgr(0., 180., 0.), 2)?;

        if let (Some(reference), Some(status)) = (report.reference, report.status) {
            imgproc::line(image, to_point(reference), center, bgr(255., 0., 255.), 2, imgproc::LINE_8, 0)?;
            if let Some((start, end)) = direction_arrow(target.center, reference) {
                imgproc::arrowed_line(image, start, end, bgr(255., 255., 255.), 2, imgproc::LINE_8, 0, 0.4)?;
            }
            let [xy, total, label, still] = status_lines(report, &status);
            put_text(image, &xy, Point::new(10, 60), 0.7, bgr(180., 180., 0.), 2)?;
            put_text(image, &total, Point::new(10, 90), 0.7, bgr(180., 180., 0.), 2)?;
            put_text(image, &label, Point::new(10, 120), 0.7, severity_color(status.severity()), 2)?;
            put_text(image, &still, Point::new(10, 150), 0.6, bgr(0., 0., 0.), 1)?;
        }
    }

    let (text, color) = prompt(report);
    put_text(image, text, Point::new(10, 30), 0.8, color, 2)?;
    if let Some(reference) = report.reference {
        let p = to_point(reference);
        imgproc::circle(image, p, 7, bgr(0., 255., 0.), imgproc::FILLED, imgproc::LINE_8, 0)?;
        imgproc::draw_marker(image, p, bgr(255., 255., 255.), imgproc::MARKER_CROSS, 15, 2, imgproc::LINE_8)?;
    }

    let mut visible = vec![];
    if report.center_marker.is_some() {
        visible.push("CENTER");
    }
    if report.target.is_some() {
        visible.push("TARGET");
    }
    if !visible.is_empty() {
        let rows = image.rows();
        let text = format!("Markers: {}", visible.join(", "));
        put_text(image, &text, Point::new(10, rows - 20), 0.6, bgr(180., 180., 180.), 2)?;
    }
    Ok(())
}

pub fn key_command(key: i32) -> Option<Command> {
    match (key & 0xFF) as u8 {
        b'c' => Some(Command::SetCenter),
        b'r' => Some(Command::ResetCenter),
        b'q' => Some(Command::Quit),
        _ => None,
    }
}

/// Read one command per line (`c`, `r` or `q`) until end of input or `q`.
/// Headless live runs have no window to take key presses from.
pub fn forward_line_commands<R: BufRead>(reader: R, commands: &Sender<Command>) -> Result<()> {
    for line in reader.lines() {
        let line = line?;
        let key = match line.trim().as_bytes() {
            [key] => *key as i32,
            [] => continue,
            _ => {
                warn!("unknown command {:?}, expected c, r or q", line.trim());
                continue;
            }
        };
        match key_command(key) {
            Some(command) => {
                if commands.send(command).is_err() || command == Command::Quit {
                    break;
                }
            }
            None => warn!("unknown command {:?}, expected c, r or q", line.trim()),
        }
    }
    Ok(())
}

/// highgui window. Key presses are forwarded as commands.
pub struct WindowPresenter {
    title: String,
    commands: Sender<Command>,
    recorder: Option<Recorder>,
}

impl WindowPresenter {
    pub fn new(title: &str, commands: Sender<Command>, recorder: Option<Recorder>) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            title: title.to_string(),
            commands,
            recorder,
        })
    }
}

impl Presenter<Mat> for WindowPresenter {
    fn present(&mut self, frame: Frame<Mat>, report: &FrameReport) -> Result<()> {
        let mut image = frame.image;
        draw_overlay(&mut image, report)?;
        if let Some(recorder) = &self.recorder {
            recorder.log_report(report)?;
            recorder.log_image(&image)?;
        }
        highgui::imshow(&self.title, &image)?;

        let key = highgui::wait_key(1)?;
        if let Some(command) = key_command(key) {
            let _ = self.commands.send(command);
        }
        Ok(())
    }
}

impl Drop for WindowPresenter {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}

/// Headless presenter: logs status changes, optionally records every frame.
#[derive(Default)]
pub struct LogPresenter {
    recorder: Option<Recorder>,
    last_status: Option<Status>,
}

impl LogPresenter {
    pub fn new(recorder: Option<Recorder>) -> Self {
        Self {
            recorder,
            last_status: None,
        }
    }
}

impl<I> Presenter<I> for LogPresenter {
    fn present(&mut self, _frame: Frame<I>, report: &FrameReport) -> Result<()> {
        if let Some(recorder) = &self.recorder {
            recorder.log_report(report)?;
        }
        if report.status.is_some() && report.status != self.last_status {
            if let (Some(status), Some(d)) = (report.status, report.display_displacement()) {
                info!(
                    "{:.3}s {status}, total {:.2}{}",
                    report.time,
                    d.total,
                    report.unit.label()
                );
            }
        }
        self.last_status = report.status;
        Ok(())
    }
}
