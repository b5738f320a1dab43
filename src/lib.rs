pub mod calibration;
pub mod camera;
pub mod config;
pub mod dataset;
pub mod detector;
pub mod displacement;
pub mod frame;
pub mod marker;
pub mod my_types;
pub mod recording;
pub mod reference;
pub mod session;
pub mod stationary;
pub mod status;
pub mod tracker;
pub mod visualization;
