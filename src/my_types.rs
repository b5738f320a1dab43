use nalgebra as na;

/// Pixel coordinates, x to the right and y down.
pub type Vector2d = na::Vector2::<f64>;

/// Seconds on a monotonic clock.
pub type Timestamp = f64;
