#![forbid(unsafe_code)]

pub mod model;
pub mod round;
pub mod time;

pub use time::Clock;
