//! Render pipelines of the viewer.
//!
//! - `basic` holds the shared pipeline builder and the lit model pipeline
//! - `light` holds the light uniform and its bind group
//! - `axes` draws the axis helper as a line list

pub mod axes;
pub mod basic;
pub mod light;
