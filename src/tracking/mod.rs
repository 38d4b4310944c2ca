//! Focus sessions and everything that watches the user while one is running.

pub mod activity;
pub mod analysis;
pub mod distraction;
pub mod idle;
pub mod monitor;
pub mod tracker;
