//! Core entity definitions for Snaplist.
//!
//! This crate defines the data types shared across the Snaplist
//! application: the persisted task record and the image handle produced
//! by the camera capture step.

mod task;

pub use task::*;
