//! Task persistence for Snaplist
//!
//! This crate provides the storage layer behind the Snaplist photo to-do
//! app. One [`TaskStore`] contract is implemented by two backends chosen
//! by the execution environment: a key-value JSON document store for the
//! browser runtime and an embedded SQLite database for native devices.
//! [`TaskService`] selects a backend once at construction and exposes the
//! uniform operation set to the presentation layer.

mod error;
mod image;
mod kv;
mod service;
mod sqlite;
mod traits;
mod web;

pub use error::*;
pub use image::*;
pub use kv::*;
pub use service::*;
pub use sqlite::*;
pub use traits::*;
pub use web::*;
