//! Studio storefront core
//!
//! Headless application core for a digital art and animation studio's shop:
//! service catalog, persisted cart, checkout with attachments, custom request
//! intake with a deposit, authentication, order history and an admin
//! dashboard. The same flows run against an in-process backend, a hosted
//! backend-as-a-service or a self-hosted database.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod app;
pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod services;
pub mod storage;

pub use app::{Storefront, View};
pub use backend::Backend;
pub use config::AppConfig;
pub use errors::ServiceError;
