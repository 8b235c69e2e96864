//! Last-mile delivery route analysis.
//!
//! Loads delivery routes (stops, packages, vehicles and the planned and
//! actual visiting orders), measures how far each route deviates from the
//! straight line, and summarizes whole datasets for export.
//!
//! # Domain Model
//!
//! - [`Package`](domain::Package): dimensions, scan status, weight and price
//! - [`Stop`](domain::Stop): location, type, time window and packages
//! - [`Vehicle`](domain::Vehicle): name and volume capacity
//! - [`Route`](domain::Route): stop arena with planned and actual sequences
//! - [`Analysis`](analysis::Analysis): a named set of routes
//!
//! # Metrics
//!
//! - **Euclidean distances**: great-circle leg lengths of a sequence
//! - **Driving distances**: leg lengths from OSRM, a street graph, Google
//!   Maps or a precomputed [`DistanceMatrix`](distance_matrix::DistanceMatrix)
//! - **Circuity factor**: driving over great-circle distance, per leg and
//!   for the whole sequence
//! - **Shape**: bounding box, centroid dispersion and minimum rotated rectangle
//! - **Street orientation**: entropy and order of a street graph's bearings

pub mod amazon;
pub mod analysis;
pub mod api;
pub mod config;
pub mod console;
pub mod converters;
pub mod demo_data;
pub mod distance;
pub mod distance_matrix;
pub mod domain;
pub mod dto;
pub mod error;
pub mod geocode;
pub mod geometry;
pub mod metrics;
pub mod orientation;
pub mod routing;
pub mod service;
