//! # xcagent-core
//!
//! Core library for a UI-automation agent that drives the platform's private
//! accessibility-testing framework.
//!
//! This crate provides the two pieces of low-level plumbing the agent's
//! higher layers depend on: access to framework symbols that are not part of
//! the public interface, and a corrected interaction point for UI elements.
//!
//! ## Modules
//!
//! - [`symbols`] - Name-based symbol lookup in loaded binary images
//! - [`config`] - Symbol-name table: which external names to try per role
//! - [`bridge`] - Write-once table of resolved private symbols
//! - [`element`] - Geometry and the read-only element snapshot interface
//! - [`hit_point`] - Hit-point correction for element snapshots
//!
//! ## Example
//!
//! ```no_run
//! use xcagent_core::bridge;
//! use xcagent_core::element::{ElementFrame, SnapshotRecord};
//! use xcagent_core::hit_point::HitPointResolver;
//!
//! // Once, during process bootstrap
//! let symbols = bridge::initialize_default().expect("private symbols unavailable");
//! println!("is-visible attribute: {:?}", symbols.is_visible_attribute());
//!
//! // Per element
//! let snapshot = SnapshotRecord::new(ElementFrame::new(0.0, 0.0, 100.0, 44.0));
//! if let Some(point) = HitPointResolver::default().resolve(&snapshot) {
//!     println!("tap at ({}, {})", point.x, point.y);
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod element;
pub mod hit_point;
pub mod symbols;
