//! Adapter utilities for the `collection-view` crate.
//!
//! The `collection-view` crate is UI-agnostic and owns the grouped tree. This crate provides
//! small, framework-neutral helpers commonly needed by hosts that render it:
//!
//! - Flattening the expanded tree into a list of headers and rows with pixel offsets
//! - Scroll anchoring across inserts, removals, collapses and re-wraps
//! - A controller that turns view events into display list rebuilds and scroll requests
//!
//! This crate is intentionally framework-agnostic (no ratatui/egui bindings).
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod anchor;
mod controller;
mod display;


pub use anchor::{ScrollAnchor, apply_anchor, capture_first_visible_anchor};
pub use controller::Controller;
pub use display::{DisplayEntry, DisplayList, row_extent};
