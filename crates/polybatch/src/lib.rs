//! Batching flush engine for heterogeneous GPU drawables.
//!
//! `polybatch` accumulates per-item geometry (sprites, decals, polygons,
//! points) into shared CPU-side vertex/index buffers and submits them to the
//! GPU in as few draw calls as possible. Each item type defines its own vertex
//! layout, texture set, and per-item state needs through the [`Batchable`]
//! trait; the [`PolyBatch`] engine decides when a GPU submission is required
//! (capacity exhausted, texture change, or any fixed-function state change)
//! and the [`RenderState`] reconciler emits only the state transitions that
//! actually changed.
//!
//! # Overview
//!
//! - [`PolyBatch`] - the packer/flush controller
//! - [`RenderState`] - pending/current GPU state vector with minimal-delta apply
//! - [`Batchable`] / [`FixedSizeBatchable`] - the drawable item contract
//! - [`BatchSorter`] - opaque grouping + back-to-front ordering for blended items
//! - [`items`] - concrete item shapes (quads, points, polygons)
//!
//! # Example
//!
//! ```ignore
//! use polybatch::{PolyBatch, items::Quad2d};
//! use polybatch_gpu::ShaderHandle;
//! use std::sync::Arc;
//!
//! let mut batch = PolyBatch::new(Quad2d::new(), 4000, 0, device);
//! batch.set_shader(ShaderHandle(1));
//!
//! batch.begin();
//! batch.item().texture(tex).position(10.0, 20.0).rotation_degrees(45.0);
//! batch.item().texture(tex).position(50.0, 20.0);
//! batch.end();
//! ```
//!
//! A single engine instance must be driven from one thread; sessions
//! (`begin`/`end`) are strictly nested and usage outside a session panics.

pub mod attributes;
pub mod batch;
pub mod batchable;
pub mod color;
pub mod items;
pub mod region;
pub mod sorter;
pub mod state;

pub use attributes::*;
pub use batch::*;
pub use batchable::*;
pub use color::*;
pub use region::*;
pub use sorter::*;
pub use state::*;
