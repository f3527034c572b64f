//! GPU device boundary for the polybatch engine.
//!
//! This crate owns the types that cross the CPU/GPU boundary:
//!
//! - Opaque resource handles ([`TextureHandle`], [`ShaderHandle`]) for
//!   externally managed textures and shader programs.
//! - Fixed-function state values ([`BlendFactor`], [`DepthFunc`], [`CullFace`])
//!   and the [`Primitive`] topology enum.
//! - The [`DrawDevice`] trait abstracting buffer uploads, draw calls, and
//!   render-state changes.
//! - `RecordingDevice` (behind the `mock` feature), which records every device
//!   call for verification in tests.
//!
//! # Design Philosophy
//!
//! ## Object Safety
//!
//! `DrawDevice` is object-safe (`dyn DrawDevice`), so the engine can hold an
//! `Arc<dyn DrawDevice>` and run unchanged against a real backend or the mock.
//!
//! ## Interior Mutability
//!
//! Trait methods take `&self`. Mock implementations use `Mutex` internally so
//! recording works through a shared reference.

pub mod device;
#[cfg(feature = "mock")]
pub mod mock;
pub mod types;

pub use device::*;
#[cfg(feature = "mock")]
pub use mock::*;
pub use types::*;
