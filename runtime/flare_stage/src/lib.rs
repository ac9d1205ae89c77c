//! Flare Stage - a small in-memory scene graph.
//!
//! The VM only sees the [`DisplayObject`](flare_value::DisplayObject)
//! contract. This crate supplies a reference implementation of it, good
//! enough for tests and the command-line runner:
//!
//! - [`Clip`]: a movie clip with a [`Timeline`], a transform, and
//!   depth-ordered children
//! - [`ClipHandle`]: the script-visible [`Object`](flare_value::Object)
//!   paired with its [`Clip`]
//! - [`Stage`]: the numbered levels (`_level0`, `_level1`, ...)
//!
//! There is no rendering and no tag parsing; clips are assembled by hand.

mod clip;
mod stage;
mod timeline;

pub use clip::{Clip, ClipHandle};
pub use stage::Stage;
pub use timeline::{Frame, Timeline};
