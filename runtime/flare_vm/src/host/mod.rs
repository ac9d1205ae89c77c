//! Services the VM asks of its embedder.
//!
//! Everything that leaves the VM (clock, randomness, drag, trace output,
//! network requests, `fscommand`) goes through the [`Host`] trait. The
//! engine never touches the outside world directly.

mod headless;

use flare_value::Object;

pub use headless::{BufferTraceSink, HeadlessHost, HostEvent, StdoutTraceSink, TraceSink};

/// Constraint rectangle of a drag, in parent coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DragBounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// A drag started by `StartDrag`.
#[derive(Clone, Debug, PartialEq)]
pub struct DragState {
    pub target: Object,
    /// Snap the clip's registration point to the pointer.
    pub lock_center: bool,
    pub bounds: Option<DragBounds>,
}

/// How `GetURL2` sends timeline variables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SendVars {
    #[default]
    None,
    Get,
    Post,
}

/// A `GetURL`/`GetURL2` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlRequest {
    pub url: String,
    pub target: String,
    pub method: SendVars,
    /// The target names a clip rather than a browser window.
    pub load_target: bool,
    /// Load variables instead of a movie.
    pub load_variables: bool,
}

/// Embedder services.
pub trait Host {
    /// Milliseconds since the movie started.
    fn time_ms(&mut self) -> u64;

    /// A uniform integer in `0..max`; `max` is at least 1.
    fn random(&mut self, max: u32) -> u32;

    fn set_drag(&mut self, drag: DragState);

    fn clear_drag(&mut self);

    /// One line of `trace` output.
    fn trace(&mut self, message: &str);

    fn get_url(&mut self, request: UrlRequest);

    fn fs_command(&mut self, command: &str, args: &[String]);

    fn toggle_quality(&mut self) {}

    fn stop_sounds(&mut self) {}
}
