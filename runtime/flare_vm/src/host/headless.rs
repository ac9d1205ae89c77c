//! A host with no window, no network, and a deterministic clock.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DragState, Host, UrlRequest};

/// Trace output written to stdout.
#[derive(Default)]
pub struct StdoutTraceSink;

impl StdoutTraceSink {
    pub fn line(&self, msg: &str) {
        println!("{msg}");
    }
}

/// Trace output captured for assertions.
#[derive(Default)]
pub struct BufferTraceSink {
    buffer: String,
}

impl BufferTraceSink {
    pub fn line(&mut self, msg: &str) {
        self.buffer.push_str(msg);
        self.buffer.push('\n');
    }

    pub fn output(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Where `trace` lines go.
///
/// Enum dispatch keeps the hot `trace` path free of trait objects.
pub enum TraceSink {
    Stdout(StdoutTraceSink),
    Buffer(BufferTraceSink),
    /// Discard everything.
    Silent,
}

impl TraceSink {
    pub fn line(&mut self, msg: &str) {
        match self {
            Self::Stdout(sink) => sink.line(msg),
            Self::Buffer(sink) => sink.line(msg),
            Self::Silent => {}
        }
    }

    /// Captured output; empty for sinks that don't capture.
    pub fn output(&self) -> &str {
        match self {
            Self::Buffer(sink) => sink.output(),
            Self::Stdout(_) | Self::Silent => "",
        }
    }
}

/// Something a script asked the host to do.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    Drag(DragState),
    ClearDrag,
    Url(UrlRequest),
    FsCommand { command: String, args: Vec<String> },
    ToggleQuality,
    StopSounds,
}

/// Deterministic [`Host`] for tests and the command-line runner.
///
/// The clock only moves when [`HeadlessHost::advance`] is called and the
/// random generator is seeded, so runs are reproducible.
pub struct HeadlessHost {
    rng: StdRng,
    now_ms: u64,
    trace: TraceSink,
    events: Vec<HostEvent>,
}

impl HeadlessHost {
    /// Capture trace output in memory.
    pub fn new(seed: u64) -> Self {
        Self::with_sink(seed, TraceSink::Buffer(BufferTraceSink::default()))
    }

    pub fn with_sink(seed: u64, trace: TraceSink) -> Self {
        HeadlessHost {
            rng: StdRng::seed_from_u64(seed),
            now_ms: 0,
            trace,
            events: Vec::new(),
        }
    }

    /// Move the clock forward.
    pub fn advance(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }

    pub fn trace_output(&self) -> &str {
        self.trace.output()
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        HeadlessHost::new(0)
    }
}

impl Host for HeadlessHost {
    fn time_ms(&mut self) -> u64 {
        self.now_ms
    }

    fn random(&mut self, max: u32) -> u32 {
        self.rng.gen_range(0..max.max(1))
    }

    fn set_drag(&mut self, drag: DragState) {
        self.events.push(HostEvent::Drag(drag));
    }

    fn clear_drag(&mut self) {
        self.events.push(HostEvent::ClearDrag);
    }

    fn trace(&mut self, message: &str) {
        self.trace.line(message);
    }

    fn get_url(&mut self, request: UrlRequest) {
        self.events.push(HostEvent::Url(request));
    }

    fn fs_command(&mut self, command: &str, args: &[String]) {
        self.events.push(HostEvent::FsCommand {
            command: command.to_owned(),
            args: args.to_vec(),
        });
    }

    fn toggle_quality(&mut self) {
        self.events.push(HostEvent::ToggleQuality);
    }

    fn stop_sounds(&mut self) {
        self.events.push(HostEvent::StopSounds);
    }
}
