//! Rendering surfaces for streamed answers.

use std::io::Write;

/// Where a sink shows the answer while it is being generated.
pub trait MessageSurface {
    /// A new answer is about to stream.
    fn generation_started(&mut self);

    /// Shows the full text accumulated so far.
    fn render(&mut self, accumulated: &str);

    /// The answer is complete.
    fn generation_finished(&mut self, text: &str);

    /// Generation stopped early; already rendered text stays visible.
    fn generation_aborted(&mut self, reason: &str);
}

/// Recorded surface callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// `generation_started`.
    Started,
    /// `render` with the accumulated text.
    Render(String),
    /// `generation_finished` with the final text.
    Finished(String),
    /// `generation_aborted` with the reason.
    Aborted(String),
}

/// Surface that records every callback in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferSurface {
    events: Vec<SurfaceEvent>,
    renders: Vec<String>,
}

impl BufferSurface {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every callback, in order.
    #[must_use]
    pub fn events(&self) -> &[SurfaceEvent] {
        &self.events
    }

    /// Every rendered snapshot, in order.
    #[must_use]
    pub fn renders(&self) -> &[String] {
        &self.renders
    }

    /// The text currently on screen.
    #[must_use]
    pub fn last_render(&self) -> Option<&str> {
        self.renders.last().map(String::as_str)
    }

    /// Forgets recorded callbacks.
    pub fn clear(&mut self) {
        self.events.clear();
        self.renders.clear();
    }
}

impl MessageSurface for BufferSurface {
    fn generation_started(&mut self) {
        self.events.push(SurfaceEvent::Started);
    }

    fn render(&mut self, accumulated: &str) {
        self.events.push(SurfaceEvent::Render(accumulated.to_string()));
        self.renders.push(accumulated.to_string());
    }

    fn generation_finished(&mut self, text: &str) {
        self.events.push(SurfaceEvent::Finished(text.to_string()));
    }

    fn generation_aborted(&mut self, reason: &str) {
        self.events.push(SurfaceEvent::Aborted(reason.to_string()));
    }
}

/// Surface that prints the answer incrementally to a writer, usually a
/// locked stdout.
///
/// Each render writes only the suffix not yet printed, so the terminal shows
/// the answer growing in place.
pub struct TerminalSurface<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> TerminalSurface<W> {
    /// Creates a surface writing to `out`.
    pub const fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    /// Consumes the surface and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

// Write errors on a closed terminal are not actionable mid-stream.
impl<W: Write> MessageSurface for TerminalSurface<W> {
    fn generation_started(&mut self) {
        self.printed = 0;
    }

    fn render(&mut self, accumulated: &str) {
        if let Some(suffix) = accumulated.get(self.printed..) {
            let _ = self.out.write_all(suffix.as_bytes());
            let _ = self.out.flush();
        }
        self.printed = accumulated.len();
    }

    fn generation_finished(&mut self, _text: &str) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn generation_aborted(&mut self, reason: &str) {
        if self.printed > 0 {
            let _ = writeln!(self.out);
        }
        let _ = writeln!(self.out, "[answer interrupted: {reason}]");
        let _ = self.out.flush();
    }
}
