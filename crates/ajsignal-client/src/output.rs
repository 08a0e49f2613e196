//! Output sinks for user-facing lines

use parking_lot::Mutex;

/// Tracing target for output lines
pub const OUTPUT_TARGET: &str = "ajsignal::output";

/// Destination for the lines the client prints
pub trait OutputSink: Send + Sync {
    /// Emit one line
    fn output_line(&self, line: &str);
}

/// Sink that logs each line at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutput;

impl OutputSink for TracingOutput {
    fn output_line(&self, line: &str) {
        tracing::info!(target: OUTPUT_TARGET, "{}", line);
    }
}

/// Sink that keeps lines in memory
#[derive(Debug, Default)]
pub struct BufferedOutput {
    lines: Mutex<Vec<String>>,
    echo: bool,
}

impl BufferedOutput {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that also logs each line
    pub fn echoing() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            echo: true,
        }
    }

    /// Snapshot of the collected lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of collected lines
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Remove and return the collected lines
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl OutputSink for BufferedOutput {
    fn output_line(&self, line: &str) {
        if self.echo {
            TracingOutput.output_line(line);
        }
        self.lines.lock().push(line.to_string());
    }
}
