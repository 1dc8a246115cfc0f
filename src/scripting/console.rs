use std::sync::Arc;

use parking_lot::Mutex;

/// Line buffer backing the viewer's console panel.
///
/// Clones share the same buffer, so the copy captured by a script's `print`
/// writes to the panel the session displays.
#[derive(Debug, Clone, Default)]
pub struct Console {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Panel contents, one line per entry.
    pub fn text(&self) -> String {
        self.lines
            .lock()
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }
}
