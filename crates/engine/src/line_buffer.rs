// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

/// Accumulates bytes for one file and emits complete newline-terminated
/// lines to a caller-supplied sink, retaining any trailing partial line
/// across calls.
///
/// A half-written record is never flushed: if the file is closed with a
/// pending partial line, that data is simply dropped when the buffer is.
#[derive(Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly read bytes and invoke `on_line` once per complete line,
    /// newline stripped, in order.
    pub fn push(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) {
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(rel_pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + rel_pos;
            match std::str::from_utf8(&self.pending[start..end]) {
                Ok(line) => on_line(line),
                Err(err) => {
                    tracing::warn!(error = %err, "dropped non-UTF-8 line");
                }
            }
            start = end + 1;
        }

        self.pending.drain(0..start);
    }

    /// Discard any pending partial line. Used when a file is reopened from
    /// offset zero after rotation or truncation.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub fn pending_bytes(&self) -> &[u8] {
        &self.pending
    }
}

#[cfg(test)]
#[path = "line_buffer_tests.rs"]
mod tests;
