#![forbid(unsafe_code)]

//! Log sink routing `tracing` output to the browser console.
//!
//! [`LineWriter`] implements [`std::io::Write`], buffers until a newline and
//! hands each complete line to a [`LineSink`]. Control characters other than
//! tab are dropped so page-controlled text can never restyle the console.
//! Anything still buffered is emitted when the writer is dropped, which is
//! how `tracing-subscriber` uses writers: one per event.
//!
//! [`ConsoleMakeWriter`] plugs this into `tracing_subscriber::fmt`, sending
//! `WARN` and `ERROR` events to `console.warn` and everything else to
//! `console.log`.

use std::io::{self, Write};

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Console channel a line is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Log,
    Warn,
}

impl Channel {
    fn for_level(level: &Level) -> Self {
        if *level <= Level::WARN {
            Self::Warn
        } else {
            Self::Log
        }
    }
}

/// Destination for complete log lines.
pub trait LineSink {
    fn emit(&mut self, channel: Channel, line: &str);
}

/// Line-buffered writer in front of a [`LineSink`].
pub struct LineWriter<S: LineSink> {
    sink: S,
    channel: Channel,
    buffer: Vec<u8>,
}

impl<S: LineSink> LineWriter<S> {
    pub fn new(sink: S, channel: Channel) -> Self {
        Self {
            sink,
            channel,
            buffer: Vec::with_capacity(256),
        }
    }

    fn emit_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = clean(&String::from_utf8_lossy(&self.buffer));
        self.sink.emit(self.channel, &line);
        self.buffer.clear();
    }

    #[cfg(test)]
    fn into_sink(mut self) -> S
    where
        S: Default,
    {
        self.emit_buffer();
        std::mem::take(&mut self.sink)
    }
}

impl<S: LineSink> Write for LineWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                self.emit_buffer();
            } else {
                self.buffer.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_buffer();
        Ok(())
    }
}

impl<S: LineSink> Drop for LineWriter<S> {
    fn drop(&mut self) {
        self.emit_buffer();
    }
}

fn clean(line: &str) -> String {
    line.chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect()
}

/// The browser console. Off `wasm32` lines go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserConsole;

impl LineSink for BrowserConsole {
    #[cfg(target_arch = "wasm32")]
    fn emit(&mut self, channel: Channel, line: &str) {
        let line = wasm_bindgen::JsValue::from_str(line);
        match channel {
            Channel::Log => web_sys::console::log_1(&line),
            Channel::Warn => web_sys::console::warn_1(&line),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn emit(&mut self, _channel: Channel, line: &str) {
        let _ = writeln!(io::stderr(), "{line}");
    }
}

/// [`MakeWriter`] for the console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = LineWriter<BrowserConsole>;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter::new(BrowserConsole, Channel::Log)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LineWriter::new(BrowserConsole, Channel::for_level(meta.level()))
    }
}

/// Install the console subscriber. A second call is a no-op.
pub fn install(max_level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(max_level)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init();
}
