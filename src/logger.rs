//! Ambient logging stack: a `log`-facade implementation colorized by level,
//! generalized from a hardwired serial port to any [`LogSink`] so host tests
//! can install an in-memory one. The per-CPU id prefix a multiprocessor
//! kernel would add is dropped since multiprocessor scheduling is out of
//! scope here.

use core::fmt::Write;
use log::{Level, LevelFilter, Log};
use owo_colors::OwoColorize;
use spin::Mutex;

/// Where log output goes. A real port implements this over its serial/UART
/// driver; `sim`/tests use [`sim::VecSink`].
pub trait LogSink: Send {
    fn write_str(&mut self, s: &str);
}

enum Color {
    Default,
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}

struct CrLfWriter<'a, S: LogSink>(&'a mut S);

impl<S: LogSink> Write for CrLfWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for chunk in s.split_inclusive('\n') {
            if let Some(body) = chunk.strip_suffix('\n') {
                self.0.write_str(body);
                self.0.write_str("\r\n");
            } else {
                self.0.write_str(chunk);
            }
        }
        Ok(())
    }
}

fn write_colored<S: LogSink>(sink: &mut S, color: Color, args: core::fmt::Arguments) {
    let mut w = CrLfWriter(sink);
    match color {
        Color::Default => write!(w, "{args}").ok(),
        Color::Gray => write!(w, "{}", args.dimmed()).ok(),
        Color::BrightRed => write!(w, "{}", args.bright_red()).ok(),
        Color::BrightYellow => write!(w, "{}", args.bright_yellow()).ok(),
        Color::BrightBlue => write!(w, "{}", args.bright_blue()).ok(),
        Color::BrightCyan => write!(w, "{}", args.bright_cyan()).ok(),
        Color::BrightMagenta => write!(w, "{}", args.bright_magenta()).ok(),
    };
}

/// A `log::Log` implementation over a [`LogSink`]. Install one `'static`
/// instance with [`ArchportLogger::install`] during bootstrap.
pub struct ArchportLogger<S: LogSink> {
    sink: Mutex<S>,
}

impl<S: LogSink> ArchportLogger<S> {
    pub const fn new(sink: S) -> Self {
        ArchportLogger {
            sink: Mutex::new(sink),
        }
    }

    /// Install as the global logger. Call once during bootstrap, before the
    /// first `log::info!`/etc.
    pub fn install(&'static self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(LevelFilter::Trace);
        log::set_logger(self)
    }
}

impl<S: LogSink> Log for ArchportLogger<S> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut sink = self.sink.lock();
        let level = record.level();
        write_colored(
            &mut *sink,
            match level {
                Level::Error => Color::BrightRed,
                Level::Warn => Color::BrightYellow,
                Level::Info => Color::BrightBlue,
                Level::Debug => Color::BrightCyan,
                Level::Trace => Color::BrightMagenta,
            },
            format_args!("{level:5} "),
        );
        write_colored(&mut *sink, Color::Gray, format_args!("[{}] ", record.target()));
        write_colored(&mut *sink, Color::Default, *record.args());
        write_colored(&mut *sink, Color::Default, format_args!("\n"));
    }

    fn flush(&self) {}
}

#[cfg(test)]
pub mod test_sink {
    use super::LogSink;
    use alloc::string::String;

    #[derive(Default)]
    pub struct VecSink(pub String);

    impl LogSink for VecSink {
        fn write_str(&mut self, s: &str) {
            self.0.push_str(s);
        }
    }
}
