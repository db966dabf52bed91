use std::{ffi::CString, fmt::Display, io::Write};

pub trait AsCString {
    fn as_c_string(&self) -> CString;
}

impl AsCString for str {
    fn as_c_string(&self) -> CString {
        CString::new(self).unwrap_or_default()
    }
}

impl AsCString for String {
    fn as_c_string(&self) -> CString {
        self.as_str().as_c_string()
    }
}

/// Writes straight to the debugger output stream, bypassing the logger.
#[cfg(windows)]
pub fn output_debug_string(s: &str) {
    use windows::{core::PCSTR, Win32::System::Diagnostics::Debug::OutputDebugStringA};

    let message = s.as_c_string();
    unsafe {
        OutputDebugStringA(PCSTR(message.as_ptr() as _));
    }
}

#[cfg(not(windows))]
pub fn output_debug_string(s: &str) {
    eprint!("{s}");
}

/// Collects writes and hands complete lines to `sink`.
///
/// `OutputDebugStringA` shows each call as its own entry, so a log record
/// split across several `write` calls must be reassembled first.
pub struct LineWriter<F: FnMut(&str)> {
    buffer: Vec<u8>,
    sink: F,
}

impl<F: FnMut(&str)> LineWriter<F> {
    pub fn new(sink: F) -> Self {
        Self {
            buffer: Vec::new(),
            sink,
        }
    }

    fn emit_complete_lines(&mut self) {
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            (self.sink)(&String::from_utf8_lossy(&line));
        }
    }
}

impl<F: FnMut(&str)> Write for LineWriter<F> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.emit_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.emit_complete_lines();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            (self.sink)(&String::from_utf8_lossy(&rest));
        }
        Ok(())
    }
}

/// Installs the `env_logger` backend. `RUST_LOG` overrides `default_level`.
///
/// On Windows records go to the debugger output stream so they remain
/// visible for binaries built with the `windows` subsystem.
pub fn init_logging(default_level: log::LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level).parse_default_env();

    if cfg!(windows) {
        builder.target(env_logger::Target::Pipe(Box::new(LineWriter::new(
            output_debug_string,
        ))));
    }

    if builder.try_init().is_err() {
        log::debug!("logger already initialized");
    }
}

pub fn trace_failure(file: &str, line: u32, expression: &str, error: &dyn Display) {
    log::error!("{file}({line}): {expression} failed: {error}");
}

/// Evaluates a `Result`, yielding `Some` on success.
///
/// Debug builds log the failing expression with its location, release builds
/// drop the error silently.
#[macro_export]
macro_rules! trace_hr {
    ($e:expr) => {
        match $e {
            Ok(value) => Some(value),
            Err(err) => {
                if cfg!(debug_assertions) {
                    $crate::util::trace_failure(file!(), line!(), stringify!($e), &err);
                }
                None
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_string_conversion() {
        assert_eq!("Arial".as_c_string().as_bytes(), b"Arial");
        assert_eq!("DirectX Learn".to_string().as_c_string().as_bytes(), b"DirectX Learn");
        assert!("bad\0title".as_c_string().as_bytes().is_empty());
    }

    #[test]
    fn line_writer_reassembles_split_records() {
        let mut lines = Vec::new();
        {
            let mut writer = LineWriter::new(|s: &str| lines.push(s.to_string()));
            writer.write_all(b"[INFO ").unwrap();
            writer.write_all(b"common] device created\nsecond").unwrap();
            writer.write_all(b" line\n").unwrap();
            writer.write_all(b"tail").unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(
            lines,
            vec!["[INFO common] device created\n", "second line\n", "tail"]
        );
    }

    #[test]
    fn trace_hr_passes_through_success() {
        let ok: Result<u32, String> = Ok(7);
        assert_eq!(crate::trace_hr!(ok), Some(7));

        let failed: Result<u32, String> = Err("E_FAIL".to_string());
        assert_eq!(crate::trace_hr!(failed), None);
    }
}
