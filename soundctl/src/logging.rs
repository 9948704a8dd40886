use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::{warn, LevelFilter};

/// Writes every log line to stderr and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn format_line(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record<'_>,
) -> io::Result<()> {
    writeln!(
        buf,
        "{} - {} - {} - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.target(),
        record.level(),
        record.args()
    )
}

/// Installs the process-wide logger. Call once, before anything logs.
///
/// `RUST_LOG` directives are applied on top of `level`.
pub fn init(level: LevelFilter, log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_env(env_logger::Env::default())
        .format(format_line);

    let mut open_error = None;
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => open_error = Some((path, e)),
        }
    }

    if builder.try_init().is_err() {
        return;
    }
    if let Some((path, e)) = open_error {
        warn!("Could not open log file {}: {e}. Logging to stderr only.", path.display());
    }
}
