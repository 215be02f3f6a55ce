use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use log::LevelFilter;

pub const LOG_FILE_NAME: &str = "activity.log";

/// Install the process logger: `<timestamp> [LEVEL] message` on stderr, and
/// into a daily rotated `activity.log` when `file` is given.
///
/// `RUST_LOG`, when set, still refines the filter per module.
pub fn init(level: LevelFilter, file: Option<DailyLogFile>) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        });

    if let Some(file) = file {
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}

/// Copies every record to stderr as well as the log file.
struct Tee {
    file: DailyLogFile,
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

/// `activity.log` that rolls over at local midnight.
///
/// Finished days are renamed to `activity.log.YYYY-MM-DD`; only the newest
/// `retention` of those are kept.
pub struct DailyLogFile {
    dir: PathBuf,
    retention: usize,
    day: NaiveDate,
    file: File,
}

impl DailyLogFile {
    pub fn open(dir: &Path, retention: usize) -> io::Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        // An existing file belongs to the day it was last written
        let day = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified).date_naive(),
            Err(_) => Local::now().date_naive(),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            retention: retention.max(1),
            day,
            file: append(&path)?,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Start a new file if `today` is past the current file's day.
    pub fn roll_over(&mut self, today: NaiveDate) -> io::Result<()> {
        if today <= self.day {
            return Ok(());
        }

        self.file.flush()?;
        let backup = self.dir.join(format!("{}.{}", LOG_FILE_NAME, self.day.format("%Y-%m-%d")));
        fs::rename(self.path(), backup)?;
        self.file = append(&self.path())?;
        self.day = today;
        self.prune()
    }

    fn prune(&self) -> io::Result<()> {
        let prefix = format!("{}.", LOG_FILE_NAME);
        let mut backups: Vec<(NaiveDate, PathBuf)> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let day = NaiveDate::parse_from_str(name.strip_prefix(&prefix)?, "%Y-%m-%d").ok()?;
                Some((day, entry.path()))
            })
            .collect();

        if backups.len() <= self.retention {
            return Ok(());
        }
        backups.sort();
        let excess = backups.len() - self.retention;
        for (_, path) in backups.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_over(Local::now().date_naive())?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
