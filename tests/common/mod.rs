#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use get_cloudify::download::Fetch;
use get_cloudify::executor::{CommandRunner, ProcessResult};
use get_cloudify::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

pub fn exit(status: i32) -> ProcessResult {
    ProcessResult {
        status,
        stdout: String::new(),
        stderr: String::new(),
    }
}

type Responder = Box<dyn Fn(&str) -> ProcessResult + Send + Sync>;

/// Records every command line and answers with a canned result.
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    respond: Responder,
}

impl RecordingRunner {
    pub fn new(respond: impl Fn(&str) -> ProcessResult + Send + Sync + 'static) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Nothing is importable yet, every other command succeeds.
    pub fn fresh_host() -> Self {
        Self::new(|cmd| if cmd.contains(" -c \"import ") { exit(1) } else { exit(0) })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &str, _suppress_stderr: bool) -> Result<ProcessResult> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok((self.respond)(command))
    }
}

/// Serves one payload for every URL, or fails every download. Clones share
/// the record of what was fetched.
#[derive(Clone)]
pub struct FakeFetcher {
    payload: Option<Vec<u8>>,
    fetched: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl FakeFetcher {
    pub fn serving(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            fetched: Arc::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            payload: None,
            fetched: Arc::default(),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn destinations(&self) -> Vec<PathBuf> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(_, dest)| dest.clone())
            .collect()
    }
}

impl Fetch for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        match &self.payload {
            Some(bytes) => {
                std::fs::create_dir_all(destination.parent().unwrap())?;
                std::fs::write(destination, bytes)?;
                Ok(())
            }
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

/// A gzipped tarball holding `files` as (path, content) pairs.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// In-memory log sink for a thread-local subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().next() == Some(level))
            .map(str::to_string)
            .collect()
    }
}

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(self.0.clone())
    }
}

/// Captures DEBUG and above on the current thread until the guard drops.
/// Lines start with the level, e.g. `ERROR oops`.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
