//! Known-good set and result sink backed by flat text files

use crate::error::SieveError;
use crate::proxy::models::{Candidate, WorkingEntry};
use crate::proxy::parser::EndpointSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Candidates confirmed working by a previous run
///
/// Loaded once at run start and treated as a read-only snapshot afterwards.
#[derive(Debug, Clone, Default)]
pub struct KnownGoodSet {
    endpoints: HashSet<Candidate>,
}

impl KnownGoodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the set from a file. A missing file yields an empty set.
    ///
    /// Accepts both persisted layouts: `<endpoint>` and `<endpoint>,<latency>`.
    pub fn load<P: AsRef<Path>>(path: P, default_scheme: &str) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(SieveError::KnownGoodUnreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self::parse_string(&content, default_scheme))
    }

    pub fn parse_string(content: &str, default_scheme: &str) -> Self {
        content
            .lines()
            .map(strip_latency_column)
            .filter_map(|line| EndpointSource::normalize(line, default_scheme))
            .collect()
    }

    /// Merge another snapshot into this one
    pub fn merge(&mut self, other: KnownGoodSet) {
        self.endpoints.extend(other.endpoints);
    }

    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.endpoints.contains(candidate)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl FromIterator<Candidate> for KnownGoodSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        Self {
            endpoints: iter.into_iter().collect(),
        }
    }
}

/// Drop a trailing `,<seconds>` column written by the overwrite sink
fn strip_latency_column(line: &str) -> &str {
    let line = line.trim();
    match line.rsplit_once(',') {
        Some((endpoint, latency)) if latency.trim().parse::<f64>().is_ok() => endpoint,
        _ => line,
    }
}

/// How the sink persists working entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// Rewrite the file with the full ranked set, `<endpoint>,<latency>` per line
    #[default]
    Overwrite,
    /// Append newly confirmed entries, `<endpoint>` per line, flushed one by one
    Append,
}

/// Writes working entries to the output file
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
    mode: SinkMode,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>, mode: SinkMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SinkMode {
        self.mode
    }

    /// Persist entries in the given order, returning the number of lines written
    pub fn write(&self, entries: &[WorkingEntry]) -> Result<usize, SieveError> {
        let result = match self.mode {
            SinkMode::Overwrite => self.overwrite(entries),
            SinkMode::Append => self.append(entries),
        };

        result.map_err(|source| SieveError::SinkWriteFailure {
            path: self.path.clone(),
            source,
        })
    }

    fn overwrite(&self, entries: &[WorkingEntry]) -> io::Result<usize> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        for entry in entries {
            writeln!(writer, "{}", entry.to_ranked_line())?;
        }
        writer.flush()?;
        Ok(entries.len())
    }

    fn append(&self, entries: &[WorkingEntry]) -> io::Result<usize> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        if !ends_with_newline(&mut file)? {
            writeln!(file)?;
        }

        for entry in entries {
            writeln!(file, "{}", entry.to_incremental_line())?;
            file.flush()?;
        }
        Ok(entries.len())
    }
}

/// True for an empty file or one whose last byte is a newline
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::parser::DEFAULT_SCHEME;
    use std::time::Duration;

    fn entry(endpoint: &str, millis: u64) -> WorkingEntry {
        WorkingEntry::new(Candidate::new(endpoint), Duration::from_millis(millis))
    }

    #[test]
    fn test_known_good_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let known = KnownGoodSet::load(dir.path().join("none.txt"), DEFAULT_SCHEME).unwrap();
        assert!(known.is_empty());
    }

    #[test]
    fn test_known_good_unreadable_file() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();
        let err = KnownGoodSet::load(dir.path(), DEFAULT_SCHEME).unwrap_err();
        assert!(matches!(err, SieveError::KnownGoodUnreadable { .. }));
    }

    #[test]
    fn test_known_good_parses_both_layouts() {
        let content = "http://p1:8080\np2:8080,0.30\n\nsocks5://p3:1080,1.25\n";
        let known = KnownGoodSet::parse_string(content, DEFAULT_SCHEME);
        assert_eq!(known.len(), 3);
        assert!(known.contains(&Candidate::new("http://p1:8080")));
        assert!(known.contains(&Candidate::new("http://p2:8080")));
        assert!(known.contains(&Candidate::new("socks5://p3:1080")));
        assert!(!known.contains(&Candidate::new("http://p4:8080")));
    }

    #[test]
    fn test_known_good_merge() {
        let mut known = KnownGoodSet::parse_string("p1:8080\np2:8080", DEFAULT_SCHEME);
        known.merge(KnownGoodSet::parse_string("p2:8080\np3:8080", DEFAULT_SCHEME));
        assert_eq!(known.len(), 3);
        assert!(known.contains(&Candidate::new("http://p3:8080")));
    }

    #[test]
    fn test_overwrite_sink_writes_ranked_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = ResultSink::new(&path, SinkMode::Overwrite);
        let written = sink
            .write(&[entry("http://p3:8080", 100), entry("http://p1:8080", 300)])
            .unwrap();

        assert_eq!(written, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "http://p3:8080,0.10\nhttp://p1:8080,0.30\n");
    }

    #[test]
    fn test_overwrite_sink_with_no_entries_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale\n").unwrap();

        ResultSink::new(&path, SinkMode::Overwrite).write(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_sink_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.txt");
        std::fs::write(&path, "http://p1:8080").unwrap();

        let sink = ResultSink::new(&path, SinkMode::Append);
        sink.write(&[entry("http://p2:8080", 50)]).unwrap();
        sink.write(&[entry("http://p3:8080", 70)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "http://p1:8080\nhttp://p2:8080\nhttp://p3:8080\n");
    }

    #[test]
    fn test_append_sink_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");

        ResultSink::new(&path, SinkMode::Append)
            .write(&[entry("http://p1:8080", 10)])
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://p1:8080\n");
    }

    #[test]
    fn test_sink_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let err = ResultSink::new(&path, SinkMode::Overwrite)
            .write(&[entry("http://p1:8080", 10)])
            .unwrap_err();
        assert!(matches!(err, SieveError::SinkWriteFailure { .. }));
    }

    #[test]
    fn test_sink_output_reloads_as_known_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        ResultSink::new(&path, SinkMode::Overwrite)
            .write(&[entry("http://p1:8080", 120)])
            .unwrap();

        let known = KnownGoodSet::load(&path, DEFAULT_SCHEME).unwrap();
        assert!(known.contains(&Candidate::new("http://p1:8080")));
    }
}
