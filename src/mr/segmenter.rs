//! Deterministic chunking of the input directory into size-bounded segments.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{debug, warn};

/// Directory under the work dir holding materialized segments.
pub const SEGMENTS_DIR: &str = "segments";

/// Scan `input_dir` and produce the ordered list of segment contents.
///
/// Regular files are visited in lexicographic path order; other entries are
/// skipped with a warning. Lines are packed into segments of at most
/// `max_segment_size` bytes: empty lines are elided and every retained line
/// keeps a trailing newline. A line of `max_segment_size` bytes or more
/// bypasses the buffer and is cut into consecutive max-size slices, each its
/// own segment with no terminator appended.
pub fn scan(input_dir: &Path, max_segment_size: usize) -> anyhow::Result<Vec<Vec<u8>>> {
    let entries = match fs::read_dir(input_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(dir = %input_dir.display(), "input directory missing; producing zero segments");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("read input directory {}", input_dir.display()));
        }
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("read input directory {}", input_dir.display()))?;
        paths.push(entry.path());
    }
    paths.sort();

    let mut segments = Vec::new();
    let mut buffer: Vec<u8> = Vec::with_capacity(max_segment_size);
    for path in paths {
        if !path.is_file() {
            warn!(path = %path.display(), "not a regular file, ignored");
            continue;
        }
        append_file(&path, max_segment_size, &mut buffer, &mut segments)
            .with_context(|| format!("read input file {}", path.display()))?;
    }
    if !buffer.is_empty() {
        segments.push(buffer);
    }

    debug!(
        count = segments.len(),
        sizes = ?segments.iter().map(Vec::len).collect::<Vec<_>>(),
        "segmentation complete"
    );
    Ok(segments)
}

/// Write segments as `segment_<i>` under `dir`, truncating leftovers from a
/// previous run. Returns the file paths in segment order.
pub fn materialize(segments: &[Vec<u8>], dir: &Path) -> anyhow::Result<Vec<String>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create segments directory {}", dir.display()))?;
    let mut paths = Vec::with_capacity(segments.len());
    for (id, segment) in segments.iter().enumerate() {
        let path = dir.join(format!("segment_{id}"));
        fs::write(&path, segment).with_context(|| format!("write segment {}", path.display()))?;
        paths.push(path.display().to_string());
    }
    Ok(paths)
}

fn append_file(
    path: &Path,
    max: usize,
    buffer: &mut Vec<u8>,
    segments: &mut Vec<Vec<u8>>,
) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        push_line(&line, max, buffer, segments);
    }
}

/// Pack one terminator-stripped line into the running buffer, emitting full
/// segments as the cap is reached.
fn push_line(line: &[u8], max: usize, buffer: &mut Vec<u8>, segments: &mut Vec<Vec<u8>>) {
    if line.len() >= max {
        if !buffer.is_empty() {
            segments.push(std::mem::take(buffer));
        }
        for slice in line.chunks(max) {
            segments.push(slice.to_vec());
        }
        return;
    }
    if buffer.len() + line.len() + 1 > max {
        segments.push(std::mem::take(buffer));
    }
    if !line.is_empty() {
        buffer.extend_from_slice(line);
        buffer.push(b'\n');
    }
}
