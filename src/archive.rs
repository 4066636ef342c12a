//! tar / tar.gz extraction.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

fn open(archive: &Path) -> io::Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(archive)?;
    let mut magic = [0u8; 2];
    let is_gzip = file.read(&mut magic)? == 2 && magic == [0x1f, 0x8b];
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Archive::new(reader))
}

/// Unpacks every member of `archive` into `destination`.
pub fn extract_all(archive: &Path, destination: &Path) -> io::Result<()> {
    tracing::debug!(
        "Extracting {} to {}...",
        archive.display(),
        destination.display()
    );
    std::fs::create_dir_all(destination)?;
    open(archive)?.unpack(destination)
}

/// Unpacks only the members whose base name is one of `names`, keeping their
/// relative location. Returns how many members were written.
pub fn extract_matching(archive: &Path, destination: &Path, names: &[&str]) -> io::Result<usize> {
    std::fs::create_dir_all(destination)?;
    let mut archive = open(archive)?;
    let mut extracted = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let wanted = entry
            .path()?
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| names.contains(&n));
        // unpack_in 会拒绝逃逸出目标目录的成员
        if wanted && entry.unpack_in(destination)? {
            extracted += 1;
        }
    }
    Ok(extracted)
}

/// The directory an archive was rooted at: its single top-level directory
/// when there is exactly one, otherwise `dir` itself.
pub fn content_root(dir: &Path) -> io::Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            return Ok(dir.to_path_buf());
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        _ => Ok(dir.to_path_buf()),
    }
}
