//! File-Channel Transfer
//!
//! Streams the buffer's readable window to a file and fills its writable
//! window from a file. Each direction caches one open handle keyed by
//! normalized absolute path, so repeated transfers against the same file
//! reuse the descriptor instead of reopening per call. Switching paths
//! closes the previous handle first; closing is null-safe, so the very
//! first transfer never touches a handle that was never opened.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::buffer::ManagedByteBuffer;
use crate::error::{BufferError, BufferResult};

/// A cached open file plus the normalized path it was opened for.
///
/// Dropping the association closes the descriptor.
#[derive(Debug)]
pub(crate) struct FileAssociation {
    pub(crate) path: PathBuf,
    pub(crate) file: File,
}

impl FileAssociation {
    fn open_append(path: PathBuf) -> BufferResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| BufferError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    fn open_read(path: PathBuf) -> BufferResult<Self> {
        let file = File::open(&path).map_err(|source| BufferError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, file })
    }
}

/// Normalize a path that must already exist (read side).
fn normalize_existing(path: &Path) -> BufferResult<PathBuf> {
    path.canonicalize().map_err(|source| BufferError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize a write target that may not exist yet: canonicalize the parent
/// and rejoin the file name, so equivalent spellings of the same path
/// compare equal regardless of where they came from.
fn normalize_target(path: &Path) -> BufferResult<PathBuf> {
    if path.exists() {
        return normalize_existing(path);
    }
    let name = path.file_name().ok_or_else(|| {
        BufferError::InvalidArgument(format!("not a file path: {}", path.display()))
    })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().map_err(|source| BufferError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parent.join(name))
}

impl ManagedByteBuffer {
    /// Append the readable window (`position..limit`) to the file at `path`,
    /// advancing position to limit.
    ///
    /// The file is opened in append mode on first use and the handle is
    /// cached; later calls against the same path write through the cached
    /// handle. A different path closes the previous handle before opening
    /// the new one. On I/O failure the association is dropped and the next
    /// call re-establishes it.
    pub fn write_to<P: AsRef<Path>>(&mut self, path: P) -> BufferResult<&mut Self> {
        let target = normalize_target(path.as_ref())?;
        let stale = !matches!(&self.write_assoc, Some(a) if a.path == target);
        if stale {
            // Close the previous handle, if any, before opening the new target.
            self.write_assoc = None;
            self.write_assoc = Some(FileAssociation::open_append(target)?);
        }
        if let Some(assoc) = self.write_assoc.as_mut() {
            if let Err(source) = assoc.file.write_all(&self.storage[self.position..self.limit]) {
                let path = assoc.path.clone();
                self.write_assoc = None;
                return Err(BufferError::Io { path, source });
            }
        }
        self.position = self.limit;
        Ok(self)
    }

    /// Fill the writable window (`position..limit`) from the file at `path`,
    /// advancing position by the number of bytes read.
    ///
    /// A single read is issued, so the fill may be short when the file has
    /// fewer bytes left than the window. Handle caching and path switching
    /// behave as in [`Self::write_to`].
    pub fn read_from<P: AsRef<Path>>(&mut self, path: P) -> BufferResult<&mut Self> {
        let target = normalize_existing(path.as_ref())?;
        let stale = !matches!(&self.read_assoc, Some(a) if a.path == target);
        if stale {
            self.read_assoc = None;
            self.read_assoc = Some(FileAssociation::open_read(target)?);
        }
        let mut filled = 0;
        if let Some(assoc) = self.read_assoc.as_mut() {
            match assoc.file.read(&mut self.storage[self.position..self.limit]) {
                Ok(n) => filled = n,
                Err(source) => {
                    let path = assoc.path.clone();
                    self.read_assoc = None;
                    return Err(BufferError::Io { path, source });
                }
            }
        }
        self.position += filled;
        Ok(self)
    }

    /// Close and drop both cached file handles.
    ///
    /// For hosts that keep buffers alive long-term; dropping the buffer
    /// closes the handles as well.
    pub fn detach(&mut self) -> &mut Self {
        self.write_assoc = None;
        self.read_assoc = None;
        self
    }

    /// Normalized path of the cached write handle, if one is open.
    pub fn write_target(&self) -> Option<&Path> {
        self.write_assoc.as_ref().map(|a| a.path.as_path())
    }

    /// Normalized path of the cached read handle, if one is open.
    pub fn read_target(&self) -> Option<&Path> {
        self.read_assoc.as_ref().map(|a| a.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::buffer::ManagedByteBuffer;
    use crate::error::BufferError;

    #[test]
    fn test_write_to_appends_across_calls() {
        let path = "/tmp/bytestage_test_append_calls.txt";
        fs::remove_file(path).ok();

        let mut buf = ManagedByteBuffer::allocate(16);
        buf.append(b"first").unwrap().flip();
        buf.write_to(path).unwrap();

        buf.clear().append(b"second").unwrap().flip();
        buf.write_to(path).unwrap();

        assert_eq!(fs::read(path).unwrap(), b"firstsecond");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_to_reuses_association_for_same_path() {
        let path = "/tmp/bytestage_test_reuse.txt";
        fs::remove_file(path).ok();

        let mut buf = ManagedByteBuffer::allocate(8);
        buf.append(b"ab").unwrap().flip();
        buf.write_to(path).unwrap();
        let first_target = buf.write_target().map(|p| p.to_path_buf()).unwrap();

        buf.clear().append(b"cd").unwrap().flip();
        buf.write_to(path).unwrap();
        assert_eq!(buf.write_target().unwrap(), first_target.as_path());

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_to_switches_path() {
        let path_a = "/tmp/bytestage_test_switch_a.txt";
        let path_b = "/tmp/bytestage_test_switch_b.txt";
        fs::remove_file(path_a).ok();
        fs::remove_file(path_b).ok();

        let mut buf = ManagedByteBuffer::allocate(8);
        buf.append(b"aa").unwrap().flip();
        buf.write_to(path_a).unwrap();

        buf.clear().append(b"bb").unwrap().flip();
        buf.write_to(path_b).unwrap();

        assert_eq!(fs::read(path_a).unwrap(), b"aa");
        assert_eq!(fs::read(path_b).unwrap(), b"bb");
        assert!(buf.write_target().unwrap().ends_with("bytestage_test_switch_b.txt"));

        // Cleanup
        fs::remove_file(path_a).ok();
        fs::remove_file(path_b).ok();
    }

    #[test]
    fn test_write_to_equivalent_path_spellings_share_handle() {
        let path = "/tmp/bytestage_test_spelling.txt";
        fs::remove_file(path).ok();

        let mut buf = ManagedByteBuffer::allocate(8);
        buf.append(b"xy").unwrap().flip();
        buf.write_to(path).unwrap();
        let target = buf.write_target().map(|p| p.to_path_buf()).unwrap();

        buf.clear().append(b"zw").unwrap().flip();
        buf.write_to("/tmp/./bytestage_test_spelling.txt").unwrap();
        assert_eq!(buf.write_target().unwrap(), target.as_path());
        assert_eq!(fs::read(path).unwrap(), b"xyzw");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_first_read_from_has_no_prior_handle() {
        let path = "/tmp/bytestage_test_first_read.txt";
        fs::write(path, b"hello").unwrap();

        // Fresh buffer, no read association yet: must not trip over a
        // missing previous handle.
        let mut buf = ManagedByteBuffer::allocate(5);
        buf.read_from(path).unwrap();
        assert_eq!(buf.position(), 5);
        buf.flip();
        assert_eq!(buf.drain_all(), b"hello");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_from_short_file_fills_partially() {
        let path = "/tmp/bytestage_test_short_read.txt";
        fs::write(path, b"abc").unwrap();

        let mut buf = ManagedByteBuffer::allocate(8);
        buf.read_from(path).unwrap();
        assert_eq!(buf.position(), 3);
        buf.flip();
        assert_eq!(buf.drain_all(), b"abc");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_from_continues_through_cached_handle() {
        let path = "/tmp/bytestage_test_read_resume.txt";
        fs::write(path, b"abcdef").unwrap();

        let mut buf = ManagedByteBuffer::allocate(3);
        buf.read_from(path).unwrap();
        buf.flip();
        assert_eq!(buf.drain_all(), b"abc");

        // Same path, cached handle: the file cursor carries on.
        buf.clear();
        buf.read_from(path).unwrap();
        buf.flip();
        assert_eq!(buf.drain_all(), b"def");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_from_missing_file_is_io_error() {
        let mut buf = ManagedByteBuffer::allocate(4);
        let err = buf.read_from("/tmp/bytestage_test_missing_xyz.txt").unwrap_err();
        assert!(matches!(err, BufferError::Io { .. }));
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn test_write_to_missing_parent_is_io_error() {
        let mut buf = ManagedByteBuffer::allocate(4);
        buf.append(b"ab").unwrap().flip();
        let err = buf
            .write_to("/tmp/bytestage_no_such_dir_xyz/out.txt")
            .unwrap_err();
        assert!(matches!(err, BufferError::Io { .. }));
    }

    #[test]
    fn test_detach_closes_associations() {
        let path = "/tmp/bytestage_test_detach.txt";
        fs::remove_file(path).ok();

        let mut buf = ManagedByteBuffer::allocate(4);
        buf.append(b"ab").unwrap().flip();
        buf.write_to(path).unwrap();
        assert!(buf.write_target().is_some());

        buf.detach();
        assert!(buf.write_target().is_none());
        assert!(buf.read_target().is_none());

        // A later transfer re-establishes the association.
        buf.clear().append(b"cd").unwrap().flip();
        buf.write_to(path).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"abcd");

        // Cleanup
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_to_empty_window_touches_file() {
        let path = "/tmp/bytestage_test_empty_window.txt";
        fs::remove_file(path).ok();

        let mut buf = ManagedByteBuffer::allocate(4);
        buf.flip();
        buf.write_to(path).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"");

        // Cleanup
        fs::remove_file(path).ok();
    }
}
