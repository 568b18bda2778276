use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Byte-addressable random access storage.
pub trait BlockDevice {
    /// Read up to `buf.len()` bytes at `offset`, returning how many were read.
    /// Fewer bytes than requested means the end of the device was reached.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data` at `offset`. The data must be on stable storage
    /// when this returns.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Size of the device in bytes.
    fn size(&mut self) -> io::Result<u64>;
}

/// A block device or image file opened read/write with synchronous writes.
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    path: PathBuf,
    synchronous: bool,
}

impl FileDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileDevice> {
        let path = path.as_ref();
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        let synchronous = request_sync_writes(&mut opts);
        let file = opts.open(path).map_err(|e| {
            io::Error::new(e.kind(), format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(FileDevice { file, path: path.to_path_buf(), synchronous })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn request_sync_writes(opts: &mut OpenOptions) -> bool {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(libc::O_SYNC);
            true
        }
    } else if #[cfg(windows)] {
        fn request_sync_writes(opts: &mut OpenOptions) -> bool {
            use std::os::windows::fs::OpenOptionsExt;
            opts.custom_flags(winapi::um::winbase::FILE_FLAG_WRITE_THROUGH);
            true
        }
    } else {
        fn request_sync_writes(_opts: &mut OpenOptions) -> bool {
            false
        }
    }
}

impl BlockDevice for FileDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if !self.synchronous {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        self.file.seek(SeekFrom::End(0))
    }
}
