use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fixed-size page I/O against a single file.
///
/// Page `n` lives at byte offset `n * page_size`. The page count is derived
/// from the file length, so a partially written trailing page is ignored.
#[derive(Debug)]
pub struct PageManager {
    file: File,
    page_size: usize,
}

impl PageManager {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path, page_size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self { file, page_size })
    }

    /// Opens an existing file.
    pub fn open(path: &Path, page_size: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self { file, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn read_page(&mut self, page_number: u32, buf: &mut [u8]) -> io::Result<()> {
        self.check_buffer(buf.len())?;

        let offset = self.page_offset(page_number);
        let file_size = self.file.metadata()?.len();
        if offset + self.page_size as u64 > file_size {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("page {} is past the end of the file", page_number),
            ));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    pub fn write_page(&mut self, page_number: u32, data: &[u8]) -> io::Result<()> {
        self.check_buffer(data.len())?;

        let offset = self.page_offset(page_number);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_data()
    }

    pub fn num_pages(&self) -> io::Result<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / self.page_size as u64) as u32)
    }

    /// Appends exactly one zero-filled page and returns its page number.
    pub fn allocate_page(&mut self) -> io::Result<u32> {
        let page_number = self.num_pages()?;
        let zeroes = vec![0u8; self.page_size];
        self.write_page(page_number, &zeroes)?;
        debug!("allocated page {} ({} bytes)", page_number, self.page_size);
        Ok(page_number)
    }

    fn check_buffer(&self, len: usize) -> io::Result<()> {
        if len != self.page_size {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("buffer must be {} bytes, got {}", self.page_size, len),
            ));
        }
        Ok(())
    }

    fn page_offset(&self, page_number: u32) -> u64 {
        page_number as u64 * self.page_size as u64
    }
}
