//! # Filesystem
//!
//! A small copy on write filesystem for the watch's flash region, holding the settings record and
//! any data faces want to keep across a reset.
//!
//! ## Layout
//!
//! The device is split into 256 byte blocks, matching the erase size. Blocks 0 and 1 hold two
//! copies of the directory, only one of which is current: the one with a valid checksum and the
//! newest revision. Every other block is a data block.
//!
//! ```text
//! +------+----------+------------------------+----------+
//! | MVFS | revision | entries (9 x 26 bytes) | checksum |
//! +------+----------+------------------------+----------+
//! ```
//!
//! Each directory entry holds a name of up to 15 bytes, the file size and up to eight data block
//! indices, which limits files to 2 KiB. There are no subdirectories.
//!
//! ## Consistency
//!
//! Data is never modified in place. A write copies every touched block into a freshly erased one
//! and then commits a new revision of the directory into the metadata block that is not current.
//! Until that commit lands the previous directory, and the blocks it references, stay intact, so
//! losing power mid-write leaves the file as it was before the write.
//!
//! The device is only ever read and written a whole block at a time, which satisfies the 16 byte
//! read and 64 byte program granularity of the flash.

mod ram;

pub use ram::RamFlash;

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

use crate::logging::{debug, info};

pub const BLOCK_SIZE: usize = 256;
pub const READ_SIZE: usize = 16;
pub const PAGE_SIZE: usize = 64;

/// Maximum number of files
pub const MAX_FILES: usize = 9;

/// Maximum length of a file name (bytes)
pub const MAX_NAME_LEN: usize = 15;

pub const BLOCKS_PER_FILE: usize = 8;

/// Maximum size of a single file (bytes)
pub const MAX_FILE_SIZE: u32 = (BLOCKS_PER_FILE * BLOCK_SIZE) as u32;

const MAGIC: [u8; 4] = *b"MVFS";
const METADATA_BLOCKS: u8 = 2;
const ENTRY_LEN: usize = 1 + MAX_NAME_LEN + 2 + BLOCKS_PER_FILE;
const ENTRIES_OFFSET: usize = 8;
const CHECKSUM_OFFSET: usize = BLOCK_SIZE - 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashErrorKind {
    NotAligned,
    OutOfBounds,
    Other,
}

impl From<NorFlashErrorKind> for FlashErrorKind {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => FlashErrorKind::NotAligned,
            NorFlashErrorKind::OutOfBounds => FlashErrorKind::OutOfBounds,
            _ => FlashErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    #[error("flash error: {0:?}")]
    Flash(FlashErrorKind),
    #[error("filesystem is not mounted")]
    NotMounted,
    #[error("no valid directory found")]
    Corrupt,
    #[error("file not found")]
    NotFound,
    #[error("no space left")]
    NoSpace,
    #[error("file name too long")]
    NameTooLong,
    #[error("invalid file name")]
    InvalidName,
    #[error("file too large")]
    TooLarge,
    #[error("seek out of range")]
    InvalidSeek,
    #[error("file not opened for reading")]
    NotReadable,
    #[error("file not opened for writing")]
    NotWritable,
}

impl FsError {
    fn flash<E: NorFlashError>(error: E) -> Self {
        FsError::Flash(error.kind().into())
    }
}

/// Options for [`Filesystem::open()`], in the manner of `std::fs::OpenOptions`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenOptions {
    read: bool,
    write: bool,
    create: bool,
    truncate: bool,
    append: bool,
}

impl OpenOptions {
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
            create: false,
            truncate: false,
            append: false,
        }
    }

    pub const fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub const fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Create the file if it does not exist. Requires write or append.
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Empty the file on open. Requires write.
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Every write goes to the end of the file
    pub const fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    const fn writable(&self) -> bool {
        self.write || self.append
    }
}

/// Seek origin for [`Filesystem::seek()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SeekFrom {
    Start(u32),
    End(i32),
    Current(i32),
}

/// An open file
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct File {
    slot: u8,
    position: u32,
    options: OpenOptions,
}

impl File {
    pub const fn position(&self) -> u32 {
        self.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Metadata {
    pub size: u32,
}

/// A file listed by [`Filesystem::list()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    name_len: u8,
    name: [u8; MAX_NAME_LEN],
    size: u16,
    /// Data block indices, 0 for a block that was never written
    blocks: [u8; BLOCKS_PER_FILE],
}

impl Entry {
    const EMPTY: Entry = Entry {
        name_len: 0,
        name: [0; MAX_NAME_LEN],
        size: 0,
        blocks: [0; BLOCKS_PER_FILE],
    };

    fn new(name: &str) -> Self {
        let mut entry = Entry::EMPTY;
        entry.name_len = name.len() as u8;
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry
    }

    fn is_used(&self) -> bool {
        self.name_len != 0
    }

    fn name(&self) -> &str {
        let len = (self.name_len as usize).min(MAX_NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    fn truncate(&mut self) {
        self.size = 0;
        self.blocks = [0; BLOCKS_PER_FILE];
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.name_len;
        out[1..1 + MAX_NAME_LEN].copy_from_slice(&self.name);
        out[1 + MAX_NAME_LEN..3 + MAX_NAME_LEN].copy_from_slice(&self.size.to_le_bytes());
        out[3 + MAX_NAME_LEN..ENTRY_LEN].copy_from_slice(&self.blocks);
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut entry = Entry::EMPTY;
        entry.name_len = bytes[0];
        entry.name.copy_from_slice(&bytes[1..1 + MAX_NAME_LEN]);
        entry.size = u16::from_le_bytes([bytes[1 + MAX_NAME_LEN], bytes[2 + MAX_NAME_LEN]]);
        entry.blocks.copy_from_slice(&bytes[3 + MAX_NAME_LEN..ENTRY_LEN]);
        entry
    }
}

type Directory = [Entry; MAX_FILES];

/// FNV-1a
fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5, |hash, &byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

fn encode_directory(revision: u32, directory: &Directory, block: &mut [u8; BLOCK_SIZE]) {
    block.fill(0);
    block[..4].copy_from_slice(&MAGIC);
    block[4..8].copy_from_slice(&revision.to_le_bytes());

    for (entry, out) in directory
        .iter()
        .zip(block[ENTRIES_OFFSET..].chunks_exact_mut(ENTRY_LEN))
    {
        entry.encode(out);
    }

    let sum = checksum(&block[..CHECKSUM_OFFSET]);
    block[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
}

fn decode_directory(block: &[u8; BLOCK_SIZE]) -> Option<(u32, Directory)> {
    if block[..4] != MAGIC {
        return None;
    }

    let sum = u32::from_le_bytes([
        block[CHECKSUM_OFFSET],
        block[CHECKSUM_OFFSET + 1],
        block[CHECKSUM_OFFSET + 2],
        block[CHECKSUM_OFFSET + 3],
    ]);
    if sum != checksum(&block[..CHECKSUM_OFFSET]) {
        return None;
    }

    let revision = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let mut directory = [Entry::EMPTY; MAX_FILES];
    for (entry, bytes) in directory
        .iter_mut()
        .zip(block[ENTRIES_OFFSET..].chunks_exact(ENTRY_LEN))
    {
        *entry = Entry::decode(bytes);
    }

    Some((revision, directory))
}

fn validate_name(name: &str) -> Result<(), FsError> {
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    if name.is_empty() || name.bytes().any(|b| b == b'/' || b == 0) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

/// The filesystem
pub struct Filesystem<F> {
    flash: F,
    block_count: u8,
    mounted: bool,
    revision: u32,
    /// Metadata block holding the current directory
    active: u8,
    directory: Directory,
    next_alloc: u8,
}

impl<F: NorFlash> Filesystem<F> {
    /// Wrap a flash device. The filesystem must be mounted or formatted before use.
    pub fn new(flash: F) -> Self {
        let block_count = (flash.capacity() / BLOCK_SIZE).min(u8::MAX as usize) as u8;

        Self {
            flash,
            block_count,
            mounted: false,
            revision: 0,
            active: 0,
            directory: [Entry::EMPTY; MAX_FILES],
            next_alloc: METADATA_BLOCKS,
        }
    }

    /// Give back the flash device
    pub fn release(self) -> F {
        self.flash
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Load the newest valid directory from flash
    pub fn mount(&mut self) -> Result<(), FsError> {
        let mut block = [0; BLOCK_SIZE];
        let mut newest: Option<(u32, u8, Directory)> = None;

        for index in 0..METADATA_BLOCKS {
            self.read_block(index, &mut block)?;

            if let Some((revision, directory)) = decode_directory(&block) {
                let newer = match newest {
                    Some((current, _, _)) => revision.wrapping_sub(current) as i32 > 0,
                    None => true,
                };
                if newer {
                    newest = Some((revision, index, directory));
                }
            }
        }

        let (revision, active, directory) = newest.ok_or(FsError::Corrupt)?;
        self.revision = revision;
        self.active = active;
        self.directory = directory;
        self.mounted = true;

        debug!("mounted filesystem revision {}", revision);
        Ok(())
    }

    /// Erase the directory, losing every file
    pub fn format(&mut self) -> Result<(), FsError> {
        if self.block_count <= METADATA_BLOCKS {
            return Err(FsError::NoSpace);
        }

        info!("formatting filesystem");

        // Stale directories must not outlive the format
        for index in 0..METADATA_BLOCKS {
            self.erase_block(index)?;
        }

        self.revision = 0;
        self.active = 1;
        self.mounted = true;
        self.commit(&[Entry::EMPTY; MAX_FILES])
    }

    /// Mount the filesystem, formatting it first if there is no valid directory
    pub fn mount_or_format(&mut self) -> Result<(), FsError> {
        match self.mount() {
            Err(FsError::Corrupt) => {
                self.format()?;
                self.mount()
            }
            result => result,
        }
    }

    pub fn stat(&self, name: &str) -> Result<Metadata, FsError> {
        self.check_mounted()?;
        let slot = self.find(name).ok_or(FsError::NotFound)?;

        Ok(Metadata {
            size: self.directory[slot].size as u32,
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.stat(name).is_ok()
    }

    pub fn open(&mut self, name: &str, options: &OpenOptions) -> Result<File, FsError> {
        self.check_mounted()?;
        validate_name(name)?;

        let mut directory = self.directory;
        let slot = match self.find(name) {
            Some(slot) => slot,
            None if options.create && options.writable() => {
                let slot = self.free_slot().ok_or(FsError::NoSpace)?;
                directory[slot] = Entry::new(name);
                slot
            }
            None => return Err(FsError::NotFound),
        };

        if options.truncate && options.write {
            directory[slot].truncate();
        }

        if directory != self.directory {
            self.commit(&directory)?;
        }

        Ok(File {
            slot: slot as u8,
            position: 0,
            options: *options,
        })
    }

    /// Read from the file's position, returning the number of bytes read. Zero at end of file.
    pub fn read(&mut self, file: &mut File, buf: &mut [u8]) -> Result<usize, FsError> {
        self.check_mounted()?;
        if !file.options.read {
            return Err(FsError::NotReadable);
        }

        let entry = self.entry(file)?;
        let size = entry.size as u32;
        if file.position >= size {
            return Ok(0);
        }

        let len = buf.len().min((size - file.position) as usize);
        let mut block = [0; BLOCK_SIZE];
        let mut done = 0;

        while done < len {
            let position = file.position as usize + done;
            let offset = position % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - offset).min(len - done);

            match entry.blocks[position / BLOCK_SIZE] {
                0 => block.fill(0),
                index => self.read_block(index, &mut block)?,
            }

            buf[done..done + chunk].copy_from_slice(&block[offset..offset + chunk]);
            done += chunk;
        }

        file.position += len as u32;
        Ok(len)
    }

    /// Write at the file's position (or the end, when appending) and commit
    pub fn write(&mut self, file: &mut File, data: &[u8]) -> Result<usize, FsError> {
        self.check_mounted()?;
        if !file.options.writable() {
            return Err(FsError::NotWritable);
        }
        self.entry(file)?;

        let slot = file.slot as usize;
        let position = if file.options.append {
            self.directory[slot].size as u32
        } else {
            file.position
        };

        let mut directory = self.directory;
        self.write_at(&mut directory, slot, position, data)?;
        self.commit(&directory)?;

        file.position = position + data.len() as u32;
        Ok(data.len())
    }

    /// Move the file's position, returning the new position
    pub fn seek(&mut self, file: &mut File, from: SeekFrom) -> Result<u32, FsError> {
        self.check_mounted()?;
        let size = self.entry(file)?.size as i64;

        let position = match from {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => size + offset as i64,
            SeekFrom::Current(offset) => file.position as i64 + offset as i64,
        };

        if !(0..=MAX_FILE_SIZE as i64).contains(&position) {
            return Err(FsError::InvalidSeek);
        }

        file.position = position as u32;
        Ok(file.position)
    }

    pub fn remove(&mut self, name: &str) -> Result<(), FsError> {
        self.check_mounted()?;
        let slot = self.find(name).ok_or(FsError::NotFound)?;

        let mut directory = self.directory;
        directory[slot] = Entry::EMPTY;
        self.commit(&directory)
    }

    /// Every file in the filesystem
    pub fn list(&self) -> impl Iterator<Item = DirEntry<'_>> {
        self.directory
            .iter()
            .filter(|entry| entry.is_used())
            .map(|entry| DirEntry {
                name: entry.name(),
                size: entry.size as u32,
            })
    }

    /// Bytes available for new data
    pub fn free_space(&self) -> Result<u32, FsError> {
        self.check_mounted()?;

        let free = (METADATA_BLOCKS..self.block_count)
            .filter(|&index| !self.in_use(index, &self.directory))
            .count();
        Ok((free * BLOCK_SIZE) as u32)
    }

    pub fn file_size(&self, name: &str) -> Result<u32, FsError> {
        self.stat(name).map(|metadata| metadata.size)
    }

    /// Read the start of a file into `buf`, returning the number of bytes read
    pub fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut file = self.open(name, &OpenOptions::new().read(true))?;
        self.read(&mut file, buf)
    }

    /// Read the line starting at `offset` into `buf`, without the newline. `offset` is moved to
    /// the start of the next line.
    ///
    /// Returns `None` once `offset` is at the end of the file. Lines longer than `buf` are split.
    pub fn read_line(
        &mut self,
        name: &str,
        offset: &mut u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, FsError> {
        let mut file = self.open(name, &OpenOptions::new().read(true))?;
        self.seek(&mut file, SeekFrom::Start(*offset))?;

        let read = self.read(&mut file, buf)?;
        if read == 0 {
            return Ok(None);
        }

        let line = match buf[..read].iter().position(|&b| b == b'\n') {
            Some(newline) => {
                *offset += newline as u32 + 1;
                newline
            }
            None => {
                *offset += read as u32;
                read
            }
        };

        Ok(Some(line))
    }

    /// Replace the contents of a file, creating it if needed. The old contents stay intact until
    /// the new ones are committed.
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        self.check_mounted()?;
        validate_name(name)?;

        let mut directory = self.directory;
        let slot = match self.find(name) {
            Some(slot) => slot,
            None => self.free_slot().ok_or(FsError::NoSpace)?,
        };
        directory[slot] = Entry::new(name);

        self.write_at(&mut directory, slot, 0, data)?;
        self.commit(&directory)
    }

    /// Append to a file, creating it if needed
    pub fn append_file(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let options = OpenOptions::new().append(true).create(true);
        let mut file = self.open(name, &options)?;
        self.write(&mut file, data).map(|_| ())
    }

    fn check_mounted(&self) -> Result<(), FsError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FsError::NotMounted)
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.directory
            .iter()
            .position(|entry| entry.is_used() && entry.name() == name)
    }

    fn free_slot(&self) -> Option<usize> {
        self.directory.iter().position(|entry| !entry.is_used())
    }

    fn entry(&self, file: &File) -> Result<Entry, FsError> {
        self.directory
            .get(file.slot as usize)
            .filter(|entry| entry.is_used())
            .copied()
            .ok_or(FsError::NotFound)
    }

    fn in_use(&self, index: u8, directory: &Directory) -> bool {
        directory
            .iter()
            .filter(|entry| entry.is_used())
            .any(|entry| entry.blocks.contains(&index))
    }

    /// Find a data block referenced by neither the committed nor the pending directory
    fn allocate(&mut self, pending: &Directory) -> Result<u8, FsError> {
        let first = METADATA_BLOCKS as usize;
        let data_blocks = self.block_count as usize - first;
        let start = self.next_alloc as usize - first;

        for i in 0..data_blocks {
            let index = (first + (start + i) % data_blocks) as u8;

            if !self.in_use(index, &self.directory) && !self.in_use(index, pending) {
                self.next_alloc = (first + (start + i + 1) % data_blocks) as u8;
                return Ok(index);
            }
        }

        Err(FsError::NoSpace)
    }

    /// Write `data` at `position` into fresh blocks, updating `directory` but not committing it
    fn write_at(
        &mut self,
        directory: &mut Directory,
        slot: usize,
        position: u32,
        data: &[u8],
    ) -> Result<(), FsError> {
        if data.is_empty() {
            return Ok(());
        }

        let end = position as usize + data.len();
        if end > MAX_FILE_SIZE as usize {
            return Err(FsError::TooLarge);
        }

        let start = position as usize;
        let old_size = directory[slot].size as usize;
        let mut block = [0; BLOCK_SIZE];

        for index in start / BLOCK_SIZE..=(end - 1) / BLOCK_SIZE {
            let block_start = index * BLOCK_SIZE;

            match directory[slot].blocks[index] {
                0 => block.fill(0),
                existing => self.read_block(existing, &mut block)?,
            }

            // Anything past the old end of file reads back as zero
            if old_size < block_start + BLOCK_SIZE {
                block[old_size.saturating_sub(block_start)..].fill(0);
            }

            let from = start.max(block_start);
            let to = end.min(block_start + BLOCK_SIZE);
            block[from - block_start..to - block_start].copy_from_slice(&data[from - start..to - start]);

            let fresh = self.allocate(directory)?;
            self.erase_block(fresh)?;
            self.write_block(fresh, &block)?;
            directory[slot].blocks[index] = fresh;
        }

        directory[slot].size = directory[slot].size.max(end as u16);
        Ok(())
    }

    /// Write `directory` as the next revision
    fn commit(&mut self, directory: &Directory) -> Result<(), FsError> {
        let revision = self.revision.wrapping_add(1);
        let target = (self.active + 1) % METADATA_BLOCKS;

        let mut block = [0; BLOCK_SIZE];
        encode_directory(revision, directory, &mut block);
        self.erase_block(target)?;
        self.write_block(target, &block)?;

        self.revision = revision;
        self.active = target;
        self.directory = *directory;
        Ok(())
    }

    fn read_block(&mut self, index: u8, block: &mut [u8; BLOCK_SIZE]) -> Result<(), FsError> {
        let offset = index as u32 * BLOCK_SIZE as u32;
        self.flash.read(offset, block).map_err(FsError::flash)
    }

    fn write_block(&mut self, index: u8, block: &[u8; BLOCK_SIZE]) -> Result<(), FsError> {
        let offset = index as u32 * BLOCK_SIZE as u32;
        self.flash.write(offset, block).map_err(FsError::flash)
    }

    fn erase_block(&mut self, index: u8) -> Result<(), FsError> {
        let from = index as u32 * BLOCK_SIZE as u32;
        self.flash
            .erase(from, from + BLOCK_SIZE as u32)
            .map_err(FsError::flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16 blocks
    type Flash = RamFlash<4096>;

    fn formatted() -> Filesystem<Flash> {
        let mut fs = Filesystem::new(Flash::new());
        fs.format().unwrap();
        fs
    }

    #[test]
    fn blank_flash_does_not_mount() {
        let mut fs = Filesystem::new(Flash::new());
        assert_eq!(fs.mount(), Err(FsError::Corrupt));
        assert_eq!(fs.stat("settings.u32"), Err(FsError::NotMounted));

        fs.mount_or_format().unwrap();
        assert!(fs.is_mounted());
        assert_eq!(fs.list().count(), 0);
    }

    #[test]
    fn files_survive_remount() {
        let mut fs = formatted();
        fs.write_file("settings.u32", &[1, 2, 3, 4]).unwrap();
        fs.write_file("log.txt", b"hello\n").unwrap();

        let mut fs = Filesystem::new(fs.release());
        fs.mount().unwrap();

        let mut buf = [0; 8];
        assert_eq!(fs.read_file("settings.u32", &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(fs.file_size("log.txt"), Ok(6));

        let names: Vec<_> = fs.list().map(|entry| entry.name).collect();
        assert_eq!(names, ["settings.u32", "log.txt"]);
    }

    #[test]
    fn newest_directory_wins() {
        let mut fs = formatted();
        for i in 0..5u8 {
            fs.write_file("count", &[i]).unwrap();
        }

        let mut fs = Filesystem::new(fs.release());
        fs.mount().unwrap();
        let mut buf = [0; 1];
        fs.read_file("count", &mut buf).unwrap();
        assert_eq!(buf, [4]);
    }

    #[test]
    fn corrupt_directory_falls_back_to_previous() {
        let mut fs = formatted();
        fs.write_file("a", b"first").unwrap();
        fs.write_file("a", b"second").unwrap();
        let active = fs.active;

        let mut flash = fs.release();
        flash.corrupt(active as usize * BLOCK_SIZE + 10);

        let mut fs = Filesystem::new(flash);
        fs.mount().unwrap();
        let mut buf = [0; 8];
        let n = fs.read_file("a", &mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");
    }

    #[test]
    fn open_options() {
        let mut fs = formatted();

        assert_eq!(
            fs.open("missing", &OpenOptions::new().read(true)),
            Err(FsError::NotFound)
        );
        assert_eq!(
            fs.open("this-name-is-too-long", &OpenOptions::new().write(true).create(true)),
            Err(FsError::NameTooLong)
        );
        assert_eq!(
            fs.open("a/b", &OpenOptions::new().write(true).create(true)),
            Err(FsError::InvalidName)
        );

        let mut file = fs
            .open("data", &OpenOptions::new().write(true).create(true))
            .unwrap();
        fs.write(&mut file, b"0123456789").unwrap();
        let mut buf = [0; 4];
        assert_eq!(fs.read(&mut file, &mut buf), Err(FsError::NotReadable));

        let mut file = fs
            .open("data", &OpenOptions::new().read(true).write(true).truncate(true))
            .unwrap();
        assert_eq!(fs.read(&mut file, &mut buf), Ok(0));
        assert_eq!(fs.file_size("data"), Ok(0));
    }

    #[test]
    fn seek_and_overwrite() {
        let mut fs = formatted();
        let options = OpenOptions::new().read(true).write(true).create(true);
        let mut file = fs.open("data", &options).unwrap();

        fs.write(&mut file, b"hello world").unwrap();
        assert_eq!(fs.seek(&mut file, SeekFrom::Start(6)), Ok(6));
        fs.write(&mut file, b"there").unwrap();
        assert_eq!(fs.seek(&mut file, SeekFrom::End(-11)), Ok(0));

        let mut buf = [0; 16];
        let n = fs.read(&mut file, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello there");
        assert_eq!(fs.seek(&mut file, SeekFrom::Current(-20)), Err(FsError::InvalidSeek));
    }

    #[test]
    fn writes_span_blocks() {
        let mut fs = formatted();
        let data: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
        fs.write_file("big", &data).unwrap();

        let options = OpenOptions::new().read(true).write(true);
        let mut file = fs.open("big", &options).unwrap();
        fs.seek(&mut file, SeekFrom::Start(250)).unwrap();
        fs.write(&mut file, &[0xAA; 10]).unwrap();

        let mut buf = [0; 700];
        assert_eq!(fs.read_file("big", &mut buf), Ok(600));
        assert_eq!(&buf[..250], &data[..250]);
        assert_eq!(&buf[250..260], &[0xAA; 10]);
        assert_eq!(&buf[260..600], &data[260..]);
    }

    #[test]
    fn gaps_read_as_zero() {
        let mut fs = formatted();
        let mut file = fs
            .open("sparse", &OpenOptions::new().read(true).write(true).create(true))
            .unwrap();
        fs.seek(&mut file, SeekFrom::Start(300)).unwrap();
        fs.write(&mut file, b"x").unwrap();

        let mut buf = [0xFF; 301];
        assert_eq!(fs.read_file("sparse", &mut buf), Ok(301));
        assert!(buf[..300].iter().all(|&b| b == 0));
        assert_eq!(buf[300], b'x');
    }

    #[test]
    fn append_and_read_lines() {
        let mut fs = formatted();
        fs.append_file("log", b"one\n").unwrap();
        fs.append_file("log", b"two\nthree").unwrap();

        let mut offset = 0;
        let mut buf = [0; 16];
        let mut lines = Vec::new();
        while let Some(len) = fs.read_line("log", &mut offset, &mut buf).unwrap() {
            lines.push(String::from_utf8(buf[..len].to_vec()).unwrap());
        }
        assert_eq!(lines, ["one", "two", "three"]);
    }

    #[test]
    fn remove_frees_space() {
        let mut fs = formatted();
        let empty = fs.free_space().unwrap();
        assert_eq!(empty, 14 * BLOCK_SIZE as u32);

        fs.write_file("data", &[7; 300]).unwrap();
        assert_eq!(fs.free_space(), Ok(empty - 2 * BLOCK_SIZE as u32));

        fs.remove("data").unwrap();
        assert_eq!(fs.free_space(), Ok(empty));
        assert!(!fs.exists("data"));
        assert_eq!(fs.remove("data"), Err(FsError::NotFound));
    }

    #[test]
    fn limits() {
        let mut fs = formatted();
        assert_eq!(
            fs.write_file("big", &[0; MAX_FILE_SIZE as usize + 1]),
            Err(FsError::TooLarge)
        );

        for i in 0..MAX_FILES {
            fs.write_file(&format!("f{i}"), b"").unwrap();
        }
        assert_eq!(fs.write_file("one-more", b""), Err(FsError::NoSpace));
    }

    #[test]
    fn rewrite_needs_room_for_a_copy() {
        let mut fs = formatted();
        fs.write_file("a", &[1; 1792]).unwrap();
        fs.write_file("b", &[2; 1536]).unwrap();

        // 7 + 6 of 14 data blocks are in use, a copy of "a" does not fit
        assert_eq!(fs.write_file("a", &[3; 1792]), Err(FsError::NoSpace));

        let mut buf = [0; 4];
        fs.read_file("a", &mut buf).unwrap();
        assert_eq!(buf, [1; 4]);
    }
}
