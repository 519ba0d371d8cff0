use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashlink::LinkedHashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    page::{
        page_constants::{FIRST_PAGE_NO, INVALID_PAGE_NO, PAGE_SIZE},
        Page, PageId,
    },
    paged_file::PagedFile,
};

// Every page occupies one slot: a fixed header followed by the page bytes.
//
//  +----------+----------+----------+----------+----------------------+
//  | page_no  | flag     | crc32    | reserved | data (PAGE_SIZE)     |
//  | u32 LE   | u32 LE   | u32 LE   | u32      |                      |
//  +----------+----------+----------+----------+----------------------+
pub const SLOT_HEADER_SIZE: usize = 16;
pub const SLOT_SIZE: usize = SLOT_HEADER_SIZE + PAGE_SIZE;

const SLOT_FREE: u32 = 0;
const SLOT_LIVE: u32 = 1;

struct SlotHeader {
    page_no: PageId,
    flag: u32,
    checksum: u32,
}

impl SlotHeader {
    fn encode(&self) -> io::Result<[u8; SLOT_HEADER_SIZE]> {
        let mut bytes = [0u8; SLOT_HEADER_SIZE];
        let mut cursor = &mut bytes[..];
        cursor.write_u32::<LittleEndian>(self.page_no)?;
        cursor.write_u32::<LittleEndian>(self.flag)?;
        cursor.write_u32::<LittleEndian>(self.checksum)?;
        Ok(bytes)
    }

    fn decode(mut bytes: &[u8]) -> io::Result<Self> {
        Ok(SlotHeader {
            page_no: bytes.read_u32::<LittleEndian>()?,
            flag: bytes.read_u32::<LittleEndian>()?,
            checksum: bytes.read_u32::<LittleEndian>()?,
        })
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

struct FileMetadata {
    // page_no -> slot offset, in allocation order
    pages: LinkedHashMap<PageId, u64>,

    // Offsets of slots released by deleted pages. Reused before the file grows.
    free_slots: VecDeque<u64>,

    slot_count: u64,
    next_page_no: PageId,
}

struct DiskState {
    io: File,
    meta: FileMetadata,
}

/// An implementation of [`PagedFile`] backed by a single file on disk.
///
/// Page numbers grow monotonically and are never handed out twice, while
/// the slots of deleted pages are recycled for new allocations.
pub struct DiskFile {
    name: String,
    path: PathBuf,
    state: Mutex<DiskState>,
}

impl DiskFile {
    /// Creates a new, empty page file. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let io = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let meta = FileMetadata {
            pages: LinkedHashMap::new(),
            free_slots: VecDeque::new(),
            slot_count: 0,
            next_page_no: FIRST_PAGE_NO,
        };
        DiskFile::from_parts(path.as_ref(), io, meta)
    }

    /// Opens an existing page file and rebuilds its page map from the slot
    /// headers.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let meta = DiskFile::scan(&mut io)?;
        DiskFile::from_parts(path.as_ref(), io, meta)
    }

    pub fn open_or_create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        if path.as_ref().exists() {
            DiskFile::open(path)
        } else {
            DiskFile::create(path)
        }
    }

    fn from_parts(path: &Path, io: File, meta: FileMetadata) -> io::Result<Self> {
        let path = path.canonicalize()?;
        let name = path.to_string_lossy().into_owned();
        Ok(DiskFile {
            name,
            path,
            state: Mutex::new(DiskState { io, meta }),
        })
    }

    fn scan(io: &mut File) -> io::Result<FileMetadata> {
        let len = io.metadata()?.len();
        if len % SLOT_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file length {} is not a multiple of the slot size", len),
            ));
        }

        let mut meta = FileMetadata {
            pages: LinkedHashMap::new(),
            free_slots: VecDeque::new(),
            slot_count: len / SLOT_SIZE as u64,
            next_page_no: FIRST_PAGE_NO,
        };

        let mut header = [0u8; SLOT_HEADER_SIZE];
        for slot in 0..meta.slot_count {
            let offset = slot * SLOT_SIZE as u64;
            io.seek(SeekFrom::Start(offset))?;
            io.read_exact(&mut header)?;

            let header = SlotHeader::decode(&header)?;
            if header.page_no != INVALID_PAGE_NO {
                // Freed slots keep their last page number so it is never handed out again
                let next = header.page_no.checked_add(1).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("slot at offset {} has page number {}", offset, header.page_no),
                    )
                })?;
                meta.next_page_no = meta.next_page_no.max(next);
            }
            if header.flag == SLOT_LIVE && header.page_no != INVALID_PAGE_NO {
                meta.pages.insert(header.page_no, offset);
            } else {
                meta.free_slots.push_back(offset);
            }
        }

        debug!(
            pages = meta.pages.len(),
            free_slots = meta.free_slots.len(),
            "scanned page file"
        );
        Ok(meta)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().meta.pages.len()
    }

    /// Live page numbers in allocation order.
    pub fn page_numbers(&self) -> Vec<PageId> {
        self.state.lock().meta.pages.keys().copied().collect()
    }

    pub fn sync(&self) -> io::Result<()> {
        self.state.lock().io.sync_all()
    }

    fn write_slot(io: &mut File, offset: u64, header: &SlotHeader, data: &[u8]) -> io::Result<()> {
        let mut slot = Vec::with_capacity(SLOT_SIZE);
        slot.extend_from_slice(&header.encode()?);
        slot.extend_from_slice(data);

        io.seek(SeekFrom::Start(offset))?;
        io.write_all(&slot)?;
        io.flush()
    }
}

fn page_not_found(page_no: PageId, name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("page {} not allocated in {}", page_no, name),
    )
}

impl PagedFile for DiskFile {
    fn filename(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_no: PageId) -> io::Result<Page> {
        let mut state = self.state.lock();
        let offset = *state
            .meta
            .pages
            .get(&page_no)
            .ok_or_else(|| page_not_found(page_no, &self.name))?;

        let mut slot = vec![0u8; SLOT_SIZE];
        state.io.seek(SeekFrom::Start(offset))?;
        state.io.read_exact(&mut slot)?;

        let header = SlotHeader::decode(&slot[..SLOT_HEADER_SIZE])?;
        let data = &slot[SLOT_HEADER_SIZE..];
        if header.flag != SLOT_LIVE || header.page_no != page_no {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("slot at offset {} does not hold page {}", offset, page_no),
            ));
        }
        if header.checksum != checksum(data) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch for page {}", page_no),
            ));
        }

        Ok(Page::from_bytes(page_no, data))
    }

    fn write_page(&self, page: &Page) -> io::Result<()> {
        let page_no = page.page_number();
        let mut state = self.state.lock();
        let offset = *state
            .meta
            .pages
            .get(&page_no)
            .ok_or_else(|| page_not_found(page_no, &self.name))?;

        let header = SlotHeader {
            page_no,
            flag: SLOT_LIVE,
            checksum: checksum(page.data()),
        };
        DiskFile::write_slot(&mut state.io, offset, &header, page.data())
    }

    fn allocate_page(&self) -> io::Result<Page> {
        let mut state = self.state.lock();
        let DiskState { io, meta } = &mut *state;

        let page_no = meta.next_page_no;
        let (offset, reused) = match meta.free_slots.pop_front() {
            Some(offset) => (offset, true),
            None => (meta.slot_count * SLOT_SIZE as u64, false),
        };

        let page = Page::new(page_no);
        let header = SlotHeader {
            page_no,
            flag: SLOT_LIVE,
            checksum: checksum(page.data()),
        };
        if let Err(err) = DiskFile::write_slot(io, offset, &header, page.data()) {
            if reused {
                meta.free_slots.push_front(offset);
            }
            return Err(err);
        }

        if !reused {
            meta.slot_count += 1;
        }
        meta.next_page_no += 1;
        meta.pages.insert(page_no, offset);
        Ok(page)
    }

    fn delete_page(&self, page_no: PageId) -> io::Result<()> {
        let mut state = self.state.lock();
        let DiskState { io, meta } = &mut *state;

        let offset = *meta
            .pages
            .get(&page_no)
            .ok_or_else(|| page_not_found(page_no, &self.name))?;

        let header = SlotHeader {
            page_no,
            flag: SLOT_FREE,
            checksum: 0,
        };
        io.seek(SeekFrom::Start(offset))?;
        io.write_all(&header.encode()?)?;
        io.flush()?;

        meta.pages.remove(&page_no);
        meta.free_slots.push_front(offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let header = SlotHeader {
            page_no: 0x0102_0304,
            flag: SLOT_LIVE,
            checksum: 0xAABB_CCDD,
        };
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);

        let decoded = SlotHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.page_no, 0x0102_0304);
        assert_eq!(decoded.checksum, 0xAABB_CCDD);
    }

    #[test]
    fn out_of_range_page_number_fails_the_scan() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.db");

        let header = SlotHeader {
            page_no: PageId::MAX,
            flag: SLOT_LIVE,
            checksum: 0,
        };
        let mut slot = header.encode().unwrap().to_vec();
        slot.resize(SLOT_SIZE, 0);
        std::fs::write(&path, slot).unwrap();

        let err = DiskFile::open(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn checksum_tracks_content() {
        let zero = [0u8; 32];
        let mut one = [0u8; 32];
        one[7] = 1;
        assert_ne!(checksum(&zero), checksum(&one));
        assert_eq!(checksum(&one), checksum(&one));
    }
}
