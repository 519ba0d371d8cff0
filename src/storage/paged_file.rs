use std::{fmt, io, sync::Arc};

use super::page::{Page, PageId};

/// The durable side of the buffer manager: a file of fixed-size pages.
///
/// Implementations use interior mutability; one file is shared by the
/// buffer manager and every caller holding an `Arc` to it.
pub trait PagedFile: Send + Sync {
    /// Stable identity of the file. Two handles with the same name are the
    /// same file as far as the buffer manager is concerned.
    fn filename(&self) -> &str;

    fn read_page(&self, page_no: PageId) -> io::Result<Page>;

    fn write_page(&self, page: &Page) -> io::Result<()>;

    /// Allocates a new zeroed page and returns it.
    fn allocate_page(&self) -> io::Result<Page>;

    fn delete_page(&self, page_no: PageId) -> io::Result<()>;
}

pub type FileRef = Arc<dyn PagedFile>;

/// Canonical file name used as the file half of a lookup key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<str>);

impl FileId {
    pub fn new(name: &str) -> Self {
        FileId(Arc::from(name))
    }

    pub fn of(file: &dyn PagedFile) -> Self {
        FileId::new(file.filename())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({:?})", &*self.0)
    }
}
