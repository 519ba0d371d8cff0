pub mod disk_file;
pub mod mem_file;
pub mod page;
pub mod paged_file;

pub use disk_file::DiskFile;
pub use mem_file::MemFile;
pub use page::{page_constants, Page, PageId};
pub use paged_file::{FileId, FileRef, PagedFile};
