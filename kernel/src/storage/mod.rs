mod block_alloc;
pub mod block_device;
mod error;
mod file_table;
mod flat_fs;
pub mod mock_device;
mod mount;
mod snapshot;

pub use block_alloc::{AllocError, BlockBitmap};
pub use block_device::{Block, BlockDevice, DeviceError, PollStage};
pub use error::FsError;
pub use file_table::{blocks_for, is_valid_name, FileInfo, FileRecord, FileTable, MAX_NAME_LEN, NAME_LEN};
pub use flat_fs::{normalize_line_breaks, FlatFs, Usage};
pub use mount::BootGeometry;
pub use snapshot::{Snapshot, SnapshotEntry};
