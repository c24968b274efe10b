//! CP/M constants for the Apple II 5.25 inch disk.
//! The disk parameter block is fixed: 1K blocks, 64 directory entries, 3 reserved tracks.

pub const RECORD_SIZE: usize = 128;
pub const BLOCK_SIZE: usize = 1024;
pub const RECORDS_PER_BLOCK: usize = 8;
/// directory entries in 2 blocks
pub const DIR_ENTRIES: usize = 64;
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DIR_BLOCKS: usize = 2;
/// first track of the data area
pub const OFF: usize = 3;
pub const TRACKS: usize = 35;
pub const SECTORS: usize = 16;
/// blocks in the data area, the directory counts as blocks 0 and 1
pub const USER_BLOCKS: usize = 128;
pub const BLOCKS_PER_EXTENT: usize = 16;
/// records addressed by one full extent
pub const RECORDS_PER_EXTENT: u8 = 0x80;
pub const MAX_EXTENT_INDEX: u8 = 31;
/// user number that marks an entry as unused or deleted
pub const DELETED: u8 = 0xe5;
pub const MAX_USER: u8 = 15;
pub const INVALID_CHARS: &str = " <>.,;:=?*[]";
/// bit in the first extension byte
pub const READ_ONLY: u8 = 0x80;
