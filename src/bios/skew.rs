//! ## Sector Skewing Module
//!
//! This contains all the sector skew tables.  This includes any non-trivial transformations
//! between blocks and sectors.
//!
//! The sector skews are kept separate from file systems and disk images because multiple
//! submodules of either can use the same tables.

use log::trace;

/// Take CP/M logical sector to DOS logical sector; the offset within the DOS sector is obtained by another table.
pub const CPM_LSEC_TO_DOS_LSEC: [usize;32] = [0,0,6,6,12,12,3,3,9,9,15,15,14,14,5,5,11,11,2,2,8,8,7,7,13,13,4,4,10,10,1,1];
/// Take CP/M logical sector to offset within DOS logical sector
pub const CPM_LSEC_TO_DOS_OFFSET: [usize;32] = [0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128,0,128];

/// Translate DOS 3.3 logical sector to physical sector
pub const DOS_LSEC_TO_DOS_PSEC: [usize;16] = [0,13,11,9,7,5,3,1,14,12,10,8,6,4,2,15];
/// Translate DOS 3.3 physical sector to logical sector
pub const DOS_PSEC_TO_DOS_LSEC: [usize;16] = [0,7,14,6,13,5,12,4,11,3,10,2,9,1,8,15];

const PRODOS_BLOCK_OFFSET: [usize;16] = [0,7,6,6,5,5,4,4,3,3,2,2,1,1,0,7];
const PRODOS_BYTE_OFFSET: [usize;16] = [0,0,256,0,256,0,256,0,256,0,256,0,256,0,256,256];

/// Get block number and byte offset into block corresponding to
/// track and logical sector of a 16 sector disk.  Returned in tuple (block,offset).
/// The caller is responsible for keeping `sector<16`.
pub fn prodos_block_from_ts(track: usize,sector: usize) -> (usize,usize) {
    (8*track + PRODOS_BLOCK_OFFSET[sector], PRODOS_BYTE_OFFSET[sector])
}

/// Get the two track and logical sector pairs corresponding to a block of a 16 sector disk.
/// The pairs are arranged in order, i.e., the first pair holds bytes 0..256 of the block.
pub fn ts_from_prodos_block(block: usize) -> [[usize;2];2] {
    let sector1: [usize;8] = [0,13,11,9,7,5,3,1];
    let sector2: [usize;8] = [14,12,10,8,6,4,2,15];
    let [track,sec1,sec2] = [block/8,sector1[block%8],sector2[block%8]];
    trace!("locate block {}: track {}, sectors {},{}",block,track,sec1,sec2);
    [[track,sec1],[track,sec2]]
}

/// Locate a 128 byte CP/M record on a 16 sector disk, counting records from the start of
/// track `off`.  Returns the DOS track and logical sector, and the byte offset within that sector.
pub fn cpm_record_ts(record: usize,off: usize) -> ([usize;2],usize) {
    let lsec = record % 32;
    let track = off + record / 32;
    ([track,CPM_LSEC_TO_DOS_LSEC[lsec]],CPM_LSEC_TO_DOS_OFFSET[lsec])
}

#[test]
fn dos_skew_tables_are_inverse() {
    for lsec in 0..16 {
        assert_eq!(DOS_PSEC_TO_DOS_LSEC[DOS_LSEC_TO_DOS_PSEC[lsec]],lsec);
    }
}

#[test]
fn prodos_block_round_trip() {
    for block in 0..280 {
        let [first,second] = ts_from_prodos_block(block);
        assert_eq!(prodos_block_from_ts(first[0],first[1]),(block,0));
        assert_eq!(prodos_block_from_ts(second[0],second[1]),(block,256));
    }
}

#[test]
fn cpm_records_fill_each_dos_sector_twice() {
    let mut seen = std::collections::HashSet::new();
    for record in 0..32 {
        let (ts,offset) = cpm_record_ts(record,3);
        assert_eq!(ts[0],3);
        assert!(seen.insert((ts[1],offset)));
    }
    assert_eq!(seen.len(),32);
}
