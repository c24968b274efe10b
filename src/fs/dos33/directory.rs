//! # DOS 3.3 directory structures
//! These are fixed length structures, with the DiskStruct trait.

use binrw::{BinRead,BinWrite};

// Note on large volumes:
// The bitmap is extended to 200 bytes, allowing for VTOC.tracks = 50.
// VTOC.sectors can be 32, because the bitmap allocates 32 bits per track.
// This gives 50*32*256 = 409600, i.e., the 400K logical disks of UniDOS and OzDOS.

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct VTOC {
    pub pad1: u8,
    pub track1: u8,
    pub sector1: u8,
    pub version: u8,
    pub pad2: [u8;2],
    pub vol: u8,
    pub pad3: [u8;32],
    pub max_pairs: u8,
    pub pad4: [u8;8],
    pub last_track: u8,
    pub last_direction: u8,
    pub pad5: [u8;2],
    pub tracks: u8,
    pub sectors: u8,
    pub bytes: u16,
    pub bitmap: [u8;200]
}

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct TrackSectorList {
    pub pad1: u8,
    pub next_track: u8,
    pub next_sector: u8,
    pub pad2: [u8;2],
    pub sector_base: u16,
    pub pad3: [u8;5],
    pub pairs: [u8;244]
}

#[derive(BinRead,BinWrite,Clone,Copy)]
#[brw(little)]
pub struct DirectoryEntry {
    pub tsl_track: u8,
    pub tsl_sector: u8,
    pub file_type: u8,
    pub name: [u8;30],
    pub sectors: u16
}

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct DirectorySector {
    pub pad1: u8,
    pub next_track: u8,
    pub next_sector: u8,
    pub pad2: [u8;8],
    pub entries: [DirectoryEntry;7]
}

impl TrackSectorList {
    pub fn new() -> Self {
        Self {
            pad1: 0,
            next_track: 0,
            next_sector: 0,
            pad2: [0;2],
            sector_base: 0,
            pad3: [0;5],
            pairs: [0;244]
        }
    }
}

impl DirectoryEntry {
    pub fn new() -> Self {
        Self {
            tsl_track: 0,
            tsl_sector: 0,
            file_type: 0,
            name: [0xa0;30],
            sectors: 0
        }
    }
}

impl DirectorySector {
    pub fn new() -> Self {
        Self {
            pad1: 0,
            next_track: 0,
            next_sector: 0,
            pad2: [0;8],
            entries: [DirectoryEntry::new();7]
        }
    }
}
