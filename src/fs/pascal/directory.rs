//! # Pascal directory elements
//! The directory is the header followed immediately by packed entries,
//! which are allowed to cross block boundaries.

use binrw::{BinRead,BinWrite};
use super::types::ENTRY_SIZE;
use crate::{DiskStruct,DYNERR};

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct VolDirHeader {
    /// points to the first boot block, not the header
    pub begin_block: u16,
    pub end_block: u16,
    pub file_type: u16,
    pub name_len: u8,
    pub name: [u8;7],
    pub total_blocks: u16,
    pub num_files: u16,
    pub last_access_date: u16,
    pub last_set_date: u16,
    pub pad: [u8;4]
}

#[derive(BinRead,BinWrite,Clone,Copy)]
#[brw(little)]
pub struct DirectoryEntry {
    pub begin_block: u16,
    pub end_block: u16,
    pub file_type: u16,
    pub name_len: u8,
    pub name: [u8;15],
    /// bytes in use in the last block
    pub bytes_remaining: u16,
    pub mod_date: u16
}

pub struct Directory {
    pub header: VolDirHeader,
    pub entries: Vec<DirectoryEntry>
}

impl DirectoryEntry {
    pub fn name(&self) -> String {
        let len = usize::min(15,self.name_len as usize);
        self.name[0..len].iter().map(|c| *c as char).collect()
    }
    pub fn raw_name(&self) -> Vec<u8> {
        self.name[0..usize::min(15,self.name_len as usize)].to_vec()
    }
}

impl VolDirHeader {
    pub fn name(&self) -> String {
        let len = usize::min(7,self.name_len as usize);
        self.name[0..len].iter().map(|c| *c as char).collect()
    }
}

impl Directory {
    /// Only the active entries, as counted by the header, are kept
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        let header = VolDirHeader::from_bytes(&buf[0..ENTRY_SIZE])?;
        let count = usize::min((buf.len()/ENTRY_SIZE).saturating_sub(1),header.num_files as usize);
        let mut entries = Vec::new();
        for i in 1..=count {
            entries.push(DirectoryEntry::from_bytes(&buf[i*ENTRY_SIZE..(i+1)*ENTRY_SIZE])?);
        }
        Ok(Self { header, entries })
    }
    /// Header and entries followed by zeros, padded to `len`
    pub fn to_bytes(&self,len: usize) -> Result<Vec<u8>,DYNERR> {
        let mut ans = self.header.to_bytes()?;
        for entry in &self.entries {
            ans.append(&mut entry.to_bytes()?);
        }
        ans.resize(len,0);
        Ok(ans)
    }
}

#[test]
fn entry_sizes() {
    let buf = vec![0;ENTRY_SIZE*2];
    let dir = Directory::from_bytes(&buf).expect("directory did not parse");
    assert_eq!(dir.header.to_bytes().unwrap().len(),ENTRY_SIZE);
    assert_eq!(dir.to_bytes(2048).unwrap().len(),2048);
}
