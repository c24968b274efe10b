//! ### ProDOS directory structures
//!
//! Every directory block holds two link pointers followed by 13 slots of 39 bytes.
//! In the key block of a directory the first slot is the volume or subdirectory header,
//! so `DirBlock` holds it as an `Entry` and the header accessors reinterpret those bytes.

use binrw::{BinRead,BinWrite};
use chrono::{Datelike,Timelike};
use num_traits::FromPrimitive;
use regex::Regex;
use super::types::*;
use crate::{DiskStruct,DYNERR};

pub fn pack_time(now: chrono::NaiveDateTime) -> [u8;4] {
    let (_is_common_era,year) = now.year_ce();
    let packed_date = (now.day() + (now.month() << 5) + (year%100 << 9)) as u16;
    let packed_time = (now.minute() + (now.hour() << 8)) as u16;
    let bytes_date = u16::to_le_bytes(packed_date);
    let bytes_time = u16::to_le_bytes(packed_time);
    [bytes_date[0],bytes_date[1],bytes_time[0],bytes_time[1]]
}

pub fn unpack_time(prodos_date_time: [u8;4]) -> Option<chrono::NaiveDateTime> {
    let date = u16::from_le_bytes([prodos_date_time[0],prodos_date_time[1]]);
    let time = u16::from_le_bytes([prodos_date_time[2],prodos_date_time[3]]);
    let yearmod100 = date >> 9;
    // two digit years before 79 are taken to be in the 21st century
    let year = match yearmod100 < 79 {
        true => 2000 + yearmod100,
        false => 1900 + yearmod100
    };
    let month = (date >> 5) & 15;
    let day = date & 31;
    let hour = (time >> 8) & 255;
    let minute = time & 255;
    match chrono::NaiveDate::from_ymd_opt(year as i32,month as u32,day as u32) {
        Some(date) => date.and_hms_opt(hour as u32,minute as u32,0),
        None => None
    }
}

/// Test the string for validity as a ProDOS name.
pub fn is_name_valid(s: &str) -> bool {
    match Regex::new(r"^[A-Z][A-Z0-9.]{0,14}$") {
        Ok(fname_patt) => fname_patt.is_match(&s.to_uppercase()),
        Err(_) => false
    }
}

/// Convert filename bytes to a string, the length is the low nibble of `nibs`.
/// Bytes outside of printable ASCII are escaped.
pub fn file_name_to_string(nibs: u8,fname: [u8;15]) -> String {
    let name_len = (nibs & 0x0f) as usize;
    fname[0..name_len].iter().map(|c| match c {
        0x20..=0x7e => (*c as char).to_string(),
        _ => format!("\\x{:02X}",c)
    }).collect()
}

/// Convert storage type and name to (stor_len_nibs,fname).
/// The name must already be valid.
pub fn string_to_file_name(stype: StorageType,s: &str) -> (u8,[u8;15]) {
    let new_nibs = ((stype as u8) << 4) + s.len() as u8;
    let mut ans: [u8;15] = [0;15];
    for (i,c) in s.to_uppercase().bytes().take(15).enumerate() {
        ans[i] = c;
    }
    (new_nibs,ans)
}

#[derive(BinRead,BinWrite,Clone,Copy)]
#[brw(little)]
pub struct VolDirHeader {
    pub stor_len_nibs: u8,
    pub name: [u8;15],
    pub pad1: [u8;8],
    pub create_time: [u8;4],
    pub vers: u8,
    pub min_vers: u8,
    pub access: u8,
    pub entry_len: u8,
    pub entries_per_block: u8,
    pub file_count: u16,
    pub bitmap_ptr: u16,
    pub total_blocks: u16
}

#[derive(BinRead,BinWrite,Clone,Copy)]
#[brw(little)]
pub struct SubDirHeader {
    pub stor_len_nibs: u8,
    pub name: [u8;15],
    pub pad1: [u8;8],
    pub create_time: [u8;4],
    pub vers: u8,
    pub min_vers: u8,
    pub access: u8,
    pub entry_len: u8,
    pub entries_per_block: u8,
    pub file_count: u16,
    pub parent_ptr: u16,
    pub parent_entry_num: u8,
    pub parent_entry_len: u8
}

#[derive(BinRead,BinWrite,Clone,Copy)]
#[brw(little)]
pub struct Entry {
    pub stor_len_nibs: u8,
    pub name: [u8;15],
    pub file_type: u8,
    pub key_ptr: u16,
    pub blocks_used: u16,
    pub eof: [u8;3],
    pub create_time: [u8;4],
    pub vers: u8,
    pub min_vers: u8,
    pub access: u8,
    pub aux_type: u16,
    pub last_mod: [u8;4],
    pub header_ptr: u16
}

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct DirBlock {
    pub prev: u16,
    pub next: u16,
    pub entries: [Entry;13],
    pub pad: u8
}

impl VolDirHeader {
    /// The name must already be valid
    pub fn create(blocks: u16,vol_name: &str,create_time: chrono::NaiveDateTime) -> Self {
        let (nibs,fname) = string_to_file_name(StorageType::VolDirHeader,vol_name);
        Self {
            stor_len_nibs: nibs,
            name: fname,
            pad1: [0;8],
            create_time: pack_time(create_time),
            vers: 0,
            min_vers: 0,
            access: STD_ACCESS,
            entry_len: ENTRY_LEN,
            entries_per_block: ENTRIES_PER_BLOCK,
            file_count: 0,
            bitmap_ptr: BITMAP_BLOCK,
            total_blocks: blocks
        }
    }
    pub fn name(&self) -> String {
        file_name_to_string(self.stor_len_nibs,self.name)
    }
}

impl SubDirHeader {
    /// The name must already be valid
    pub fn create(name: &str,parent_ptr: u16,parent_entry_num: u8,create_time: chrono::NaiveDateTime) -> Self {
        let (nibs,fname) = string_to_file_name(StorageType::SubDirHeader,name);
        Self {
            stor_len_nibs: nibs,
            name: fname,
            pad1: [0x75,0,0,0,0,0,0,0],
            create_time: pack_time(create_time),
            vers: 0,
            min_vers: 0,
            access: STD_ACCESS,
            entry_len: ENTRY_LEN,
            entries_per_block: ENTRIES_PER_BLOCK,
            file_count: 0,
            parent_ptr,
            parent_entry_num,
            parent_entry_len: ENTRY_LEN
        }
    }
}

impl Entry {
    pub fn new() -> Self {
        Self {
            stor_len_nibs: 0,
            name: [0;15],
            file_type: 0,
            key_ptr: 0,
            blocks_used: 0,
            eof: [0;3],
            create_time: [0;4],
            vers: 0,
            min_vers: 0,
            access: 0,
            aux_type: 0,
            last_mod: [0;4],
            header_ptr: 0
        }
    }
    /// The name must already be valid
    pub fn create(stype: StorageType,name: &str,file_type: u8,key_ptr: u16,header_ptr: u16,create_time: chrono::NaiveDateTime) -> Self {
        let (nibs,fname) = string_to_file_name(stype,name);
        let mut ans = Self::new();
        ans.stor_len_nibs = nibs;
        ans.name = fname;
        ans.file_type = file_type;
        ans.key_ptr = key_ptr;
        ans.create_time = pack_time(create_time);
        ans.access = STD_ACCESS;
        ans.last_mod = pack_time(create_time);
        ans.header_ptr = header_ptr;
        ans
    }
    pub fn is_active(&self) -> bool {
        self.stor_len_nibs>>4 != 0
    }
    pub fn storage_type(&self) -> Option<StorageType> {
        StorageType::from_u8(self.stor_len_nibs >> 4)
    }
    pub fn name(&self) -> String {
        file_name_to_string(self.stor_len_nibs,self.name)
    }
    /// The name exactly as stored, without padding
    pub fn raw_name(&self) -> Vec<u8> {
        self.name[0..(self.stor_len_nibs & 0x0f) as usize].to_vec()
    }
    /// Keeps the storage type
    pub fn rename(&mut self,name: &str) {
        let (nibs,fname) = string_to_file_name(StorageType::Inactive,name);
        self.stor_len_nibs = (self.stor_len_nibs & 0xf0) | nibs;
        self.name = fname;
    }
    pub fn eof(&self) -> usize {
        u32::from_le_bytes([self.eof[0],self.eof[1],self.eof[2],0]) as usize
    }
    pub fn set_eof(&mut self,bytes: usize) {
        let inc = u32::to_le_bytes(bytes as u32);
        self.eof = [inc[0],inc[1],inc[2]];
    }
    pub fn get_access(&self,what: Access) -> bool {
        self.access & what as u8 > 0
    }
    pub fn set_access(&mut self,what: Access,which: bool) {
        if which {
            self.access |= what as u8;
        } else {
            self.access &= u8::MAX ^ what as u8;
        }
    }
}

impl DirBlock {
    pub fn new() -> Self {
        Self {
            prev: 0,
            next: 0,
            entries: [Entry::new();13],
            pad: 0
        }
    }
    /// header slot of a key block, whatever kind it is
    pub fn header_storage_type(&self) -> Option<StorageType> {
        self.entries[0].storage_type()
    }
    pub fn vol_header(&self) -> Result<VolDirHeader,DYNERR> {
        VolDirHeader::from_bytes(&self.entries[0].to_bytes()?)
    }
    pub fn sub_header(&self) -> Result<SubDirHeader,DYNERR> {
        SubDirHeader::from_bytes(&self.entries[0].to_bytes()?)
    }
    pub fn set_header<T: DiskStruct>(&mut self,hdr: &T) -> Result<(),DYNERR> {
        self.entries[0] = Entry::from_bytes(&hdr.to_bytes()?)?;
        Ok(())
    }
    /// Both header types keep the file count in the same place
    pub fn adjust_file_count(&mut self,delta: i32) -> Result<(),DYNERR> {
        let mut hdr = self.sub_header()?;
        hdr.file_count = (hdr.file_count as i32 + delta).max(0) as u16;
        self.set_header(&hdr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn structures_have_prodos_sizes() {
        assert_eq!(Entry::new().to_bytes().unwrap().len(),0x27);
        assert_eq!(DirBlock::new().to_bytes().unwrap().len(),512);
        let now = chrono::NaiveDate::from_ymd_opt(2024,3,9).unwrap().and_hms_opt(13,45,0).unwrap();
        assert_eq!(VolDirHeader::create(280,"TEST",now).to_bytes().unwrap().len(),0x27);
        assert_eq!(SubDirHeader::create("SUB",2,2,now).to_bytes().unwrap().len(),0x27);
    }

    #[test]
    fn header_fields_land_at_prodos_offsets() {
        let now = chrono::NaiveDate::from_ymd_opt(2024,3,9).unwrap().and_hms_opt(13,45,0).unwrap();
        let mut blk = DirBlock::new();
        blk.next = 3;
        blk.set_header(&VolDirHeader::create(1600,"HARD.DISK",now)).unwrap();
        let buf = blk.to_bytes().unwrap();
        assert_eq!(buf[2],3);
        assert_eq!(buf[4],0xf9);
        assert_eq!(buf[0x23],0x27);
        assert_eq!(buf[0x24],0x0d);
        assert_eq!(u16::from_le_bytes([buf[0x27],buf[0x28]]),6);
        assert_eq!(u16::from_le_bytes([buf[0x29],buf[0x2a]]),1600);
        assert_eq!(blk.vol_header().unwrap().name(),"HARD.DISK");
    }

    #[test]
    fn time_round_trip() {
        let now = chrono::NaiveDate::from_ymd_opt(1986,11,30).unwrap().and_hms_opt(23,5,0).unwrap();
        assert_eq!(unpack_time(pack_time(now)),Some(now));
        assert_eq!(unpack_time([0;4]),None);
    }

    #[test]
    fn names() {
        assert!(is_name_valid("HELLO.WORLD"));
        assert!(!is_name_valid("1HELLO"));
        assert!(!is_name_valid("ABCDEFGHIJKLMNOP"));
        let mut ent = Entry::create(StorageType::Sapling,"OLD",6,10,2,chrono::NaiveDateTime::default());
        ent.rename("NEWER");
        assert_eq!(ent.stor_len_nibs,0x25);
        assert_eq!(ent.name(),"NEWER");
    }
}
