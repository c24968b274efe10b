//! ### CP/M directory structures
//!
//! The directory is a packed sequence of 32 byte extents.  All information about file
//! locations is in the extents, there is no separate file index or volume bitmap.

use binrw::{BinRead,BinWrite};
use super::types::*;

/// One directory entry.  A file with more than 16K of data needs one extent for every 16K.
#[derive(BinRead,BinWrite,Clone,Copy,PartialEq,Debug)]
#[brw(little)]
pub struct Extent {
    /// 0-15 is the user number, 0xe5 means unused or deleted
    pub user: u8,
    /// positive ASCII, high bits are attributes
    pub name: [u8;8],
    /// high bit of the first byte is read only, second byte is system
    pub typ: [u8;3],
    /// low 5 bits of the extent index
    pub idx_low: u8,
    /// bytes used in the last record, 0 means the record is full
    pub last_bytes: u8,
    /// high bits of the extent index, always 0 here
    pub idx_high: u8,
    /// records used in this extent
    pub records: u8,
    pub block_list: [u8;16]
}

impl Extent {
    pub fn new() -> Self {
        Self {
            user: DELETED,
            name: [0x20;8],
            typ: [0x20;3],
            idx_low: 0,
            last_bytes: 0,
            idx_high: 0,
            records: 0,
            block_list: [0;16]
        }
    }
    /// Name and type without attribute bits, as stored (space padded)
    pub fn plain_name(&self) -> [u8;11] {
        let mut ans = [0;11];
        for i in 0..8 {
            ans[i] = self.name[i] & 0x7f;
        }
        for i in 0..3 {
            ans[8+i] = self.typ[i] & 0x7f;
        }
        ans
    }
    /// Change only the lowest 7 bits (change name, keep flags)
    pub fn set_name(&mut self,name: [u8;8],typ: [u8;3]) {
        for i in 0..8 {
            self.name[i] = (name[i] & 0x7f) + (self.name[i] & 0x80);
        }
        for i in 0..3 {
            self.typ[i] = (typ[i] & 0x7f) + (self.typ[i] & 0x80);
        }
    }
    pub fn index(&self) -> usize {
        (self.idx_low & 0x1f) as usize + 32 * (self.idx_high & 0x3f) as usize
    }
    pub fn is_read_only(&self) -> bool {
        self.typ[0] & READ_ONLY > 0
    }
    /// Block pointers up to the first unused one
    pub fn blocks(&self) -> Vec<usize> {
        self.block_list.iter().take_while(|b| **b>0).map(|b| *b as usize).collect()
    }
    /// Name bytes could belong to a file (printable positive ASCII)
    pub fn has_plausible_name(&self) -> bool {
        self.name.iter().all(|c| *c>=0x20 && *c<0x80) && self.typ.iter().all(|c| (*c & 0x7f)>=0x20)
    }
}

/// Format "BASE.EXT" from the padded name, or "BASE" if there is no extension
pub fn display_name(plain: &[u8;11]) -> String {
    let base: String = plain[0..8].iter().map(|c| *c as char).collect();
    let ext: String = plain[8..11].iter().map(|c| *c as char).collect();
    match ext.trim_end().len() {
        0 => base.trim_end().to_string(),
        _ => [base.trim_end(),".",ext.trim_end()].concat()
    }
}

/// Split a sanitized name into the padded base and extension
pub fn split_name(name: &str) -> ([u8;8],[u8;3]) {
    let (base,ext) = match name.rfind('.') {
        Some(i) => (&name[..i],&name[i+1..]),
        None => (name,"")
    };
    let mut b = [0x20;8];
    let mut e = [0x20;3];
    for (i,c) in base.bytes().take(8).enumerate() {
        b[i] = c;
    }
    for (i,c) in ext.bytes().take(3).enumerate() {
        e[i] = c;
    }
    (b,e)
}
