use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;
use std::fmt;
use super::super::Error;

pub const VOL_HEADER_BLOCK: usize = 2;
/// first block after the directory as placed by `format`
pub const DIR_END_BLOCK: usize = 6;
/// largest end block a volume header may declare
pub const MAX_DIR_END_BLOCK: usize = 20;
pub const ENTRY_SIZE: usize = 26;

/// Entries that fit after the header in a directory ending at `end_block`
pub fn dir_capacity(end_block: usize) -> usize {
    ((end_block - 2)*512/ENTRY_SIZE).saturating_sub(1)
}
pub const MAX_VOL_NAME: usize = 7;

/// Map file type codes to strings for display
pub const TYPE_MAP_DISP: [(u8,&str);9] = [
    (0x00, "NONE"),
    (0x01, "BAD"),
    (0x02, "CODE"),
    (0x03, "TEXT"),
    (0x04, "INFO"),
    (0x05, "DATA"),
    (0x06, "GRAF"),
    (0x07, "FOTO"),
    (0x08, "SECURE")
];

/// Enumerates the Pascal file types, available conversions are:
/// * FileType to u8,u16: `as u8` etc.
/// * u8 to FileType: `FileType::from_u8` (use FromPrimitive trait)
/// * &str to FileType: `FileType::from_str`, str can be a number or mnemonic
#[derive(FromPrimitive,Clone,Copy,PartialEq,Eq,Debug)]
pub enum FileType {
    Non = 0x00,
    Bad = 0x01,
    Code = 0x02,
    Text = 0x03,
    Info = 0x04,
    Data = 0x05,
    Graf = 0x06,
    Foto = 0x07,
    Secure = 0x08
}

impl FromStr for FileType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        if let Ok(num) = u8::from_str(s) {
            return match FileType::from_u8(num) {
                Some(typ) => Ok(typ),
                _ => Err(Error::FileTypeMismatch)
            };
        }
        match s {
            "bin" => Ok(Self::Data),
            "txt" => Ok(Self::Text),
            "pcode" => Ok(Self::Code),
            _ => Err(Error::FileTypeMismatch)
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",TYPE_MAP_DISP[*self as usize].1)
    }
}

#[test]
fn directory_capacity() {
    assert_eq!(dir_capacity(DIR_END_BLOCK),77);
    assert_eq!(dir_capacity(10),156);
    assert_eq!(dir_capacity(3),18);
}
