use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;
use std::fmt;
use super::super::Error;

pub const VTOC_TRACK: usize = 17;
pub const MAX_DIRECTORY_REPS: usize = 100;
pub const MAX_TSLIST_REPS: usize = 1000;
/// track-sector pairs in one list sector
pub const MAX_PAIRS: usize = 122;
/// tracks holding the DOS image on a standard disk
pub const DOS_IMAGE_TRACKS: usize = 3;
/// value of `tsl_track` for a deleted entry
pub const DELETED: u8 = 0xff;
/// bit in the file type byte
pub const LOCKED: u8 = 0x80;
pub const DIRECTORY_ENTRIES: usize = 7;

/// Enumerates the DOS file types, available conversions are:
/// * FileType to u8: `as u8`
/// * u8 to FileType: `FileType::from_u8`, after masking off the lock bit (use FromPrimitive trait)
/// * &str to FileType: `FileType::from_str`, str can be a number or mnemonic
#[derive(FromPrimitive,Clone,Copy,PartialEq,Eq,Debug)]
pub enum FileType {
    Text = 0x00,
    Integer = 0x01,
    Applesoft = 0x02,
    Binary = 0x04,
    SType = 0x08,
    Relocatable = 0x10,
    AType = 0x20,
    BType = 0x40
}

impl FromStr for FileType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        // string can be the number itself
        if let Ok(num) = u8::from_str(s) {
            return match FileType::from_u8(num) {
                Some(typ) => Ok(typ),
                _ => Err(Error::FileTypeMismatch)
            };
        }
        // or a mnemonic
        match s {
            "bin" | "B" => Ok(Self::Binary),
            "txt" | "T" => Ok(Self::Text),
            "atok" | "A" => Ok(Self::Applesoft),
            "itok" | "I" => Ok(Self::Integer),
            "S" => Ok(Self::SType),
            "rel" | "R" => Ok(Self::Relocatable),
            _ => Err(Error::FileTypeMismatch)
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "T",
            Self::Integer => "I",
            Self::Applesoft => "A",
            Self::Binary => "B",
            Self::SType => "S",
            Self::Relocatable => "R",
            Self::AType => "a",
            Self::BType => "b"
        };
        write!(f,"{}",s)
    }
}

impl FileType {
    /// Length of the header DOS puts in front of the data, the header holds the data length
    pub fn header_len(&self) -> usize {
        match self {
            Self::Binary => 4,
            Self::Integer | Self::Applesoft => 2,
            _ => 0
        }
    }
}

#[test]
fn mnemonics() {
    assert_eq!(FileType::from_str("B").unwrap(),FileType::Binary);
    assert_eq!(FileType::from_str("2").unwrap(),FileType::Applesoft);
    assert!(FileType::from_str("3").is_err());
    assert_eq!(FileType::Relocatable.to_string(),"R");
}
