use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;
use std::collections::HashMap;
use super::super::Error;

pub const VOL_KEY_BLOCK: u16 = 2;
/// first block of the bitmap as placed by `format`
pub const BITMAP_BLOCK: u16 = 6;
pub const ENTRY_LEN: u8 = 0x27;
pub const ENTRIES_PER_BLOCK: u8 = 13;
pub const MAX_DIRECTORY_REPS: usize = 1000;
/// eof is a 3 byte field
pub const MAX_EOF: usize = 0xffffff;
pub const STD_ACCESS: u8 = 1+2+32+64+128;

/// Map file type codes to strings for display
pub const TYPE_MAP_DISP: [(u8,&str);20] = [
    (0x00, "???"),
    (0x01, "BAD"),
    (0x02, "PCD"),
    (0x03, "PTX"),
    (0x04, "TXT"),
    (0x05, "PDA"),
    (0x06, "BIN"),
    (0x08, "FOT"),
    (0x0f, "DIR"),
    (0x19, "ADB"),
    (0x1a, "AWP"),
    (0x1b, "ASP"),
    (0xef, "PAS"),
    (0xf0, "CMD"),
    (0xfa, "INT"),
    (0xfb, "IVR"),
    (0xfc, "BAS"),
    (0xfd, "VAR"),
    (0xfe, "REL"),
    (0xff, "SYS")
];

/// Mnemonic of a file type, or `$` and the hex code if there is none
pub fn type_name(code: u8) -> String {
    let typ_map: HashMap<u8,&str> = HashMap::from(TYPE_MAP_DISP);
    match typ_map.get(&code) {
        Some(s) => s.to_string(),
        None => "$".to_string() + &hex::encode_upper(vec![code])
    }
}

/// Enumerates a subset of ProDOS file types, available conversions are:
/// * Type to u8: `as u8`
/// * u8 to Type: `FromPrimitive::from_u8`
/// * &str to Type: `Type::from_str`, str can be a number or mnemonic
#[derive(FromPrimitive,Clone,Copy,PartialEq,Eq,Debug)]
pub enum FileType {
    None = 0x00,
    Text = 0x04,
    Binary = 0x06,
    Directory = 0x0f,
    IntegerCode = 0xfa,
    IntegerVars = 0xfb,
    ApplesoftCode = 0xfc,
    ApplesoftVars = 0xfd,
    RelocatableCode = 0xfe,
    System = 0xff
}

impl FromStr for FileType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        if let Ok(num) = u8::from_str(s) {
            return match FromPrimitive::from_u8(num) {
                Some(typ) => Ok(typ),
                _ => Err(Error::FileTypeMismatch)
            };
        }
        match s {
            "bin" => Ok(Self::Binary),
            "txt" => Ok(Self::Text),
            "atok" => Ok(Self::ApplesoftCode),
            "itok" => Ok(Self::IntegerCode),
            "avar" => Ok(Self::ApplesoftVars),
            "ivar" => Ok(Self::IntegerVars),
            "rel" => Ok(Self::RelocatableCode),
            "sys" => Ok(Self::System),
            _ => Err(Error::FileTypeMismatch)
        }
    }
}

/// The high nibble of the first byte of every entry or header
#[derive(Clone,Copy,FromPrimitive,PartialEq,Eq,Debug)]
pub enum StorageType {
    Inactive = 0x00,
    Seedling = 0x01,
    Sapling = 0x02,
    Tree = 0x03,
    Pascal = 0x04,
    SubDirEntry = 0x0d,
    SubDirHeader = 0x0e,
    VolDirHeader = 0x0f
}

#[derive(Clone,Copy,FromPrimitive)]
pub enum Access {
    Read = 0x01,
    Write = 0x02,
    Backup = 0x20,
    Rename = 0x40,
    Destroy = 0x80
}

#[test]
fn type_names() {
    assert_eq!(type_name(0x06),"BIN");
    assert_eq!(type_name(0x42),"$42");
    assert_eq!(FileType::from_str("sys").unwrap(),FileType::System);
    assert_eq!(FileType::from_str("15").unwrap(),FileType::Directory);
}
