//! # Low level treatment of 5.25 inch nibble tracks
//!
//! This handles the byte level layout of a 16 sector track as captured by a NIB image:
//! address fields in 4&4 encoding, data fields in 6&2 encoding, and the sync gaps between them.
//! The track buffer is treated as cyclic, since the capture can start anywhere on the track.
//! Acknowledgment: the 6&2 codec is adapted from CiderPress.

use thiserror;

const INVALID_NIB_BYTE: u8 = 0xff;
const CHUNK62: usize = 0x56;
/// nibbles in an encoded data field, not counting prolog and epilog
pub const DATA_NIBS: usize = 343;

pub const ADDR_PROLOG: [u8;3] = [0xd5,0xaa,0x96];
pub const DATA_PROLOG: [u8;3] = [0xd5,0xaa,0xad];
pub const EPILOG: [u8;3] = [0xde,0xaa,0xeb];

pub const DISK_BYTES_62: [u8;64] = [
    0x96, 0x97, 0x9a, 0x9b, 0x9d, 0x9e, 0x9f, 0xa6,
    0xa7, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb2, 0xb3,
    0xb4, 0xb5, 0xb6, 0xb7, 0xb9, 0xba, 0xbb, 0xbc,
    0xbd, 0xbe, 0xbf, 0xcb, 0xcd, 0xce, 0xcf, 0xd3,
    0xd6, 0xd7, 0xd9, 0xda, 0xdb, 0xdc, 0xdd, 0xde,
    0xdf, 0xe5, 0xe6, 0xe7, 0xe9, 0xea, 0xeb, 0xec,
    0xed, 0xee, 0xef, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6,
    0xf7, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff
];

#[derive(thiserror::Error,Debug,PartialEq)]
pub enum NibbleError {
    #[error("invalid byte while decoding")]
    InvalidByte,
    #[error("bad checksum found in a sector")]
    BadChecksum,
    #[error("could not find bit pattern")]
    BitPatternNotFound
}

/// Contents of an address field
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Address {
    pub volume: u8,
    pub track: u8,
    pub sector: u8
}

fn invert_62() -> [u8;256] {
    let mut ans: [u8;256] = [INVALID_NIB_BYTE;256];
    for i in 0..64 {
        ans[DISK_BYTES_62[i] as usize] = i as u8;
    }
    ans
}

/// encode a byte as two disk-friendly bytes
pub fn encode_44(val: u8) -> [u8;2] {
    [(val >> 1) | 0xaa, val | 0xaa]
}

/// decode two bytes, returning the nibbles in a single u8
pub fn decode_44(nibs: [u8;2]) -> u8 {
    ((nibs[0] << 1) | 0x01) & nibs[1]
}

/// encode a 6-bit nibble as a disk-friendly u8
fn encode_62(nib6: u8) -> u8 {
    DISK_BYTES_62[(nib6 & 0x3f) as usize]
}

/// Encode a 256 byte sector as the 343 nibbles of a data field
pub fn encode_sector(dat: &[u8]) -> [u8;DATA_NIBS] {
    let mut ans: [u8;DATA_NIBS] = [0;DATA_NIBS];
    let mut top: [u8;256] = [0;256];
    let mut twos: [u8;CHUNK62] = [0;CHUNK62];
    let mut two_shift = 0;
    let mut two_pos_n = CHUNK62-1;
    for i in 0..256 {
        let val = dat[i];
        top[i] = val >> 2;
        twos[two_pos_n] |= ((val & 1) << 1 | (val & 2) >> 1) << two_shift;
        if two_pos_n==0 {
            two_pos_n = CHUNK62;
            two_shift += 2;
        }
        two_pos_n -= 1;
    }
    let mut chksum = 0;
    let mut idx = 0;
    for i in (0..CHUNK62).rev() {
        ans[idx] = encode_62(twos[i] ^ chksum);
        chksum = twos[i];
        idx += 1;
    }
    for i in 0..256 {
        ans[idx] = encode_62(top[i] ^ chksum);
        chksum = top[i];
        idx += 1;
    }
    ans[idx] = encode_62(chksum);
    ans
}

/// Decode the 343 nibbles of a data field, the running checksum must come out 0
pub fn decode_sector(nibs: &[u8]) -> Result<Vec<u8>,NibbleError> {
    if nibs.len() < DATA_NIBS {
        return Err(NibbleError::BitPatternNotFound);
    }
    let mut ans: Vec<u8> = Vec::with_capacity(256);
    let mut twos: [u8;CHUNK62*3] = [0;CHUNK62*3];
    let mut chksum = 0;
    let inv = invert_62();
    let mut idx = 0;
    for i in 0..CHUNK62 {
        let val = inv[nibs[idx] as usize];
        if val==INVALID_NIB_BYTE {
            return Err(NibbleError::InvalidByte);
        }
        chksum ^= val;
        twos[i] = ((chksum & 0x01) << 1) | ((chksum & 0x02) >> 1);
        twos[i + CHUNK62] = ((chksum & 0x04) >> 1) | ((chksum & 0x08) >> 3);
        twos[i + CHUNK62*2] = ((chksum & 0x10) >> 3) | ((chksum & 0x20) >> 5);
        idx += 1;
    }
    for i in 0..256 {
        let val = inv[nibs[idx] as usize];
        if val==INVALID_NIB_BYTE {
            return Err(NibbleError::InvalidByte);
        }
        chksum ^= val;
        ans.push((chksum << 2) | twos[i]);
        idx += 1;
    }
    let val = inv[nibs[idx] as usize];
    if val==INVALID_NIB_BYTE {
        return Err(NibbleError::InvalidByte);
    }
    chksum ^= val;
    if chksum!=0 {
        return Err(NibbleError::BadChecksum)
    }
    Ok(ans)
}

/// Address field nibbles from prolog through epilog
pub fn encode_address(vol: u8,track: u8,sector: u8) -> Vec<u8> {
    let mut ans = ADDR_PROLOG.to_vec();
    ans.extend_from_slice(&encode_44(vol));
    ans.extend_from_slice(&encode_44(track));
    ans.extend_from_slice(&encode_44(sector));
    ans.extend_from_slice(&encode_44(vol ^ track ^ sector));
    ans.extend_from_slice(&EPILOG);
    ans
}

/// Data field nibbles from prolog through epilog
pub fn encode_data_field(dat: &[u8]) -> Vec<u8> {
    let mut ans = DATA_PROLOG.to_vec();
    ans.extend_from_slice(&encode_sector(dat));
    ans.extend_from_slice(&EPILOG);
    ans
}

/// Copy `len` bytes out of a cyclic track starting at `pos`
pub fn cyclic_read(track: &[u8],pos: usize,len: usize) -> Vec<u8> {
    (0..len).map(|i| track[(pos+i)%track.len()]).collect()
}

/// Copy bytes into a cyclic track starting at `pos`
pub fn cyclic_write(track: &mut [u8],pos: usize,dat: &[u8]) {
    let n = track.len();
    for (i,b) in dat.iter().enumerate() {
        track[(pos+i)%n] = *b;
    }
}

/// Search a cyclic track for a byte pattern, starting at `start` and going at most once around.
/// Returns the position just after the pattern, reduced modulo the track length.
pub fn find_pattern(track: &[u8],start: usize,patt: &[u8]) -> Option<usize> {
    let n = track.len();
    if n==0 {
        return None;
    }
    for i in 0..n {
        if (0..patt.len()).all(|j| track[(start+i+j)%n]==patt[j]) {
            return Some((start+i+patt.len())%n);
        }
    }
    None
}

/// Decode the address field whose prolog ends at `pos`.  Fails if the checksum is not 0.
pub fn decode_address(track: &[u8],pos: usize) -> Result<Address,NibbleError> {
    let buf = cyclic_read(track,pos,8);
    let volume = decode_44([buf[0],buf[1]]);
    let trk = decode_44([buf[2],buf[3]]);
    let sector = decode_44([buf[4],buf[5]]);
    let chk = decode_44([buf[6],buf[7]]);
    if volume ^ trk ^ sector ^ chk != 0 {
        return Err(NibbleError::BadChecksum);
    }
    Ok(Address { volume, track: trk, sector })
}
