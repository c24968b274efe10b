//! ## Support for DiskCopy 4.2 images
//!
//! A DiskCopy 4.2 image is an 84 byte big-endian header, followed by the sector data in
//! ProDOS block order, followed by the tag bytes (if any).  The header carries a checksum for
//! the data and another for the tags.

use binrw::{BinRead,BinWrite};
use log::{debug,info,error};
use crate::img;
use super::{dsk,ByteSource,Envelope,Hints,NormalizedImage};
use crate::{DiskStruct,DYNERR};

pub const HEADER_LEN: usize = 84;
const PRIVATE: u16 = 0x0100;
const MAX_NAME_LEN: u8 = 63;
/// bytes at the start of the tags that are left out of the tag checksum
const TAG_CHECKSUM_SKIP: usize = 12;

pub fn file_extensions() -> Vec<String> {
    vec!["dc".to_string(),"dc42".to_string(),"image".to_string()]
}

#[derive(BinRead,BinWrite,Clone)]
#[brw(big)]
pub struct Header {
    name_len: u8,
    name: [u8;63],
    data_size: u32,
    tag_size: u32,
    data_checksum: u32,
    tag_checksum: u32,
    disk_format: u8,
    format_byte: u8,
    private: u16
}

pub struct Dc42 {
    header: Header,
    tags: Vec<u8>
}

/// Add each big-endian word and rotate right
pub fn checksum(buf: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for pair in buf.chunks(2) {
        let word = match pair.len() {
            2 => u16::from_be_bytes([pair[0],pair[1]]),
            _ => (pair[0] as u16) << 8
        };
        sum = sum.wrapping_add(word as u32).rotate_right(1);
    }
    sum
}

fn tag_checksum(tags: &[u8]) -> u32 {
    match tags.len() > TAG_CHECKSUM_SKIP {
        true => checksum(&tags[TAG_CHECKSUM_SKIP..]),
        false => 0
    }
}

impl Dc42 {
    /// Image name stored in the header
    pub fn name(&self) -> String {
        let len = usize::min(self.header.name_len as usize,MAX_NAME_LEN as usize);
        String::from_utf8_lossy(&self.header.name[0..len]).to_string()
    }
    /// Returns `Ok(None)` if the bytes do not look like DiskCopy 4.2.  If they do, but the data
    /// size is not whole blocks, or a checksum fails verification, the image is rejected with an error.
    pub fn unwrap(buf: &[u8],verify_checksums: bool) -> Result<Option<NormalizedImage>,DYNERR> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let header = Header::from_bytes(&buf[0..HEADER_LEN])?;
        if header.private != PRIVATE || header.name_len > MAX_NAME_LEN {
            debug!("DiskCopy signature not found");
            return Ok(None);
        }
        let data_size = header.data_size as usize;
        let tag_size = header.tag_size as usize;
        if HEADER_LEN + data_size + tag_size != buf.len() {
            debug!("DiskCopy sizes do not add up to file length");
            return Ok(None);
        }
        if data_size==0 || data_size % 512 != 0 {
            error!("DiskCopy data size {} is not a whole number of blocks",data_size);
            return Err(Box::new(img::Error::ContainerFormat));
        }
        let data = &buf[HEADER_LEN..HEADER_LEN+data_size];
        let tags = buf[HEADER_LEN+data_size..].to_vec();
        if verify_checksums {
            if checksum(data) != header.data_checksum {
                error!("DiskCopy data checksum mismatch");
                return Err(Box::new(img::Error::ContainerFormat));
            }
            if tag_checksum(&tags) != header.tag_checksum {
                error!("DiskCopy tag checksum mismatch");
                return Err(Box::new(img::Error::ContainerFormat));
            }
        }
        let orders = dsk::block_orders(data_size);
        if orders.is_empty() {
            error!("DiskCopy data size {} is not supported",data_size);
            return Err(Box::new(img::Error::ContainerFormat));
        }
        let dc = Self { header, tags };
        info!("DiskCopy image name: {}",dc.name());
        Ok(Some(NormalizedImage {
            envelope: Envelope::DiskCopy(dc),
            source: ByteSource::new(data.to_vec()),
            hints: Hints {
                disk_copy: true,
                ..Hints::default()
            },
            orders
        }))
    }
    /// Wrap a block ordered payload with the header and tags, checksums are recomputed
    pub fn wrap(&self,payload: &[u8]) -> Result<Vec<u8>,DYNERR> {
        let mut header = self.header.clone();
        header.data_size = payload.len() as u32;
        header.data_checksum = checksum(payload);
        header.tag_checksum = tag_checksum(&self.tags);
        let mut ans = header.to_bytes()?;
        ans.extend_from_slice(payload);
        ans.extend_from_slice(&self.tags);
        Ok(ans)
    }
    /// Create the envelope for a new image with no tags
    pub fn create(name: &str,payload_len: usize) -> Self {
        let mut fname = [0;63];
        let bytes: Vec<u8> = name.bytes().take(MAX_NAME_LEN as usize).collect();
        fname[0..bytes.len()].copy_from_slice(&bytes);
        Self {
            header: Header {
                name_len: bytes.len() as u8,
                name: fname,
                data_size: payload_len as u32,
                tag_size: 0,
                data_checksum: 0,
                tag_checksum: 0,
                disk_format: match payload_len { 819200 => 1, _ => 3 },
                format_byte: match payload_len { 819200 => 0x22, _ => 0x24 },
                private: PRIVATE
            },
            tags: Vec::new()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn checksum_rotates() {
        assert_eq!(checksum(&[0,1]),0x8000_0000);
        assert_eq!(checksum(&[0,1,0,1]),0x4000_0000 + 0x8000_0000);
        assert_eq!(checksum(&[0;512]),0);
    }

    #[test]
    fn header_is_84_bytes() {
        let dc = Dc42::create("TEST",dsk::SIZE_800K);
        assert_eq!(dc.header.to_bytes().unwrap().len(),HEADER_LEN);
        assert_eq!(dc.name(),"TEST");
    }

    #[test]
    fn wrap_then_unwrap() {
        let mut payload = vec![0;dsk::SIZE_140K];
        payload[1000] = 0x77;
        let dc = Dc42::create("DISK",payload.len());
        let buf = dc.wrap(&payload).unwrap();
        let img = Dc42::unwrap(&buf,true).unwrap().expect("not recognized");
        assert!(img.hints.disk_copy);
        assert_eq!(img.source.as_bytes(),&payload[..]);
        let mut bad = buf.clone();
        bad[HEADER_LEN+5] = 1;
        assert!(Dc42::unwrap(&bad,true).is_err());
        assert!(Dc42::unwrap(&bad,false).unwrap().is_some());
    }
}
