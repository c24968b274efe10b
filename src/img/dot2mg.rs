//! ## Support for 2MG disk images
//!
//! This is a 64 byte header followed by either a DOS ordered image, a ProDOS ordered image,
//! or a NIB capture.  The header can point to an optional comment and creator chunk,
//! which are kept so they survive when the image is saved.

use binrw::{BinRead,BinWrite};
use log::{debug,info,warn,error};
use crate::bios::Order;
use crate::img;
use super::{dsk,nib,ByteSource,Envelope,Hints,NormalizedImage};
use crate::{DiskStruct,DYNERR};

pub const HEADER_LEN: usize = 64;
const MAGIC: &[u8;4] = b"2IMG";
const FLAG_LOCKED: u32 = 0x8000_0000;
const FLAG_VOLUME: u32 = 0x0100;

pub fn file_extensions() -> Vec<String> {
    vec!["2mg".to_string(),"2img".to_string()]
}

#[derive(BinRead,BinWrite,Clone)]
#[brw(little)]
pub struct Header {
    magic: [u8;4],
    creator_id: [u8;4],
    header_len: u16,
    version: u16,
    img_fmt: u32,
    flags: u32,
    blocks: u32,
    data_offset: u32,
    data_len: u32,
    comment_offset: u32,
    comment_len: u32,
    creator_offset: u32,
    creator_len: u32,
    pad: [u8;16]
}

pub struct Dot2mg {
    header: Header,
    comment: Vec<u8>,
    creator_info: Vec<u8>,
    /// retained capture when the payload is nibbles
    nib: Option<nib::Nib>
}

/// Optional chunk pointed to by the header, missing or out of range chunks come back empty
fn chunk(buf: &[u8],offset: u32,len: u32,what: &str) -> Vec<u8> {
    let (offset,len) = (offset as usize,len as usize);
    if len==0 {
        return Vec::new();
    }
    if offset+len > buf.len() {
        warn!("end of {} {} runs past EOF, ignoring",what,offset+len);
        return Vec::new();
    }
    info!("2MG {}: {}",what,String::from_utf8_lossy(&buf[offset..offset+len]));
    buf[offset..offset+len].to_vec()
}

impl Dot2mg {
    /// Create the envelope for a new image, `img_fmt` is 0 for DOS order, 1 for ProDOS order.
    /// If a volume is given it is put in the flags.
    pub fn create(img_fmt: u32,payload_len: usize,vol: Option<u8>) -> Self {
        Self {
            header: Header {
                magic: *MAGIC,
                creator_id: *b"A2VL",
                header_len: HEADER_LEN as u16,
                version: 1,
                img_fmt,
                flags: match vol { Some(v) => FLAG_VOLUME | v as u32, None => 0 },
                blocks: match img_fmt { 1 => (payload_len/512) as u32, _ => 0 },
                data_offset: HEADER_LEN as u32,
                data_len: payload_len as u32,
                comment_offset: 0,
                comment_len: 0,
                creator_offset: 0,
                creator_len: 0,
                pad: [0;16]
            },
            comment: Vec::new(),
            creator_info: Vec::new(),
            nib: None
        }
    }
    pub fn comment(&self) -> String {
        String::from_utf8_lossy(&self.comment).to_string()
    }
    pub fn set_comment(&mut self,comment: &str) {
        if !comment.is_ascii() {
            warn!("2MG comment is not ASCII");
        }
        self.comment = comment.as_bytes().to_vec();
    }
    pub fn creator_info(&self) -> String {
        String::from_utf8_lossy(&self.creator_info).to_string()
    }
    /// Returns `Ok(None)` if the magic is absent, or an error if the header is inconsistent.
    /// The extension is not needed, the header settles the order.
    pub fn unwrap(buf: &[u8],_maybe_ext: Option<&str>) -> Result<Option<NormalizedImage>,DYNERR> {
        if buf.len() < HEADER_LEN || &buf[0..4] != MAGIC {
            return Ok(None);
        }
        let header = Header::from_bytes(&buf[0..HEADER_LEN])?;
        if header.header_len as usize != HEADER_LEN {
            warn!("unexpected 2MG header length {}",header.header_len);
        }
        if header.version != 1 {
            warn!("unexpected 2MG version {}",header.version);
        }
        if header.img_fmt > 2 {
            error!("unknown 2MG format code {}",header.img_fmt);
            return Err(Box::new(img::Error::ContainerFormat));
        }
        let offset = header.data_offset as usize;
        let len = match (header.data_len,header.img_fmt) {
            (0,1) => header.blocks as usize * 512,
            (l,_) => l as usize
        };
        if offset < HEADER_LEN || offset+len > buf.len() {
            error!("2MG data runs past EOF ({}+{} > {})",offset,len,buf.len());
            return Err(Box::new(img::Error::ContainerFormat));
        }
        let data = &buf[offset..offset+len];
        let mut hints = Hints {
            universal_disk_image: true,
            ..Hints::default()
        };
        if header.flags & FLAG_LOCKED > 0 {
            hints.write_protected = true;
        }
        if header.flags & FLAG_VOLUME > 0 {
            hints.volume = Some((header.flags & 0xff) as u8);
        }
        let mut maybe_nib = None;
        let (mut source,orders) = match header.img_fmt {
            0 => {
                info!("2MG flagged as DOS ordered");
                if len==0 || len % 4096 != 0 {
                    error!("DOS ordered data is not a whole number of tracks");
                    return Err(Box::new(img::Error::ContainerFormat));
                }
                (ByteSource::new(data.to_vec()),vec![Order::DosOrder(len/4096)])
            },
            1 => {
                info!("2MG flagged as ProDOS ordered");
                if header.blocks>0 && header.blocks as usize * 512 != len {
                    error!("2MG block count does not match data size");
                    return Err(Box::new(img::Error::ContainerFormat));
                }
                let orders = dsk::block_orders(len);
                if orders.is_empty() {
                    error!("2MG data size {} is not a whole number of blocks",len);
                    return Err(Box::new(img::Error::ContainerFormat));
                }
                (ByteSource::new(data.to_vec()),orders)
            },
            _ => {
                info!("2MG flagged as nibbles");
                match nib::Nib::decode(data) {
                    Some((n,src)) => {
                        hints.nibble_capture = true;
                        if hints.volume.is_none() {
                            hints.volume = n.volume();
                        }
                        maybe_nib = Some(n);
                        (src,vec![Order::Nibble(nib::TRACKS)])
                    },
                    None => {
                        error!("2MG nibble data could not be decoded");
                        return Err(Box::new(img::Error::ContainerFormat));
                    }
                }
            }
        };
        source.set_write_protected(hints.write_protected);
        let comment = chunk(buf,header.comment_offset,header.comment_len,"comment");
        let creator_info = chunk(buf,header.creator_offset,header.creator_len,"creator info");
        debug!("2MG creator ID {}",String::from_utf8_lossy(&header.creator_id));
        Ok(Some(NormalizedImage {
            envelope: Envelope::Dot2mg(Self { header, comment, creator_info, nib: maybe_nib }),
            source,
            hints,
            orders
        }))
    }
    /// Put the header in front of the payload, then the comment and creator chunks
    pub fn wrap(&self,payload: &[u8]) -> Result<Vec<u8>,DYNERR> {
        let mut data = match &self.nib {
            Some(n) => n.wrap(payload)?,
            None => payload.to_vec()
        };
        let mut header = self.header.clone();
        let buf_len = data.len() as u32;
        let rem_len = self.comment.len() as u32;
        let cre_len = self.creator_info.len() as u32;
        header.header_len = HEADER_LEN as u16;
        header.data_offset = HEADER_LEN as u32;
        header.data_len = buf_len;
        if header.img_fmt==1 {
            header.blocks = buf_len/512;
        }
        header.comment_offset = match rem_len { 0 => 0, _ => HEADER_LEN as u32 + buf_len };
        header.comment_len = rem_len;
        header.creator_offset = match cre_len { 0 => 0, _ => HEADER_LEN as u32 + buf_len + rem_len };
        header.creator_len = cre_len;
        let mut ans = header.to_bytes()?;
        ans.append(&mut data);
        ans.extend_from_slice(&self.comment);
        ans.extend_from_slice(&self.creator_info);
        Ok(ans)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut mg = Dot2mg::create(1,dsk::SIZE_140K,None);
        mg.set_comment("hello");
        let buf = mg.wrap(&vec![0;dsk::SIZE_140K]).unwrap();
        assert_eq!(buf.len(),HEADER_LEN+dsk::SIZE_140K+5);
        let img = Dot2mg::unwrap(&buf,None).unwrap().expect("not recognized");
        assert!(img.hints.universal_disk_image);
        assert_eq!(img.orders,vec![Order::ProdosOrder(280)]);
        match img.envelope {
            Envelope::Dot2mg(mg) => assert_eq!(mg.comment(),"hello"),
            _ => panic!("wrong envelope")
        }
    }

    #[test]
    fn flags_give_volume_and_protection() {
        let mg = Dot2mg::create(0,dsk::SIZE_140K,Some(17));
        let mut buf = mg.wrap(&vec![0;dsk::SIZE_140K]).unwrap();
        buf[19] |= 0x80;
        let img = Dot2mg::unwrap(&buf,None).unwrap().expect("not recognized");
        assert_eq!(img.hints.volume,Some(17));
        assert!(img.hints.write_protected);
        assert!(img.source.write_protected());
        assert_eq!(img.orders,vec![Order::DosOrder(35)]);
    }

    #[test]
    fn inconsistent_headers_are_errors() {
        let mg = Dot2mg::create(1,dsk::SIZE_140K,None);
        let buf = mg.wrap(&vec![0;dsk::SIZE_140K]).unwrap();
        let mut bad_fmt = buf.clone();
        bad_fmt[12] = 3;
        assert!(Dot2mg::unwrap(&bad_fmt,None).is_err());
        let truncated = buf[0..buf.len()-512].to_vec();
        assert!(Dot2mg::unwrap(&truncated,None).is_err());
        assert!(Dot2mg::unwrap(&buf[4..],None).unwrap().is_none());
    }
}
