//! # Disk Image Module
//!
//! This module recognizes the outer envelope of a disk image file and unwraps it into a
//! flat buffer of sector data, the `ByteSource`.  Nothing here interprets a file system.
//!
//! ## Containers
//!
//! Each container is handled by a submodule named for the image type:
//! * `dot2mg` handles the universal disk image (2MG), which can wrap DOS ordered, ProDOS ordered, or NIB data
//! * `dc42` handles DiskCopy 4.2 images, which hold ProDOS ordered blocks
//! * `nib` handles nibble captures, decoded sector by sector with the help of `disk525`
//! * `dsk` handles plain sector dumps (DSK, DO, PO)
//!
//! The containers are tried in the fixed order of `CONTAINER_ORDER`.  The first one that
//! recognizes the bytes produces a `NormalizedImage`, which carries the flat buffer, the
//! addressing strategies worth trying, and the `Hints` implied by the container.
//!
//! ## Saving
//!
//! The `Envelope` retains whatever the container needs in order to wrap an updated
//! buffer in the original format, see `Envelope::wrap`.

pub mod dsk;
pub mod dot2mg;
pub mod dc42;
pub mod nib;
pub mod disk525;

use std::collections::BTreeSet;
use std::fmt;
use log::{info,debug,error};
use crate::bios::Order;
use crate::{STDRESULT,DYNERR};

/// Enumerates disk image errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("track or sector outside of declared geometry")]
    Address,
    #[error("access runs past the end of the image")]
    Bounds,
    #[error("container header is inconsistent")]
    ContainerFormat,
    #[error("unable to access sector")]
    SectorAccess,
    #[error("disk image is write protected")]
    WriteProtected
}

/// Enumerates the container formats, i.e., the outer envelope of a disk image file
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DiskImageType {
    Plain,
    DiskCopy,
    Dot2mg,
    Nib
}

/// The order in which containers are tried.  Plain must come last since almost anything
/// with the right length passes as a plain image.
pub const CONTAINER_ORDER: [DiskImageType;4] = [
    DiskImageType::Dot2mg,
    DiskImageType::DiskCopy,
    DiskImageType::Nib,
    DiskImageType::Plain
];

impl fmt::Display for DiskImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f,"plain sector image"),
            Self::DiskCopy => write!(f,"DiskCopy 4.2"),
            Self::Dot2mg => write!(f,"2MG"),
            Self::Nib => write!(f,"NIB")
        }
    }
}

/// Facts about a recognized image.  The container flags are set when the container is
/// identified, the order flags are set once a file system has been found.
#[derive(Clone,Debug,Default,PartialEq)]
pub struct Hints {
    pub dos_order: bool,
    pub prodos_order: bool,
    pub nibble_order: bool,
    pub disk_copy: bool,
    pub universal_disk_image: bool,
    pub nibble_capture: bool,
    pub write_protected: bool,
    /// volume number declared by the container or found in nibble address fields
    pub volume: Option<u8>
}

impl Hints {
    /// Record the addressing strategy that produced a match
    pub fn record_order(&mut self,order: &Order) {
        match order {
            Order::DosOrder(_) | Order::UniDos(_) | Order::OzDos(_) => self.dos_order = true,
            Order::ProdosOrder(_) => self.prodos_order = true,
            Order::Nibble(_) => self.nibble_order = true
        }
    }
}

/// Owns the flat buffer of sector data for one image.
/// The length never changes; reads and writes are bounds checked.
/// Sectors that could not be decoded from a nibble capture are marked unreadable,
/// and refuse both reads and writes.
#[derive(Clone)]
pub struct ByteSource {
    data: Vec<u8>,
    unreadable: BTreeSet<usize>,
    write_protected: bool
}

impl ByteSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            unreadable: BTreeSet::new(),
            write_protected: false
        }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn write_protected(&self) -> bool {
        self.write_protected
    }
    pub fn set_write_protected(&mut self,protect: bool) {
        self.write_protected = protect;
    }
    /// Mark the 256 byte sector containing `pos` as unreadable
    pub fn mark_unreadable(&mut self,pos: usize) {
        self.unreadable.insert(pos/256);
    }
    pub fn is_readable(&self,pos: usize) -> bool {
        !self.unreadable.contains(&(pos/256))
    }
    pub fn unreadable_count(&self) -> usize {
        self.unreadable.len()
    }
    fn check_bounds(&self,pos: usize,len: usize) -> STDRESULT {
        if pos+len > self.data.len() {
            error!("access at {} of length {} runs past end of image ({})",pos,len,self.data.len());
            return Err(Box::new(Error::Bounds));
        }
        Ok(())
    }
    pub fn read(&self,pos: usize,len: usize) -> Result<Vec<u8>,DYNERR> {
        self.check_bounds(pos,len)?;
        if len>0 && (pos/256..=(pos+len-1)/256).any(|s| self.unreadable.contains(&s)) {
            debug!("sector at {} was marked unreadable",pos);
            return Err(Box::new(Error::SectorAccess));
        }
        Ok(self.data[pos..pos+len].to_vec())
    }
    pub fn write(&mut self,pos: usize,dat: &[u8]) -> STDRESULT {
        if self.write_protected {
            error!("image is write protected");
            return Err(Box::new(Error::WriteProtected));
        }
        self.check_bounds(pos,dat.len())?;
        // the container has nowhere to put data for a sector it could not find
        if dat.len()>0 && (pos/256..=(pos+dat.len()-1)/256).any(|s| self.unreadable.contains(&s)) {
            error!("sector at {} was marked unreadable and cannot be written",pos);
            return Err(Box::new(Error::SectorAccess));
        }
        self.data[pos..pos+dat.len()].copy_from_slice(dat);
        Ok(())
    }
}

/// Whatever a container needs to put an updated buffer back into its original form
pub enum Envelope {
    Plain,
    DiskCopy(dc42::Dc42),
    Dot2mg(dot2mg::Dot2mg),
    Nib(nib::Nib)
}

impl Envelope {
    pub fn image_type(&self) -> DiskImageType {
        match self {
            Self::Plain => DiskImageType::Plain,
            Self::DiskCopy(_) => DiskImageType::DiskCopy,
            Self::Dot2mg(_) => DiskImageType::Dot2mg,
            Self::Nib(_) => DiskImageType::Nib
        }
    }
    /// Produce the bytes of an image file from the (possibly updated) sector data
    pub fn wrap(&self,payload: &[u8]) -> Result<Vec<u8>,DYNERR> {
        match self {
            Self::Plain => Ok(payload.to_vec()),
            Self::DiskCopy(dc) => dc.wrap(payload),
            Self::Dot2mg(img) => img.wrap(payload),
            Self::Nib(nib) => nib.wrap(payload)
        }
    }
}

/// Result of unwrapping a container
pub struct NormalizedImage {
    pub envelope: Envelope,
    pub source: ByteSource,
    pub hints: Hints,
    /// addressing strategies to try, in order of preference
    pub orders: Vec<Order>
}

/// Try each container in `CONTAINER_ORDER`.  Returns `Ok(None)` if no container recognizes the bytes,
/// or `Err` if a container header is present but inconsistent.
/// The optional extension only changes the preference between otherwise ambiguous orders.
pub fn identify(buf: &[u8],maybe_ext: Option<&str>,verify_checksums: bool) -> Result<Option<NormalizedImage>,DYNERR> {
    let ext = maybe_ext.map(|x| x.to_lowercase());
    for typ in CONTAINER_ORDER {
        let maybe_img = match typ {
            DiskImageType::Dot2mg => dot2mg::Dot2mg::unwrap(buf,ext.as_deref())?,
            DiskImageType::DiskCopy => dc42::Dc42::unwrap(buf,verify_checksums)?,
            DiskImageType::Nib => nib::Nib::unwrap(buf)?,
            DiskImageType::Plain => dsk::unwrap(buf,ext.as_deref())
        };
        if let Some(img) = maybe_img {
            info!("identified {} image",typ);
            return Ok(Some(img));
        }
        debug!("not a {} image",typ);
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unreadable_sector_refuses_access() {
        let mut src = ByteSource::new(vec![0;1024]);
        src.mark_unreadable(300);
        assert!(src.read(0,256).is_ok());
        assert!(src.read(256,256).is_err());
        assert!(src.read(200,100).is_err());
        assert!(matches!(
            src.write(256,&[1;256]).unwrap_err().downcast_ref::<Error>(),
            Some(Error::SectorAccess)
        ));
        assert!(src.write(200,&[1;100]).is_err());
        assert!(src.read(256,256).is_err());
        src.write(512,&[2;512]).expect("write failed");
        assert_eq!(src.read(512,512).unwrap(),vec![2;512]);
    }

    #[test]
    fn bounds_are_enforced() {
        let mut src = ByteSource::new(vec![0;512]);
        assert!(src.read(256,257).is_err());
        assert!(src.write(511,&[0,0]).is_err());
        src.set_write_protected(true);
        assert!(src.write(0,&[1]).is_err());
    }
}
