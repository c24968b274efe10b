//! # BIOS module
//!
//! This module is a place for the middleware between the `fs` and `img` modules.  It is named in analogy
//! with the CP/M concept of a BIOS as being (in part) a layer between the BDOS and the physical disk.
//!
//! All the sector skewing tables are kept in this module, along with the `Order` enumeration,
//! which maps a DOS track and logical sector to a location in a flat buffer, and the `Device`
//! that applies an `Order` to a shared byte source.

pub mod skew;
pub mod device;

use std::fmt;
use log::error;
use crate::img;
use crate::DYNERR;

/// Tracks per logical disk on an 800K UniDOS or OzDOS image
pub const DUAL_TRACKS: usize = 50;
/// Sectors per track on an 800K UniDOS or OzDOS image
pub const DUAL_SECTORS: usize = 32;

/// Addressing strategy, i.e., the way a track and DOS logical sector are laid out in a flat buffer.
/// The layout is given by `compute_block` and `compute_offset`, the byte position being
/// `compute_block*block_size + compute_offset`.  The value carried by the single disk variants
/// gives the extent of the address space.
#[derive(PartialEq,Eq,Clone,Copy,Debug,Hash)]
pub enum Order {
    /// value is the number of tracks, 256 byte units in DOS logical order
    DosOrder(usize),
    /// value is the number of 512 byte blocks, units are ProDOS blocks
    ProdosOrder(usize),
    /// value is the number of tracks, 256 byte units in physical order (as they come off a nibble track)
    Nibble(usize),
    /// value is the logical disk (1 or 2), disk 2 starts 50 tracks into the image
    UniDos(u8),
    /// value is the logical disk (1 or 2), disk 2 is in the high half of every block
    OzDos(u8)
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.name())
    }
}

impl Order {
    /// Human readable identifier of the strategy
    pub fn name(&self) -> String {
        match self {
            Self::DosOrder(_) => "DOS order".to_string(),
            Self::ProdosOrder(_) => "ProDOS order".to_string(),
            Self::Nibble(_) => "physical order".to_string(),
            Self::UniDos(d) => format!("UniDOS disk {}",d),
            Self::OzDos(d) => format!("OzDOS disk {}",d)
        }
    }
    /// Number of tracks in the logical disk
    pub fn tracks(&self) -> usize {
        match self {
            Self::DosOrder(t) | Self::Nibble(t) => *t,
            Self::ProdosOrder(blocks) => *blocks / 8,
            Self::UniDos(_) | Self::OzDos(_) => DUAL_TRACKS
        }
    }
    /// Sectors per track in the logical disk
    pub fn sectors(&self) -> usize {
        match self {
            Self::UniDos(_) | Self::OzDos(_) => DUAL_SECTORS,
            _ => 16
        }
    }
    /// Size of the unit returned by `compute_block`
    pub fn block_size(&self) -> usize {
        match self {
            Self::DosOrder(_) | Self::Nibble(_) => 256,
            _ => 512
        }
    }
    /// Number of 512 byte blocks in the logical disk
    pub fn block_count(&self) -> usize {
        match self {
            Self::ProdosOrder(blocks) => *blocks,
            _ => self.tracks() * self.sectors() / 2
        }
    }
    /// Number of bytes the whole image must have for this strategy to apply
    pub fn image_len(&self) -> usize {
        match self {
            Self::DosOrder(t) | Self::Nibble(t) => t * 4096,
            Self::ProdosOrder(blocks) => blocks * 512,
            Self::UniDos(_) | Self::OzDos(_) => 2 * DUAL_TRACKS * DUAL_SECTORS * 256
        }
    }
    /// True if this is one of two logical disks sharing an image
    pub fn is_dual(&self) -> bool {
        matches!(self,Self::UniDos(_) | Self::OzDos(_))
    }
    /// Validate the coordinates against the declared geometry
    fn check(&self,track: usize,sector: usize) -> Result<(),DYNERR> {
        if let Self::UniDos(d) | Self::OzDos(d) = self {
            if *d<1 || *d>2 {
                error!("{} does not exist",self);
                return Err(Box::new(img::Error::Address));
            }
        }
        if track>=self.tracks() || sector>=self.sectors() {
            error!("track {} sector {} is outside {} geometry",track,sector,self);
            return Err(Box::new(img::Error::Address));
        }
        Ok(())
    }
    /// Index of the unit (of size `block_size`) holding the given track and DOS logical sector
    pub fn compute_block(&self,track: usize,sector: usize) -> Result<usize,DYNERR> {
        self.check(track,sector)?;
        Ok(match self {
            Self::DosOrder(_) => track*16 + sector,
            Self::Nibble(_) => track*16 + skew::DOS_LSEC_TO_DOS_PSEC[sector],
            Self::ProdosOrder(_) => skew::prodos_block_from_ts(track,sector).0,
            Self::UniDos(d) => ((track + DUAL_TRACKS*(*d as usize-1))*DUAL_SECTORS + sector)/2,
            Self::OzDos(_) => track*DUAL_SECTORS + sector
        })
    }
    /// Byte offset of the sector within the unit returned by `compute_block`
    pub fn compute_offset(&self,track: usize,sector: usize) -> Result<usize,DYNERR> {
        self.check(track,sector)?;
        Ok(match self {
            Self::DosOrder(_) | Self::Nibble(_) => 0,
            Self::ProdosOrder(_) => skew::prodos_block_from_ts(track,sector).1,
            Self::UniDos(_) => 256*(sector & 1),
            Self::OzDos(1) => 0,
            Self::OzDos(_) => 0x100
        })
    }
    /// Absolute byte position of the sector in the image
    pub fn byte_position(&self,track: usize,sector: usize) -> Result<usize,DYNERR> {
        Ok(self.compute_block(track,sector)? * self.block_size() + self.compute_offset(track,sector)?)
    }
    /// Track and DOS logical sector pairs making up a 512 byte block of the logical disk
    pub fn ts_from_block(&self,block: usize) -> Result<[[usize;2];2],DYNERR> {
        if block>=self.block_count() {
            error!("block {} is outside {} geometry",block,self);
            return Err(Box::new(img::Error::Address));
        }
        Ok(match self.sectors() {
            16 => skew::ts_from_prodos_block(block),
            spt => [[2*block/spt,2*block%spt],[(2*block+1)/spt,(2*block+1)%spt]]
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    fn assert_bijection(order: Order) -> HashSet<(usize,usize)> {
        let mut seen = HashSet::new();
        for track in 0..order.tracks() {
            for sector in 0..order.sectors() {
                let addr = (order.compute_block(track,sector).unwrap(),order.compute_offset(track,sector).unwrap());
                assert!(seen.insert(addr),"{} maps two sectors onto {:?}",order,addr);
                assert!(addr.0*order.block_size()+addr.1+256 <= order.image_len());
            }
        }
        assert_eq!(seen.len(),order.tracks()*order.sectors());
        seen
    }

    #[test]
    fn every_order_is_a_bijection() {
        for order in [Order::DosOrder(35),Order::Nibble(35),Order::ProdosOrder(280),Order::ProdosOrder(1600),
            Order::UniDos(1),Order::UniDos(2),Order::OzDos(1),Order::OzDos(2)] {
            assert_bijection(order);
        }
    }

    #[test]
    fn unidos_disks_use_separate_halves() {
        let d1 = assert_bijection(Order::UniDos(1));
        let d2 = assert_bijection(Order::UniDos(2));
        assert!(d1.iter().all(|(b,_)| *b<800));
        assert!(d2.iter().all(|(b,_)| *b>=800 && *b<1600));
        assert_eq!(Order::UniDos(2).compute_block(0,0).unwrap(),800);
        assert_eq!(Order::UniDos(1).compute_offset(3,7).unwrap(),256);
    }

    #[test]
    fn ozdos_disks_interleave_within_blocks() {
        let d1 = assert_bijection(Order::OzDos(1));
        let d2 = assert_bijection(Order::OzDos(2));
        assert!(d1.is_disjoint(&d2));
        assert_eq!(Order::OzDos(1).compute_block(49,31).unwrap(),1599);
        assert_eq!(Order::OzDos(2).compute_block(49,31).unwrap(),1599);
        assert_eq!(Order::OzDos(2).compute_offset(10,3).unwrap(),0x100);
        assert_eq!(Order::OzDos(1).compute_offset(10,3).unwrap(),0);
    }

    #[test]
    fn out_of_range_is_an_address_error() {
        assert!(Order::DosOrder(35).compute_block(35,0).is_err());
        assert!(Order::DosOrder(35).compute_offset(0,16).is_err());
        assert!(Order::UniDos(1).compute_block(50,0).is_err());
        assert!(Order::UniDos(3).compute_block(0,0).is_err());
        assert!(Order::OzDos(2).compute_offset(0,32).is_err());
        assert!(Order::ProdosOrder(280).ts_from_block(280).is_err());
    }

    #[test]
    fn nibble_order_applies_physical_skew() {
        assert_eq!(Order::Nibble(35).compute_block(1,1).unwrap(),16+13);
        assert_eq!(Order::Nibble(35).compute_block(17,15).unwrap(),17*16+15);
    }

    #[test]
    fn blocks_on_32_sector_disks_are_linear() {
        assert_eq!(Order::UniDos(1).ts_from_block(17).unwrap(),[[1,2],[1,3]]);
        assert_eq!(Order::OzDos(2).block_count(),800);
    }
}
