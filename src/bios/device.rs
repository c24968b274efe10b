//! ## Block and sector device
//!
//! The `Device` applies an addressing strategy (`bios::Order`) to a byte source.
//! It is the only place where file systems reach the raw bytes.  Sectors are addressed
//! by track and DOS logical sector, blocks are 512 byte ProDOS blocks.
//!
//! Several devices can share one byte source, this is how the two logical disks
//! of a UniDOS or OzDOS image are written into the same buffer.

use std::cell::RefCell;
use std::rc::Rc;
use log::error;
use crate::img::{self,ByteSource};
use super::Order;
use crate::{STDRESULT,DYNERR};

pub const SECTOR_SIZE: usize = 256;
pub const BLOCK_SIZE: usize = 512;

#[derive(Clone)]
pub struct Device {
    src: Rc<RefCell<ByteSource>>,
    order: Order
}

impl Device {
    /// Attach an addressing strategy to a shared byte source.
    /// Fails if the source is too small for the strategy.
    pub fn new(src: Rc<RefCell<ByteSource>>,order: Order) -> Result<Self,DYNERR> {
        let len = src.borrow().len();
        if len < order.image_len() {
            error!("{} needs {} bytes, image has {}",order,order.image_len(),len);
            return Err(Box::new(img::Error::Bounds));
        }
        Ok(Self { src, order })
    }
    /// Create a device backed by a new zeroed buffer of the size the strategy requires
    pub fn blank(order: Order) -> Self {
        Self {
            src: Rc::new(RefCell::new(ByteSource::new(vec![0;order.image_len()]))),
            order
        }
    }
    /// Create a device that uses the same bytes as this one, but with another strategy
    pub fn sibling(&self,order: Order) -> Result<Self,DYNERR> {
        Self::new(Rc::clone(&self.src),order)
    }
    pub fn order(&self) -> Order {
        self.order
    }
    pub fn tracks(&self) -> usize {
        self.order.tracks()
    }
    pub fn sectors(&self) -> usize {
        self.order.sectors()
    }
    pub fn block_count(&self) -> usize {
        self.order.block_count()
    }
    pub fn source(&self) -> Rc<RefCell<ByteSource>> {
        Rc::clone(&self.src)
    }
    /// Copy of the whole underlying buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        self.src.borrow().as_bytes().to_vec()
    }
    pub fn read_sector(&self,track: usize,sector: usize) -> Result<Vec<u8>,DYNERR> {
        let pos = self.order.byte_position(track,sector)?;
        self.src.borrow().read(pos,SECTOR_SIZE)
    }
    /// Write a sector, data shorter than a sector is padded with zeros, longer data is an error
    pub fn write_sector(&mut self,track: usize,sector: usize,dat: &[u8]) -> STDRESULT {
        let pos = self.order.byte_position(track,sector)?;
        if dat.len() > SECTOR_SIZE {
            error!("{} bytes will not fit in track {} sector {}",dat.len(),track,sector);
            return Err(Box::new(img::Error::Bounds));
        }
        let mut buf = dat.to_vec();
        buf.resize(SECTOR_SIZE,0);
        self.src.borrow_mut().write(pos,&buf)
    }
    fn check_block(&self,block: usize) -> STDRESULT {
        if block >= self.block_count() {
            error!("block {} is beyond the end of the device ({} blocks)",block,self.block_count());
            return Err(Box::new(img::Error::Bounds));
        }
        Ok(())
    }
    pub fn read_block(&self,block: usize) -> Result<Vec<u8>,DYNERR> {
        self.check_block(block)?;
        if let Order::ProdosOrder(_) = self.order {
            return self.src.borrow().read(block*BLOCK_SIZE,BLOCK_SIZE);
        }
        let mut ans = Vec::new();
        for [t,s] in self.order.ts_from_block(block)? {
            ans.append(&mut self.read_sector(t,s)?);
        }
        Ok(ans)
    }
    /// Write a block, data shorter than a block is padded with zeros, longer data is an error
    pub fn write_block(&mut self,block: usize,dat: &[u8]) -> STDRESULT {
        self.check_block(block)?;
        if dat.len() > BLOCK_SIZE {
            error!("{} bytes will not fit in block {}",dat.len(),block);
            return Err(Box::new(img::Error::Bounds));
        }
        let mut buf = dat.to_vec();
        buf.resize(BLOCK_SIZE,0);
        if let Order::ProdosOrder(_) = self.order {
            return self.src.borrow_mut().write(block*BLOCK_SIZE,&buf);
        }
        let [first,second] = self.order.ts_from_block(block)?;
        self.write_sector(first[0],first[1],&buf[0..SECTOR_SIZE])?;
        self.write_sector(second[0],second[1],&buf[SECTOR_SIZE..])
    }
}
