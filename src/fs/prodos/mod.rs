//! ## ProDOS file system module
//!
//! This manipulates disk images containing one ProDOS volume, from 140K floppies up to
//! the 32M limit of the block count.  Subdirectories are supported, as are seedling,
//! sapling, and tree files.  Sparse files can be read, holes come back as zeros.
//!
//! Paths are relative to the volume directory, separated by `/`.

mod directory;
pub mod types;

use std::collections::HashSet;
use log::{debug,trace,error};
use bit_vec::BitVec;
use types::*;
use directory::*;
pub use directory::{is_name_valid,pack_time,unpack_time};
use super::{Error,FileEntry,FreeSpace,Slot,Start};
use crate::bios::device::{Device,BLOCK_SIZE};
use crate::{DiskStruct,STDRESULT,DYNERR};

/// Make a string into a valid ProDOS name.
/// Spaces become dots, other invalid characters are dropped, the first character must be a letter.
pub fn sanitize_name(raw: &str) -> String {
    let mut ans: String = raw.chars()
        .map(|c| if c==' ' { '.' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c=='.')
        .collect::<String>().to_uppercase();
    match ans.chars().next() {
        Some(c) if c.is_ascii_uppercase() => {},
        _ => ans.insert(0,'A')
    }
    ans.truncate(15);
    ans
}

/// Split a path into sanitized directory components and the final name
fn split_path(path: &str) -> (Vec<String>,String) {
    let mut parts: Vec<String> = path.split('/').filter(|s| s.len()>0).map(|s| sanitize_name(s)).collect();
    let name = parts.pop().unwrap_or_default();
    (parts,name)
}

/// Data block pointers are split into low bytes and high bytes
fn unpack_index(buf: &[u8]) -> Vec<u16> {
    (0..256).map(|i| u16::from_le_bytes([buf[i],buf[i+256]])).collect()
}

fn pack_index(ptrs: &[u16]) -> Vec<u8> {
    let mut ans = vec![0;BLOCK_SIZE];
    for (i,ptr) in ptrs.iter().enumerate() {
        let [lo,hi] = u16::to_le_bytes(*ptr);
        ans[i] = lo;
        ans[i+256] = hi;
    }
    ans
}

/// Blocks needed for a file of `len` bytes, including index blocks
fn blocks_needed(len: usize) -> usize {
    let data = usize::max(1,(len+BLOCK_SIZE-1)/BLOCK_SIZE);
    match data {
        1 => 1,
        d if d<=256 => d + 1,
        d => d + 1 + (d+255)/256
    }
}

/// Volume bitmap, a set bit means the block is free
struct Bitmap {
    ptr: usize,
    total: usize,
    buf: Vec<u8>
}

impl Bitmap {
    fn is_free(&self,block: usize) -> bool {
        block < self.total && (self.buf[block/8] >> (7 - block%8)) & 1 == 1
    }
    fn set_free(&mut self,block: usize,free: bool) {
        match free {
            true => self.buf[block/8] |= 1 << (7 - block%8),
            false => self.buf[block/8] &= !(1 << (7 - block%8))
        }
    }
    fn free_count(&self) -> usize {
        (0..self.total).filter(|b| self.is_free(*b)).count()
    }
    fn allocate(&mut self) -> Result<usize,DYNERR> {
        for block in 0..self.total {
            if self.is_free(block) {
                self.set_free(block,false);
                return Ok(block);
            }
        }
        Err(Box::new(Error::DiskFull))
    }
}

/// The primary interface for disk operations.
pub struct Disk {
    dev: Device
}

impl Disk {
    /// Use the given device as storage.  The device may or may not be formatted.
    pub fn from_device(dev: Device) -> Self {
        Self { dev }
    }
    pub fn device(&self) -> &Device {
        &self.dev
    }
    /// Test a device for the ProDOS file system by examining the volume directory header.
    pub fn test_img(dev: &Device) -> bool {
        let buf = match dev.read_block(VOL_KEY_BLOCK as usize) {
            Ok(buf) => buf,
            Err(_) => {
                debug!("ProDOS volume directory was not readable");
                return false;
            }
        };
        let first_char_patt = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let char_patt = [first_char_patt,"0123456789."].concat();
        let vol_key = match DirBlock::from_bytes(&buf) {
            Ok(blk) => blk,
            Err(_) => return false
        };
        let total_blocks = u16::from_le_bytes([buf[0x29],buf[0x2a]]) as usize;
        if total_blocks<280 || total_blocks>dev.block_count() {
            debug!("peculiar block count {}",total_blocks);
            return false;
        }
        if buf[0x23]!=ENTRY_LEN || (buf[0x24]!=0x0d && buf[0x24]!=0x0c) {
            debug!("unexpected header bytes {}, {}",buf[0x23],buf[0x24]);
            return false;
        }
        let nibs = buf[4];
        if vol_key.prev!=0 || (nibs >> 4)!=0x0f || (nibs & 0x0f)==0 {
            debug!("unexpected volume name length or links");
            return false;
        }
        if !first_char_patt.contains(buf[5] as char) {
            debug!("volume name unexpected character");
            return false;
        }
        for i in 1..(nibs & 0x0f) as usize {
            if !char_patt.contains(buf[5+i] as char) {
                debug!("volume name unexpected character");
                return false;
            }
        }
        true
    }
    /// Use the device as storage and walk every directory to verify the links.
    pub fn parse(dev: Device) -> Result<Self,DYNERR> {
        let disk = Self::from_device(dev);
        let hdr = disk.get_vol_header()?;
        if hdr.bitmap_ptr as usize >= disk.total_blocks()? {
            error!("bitmap pointer {} out of range",hdr.bitmap_ptr);
            return Err(Box::new(Error::CorruptDirectory));
        }
        let mut visited = HashSet::new();
        disk.verify_dir(VOL_KEY_BLOCK,&mut visited)?;
        Ok(disk)
    }
    fn verify_dir(&self,key: u16,visited: &mut HashSet<u16>) -> STDRESULT {
        for (_iblock,blk) in self.dir_chain(key)? {
            for entry in blk.entries.iter() {
                if entry.storage_type()==Some(StorageType::SubDirEntry) {
                    if !visited.insert(entry.key_ptr) {
                        error!("subdirectory {} is visited twice",entry.name());
                        return Err(Box::new(Error::CorruptDirectory));
                    }
                    let sub = self.read_dir_block(entry.key_ptr)?;
                    if sub.header_storage_type()!=Some(StorageType::SubDirHeader) {
                        error!("subdirectory {} has no header",entry.name());
                        return Err(Box::new(Error::CorruptDirectory));
                    }
                    self.verify_dir(entry.key_ptr,visited)?;
                }
            }
        }
        Ok(())
    }
    fn total_blocks(&self) -> Result<usize,DYNERR> {
        Ok(self.get_vol_header()?.total_blocks as usize)
    }
    fn get_vol_header(&self) -> Result<VolDirHeader,DYNERR> {
        DirBlock::from_bytes(&self.dev.read_block(VOL_KEY_BLOCK as usize)?)?.vol_header()
    }
    pub fn volume_name(&self) -> Result<String,DYNERR> {
        Ok(self.get_vol_header()?.name())
    }
    fn read_dir_block(&self,iblock: u16) -> Result<DirBlock,DYNERR> {
        DirBlock::from_bytes(&self.dev.read_block(iblock as usize)?)
    }
    fn write_dir_block(&mut self,iblock: u16,blk: &DirBlock) -> STDRESULT {
        self.dev.write_block(iblock as usize,&blk.to_bytes()?)
    }
    fn get_bitmap(&self) -> Result<Bitmap,DYNERR> {
        let hdr = self.get_vol_header()?;
        let total = hdr.total_blocks as usize;
        let ptr = hdr.bitmap_ptr as usize;
        let mut buf = Vec::new();
        for iblock in ptr..ptr + (total+4095)/4096 {
            buf.append(&mut self.dev.read_block(iblock)?);
        }
        Ok(Bitmap { ptr, total, buf })
    }
    fn put_bitmap(&mut self,bitmap: &Bitmap) -> STDRESULT {
        for (i,chunk) in bitmap.buf.chunks(BLOCK_SIZE).enumerate() {
            self.dev.write_block(bitmap.ptr+i,chunk)?;
        }
        Ok(())
    }
    /// Format the device with an empty volume.  Blocks 0 and 1 are reserved for a loader, but no loader is written.
    pub fn format(&mut self,vol_name: &str,time: chrono::NaiveDateTime) -> STDRESULT {
        if !is_name_valid(vol_name) {
            error!("invalid ProDOS volume name {}",vol_name);
            return Err(Box::new(Error::InvalidName));
        }
        let total = usize::min(self.dev.block_count(),u16::MAX as usize);
        if total < 7 {
            return Err(Box::new(Error::Unsupported));
        }
        trace!("formatting: zero all");
        for iblock in 0..total {
            self.dev.write_block(iblock,&[0;BLOCK_SIZE])?;
        }
        trace!("formatting: volume directory");
        let mut volume_dir = DirBlock::new();
        volume_dir.next = VOL_KEY_BLOCK+1;
        volume_dir.set_header(&VolDirHeader::create(total as u16,vol_name,time))?;
        self.write_dir_block(VOL_KEY_BLOCK,&volume_dir)?;
        for b in 3..6 {
            let mut this = DirBlock::new();
            this.prev = b-1;
            this.next = if b==5 { 0 } else { b+1 };
            self.write_dir_block(b,&this)?;
        }
        trace!("formatting: bitmap");
        let bitmap_blocks = (total+4095)/4096;
        let mut bitmap = Bitmap { ptr: BITMAP_BLOCK as usize, total, buf: vec![0;bitmap_blocks*BLOCK_SIZE] };
        for b in BITMAP_BLOCK as usize + bitmap_blocks..total {
            bitmap.set_free(b,true);
        }
        self.put_bitmap(&bitmap)
    }
    /// Blocks of a directory in link order, guarding against loops and bad links
    fn dir_chain(&self,key: u16) -> Result<Vec<(u16,DirBlock)>,DYNERR> {
        let total = self.total_blocks()?;
        let mut ans = Vec::new();
        let mut visited = HashSet::new();
        let mut curr = key;
        for _try in 0..MAX_DIRECTORY_REPS {
            if curr as usize >= total || !visited.insert(curr) {
                error!("bad directory link {}",curr);
                return Err(Box::new(Error::CorruptDirectory));
            }
            let blk = self.read_dir_block(curr)?;
            let next = blk.next;
            ans.push((curr,blk));
            if next==0 {
                return Ok(ans);
            }
            curr = next;
        }
        error!("directory block count not plausible, aborting");
        Err(Box::new(Error::CorruptDirectory))
    }
    /// Active entries in a directory as (block,index,entry), the header slot is index 1 of the key block
    fn dir_entries(&self,key: u16) -> Result<Vec<(u16,usize,Entry)>,DYNERR> {
        let mut ans = Vec::new();
        for (iblock,blk) in self.dir_chain(key)? {
            for (i,entry) in blk.entries.iter().enumerate() {
                if iblock==key && i==0 {
                    continue;
                }
                if entry.is_active() {
                    ans.push((iblock,i+1,*entry));
                }
            }
        }
        Ok(ans)
    }
    /// Key block of the directory at the end of the path
    fn find_dir_key_block(&self,dirs: &[String]) -> Result<u16,DYNERR> {
        let mut key = VOL_KEY_BLOCK;
        for dir in dirs {
            let mut found = None;
            for (_b,_i,entry) in self.dir_entries(key)? {
                if entry.storage_type()==Some(StorageType::SubDirEntry) && entry.name()==*dir {
                    found = Some(entry.key_ptr);
                }
            }
            key = match found {
                Some(ptr) => ptr,
                None => {
                    debug!("directory {} not found",dir);
                    return Err(Box::new(Error::FileNotFound));
                }
            }
        }
        Ok(key)
    }
    fn to_file_entry(&self,dirs: &[String],iblock: u16,idx: usize,entry: &Entry) -> FileEntry {
        let name = entry.name();
        let is_dir = entry.storage_type()==Some(StorageType::SubDirEntry);
        FileEntry {
            raw_name: entry.raw_name(),
            path: [dirs.to_vec(),vec![name.clone()]].concat().join("/"),
            name,
            type_code: entry.file_type,
            type_name: type_name(entry.file_type),
            aux: entry.aux_type,
            blocks: entry.blocks_used as usize,
            eof: Some(entry.eof()),
            start: Start::Block(entry.key_ptr as usize),
            slot: Slot { block: iblock as usize, index: idx },
            deleted: false,
            locked: !entry.get_access(Access::Write),
            is_dir,
            user: None
        }
    }
    /// List the files in the directory at `path`, use "" for the volume directory
    pub fn list(&self,path: &str) -> Result<Vec<FileEntry>,DYNERR> {
        let dirs: Vec<String> = path.split('/').filter(|s| s.len()>0).map(|s| sanitize_name(s)).collect();
        let key = self.find_dir_key_block(&dirs)?;
        Ok(self.dir_entries(key)?.iter().map(|(b,i,e)| self.to_file_entry(&dirs,*b,*i,e)).collect())
    }
    /// Go back to the directory and get the entry a `FileEntry` was made from
    fn locate(&self,file: &FileEntry) -> Result<(u16,DirBlock),DYNERR> {
        if file.slot.index>=1 && file.slot.index<=ENTRIES_PER_BLOCK as usize && file.slot.block < self.total_blocks()? {
            let blk = self.read_dir_block(file.slot.block as u16)?;
            let entry = &blk.entries[file.slot.index-1];
            let is_header = matches!(entry.storage_type(),Some(StorageType::VolDirHeader) | Some(StorageType::SubDirHeader));
            if entry.is_active() && !is_header && entry.raw_name()==file.raw_name {
                return Ok((file.slot.block as u16,blk));
            }
        }
        debug!("{} is no longer in the directory",file.path);
        Err(Box::new(Error::FileNotFound))
    }
    fn check_block_ptr(&self,ptr: u16) -> STDRESULT {
        if ptr==0 || ptr as usize >= self.total_blocks()? {
            error!("block pointer {} out of range",ptr);
            return Err(Box::new(Error::CorruptDirectory));
        }
        Ok(())
    }
    /// Data block pointers in file order (0 for a hole), and the index blocks
    fn file_map(&self,entry: &Entry) -> Result<(Vec<u16>,Vec<u16>),DYNERR> {
        let master_ptr = entry.key_ptr;
        self.check_block_ptr(master_ptr)?;
        match entry.storage_type() {
            Some(StorageType::Seedling) => Ok((vec![master_ptr],vec![])),
            Some(StorageType::Sapling) => {
                let ptrs = unpack_index(&self.dev.read_block(master_ptr as usize)?);
                for ptr in ptrs.iter().filter(|p| **p>0) {
                    self.check_block_ptr(*ptr)?;
                }
                Ok((ptrs,vec![master_ptr]))
            },
            Some(StorageType::Tree) => {
                let mut data = Vec::new();
                let mut index = vec![master_ptr];
                for iptr in unpack_index(&self.dev.read_block(master_ptr as usize)?).into_iter().take(128) {
                    if iptr==0 {
                        data.append(&mut vec![0;256]);
                        continue;
                    }
                    self.check_block_ptr(iptr)?;
                    let ptrs = unpack_index(&self.dev.read_block(iptr as usize)?);
                    for ptr in ptrs.iter().filter(|p| **p>0) {
                        self.check_block_ptr(*ptr)?;
                    }
                    data.extend(ptrs);
                    index.push(iptr);
                }
                Ok((data,index))
            },
            _ => {
                error!("cannot read storage type of {}",entry.name());
                Err(Box::new(Error::FileTypeMismatch))
            }
        }
    }
    /// Read the file up to its end of file marker, holes are filled with zeros
    pub fn read(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (_blk,dir) = self.locate(file)?;
        let entry = dir.entries[file.slot.index-1];
        let (ptrs,_index) = self.file_map(&entry)?;
        let eof = entry.eof();
        let mut ans = Vec::new();
        for i in 0..(eof+BLOCK_SIZE-1)/BLOCK_SIZE {
            match ptrs.get(i) {
                Some(ptr) if *ptr>0 => ans.append(&mut self.dev.read_block(*ptr as usize)?),
                _ => ans.append(&mut vec![0;BLOCK_SIZE])
            }
        }
        ans.truncate(eof);
        Ok(ans)
    }
    /// Read every data block up to the last allocated one, ignoring the end of file marker
    pub fn read_raw(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (_blk,dir) = self.locate(file)?;
        let (mut ptrs,_index) = self.file_map(&dir.entries[file.slot.index-1])?;
        while ptrs.last()==Some(&0) {
            ptrs.pop();
        }
        let mut ans = Vec::new();
        for ptr in ptrs {
            match ptr {
                0 => ans.append(&mut vec![0;BLOCK_SIZE]),
                p => ans.append(&mut self.dev.read_block(p as usize)?)
            }
        }
        Ok(ans)
    }
    fn check_new_name(&self,key: u16,name: &str,except: Option<&FileEntry>) -> STDRESULT {
        for (b,i,entry) in self.dir_entries(key)? {
            let same_slot = match except {
                Some(f) => f.slot==Slot { block: b as usize, index: i },
                None => false
            };
            if entry.name()==name && !same_slot {
                error!("{} already exists",name);
                return Err(Box::new(Error::DuplicateFilename));
            }
        }
        Ok(())
    }
    /// First free slot in the directory, `None` if the directory has to grow
    fn find_free_slot(&self,key: u16) -> Result<Option<(u16,usize)>,DYNERR> {
        for (iblock,blk) in self.dir_chain(key)? {
            for (i,entry) in blk.entries.iter().enumerate() {
                if !(iblock==key && i==0) && !entry.is_active() {
                    return Ok(Some((iblock,i+1)));
                }
            }
        }
        Ok(None)
    }
    /// Add a block to a subdirectory and return the first slot in it
    fn expand_directory(&mut self,key: u16,bitmap: &mut Bitmap) -> Result<(u16,usize),DYNERR> {
        let key_blk = self.read_dir_block(key)?;
        let hdr = key_blk.sub_header()?;
        let chain = self.dir_chain(key)?;
        let (last,mut last_blk) = match chain.last() {
            Some((b,blk)) => (*b,blk.clone()),
            None => return Err(Box::new(Error::CorruptDirectory))
        };
        let avail = bitmap.allocate()? as u16;
        let mut new_blk = DirBlock::new();
        new_blk.prev = last;
        self.write_dir_block(avail,&new_blk)?;
        last_blk.next = avail;
        self.write_dir_block(last,&last_blk)?;
        // the parent entry accounts for the new block
        let mut parent = self.read_dir_block(hdr.parent_ptr)?;
        let idx = hdr.parent_entry_num as usize;
        if idx<1 || idx>ENTRIES_PER_BLOCK as usize {
            return Err(Box::new(Error::CorruptDirectory));
        }
        let eof = parent.entries[idx-1].eof();
        parent.entries[idx-1].set_eof(eof+BLOCK_SIZE);
        parent.entries[idx-1].blocks_used += 1;
        self.write_dir_block(hdr.parent_ptr,&parent)?;
        Ok((avail,1))
    }
    /// Resolve the parent directory, check the name, and find a slot.
    /// Returns (key block, name, slot if one is free).
    fn prepare_to_write(&self,path: &str) -> Result<(u16,String,Option<(u16,usize)>),DYNERR> {
        let (dirs,name) = split_path(path);
        if !is_name_valid(&name) {
            error!("invalid ProDOS name {}",name);
            return Err(Box::new(Error::InvalidName));
        }
        let key = self.find_dir_key_block(&dirs)?;
        self.check_new_name(key,&name,None)?;
        let slot = self.find_free_slot(key)?;
        if slot.is_none() && key==VOL_KEY_BLOCK {
            return Err(Box::new(Error::DirectoryFull));
        }
        Ok((key,name,slot))
    }
    fn finish_entry(&mut self,key: u16,slot: (u16,usize),entry: Entry) -> STDRESULT {
        let mut blk = self.read_dir_block(slot.0)?;
        blk.entries[slot.1-1] = entry;
        self.write_dir_block(slot.0,&blk)?;
        let mut key_blk = self.read_dir_block(key)?;
        key_blk.adjust_file_count(1)?;
        self.write_dir_block(key,&key_blk)
    }
    /// Write data blocks and index blocks, returns (storage type, key pointer, blocks used)
    fn write_data(&mut self,dat: &[u8],bitmap: &mut Bitmap) -> Result<(StorageType,u16,usize),DYNERR> {
        let chunks: Vec<&[u8]> = match dat.len() {
            0 => vec![&[]],
            _ => dat.chunks(BLOCK_SIZE).collect()
        };
        let mut data_ptrs = Vec::new();
        for chunk in chunks {
            let iblock = bitmap.allocate()?;
            self.dev.write_block(iblock,chunk)?;
            data_ptrs.push(iblock as u16);
        }
        match data_ptrs.len() {
            1 => Ok((StorageType::Seedling,data_ptrs[0],1)),
            n if n<=256 => {
                let index_ptr = bitmap.allocate()?;
                self.dev.write_block(index_ptr,&pack_index(&data_ptrs))?;
                Ok((StorageType::Sapling,index_ptr as u16,n+1))
            },
            n => {
                let master_ptr = bitmap.allocate()?;
                let mut index_ptrs = Vec::new();
                for group in data_ptrs.chunks(256) {
                    let index_ptr = bitmap.allocate()?;
                    self.dev.write_block(index_ptr,&pack_index(group))?;
                    index_ptrs.push(index_ptr as u16);
                }
                self.dev.write_block(master_ptr,&pack_index(&index_ptrs))?;
                Ok((StorageType::Tree,master_ptr as u16,n+1+index_ptrs.len()))
            }
        }
    }
    /// Save a file of the given type, `path` can include subdirectories that already exist.
    /// Nothing is written unless there is room for all of it.
    pub fn save(&mut self,path: &str,dat: &[u8],ftype: u8,aux: u16) -> Result<FileEntry,DYNERR> {
        if ftype==FileType::Directory as u8 {
            return Err(Box::new(Error::FileTypeMismatch));
        }
        if dat.len()>MAX_EOF {
            error!("file too large for ProDOS");
            return Err(Box::new(Error::FileTooLarge));
        }
        let (key,name,maybe_slot) = self.prepare_to_write(path)?;
        let mut bitmap = self.get_bitmap()?;
        let needed = blocks_needed(dat.len()) + match maybe_slot { Some(_) => 0, None => 1 };
        if needed > bitmap.free_count() {
            error!("{} needs {} blocks",name,needed);
            return Err(Box::new(Error::DiskFull));
        }
        let slot = match maybe_slot {
            Some(s) => s,
            None => self.expand_directory(key,&mut bitmap)?
        };
        let (stype,key_ptr,blocks) = self.write_data(dat,&mut bitmap)?;
        let mut entry = Entry::create(stype,&name,ftype,key_ptr,key,chrono::Local::now().naive_local());
        entry.aux_type = aux;
        entry.blocks_used = blocks as u16;
        entry.set_eof(dat.len());
        self.finish_entry(key,slot,entry)?;
        self.put_bitmap(&bitmap)?;
        let (dirs,_name) = split_path(path);
        Ok(self.to_file_entry(&dirs,slot.0,slot.1,&entry))
    }
    /// Create a subdirectory, its parent must already exist
    pub fn create_dir(&mut self,path: &str) -> Result<FileEntry,DYNERR> {
        let (key,name,maybe_slot) = self.prepare_to_write(path)?;
        let mut bitmap = self.get_bitmap()?;
        let needed = match maybe_slot { Some(_) => 1, None => 2 };
        if needed > bitmap.free_count() {
            return Err(Box::new(Error::DiskFull));
        }
        let slot = match maybe_slot {
            Some(s) => s,
            None => self.expand_directory(key,&mut bitmap)?
        };
        let now = chrono::Local::now().naive_local();
        let sub_key = bitmap.allocate()? as u16;
        let mut sub_blk = DirBlock::new();
        sub_blk.set_header(&SubDirHeader::create(&name,slot.0,slot.1 as u8,now))?;
        self.write_dir_block(sub_key,&sub_blk)?;
        let mut entry = Entry::create(StorageType::SubDirEntry,&name,FileType::Directory as u8,sub_key,key,now);
        entry.blocks_used = 1;
        entry.set_eof(BLOCK_SIZE);
        self.finish_entry(key,slot,entry)?;
        self.put_bitmap(&bitmap)?;
        let (dirs,_name) = split_path(path);
        Ok(self.to_file_entry(&dirs,slot.0,slot.1,&entry))
    }
    /// Delete a file, or a subdirectory if it is empty
    pub fn delete(&mut self,file: &FileEntry) -> STDRESULT {
        let (iblock,mut blk) = self.locate(file)?;
        let entry = blk.entries[file.slot.index-1];
        if !entry.get_access(Access::Destroy) {
            return Err(Box::new(Error::FileLocked));
        }
        let mut bitmap = self.get_bitmap()?;
        if entry.storage_type()==Some(StorageType::SubDirEntry) {
            if self.dir_entries(entry.key_ptr)?.len()>0 {
                return Err(Box::new(Error::DirectoryNotEmpty));
            }
            for (b,_) in self.dir_chain(entry.key_ptr)? {
                bitmap.set_free(b as usize,true);
            }
        } else {
            let (data,index) = self.file_map(&entry)?;
            for ptr in data.into_iter().chain(index).filter(|p| *p>0) {
                bitmap.set_free(ptr as usize,true);
            }
        }
        blk.entries[file.slot.index-1].stor_len_nibs &= 0x0f;
        self.write_dir_block(iblock,&blk)?;
        let mut key_blk = self.read_dir_block(entry.header_ptr)?;
        key_blk.adjust_file_count(-1)?;
        self.write_dir_block(entry.header_ptr,&key_blk)?;
        self.put_bitmap(&bitmap)
    }
    pub fn rename(&mut self,file: &FileEntry,new_name: &str) -> Result<FileEntry,DYNERR> {
        let name = sanitize_name(new_name);
        let (iblock,mut blk) = self.locate(file)?;
        let mut entry = blk.entries[file.slot.index-1];
        if !entry.get_access(Access::Rename) {
            return Err(Box::new(Error::FileLocked));
        }
        self.check_new_name(entry.header_ptr,&name,Some(file))?;
        entry.rename(&name);
        blk.entries[file.slot.index-1] = entry;
        self.write_dir_block(iblock,&blk)?;
        if entry.storage_type()==Some(StorageType::SubDirEntry) {
            let mut sub_blk = self.read_dir_block(entry.key_ptr)?;
            let mut hdr = sub_blk.sub_header()?;
            let (nibs,fname) = string_to_file_name(StorageType::SubDirHeader,&name);
            hdr.stor_len_nibs = nibs;
            hdr.name = fname;
            sub_blk.set_header(&hdr)?;
            self.write_dir_block(entry.key_ptr,&sub_blk)?;
        }
        let (dirs,_name) = split_path(&file.path);
        Ok(self.to_file_entry(&dirs,iblock,file.slot.index,&entry))
    }
    /// Locking clears the write, rename, and destroy permissions
    pub fn lock(&mut self,file: &FileEntry,locked: bool) -> Result<FileEntry,DYNERR> {
        let (iblock,mut blk) = self.locate(file)?;
        let entry = &mut blk.entries[file.slot.index-1];
        for what in [Access::Write,Access::Rename,Access::Destroy] {
            entry.set_access(what,!locked);
        }
        let entry = *entry;
        self.write_dir_block(iblock,&blk)?;
        let (dirs,_name) = split_path(&file.path);
        Ok(self.to_file_entry(&dirs,iblock,file.slot.index,&entry))
    }
    pub fn free_space(&self) -> Result<FreeSpace,DYNERR> {
        let bitmap = self.get_bitmap()?;
        let mut map = BitVec::from_elem(bitmap.total,false);
        for b in 0..bitmap.total {
            map.set(b,bitmap.is_free(b));
        }
        Ok(FreeSpace::from_map(&map,BLOCK_SIZE))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_name("hello world"),"HELLO.WORLD");
        assert_eq!(sanitize_name("2021"),"A2021");
        assert_eq!(sanitize_name("The File Name"),"THE.FILE.NAME");
        assert_eq!(sanitize_name("a*b?c"),"ABC");
        assert_eq!(sanitize_name(""),"A");
        assert_eq!(sanitize_name("abcdefghijklmnopqrst"),"ABCDEFGHIJKLMNO");
        assert!(is_name_valid(&sanitize_name("\t hidden tab")));
    }

    #[test]
    fn storage_thresholds() {
        assert_eq!(blocks_needed(0),1);
        assert_eq!(blocks_needed(512),1);
        assert_eq!(blocks_needed(513),3);
        assert_eq!(blocks_needed(256*512),257);
        assert_eq!(blocks_needed(256*512+1),257+1+2);
    }

    #[test]
    fn index_halves() {
        let buf = pack_index(&[0x1234,0x0005]);
        assert_eq!(buf[0],0x34);
        assert_eq!(buf[256],0x12);
        assert_eq!(unpack_index(&buf)[0..3],[0x1234,5,0]);
    }
}
