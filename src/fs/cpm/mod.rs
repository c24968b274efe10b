//! ## CP/M file system module
//!
//! This manipulates Apple II CP/M 5.25 inch disks.  The first three tracks are reserved
//! for the system, the directory follows in two 1K blocks.  Records of 128 bytes are
//! mapped to DOS sectors using the CP/M skew in `bios::skew`.
//!
//! A file is the set of extents that share a user number and name.  Extents are
//! ordered by their extent index, each one addresses up to 16 blocks.

mod directory;
pub mod types;

use std::collections::{BTreeMap,HashSet};
use log::{debug,trace,error};
use bit_vec::BitVec;
use types::*;
use directory::*;
use super::{Error,FileEntry,FreeSpace,Slot,Start};
use crate::bios::device::Device;
use crate::bios::skew;
use crate::{DiskStruct,STDRESULT,DYNERR};

/// Make a string into a valid CP/M file name.
/// The part after the last dot is the extension.  Invalid characters are dropped.
pub fn sanitize_name(raw: &str) -> String {
    let clean = |s: &str, max: usize| -> String {
        let mut ans: String = s.chars()
            .filter(|c| c.is_ascii() && !c.is_ascii_control() && !INVALID_CHARS.contains(*c))
            .collect::<String>().to_uppercase();
        ans.truncate(max);
        ans
    };
    let (base,ext) = match raw.rfind('.') {
        Some(i) => (clean(&raw[..i],8),clean(&raw[i+1..],3)),
        None => (clean(raw,8),String::new())
    };
    let base = match base.len() {
        0 => "A".to_string(),
        _ => base
    };
    match ext.len() {
        0 => base,
        _ => [base,ext].join(".")
    }
}

/// Extents of one file in directory order of their index, with their directory slots
struct CpmFile {
    user: u8,
    plain: [u8;11],
    extents: Vec<(usize,Extent)>
}

impl CpmFile {
    fn blocks(&self) -> Vec<usize> {
        self.extents.iter().flat_map(|(_,fx)| fx.blocks()).collect()
    }
    fn records(&self) -> usize {
        self.extents.iter().map(|(_,fx)| fx.records as usize).sum()
    }
    /// Length in bytes, the last extent may say how much of the last record is used
    fn len(&self) -> usize {
        let records = self.records();
        match self.extents.last() {
            Some((_,fx)) if fx.last_bytes>0 && records>0 => (records-1)*RECORD_SIZE + fx.last_bytes as usize,
            _ => records*RECORD_SIZE
        }
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
    fn read_record(dev: &Device,record: usize) -> Result<Vec<u8>,DYNERR> {
        let ([track,sector],offset) = skew::cpm_record_ts(record,OFF);
        let buf = dev.read_sector(track,sector)?;
        Ok(buf[offset..offset+RECORD_SIZE].to_vec())
    }
    fn write_record(&mut self,record: usize,dat: &[u8]) -> STDRESULT {
        let ([track,sector],offset) = skew::cpm_record_ts(record,OFF);
        let mut buf = self.dev.read_sector(track,sector)?;
        let mut rec = dat.to_vec();
        rec.resize(RECORD_SIZE,0);
        buf[offset..offset+RECORD_SIZE].copy_from_slice(&rec);
        self.dev.write_sector(track,sector,&buf)
    }
    fn read_cpm_block(&self,iblock: usize) -> Result<Vec<u8>,DYNERR> {
        let mut ans = Vec::new();
        for r in 0..RECORDS_PER_BLOCK {
            ans.append(&mut Self::read_record(&self.dev,iblock*RECORDS_PER_BLOCK + r)?);
        }
        Ok(ans)
    }
    fn write_cpm_block(&mut self,iblock: usize,dat: &[u8]) -> STDRESULT {
        let mut buf = dat.to_vec();
        buf.resize(BLOCK_SIZE,0);
        for r in 0..RECORDS_PER_BLOCK {
            self.write_record(iblock*RECORDS_PER_BLOCK + r,&buf[r*RECORD_SIZE..(r+1)*RECORD_SIZE])?;
        }
        Ok(())
    }
    fn read_dir(dev: &Device) -> Result<Vec<Extent>,DYNERR> {
        let mut ans = Vec::new();
        for r in 0..DIR_ENTRIES*DIR_ENTRY_SIZE/RECORD_SIZE {
            let rec = Self::read_record(dev,r)?;
            for chunk in rec.chunks(DIR_ENTRY_SIZE) {
                ans.push(Extent::from_bytes(chunk)?);
            }
        }
        Ok(ans)
    }
    fn get_directory(&self) -> Result<Vec<Extent>,DYNERR> {
        Self::read_dir(&self.dev)
    }
    fn save_directory(&mut self,dir: &[Extent]) -> STDRESULT {
        let mut buf: Vec<u8> = Vec::new();
        for fx in dir {
            buf.append(&mut fx.to_bytes()?);
        }
        for (r,chunk) in buf.chunks(RECORD_SIZE).enumerate() {
            self.write_record(r,chunk)?;
        }
        Ok(())
    }
    /// Test a device for CP/M by checking every directory entry for plausibility.
    /// Erased entries (all 0xe5) are skipped.
    pub fn test_img(dev: &Device) -> bool {
        if dev.tracks()!=TRACKS || dev.sectors()!=SECTORS {
            debug!("CP/M requires a 35 track 16 sector disk");
            return false;
        }
        let raw = match Self::read_dir(dev) {
            Ok(d) => d,
            Err(_) => {
                debug!("CP/M directory was not readable");
                return false;
            }
        };
        for (i,fx) in raw.iter().enumerate() {
            if matches!(fx.to_bytes(),Ok(buf) if buf.iter().all(|b| *b==DELETED)) {
                continue;
            }
            if fx.user>MAX_USER && fx.user!=DELETED {
                debug!("entry {} user {}",i,fx.user);
                return false;
            }
            // filename bytes must be positive ASCII and not control characters
            if fx.name.iter().any(|c| *c>=0x80 || *c<0x20) {
                debug!("entry {} bad name",i);
                return false;
            }
            if fx.idx_low>MAX_EXTENT_INDEX || fx.idx_high!=0 || fx.records>RECORDS_PER_EXTENT {
                debug!("entry {} extent {} s2 {} records {}",i,fx.idx_low,fx.idx_high,fx.records);
                return false;
            }
        }
        true
    }
    /// Group active extents into files, in order of the first extent's slot
    fn build_files(dir: &[Extent]) -> Result<Vec<CpmFile>,DYNERR> {
        let mut map: BTreeMap<(u8,[u8;11]),Vec<(usize,Extent)>> = BTreeMap::new();
        for (slot,fx) in dir.iter().enumerate() {
            if fx.user<=MAX_USER {
                map.entry((fx.user,fx.plain_name())).or_default().push((slot,*fx));
            }
        }
        let mut ans: Vec<CpmFile> = Vec::new();
        for ((user,plain),mut extents) in map {
            extents.sort_by_key(|(_,fx)| fx.index());
            for pair in extents.windows(2) {
                if pair[0].1.index()==pair[1].1.index() {
                    error!("extent {} of {} appears twice",pair[0].1.index(),display_name(&plain));
                    return Err(Box::new(Error::CorruptDirectory));
                }
            }
            ans.push(CpmFile { user, plain, extents });
        }
        ans.sort_by_key(|f| f.extents.iter().map(|(s,_)| *s).min().unwrap_or(0));
        Ok(ans)
    }
    /// Use the device as storage and verify that every block is in range and claimed only once.
    pub fn parse(dev: Device) -> Result<Self,DYNERR> {
        let disk = Self::from_device(dev);
        let dir = disk.get_directory()?;
        let mut claimed = HashSet::new();
        for file in Self::build_files(&dir)? {
            for b in file.blocks() {
                if b<DIR_BLOCKS || b>=USER_BLOCKS || !claimed.insert(b) {
                    error!("{} has bad or shared block {}",display_name(&file.plain),b);
                    return Err(Box::new(Error::CorruptDirectory));
                }
            }
        }
        Ok(disk)
    }
    /// Fill the directory and data area with 0xe5.  The system tracks are not touched.
    pub fn format(&mut self) -> STDRESULT {
        if self.dev.tracks()!=TRACKS || self.dev.sectors()!=SECTORS {
            error!("CP/M requires a 35 track 16 sector disk");
            return Err(Box::new(Error::Unsupported));
        }
        trace!("formatting: fill data area");
        for track in OFF..TRACKS {
            for sector in 0..SECTORS {
                self.dev.write_sector(track,sector,&[DELETED;256])?;
            }
        }
        Ok(())
    }
    fn to_file_entry(file: &CpmFile,deleted: bool) -> FileEntry {
        let name = display_name(&file.plain);
        let blocks = file.blocks();
        let first = &file.extents[0];
        FileEntry {
            raw_name: [first.1.name.to_vec(),first.1.typ.to_vec()].concat(),
            path: name.clone(),
            name,
            type_code: 0,
            type_name: String::from_utf8_lossy(&file.plain[8..11]).trim_end().to_string(),
            aux: 0,
            blocks: blocks.len(),
            eof: Some(file.len()),
            start: Start::Block(blocks.first().copied().unwrap_or(0)),
            slot: Slot { block: 0, index: first.0 },
            deleted,
            locked: first.1.is_read_only(),
            is_dir: false,
            user: Some(file.user)
        }
    }
    /// Files of every user
    pub fn list(&self) -> Result<Vec<FileEntry>,DYNERR> {
        let dir = self.get_directory()?;
        Ok(Self::build_files(&dir)?.iter().map(|f| Self::to_file_entry(f,false)).collect())
    }
    /// Erased extents that still carry a plausible name.
    /// The original user number is lost, so every name appears once.
    pub fn list_deleted(&self) -> Result<Vec<FileEntry>,DYNERR> {
        let dir = self.get_directory()?;
        let mut map: BTreeMap<[u8;11],Vec<(usize,Extent)>> = BTreeMap::new();
        for (slot,fx) in dir.iter().enumerate() {
            if fx.user==DELETED && fx.has_plausible_name() && fx.idx_low<=MAX_EXTENT_INDEX {
                map.entry(fx.plain_name()).or_default().push((slot,*fx));
            }
        }
        let mut ans = Vec::new();
        for (plain,mut extents) in map {
            extents.sort_by_key(|(_,fx)| fx.index());
            ans.push(Self::to_file_entry(&CpmFile { user: DELETED, plain, extents },true));
        }
        Ok(ans)
    }
    /// Go back to the directory and gather the file a `FileEntry` was made from
    fn locate(&self,file: &FileEntry) -> Result<(Vec<Extent>,CpmFile),DYNERR> {
        let dir = self.get_directory()?;
        if let (Some(user),Some(fx)) = (file.user,dir.get(file.slot.index)) {
            if fx.user==user && fx.user<=MAX_USER && [fx.name.to_vec(),fx.typ.to_vec()].concat()==file.raw_name {
                let plain = fx.plain_name();
                for f in Self::build_files(&dir)? {
                    if f.user==user && f.plain==plain {
                        return Ok((dir,f));
                    }
                }
            }
        }
        debug!("{} is no longer in the directory",file.name);
        Err(Box::new(Error::FileNotFound))
    }
    pub fn read(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (_dir,f) = self.locate(file)?;
        let mut ans = Vec::new();
        for b in f.blocks() {
            ans.append(&mut self.read_cpm_block(b)?);
        }
        ans.truncate(f.len());
        Ok(ans)
    }
    pub fn read_raw(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (_dir,f) = self.locate(file)?;
        let mut ans = Vec::new();
        for b in f.blocks() {
            ans.append(&mut self.read_cpm_block(b)?);
        }
        Ok(ans)
    }
    fn used_blocks(dir: &[Extent]) -> BitVec {
        let mut map = BitVec::from_elem(USER_BLOCKS,false);
        for b in 0..DIR_BLOCKS {
            map.set(b,true);
        }
        for fx in dir.iter().filter(|fx| fx.user<=MAX_USER) {
            for b in fx.blocks().into_iter().filter(|b| *b<USER_BLOCKS) {
                map.set(b,true);
            }
        }
        map
    }
    fn check_new_name(dir: &[Extent],user: u8,plain: &[u8;11]) -> STDRESULT {
        if dir.iter().any(|fx| fx.user==user && fx.plain_name()==*plain) {
            error!("{} already exists for user {}",display_name(plain),user);
            return Err(Box::new(Error::DuplicateFilename));
        }
        Ok(())
    }
    /// Save a file for the given user.  Nothing is written unless there is room for all of it.
    pub fn save(&mut self,name: &str,dat: &[u8],user: u8) -> Result<FileEntry,DYNERR> {
        if user>MAX_USER {
            return Err(Box::new(Error::InvalidName));
        }
        let (b,e) = split_name(&sanitize_name(name));
        let mut dir = self.get_directory()?;
        let mut plain = [0;11];
        plain[0..8].copy_from_slice(&b);
        plain[8..11].copy_from_slice(&e);
        Self::check_new_name(&dir,user,&plain)?;
        let num_blocks = (dat.len()+BLOCK_SIZE-1)/BLOCK_SIZE;
        let num_extents = usize::max(1,(num_blocks+BLOCKS_PER_EXTENT-1)/BLOCKS_PER_EXTENT);
        let free_slots: Vec<usize> = (0..dir.len()).filter(|i| dir[*i].user==DELETED).collect();
        if free_slots.len()<num_extents {
            return Err(Box::new(Error::DirectoryFull));
        }
        let used = Self::used_blocks(&dir);
        let free_blocks: Vec<usize> = (0..USER_BLOCKS).filter(|b| !used[*b]).take(num_blocks).collect();
        if free_blocks.len()<num_blocks {
            error!("{} needs {} blocks",display_name(&plain),num_blocks);
            return Err(Box::new(Error::DiskFull));
        }
        for (i,chunk) in dat.chunks(BLOCK_SIZE).enumerate() {
            self.write_cpm_block(free_blocks[i],chunk)?;
        }
        let total_records = (dat.len()+RECORD_SIZE-1)/RECORD_SIZE;
        for x in 0..num_extents {
            let mut fx = Extent::new();
            fx.user = user;
            fx.name = b;
            fx.typ = e;
            fx.idx_low = x as u8;
            for (i,blk) in free_blocks.iter().skip(x*BLOCKS_PER_EXTENT).take(BLOCKS_PER_EXTENT).enumerate() {
                fx.block_list[i] = *blk as u8;
            }
            let prior = x*RECORDS_PER_EXTENT as usize;
            fx.records = usize::min(RECORDS_PER_EXTENT as usize,total_records.saturating_sub(prior)) as u8;
            if x+1==num_extents {
                fx.last_bytes = (dat.len() % RECORD_SIZE) as u8;
            }
            dir[free_slots[x]] = fx;
        }
        self.save_directory(&dir)?;
        let file = CpmFile {
            user,
            plain,
            extents: (0..num_extents).map(|x| (free_slots[x],dir[free_slots[x]])).collect()
        };
        Ok(Self::to_file_entry(&file,false))
    }
    /// Mark every extent of the file as deleted, the data is left in place
    pub fn delete(&mut self,file: &FileEntry) -> STDRESULT {
        let (mut dir,f) = self.locate(file)?;
        if f.extents[0].1.is_read_only() {
            return Err(Box::new(Error::FileLocked));
        }
        for (slot,_) in &f.extents {
            dir[*slot].user = DELETED;
        }
        self.save_directory(&dir)
    }
    pub fn rename(&mut self,file: &FileEntry,new_name: &str) -> Result<FileEntry,DYNERR> {
        let (mut dir,mut f) = self.locate(file)?;
        if f.extents[0].1.is_read_only() {
            return Err(Box::new(Error::FileLocked));
        }
        let (b,e) = split_name(&sanitize_name(new_name));
        let mut plain = [0;11];
        plain[0..8].copy_from_slice(&b);
        plain[8..11].copy_from_slice(&e);
        if plain!=f.plain {
            Self::check_new_name(&dir,f.user,&plain)?;
        }
        for (slot,fx) in f.extents.iter_mut() {
            dir[*slot].set_name(b,e);
            *fx = dir[*slot];
        }
        f.plain = plain;
        self.save_directory(&dir)?;
        Ok(Self::to_file_entry(&f,false))
    }
    /// Set or clear the read only attribute on every extent
    pub fn lock(&mut self,file: &FileEntry,locked: bool) -> Result<FileEntry,DYNERR> {
        let (mut dir,mut f) = self.locate(file)?;
        for (slot,fx) in f.extents.iter_mut() {
            match locked {
                true => dir[*slot].typ[0] |= READ_ONLY,
                false => dir[*slot].typ[0] &= !READ_ONLY
            }
            *fx = dir[*slot];
        }
        self.save_directory(&dir)?;
        Ok(Self::to_file_entry(&f,false))
    }
    pub fn free_space(&self) -> Result<FreeSpace,DYNERR> {
        let mut map = Self::used_blocks(&self.get_directory()?);
        map.negate();
        Ok(FreeSpace::from_map(&map,BLOCK_SIZE))
    }
}
