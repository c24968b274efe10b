//! ## Pascal file system module
//!
//! This manipulates disk images containing one Apple Pascal volume.
//! There is one flat directory in blocks 2 through 5, and every file occupies a
//! contiguous run of blocks.  Entries are kept sorted by starting block.

mod directory;
pub mod types;

use std::collections::HashMap;
use chrono::Datelike;
use log::{debug,trace,error};
use bit_vec::BitVec;
use types::*;
use directory::*;
use super::{Error,FileEntry,FreeSpace,Slot,Start};
use crate::bios::device::{Device,BLOCK_SIZE};
use crate::{STDRESULT,DYNERR};

/// Pascal packs month, day, and two digit year into 16 bits
pub fn pack_date(time: chrono::NaiveDateTime) -> u16 {
    let (_is_common_era,year) = time.year_ce();
    (time.month() + (time.day() << 4) + ((year%100) << 9)) as u16
}

/// Make a string into a valid Pascal file name.
/// Only letters, digits, and dots are kept, at most 15 characters.
pub fn sanitize_name(raw: &str) -> String {
    let mut ans: String = raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c=='.')
        .collect::<String>().to_uppercase();
    ans.truncate(15);
    match ans.len() {
        0 => "A".to_string(),
        _ => ans
    }
}

fn string_to_name<const N: usize>(s: &str) -> [u8;N] {
    let mut ans = [0;N];
    for (i,c) in s.bytes().take(N).enumerate() {
        ans[i] = c;
    }
    ans
}

fn printable(name: &[u8]) -> bool {
    name.iter().all(|c| *c>=32 && *c<=126)
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
    /// Read the directory through the end block declared in the volume header
    fn read_dir_bytes(dev: &Device) -> Result<Vec<u8>,DYNERR> {
        let mut buf = dev.read_block(VOL_HEADER_BLOCK)?;
        let end = u16::from_le_bytes([buf[2],buf[3]]) as usize;
        if end<=VOL_HEADER_BLOCK || end>MAX_DIR_END_BLOCK || end>dev.block_count() {
            debug!("directory end block {} is out of range",end);
            return Err(Box::new(Error::CorruptDirectory));
        }
        for iblock in VOL_HEADER_BLOCK+1..end {
            buf.append(&mut dev.read_block(iblock)?);
        }
        Ok(buf)
    }
    fn get_directory(&self) -> Result<Directory,DYNERR> {
        Directory::from_bytes(&Self::read_dir_bytes(&self.dev)?)
    }
    fn save_directory(&mut self,dir: &Directory) -> STDRESULT {
        let buf = dir.to_bytes((dir.header.end_block as usize - VOL_HEADER_BLOCK)*BLOCK_SIZE)?;
        for (i,chunk) in buf.chunks(BLOCK_SIZE).enumerate() {
            self.dev.write_block(VOL_HEADER_BLOCK+i,chunk)?;
        }
        Ok(())
    }
    /// Test a device for the Pascal file system by examining the volume header and every entry.
    pub fn test_img(dev: &Device) -> bool {
        let directory = match Self::read_dir_bytes(dev) {
            Ok(buf) => match Directory::from_bytes(&buf) {
                Ok(d) => d,
                Err(_) => return false
            },
            Err(e) => {
                debug!("pascal directory was not readable; {}",e);
                return false;
            }
        };
        let hdr = &directory.header;
        let end = hdr.end_block as usize;
        let tot = hdr.total_blocks as usize;
        if hdr.begin_block!=0 || end<=VOL_HEADER_BLOCK || end>MAX_DIR_END_BLOCK {
            debug!("header begin {} end {}",hdr.begin_block,end);
            return false;
        }
        if hdr.name_len>7 || hdr.name_len==0 || !printable(&hdr.name[0..hdr.name_len as usize]) {
            debug!("header name length {}",hdr.name_len);
            return false;
        }
        if hdr.file_type!=0 {
            debug!("header type {}",hdr.file_type);
            return false;
        }
        if tot>dev.block_count() || hdr.num_files as usize>dir_capacity(end) {
            debug!("header total blocks {} files {}",tot,hdr.num_files);
            return false;
        }
        for (i,entry) in directory.entries.iter().enumerate() {
            let ebeg = entry.begin_block as usize;
            let eend = entry.end_block as usize;
            if ebeg<end || eend<=ebeg || eend>tot {
                debug!("entry {} begin {} end {}",i,ebeg,eend);
                return false;
            }
            if entry.name_len>15 || entry.name_len==0 || !printable(&entry.raw_name()) {
                debug!("entry {} name length {}",i,entry.name_len);
                return false;
            }
        }
        true
    }
    /// Use the device as storage and verify that no two files overlap.
    pub fn parse(dev: Device) -> Result<Self,DYNERR> {
        let disk = Self::from_device(dev);
        let dir = disk.get_directory()?;
        let mut prev_end = dir.header.end_block;
        for entry in &dir.entries {
            if entry.begin_block<prev_end || entry.end_block<=entry.begin_block || entry.end_block>dir.header.total_blocks {
                error!("{} occupies blocks {} to {}, overlaps or out of order",entry.name(),entry.begin_block,entry.end_block);
                return Err(Box::new(Error::CorruptDirectory));
            }
            prev_end = entry.end_block;
        }
        Ok(disk)
    }
    pub fn volume_name(&self) -> Result<String,DYNERR> {
        Ok(self.get_directory()?.header.name())
    }
    /// Format the disk for the Pascal file system.  The boot blocks are zeroed, no loader is written.
    pub fn format(&mut self,vol_name: &str,time: chrono::NaiveDateTime) -> STDRESULT {
        let mut name = sanitize_name(vol_name);
        name.truncate(MAX_VOL_NAME);
        let num_blocks = usize::min(self.dev.block_count(),u16::MAX as usize);
        if num_blocks <= DIR_END_BLOCK {
            return Err(Box::new(Error::Unsupported));
        }
        trace!("formatting: zero boot and directory blocks");
        for iblock in 0..DIR_END_BLOCK {
            self.dev.write_block(iblock,&[0;BLOCK_SIZE])?;
        }
        let header = VolDirHeader {
            begin_block: 0,
            end_block: DIR_END_BLOCK as u16,
            file_type: 0,
            name_len: name.len() as u8,
            name: string_to_name(&name),
            total_blocks: num_blocks as u16,
            num_files: 0,
            last_access_date: 0,
            last_set_date: pack_date(time),
            pad: [0;4]
        };
        self.save_directory(&Directory { header, entries: Vec::new() })
    }
    fn type_name(code: u8) -> String {
        let typ_map: HashMap<u8,&str> = HashMap::from(TYPE_MAP_DISP);
        match typ_map.get(&code) {
            Some(s) => s.to_string(),
            None => format!("${:02X}",code)
        }
    }
    fn to_file_entry(&self,idx: usize,entry: &DirectoryEntry) -> FileEntry {
        let blocks = entry.end_block.saturating_sub(entry.begin_block) as usize;
        let code = (entry.file_type & 0x0f) as u8;
        FileEntry {
            raw_name: entry.raw_name(),
            name: entry.name(),
            path: entry.name(),
            type_code: code,
            type_name: Self::type_name(code),
            aux: 0,
            blocks,
            eof: Some(blocks.saturating_sub(1)*BLOCK_SIZE + entry.bytes_remaining as usize),
            start: Start::Block(entry.begin_block as usize),
            slot: Slot { block: VOL_HEADER_BLOCK, index: idx+1 },
            deleted: false,
            locked: false,
            is_dir: false,
            user: None
        }
    }
    pub fn list(&self) -> Result<Vec<FileEntry>,DYNERR> {
        let dir = self.get_directory()?;
        Ok(dir.entries.iter().enumerate().map(|(i,e)| self.to_file_entry(i,e)).collect())
    }
    /// Go back to the directory and get the entry a `FileEntry` was made from
    fn locate(&self,file: &FileEntry) -> Result<(usize,Directory),DYNERR> {
        let dir = self.get_directory()?;
        if file.slot.index>=1 && file.slot.index<=dir.entries.len() {
            let idx = file.slot.index-1;
            if dir.entries[idx].raw_name()==file.raw_name && Start::Block(dir.entries[idx].begin_block as usize)==file.start {
                return Ok((idx,dir));
            }
        }
        debug!("{} is no longer in the directory",file.name);
        Err(Box::new(Error::FileNotFound))
    }
    fn read_blocks(&self,entry: &DirectoryEntry) -> Result<Vec<u8>,DYNERR> {
        let mut ans = Vec::new();
        for iblock in entry.begin_block..entry.end_block {
            ans.append(&mut self.dev.read_block(iblock as usize)?);
        }
        Ok(ans)
    }
    pub fn read(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (idx,dir) = self.locate(file)?;
        let entry = &dir.entries[idx];
        let mut ans = self.read_blocks(entry)?;
        let blocks = entry.end_block.saturating_sub(entry.begin_block) as usize;
        ans.truncate((blocks-1)*BLOCK_SIZE + usize::min(BLOCK_SIZE,entry.bytes_remaining as usize));
        Ok(ans)
    }
    pub fn read_raw(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let (idx,dir) = self.locate(file)?;
        self.read_blocks(&dir.entries[idx])
    }
    /// Find the first gap of `num` free blocks, returns the directory position and starting block
    fn get_available_blocks(&self,dir: &Directory,num: usize) -> Option<(usize,u16)> {
        let mut start = dir.header.end_block as usize;
        for (i,entry) in dir.entries.iter().enumerate() {
            if entry.begin_block as usize >= start + num {
                return Some((i,start as u16));
            }
            start = usize::max(start,entry.end_block as usize);
        }
        match start + num <= dir.header.total_blocks as usize {
            true => Some((dir.entries.len(),start as u16)),
            false => None
        }
    }
    fn check_new_name(&self,dir: &Directory,name: &str,except: Option<usize>) -> STDRESULT {
        for (i,entry) in dir.entries.iter().enumerate() {
            if entry.name()==name && Some(i)!=except {
                error!("{} already exists",name);
                return Err(Box::new(Error::DuplicateFilename));
            }
        }
        Ok(())
    }
    /// Save a file in the first contiguous run of blocks that will hold it
    pub fn save(&mut self,name: &str,dat: &[u8],typ: FileType) -> Result<FileEntry,DYNERR> {
        let fname = sanitize_name(name);
        let mut dir = self.get_directory()?;
        self.check_new_name(&dir,&fname,None)?;
        if dir.entries.len()>=dir_capacity(dir.header.end_block as usize) {
            return Err(Box::new(Error::DirectoryFull));
        }
        let num = usize::max(1,(dat.len()+BLOCK_SIZE-1)/BLOCK_SIZE);
        let (pos,begin) = match self.get_available_blocks(&dir,num) {
            Some(x) => x,
            None => {
                error!("no run of {} free blocks",num);
                return Err(Box::new(Error::DiskFull));
            }
        };
        for (i,chunk) in dat.chunks(BLOCK_SIZE).enumerate() {
            self.dev.write_block(begin as usize + i,chunk)?;
        }
        if dat.len()==0 {
            self.dev.write_block(begin as usize,&[])?;
        }
        let entry = DirectoryEntry {
            begin_block: begin,
            end_block: begin + num as u16,
            file_type: typ as u16,
            name_len: fname.len() as u8,
            name: string_to_name(&fname),
            bytes_remaining: (dat.len() - (num-1)*BLOCK_SIZE) as u16,
            mod_date: pack_date(chrono::Local::now().naive_local())
        };
        dir.entries.insert(pos,entry);
        dir.header.num_files += 1;
        self.save_directory(&dir)?;
        Ok(self.to_file_entry(pos,&entry))
    }
    /// Remove the entry, later entries move down to close the gap
    pub fn delete(&mut self,file: &FileEntry) -> STDRESULT {
        let (idx,mut dir) = self.locate(file)?;
        dir.entries.remove(idx);
        dir.header.num_files -= 1;
        self.save_directory(&dir)
    }
    pub fn rename(&mut self,file: &FileEntry,new_name: &str) -> Result<FileEntry,DYNERR> {
        let fname = sanitize_name(new_name);
        let (idx,mut dir) = self.locate(file)?;
        self.check_new_name(&dir,&fname,Some(idx))?;
        dir.entries[idx].name = string_to_name(&fname);
        dir.entries[idx].name_len = fname.len() as u8;
        self.save_directory(&dir)?;
        Ok(self.to_file_entry(idx,&dir.entries[idx]))
    }
    /// Every block below the end of the directory is in use, others are free unless a file covers them
    pub fn free_space(&self) -> Result<FreeSpace,DYNERR> {
        let dir = self.get_directory()?;
        let total = dir.header.total_blocks as usize;
        let mut map = BitVec::from_elem(total,true);
        for b in 0..usize::min(total,dir.header.end_block as usize) {
            map.set(b,false);
        }
        for entry in &dir.entries {
            for b in entry.begin_block as usize..usize::min(total,entry.end_block as usize) {
                map.set(b,false);
            }
        }
        Ok(FreeSpace::from_map(&map,BLOCK_SIZE))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_name("FileName"),"FILENAME");
        assert_eq!(sanitize_name("2021"),"2021");
        assert_eq!(sanitize_name(".."),"..");
        assert_eq!(sanitize_name("The File Name"),"THEFILENAME");
        assert_eq!(sanitize_name("\t hidden tab"),"HIDDENTAB");
        assert_eq!(sanitize_name(""),"A");
        assert_eq!(sanitize_name("abcdefghijklmnopqrst"),"ABCDEFGHIJKLMNO");
    }

    #[test]
    fn date_packing() {
        let t = chrono::NaiveDate::from_ymd_opt(1984,7,15).unwrap().and_hms_opt(0,0,0).unwrap();
        assert_eq!(pack_date(t),7 + (15 << 4) + (84 << 9));
    }
}
