//! ## DOS 3.3 file system module
//!
//! This manipulates disk images containing one DOS 3.3 volume.
//!
//! * 16 sector disks with up to 50 tracks
//! * 32 sector logical disks as found on UniDOS and OzDOS 800K images
//!
//! The catalog is a linked list of sectors on track 17, each holding 7 entries.
//! Files are located by a linked list of track-sector list sectors.
//! Free space is a bitmap in the VTOC, 4 bytes per track.

mod directory;
pub mod types;

use std::collections::HashSet;
use num_traits::FromPrimitive;
use log::{debug,trace,error};
use bit_vec::BitVec;
use types::*;
use directory::*;
use super::{Error,FileEntry,FreeSpace,Slot,Start};
use crate::bios::device::Device;
use crate::{DiskStruct,STDRESULT,DYNERR};

/// Name as displayed, high bits stripped and trailing spaces removed
fn file_name_to_string(fname: &[u8]) -> String {
    let ans: String = fname.iter().map(|c| (c & 0x7f) as char).collect();
    ans.trim_end().to_string()
}

/// Negative ASCII padded with negative spaces
fn string_to_file_name(s: &str) -> [u8;30] {
    let mut ans: [u8;30] = [0xa0;30];
    for (i,c) in s.bytes().take(30).enumerate() {
        ans[i] = c | 0x80;
    }
    ans
}

/// Make a string into a valid DOS 3.3 file name.
/// Uppercase, no commas, at most 30 characters, and the first character must be a letter.
pub fn sanitize_name(raw: &str) -> String {
    let mut ans: String = raw.to_uppercase().chars().filter(|c| *c!=',' && c.is_ascii()).collect();
    match ans.chars().next() {
        Some(c) if c.is_ascii_uppercase() => {},
        _ => ans.insert(0,'A')
    }
    ans.truncate(30);
    ans.trim_end().to_string()
}

/// bit mask of the sectors of one track in the VTOC bitmap
fn track_mask(sectors: usize) -> u32 {
    match sectors {
        32 => u32::MAX,
        s => ((1u32 << s) - 1) << (32 - s)
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
    fn ts_ok(&self,ts: [u8;2]) -> bool {
        (ts[0] as usize) < self.dev.tracks() && (ts[1] as usize) < self.dev.sectors()
    }
    fn read_ts(&self,ts: [u8;2]) -> Result<Vec<u8>,DYNERR> {
        self.dev.read_sector(ts[0] as usize,ts[1] as usize)
    }
    fn write_ts(&mut self,ts: [u8;2],dat: &[u8]) -> STDRESULT {
        self.dev.write_sector(ts[0] as usize,ts[1] as usize,dat)
    }
    fn get_vtoc(&self) -> Result<VTOC,DYNERR> {
        VTOC::from_bytes(&self.dev.read_sector(VTOC_TRACK,0)?)
    }
    fn save_vtoc(&mut self,vtoc: &VTOC) -> STDRESULT {
        self.dev.write_sector(VTOC_TRACK,0,&vtoc.to_bytes()?)
    }
    /// Test a device for the DOS 3.3 file system.
    pub fn test_img(dev: &Device) -> bool {
        let [tracks,sectors] = [dev.tracks(),dev.sectors()];
        if tracks<=VTOC_TRACK || tracks>50 {
            debug!("{} tracks cannot hold DOS 3.3",tracks);
            return false;
        }
        let vtoc = match dev.read_sector(VTOC_TRACK,0) {
            Ok(buf) => match VTOC::from_bytes(&buf) {
                Ok(v) => v,
                Err(_) => return false
            },
            Err(_) => {
                debug!("VTOC was not readable");
                return false;
            }
        };
        if vtoc.version<3 {
            debug!("VTOC wrong version {}",vtoc.version);
            return false;
        }
        if vtoc.vol<1 || vtoc.vol>254 {
            debug!("Volume {} out of range",vtoc.vol);
            return false;
        }
        if vtoc.track1 as usize!=VTOC_TRACK || vtoc.sector1==0 || vtoc.sector1 as usize>=sectors {
            debug!("VTOC wrong catalog pointer {},{}",vtoc.track1,vtoc.sector1);
            return false;
        }
        if vtoc.bytes!=256 || vtoc.max_pairs as usize!=MAX_PAIRS {
            debug!("VTOC wrong sector size or pair count");
            return false;
        }
        if vtoc.sectors as usize!=sectors || vtoc.tracks as usize!=tracks {
            debug!("VTOC geometry {}x{} does not match device {}x{}",vtoc.tracks,vtoc.sectors,tracks,sectors);
            return false;
        }
        let disk = Self::from_device(dev.clone());
        match disk.catalog_chain(&vtoc) {
            Ok(_) => true,
            Err(_) => {
                debug!("catalog chain is broken");
                false
            }
        }
    }
    /// Use the device as storage and verify every catalog and track-sector list link.
    pub fn parse(dev: Device) -> Result<Self,DYNERR> {
        let disk = Self::from_device(dev);
        let vtoc = disk.get_vtoc()?;
        for (_ts,_idx,entry) in disk.catalog(&vtoc)? {
            if entry.tsl_track==DELETED {
                continue;
            }
            let tsl = [entry.tsl_track,entry.tsl_sector];
            if !disk.ts_ok(tsl) {
                error!("track-sector list {:?} of {} out of range",tsl,file_name_to_string(&entry.name));
                return Err(Box::new(Error::CorruptDirectory));
            }
            disk.tslist_chain(tsl)?;
        }
        Ok(disk)
    }
    pub fn volume_number(&self) -> Result<u8,DYNERR> {
        Ok(self.get_vtoc()?.vol)
    }
    /// Format the disk for DOS 3.3.  Tracks 0-2 are reserved for the DOS image, but it is not written.
    pub fn format(&mut self,vol: u8) -> STDRESULT {
        let [tracks,sectors] = [self.dev.tracks(),self.dev.sectors()];
        if tracks<=VTOC_TRACK || tracks>50 || vol<1 || vol>254 {
            error!("cannot format {} tracks as DOS volume {}",tracks,vol);
            return Err(Box::new(Error::Unsupported));
        }
        trace!("formatting: zero all");
        for track in 0..tracks {
            for sector in 0..sectors {
                self.dev.write_sector(track,sector,&[0;256])?;
            }
        }
        let mut vtoc = VTOC::from_bytes(&[0;256])?;
        vtoc.pad1 = 4;
        vtoc.track1 = VTOC_TRACK as u8;
        vtoc.sector1 = sectors as u8 - 1;
        vtoc.version = 3;
        vtoc.vol = vol;
        vtoc.max_pairs = MAX_PAIRS as u8;
        vtoc.last_track = VTOC_TRACK as u8;
        vtoc.last_direction = 1;
        vtoc.tracks = tracks as u8;
        vtoc.sectors = sectors as u8;
        vtoc.bytes = 256;
        for track in DOS_IMAGE_TRACKS..tracks {
            if track!=VTOC_TRACK {
                vtoc.bitmap[track*4..track*4+4].copy_from_slice(&u32::to_be_bytes(track_mask(sectors)));
            }
        }
        self.save_vtoc(&vtoc)?;
        trace!("formatting: catalog");
        for sector in (1..sectors).rev() {
            let mut dir = DirectorySector::new();
            if sector>1 {
                dir.next_track = VTOC_TRACK as u8;
                dir.next_sector = sector as u8 - 1;
            }
            self.dev.write_sector(VTOC_TRACK,sector,&dir.to_bytes()?)?;
        }
        Ok(())
    }
    fn is_sector_free(&self,vtoc: &VTOC,ts: [u8;2]) -> bool {
        let t = ts[0] as usize;
        let map = u32::from_be_bytes([vtoc.bitmap[t*4],vtoc.bitmap[t*4+1],vtoc.bitmap[t*4+2],vtoc.bitmap[t*4+3]]);
        let bit = ts[1] as usize + 32 - self.dev.sectors();
        (map >> bit) & 1 == 1
    }
    fn set_sector_free(&self,vtoc: &mut VTOC,ts: [u8;2],free: bool) {
        let t = ts[0] as usize;
        let mut map = u32::from_be_bytes([vtoc.bitmap[t*4],vtoc.bitmap[t*4+1],vtoc.bitmap[t*4+2],vtoc.bitmap[t*4+3]]);
        let bit = ts[1] as usize + 32 - self.dev.sectors();
        match free {
            true => map |= 1 << bit,
            false => map &= !(1 << bit)
        }
        vtoc.bitmap[t*4..t*4+4].copy_from_slice(&u32::to_be_bytes(map));
    }
    fn num_free_sectors(&self,vtoc: &VTOC) -> usize {
        let mut ans = 0;
        for track in 0..self.dev.tracks() {
            for sector in 0..self.dev.sectors() {
                if self.is_sector_free(vtoc,[track as u8,sector as u8]) {
                    ans += 1;
                }
            }
        }
        ans
    }
    /// Search outward from the catalog track, first toward the end of the disk
    fn get_next_free_sector(&self,vtoc: &VTOC) -> Option<[u8;2]> {
        let tvtoc = vtoc.track1 as usize;
        let search_tracks: Vec<usize> = [
            (tvtoc+1..self.dev.tracks()).collect::<Vec<usize>>(),
            (1..tvtoc).rev().collect()
        ].concat();
        for track in search_tracks {
            for sector in (0..self.dev.sectors()).rev() {
                if self.is_sector_free(vtoc,[track as u8,sector as u8]) {
                    return Some([track as u8,sector as u8]);
                }
            }
        }
        None
    }
    /// Walk the catalog sectors, guarding against loops and bad links
    fn catalog_chain(&self,vtoc: &VTOC) -> Result<Vec<[u8;2]>,DYNERR> {
        let mut ans = Vec::new();
        let mut visited = HashSet::new();
        let mut ts = [vtoc.track1,vtoc.sector1];
        for _try in 0..MAX_DIRECTORY_REPS {
            if ts[0]==0 {
                return Ok(ans);
            }
            if !self.ts_ok(ts) || !visited.insert(ts) {
                debug!("bad catalog link {:?}",ts);
                return Err(Box::new(Error::CorruptDirectory));
            }
            let dir = DirectorySector::from_bytes(&self.read_ts(ts)?)?;
            ans.push(ts);
            ts = [dir.next_track,dir.next_sector];
        }
        debug!("catalog sector count not plausible");
        Err(Box::new(Error::CorruptDirectory))
    }
    /// Every slot in use or previously used, with the catalog sector and index.
    /// Scanning stops at the first slot that was never used.
    fn catalog(&self,vtoc: &VTOC) -> Result<Vec<([u8;2],usize,DirectoryEntry)>,DYNERR> {
        let mut ans = Vec::new();
        for ts in self.catalog_chain(vtoc)? {
            let dir = DirectorySector::from_bytes(&self.read_ts(ts)?)?;
            for (idx,entry) in dir.entries.iter().enumerate() {
                if entry.tsl_track==0 {
                    return Ok(ans);
                }
                ans.push((ts,idx,*entry));
            }
        }
        Ok(ans)
    }
    fn to_file_entry(&self,ts: [u8;2],idx: usize,entry: &DirectoryEntry) -> FileEntry {
        let deleted = entry.tsl_track==DELETED;
        let (name,tsl) = match deleted {
            true => (file_name_to_string(&entry.name[0..29]),[entry.name[29] as usize,entry.tsl_sector as usize]),
            false => (file_name_to_string(&entry.name),[entry.tsl_track as usize,entry.tsl_sector as usize])
        };
        let type_name = match FileType::from_u8(entry.file_type & 0x7f) {
            Some(typ) => typ.to_string(),
            None => "?".to_string()
        };
        FileEntry {
            raw_name: entry.name.to_vec(),
            path: name.clone(),
            name,
            type_code: entry.file_type & 0x7f,
            type_name,
            aux: 0,
            blocks: entry.sectors as usize,
            eof: None,
            start: Start::TrackSector(tsl),
            slot: Slot { block: ts[0] as usize * self.dev.sectors() + ts[1] as usize, index: idx },
            deleted,
            locked: entry.file_type & LOCKED > 0,
            is_dir: false,
            user: None
        }
    }
    pub fn list(&self) -> Result<Vec<FileEntry>,DYNERR> {
        let vtoc = self.get_vtoc()?;
        Ok(self.catalog(&vtoc)?.iter()
            .filter(|(_,_,e)| e.tsl_track!=DELETED)
            .map(|(ts,idx,e)| self.to_file_entry(*ts,*idx,e)).collect())
    }
    pub fn list_deleted(&self) -> Result<Vec<FileEntry>,DYNERR> {
        let vtoc = self.get_vtoc()?;
        Ok(self.catalog(&vtoc)?.iter()
            .filter(|(_,_,e)| e.tsl_track==DELETED)
            .map(|(ts,idx,e)| self.to_file_entry(*ts,*idx,e)).collect())
    }
    /// Go back to the catalog and get the entry a `FileEntry` was made from
    fn locate(&self,file: &FileEntry) -> Result<([u8;2],DirectorySector),DYNERR> {
        let sectors = self.dev.sectors();
        let ts = [(file.slot.block / sectors) as u8,(file.slot.block % sectors) as u8];
        if self.ts_ok(ts) && file.slot.index<DIRECTORY_ENTRIES {
            let dir = DirectorySector::from_bytes(&self.read_ts(ts)?)?;
            let entry = &dir.entries[file.slot.index];
            if entry.tsl_track!=DELETED && entry.tsl_track!=0 && entry.name.to_vec()==file.raw_name {
                return Ok((ts,dir));
            }
        }
        debug!("{} is no longer in the catalog",file.name);
        Err(Box::new(Error::FileNotFound))
    }
    /// Sectors of the track-sector list chain, guarding against loops and bad links
    fn tslist_chain(&self,start: [u8;2]) -> Result<Vec<([u8;2],TrackSectorList)>,DYNERR> {
        let mut ans = Vec::new();
        let mut visited = HashSet::new();
        let mut ts = start;
        for _try in 0..MAX_TSLIST_REPS {
            if !self.ts_ok(ts) || !visited.insert(ts) {
                error!("bad track-sector list link {:?}",ts);
                return Err(Box::new(Error::CorruptDirectory));
            }
            let tslist = TrackSectorList::from_bytes(&self.read_ts(ts)?)?;
            for p in 0..MAX_PAIRS {
                let pair = [tslist.pairs[p*2],tslist.pairs[p*2+1]];
                if pair[0]>0 && !self.ts_ok(pair) {
                    error!("data sector {:?} out of range",pair);
                    return Err(Box::new(Error::CorruptDirectory));
                }
            }
            let next = [tslist.next_track,tslist.next_sector];
            ans.push((ts,tslist));
            if next[0]==0 {
                return Ok(ans);
            }
            ts = next;
        }
        error!("the track sector list seems to be damaged");
        Err(Box::new(Error::CorruptDirectory))
    }
    /// Data sectors in file order, `None` for a hole
    fn data_sectors(&self,tsl: &[([u8;2],TrackSectorList)]) -> Vec<Option<[u8;2]>> {
        let mut ans = Vec::new();
        for (_,tslist) in tsl {
            for p in 0..MAX_PAIRS {
                let pair = [tslist.pairs[p*2],tslist.pairs[p*2+1]];
                ans.push(match pair[0] {
                    0 => None,
                    _ => Some(pair)
                });
            }
        }
        while let Some(None) = ans.last() {
            ans.pop();
        }
        ans
    }
    fn tsl_start(file: &FileEntry) -> Result<[u8;2],DYNERR> {
        match file.start {
            Start::TrackSector([t,s]) => Ok([t as u8,s as u8]),
            _ => Err(Box::new(Error::FileTypeMismatch))
        }
    }
    /// Read all the data sectors of the file, holes are filled with zeros
    pub fn read_raw(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let tsl = self.tslist_chain(Self::tsl_start(file)?)?;
        let mut ans = Vec::new();
        for maybe_ts in self.data_sectors(&tsl) {
            match maybe_ts {
                Some(ts) => ans.append(&mut self.read_ts(ts)?),
                None => ans.append(&mut vec![0;256])
            }
        }
        Ok(ans)
    }
    /// Read the file and strip the header its type calls for.
    /// Text files end at the first null.
    pub fn read(&self,file: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        let raw = self.read_raw(file)?;
        let typ = FileType::from_u8(file.type_code);
        let hdr = match typ {
            Some(t) => t.header_len(),
            None => 0
        };
        if raw.len()<hdr {
            error!("file is too short for its header");
            return Err(Box::new(Error::FileTypeMismatch));
        }
        let len = match hdr {
            4 => u16::from_le_bytes([raw[2],raw[3]]) as usize,
            2 => u16::from_le_bytes([raw[0],raw[1]]) as usize,
            _ => raw.len()
        };
        let end = usize::min(hdr+len,raw.len());
        if typ==Some(FileType::Text) {
            return Ok(raw.into_iter().take_while(|b| *b!=0).collect());
        }
        Ok(raw[hdr..end].to_vec())
    }
    fn check_new_name(&self,name: &str,except: Option<&FileEntry>) -> STDRESULT {
        for file in self.list()? {
            if file.name==name && Some(&file)!=except {
                error!("{} already exists",name);
                return Err(Box::new(Error::DuplicateFilename));
            }
        }
        Ok(())
    }
    /// Save a file with the given type, `aux` is the load address of binary files.
    /// Nothing is written unless there is room for all of it.
    pub fn save(&mut self,name: &str,dat: &[u8],typ: FileType,aux: u16) -> Result<FileEntry,DYNERR> {
        let fname = sanitize_name(name);
        self.check_new_name(&fname,None)?;
        let hdr = typ.header_len();
        if hdr>0 && dat.len()>u16::MAX as usize {
            error!("file too large for a DOS {} file",typ);
            return Err(Box::new(Error::FileTooLarge));
        }
        let payload = match hdr {
            4 => [u16::to_le_bytes(aux).to_vec(),u16::to_le_bytes(dat.len() as u16).to_vec(),dat.to_vec()].concat(),
            2 => [u16::to_le_bytes(dat.len() as u16).to_vec(),dat.to_vec()].concat(),
            _ => dat.to_vec()
        };
        let data_sectors = usize::max(1,(payload.len()+255)/256);
        let tslist_sectors = (data_sectors+MAX_PAIRS-1)/MAX_PAIRS;
        let mut vtoc = self.get_vtoc()?;
        if data_sectors + tslist_sectors > self.num_free_sectors(&vtoc) {
            error!("{} needs {} sectors",fname,data_sectors+tslist_sectors);
            return Err(Box::new(Error::DiskFull));
        }
        // find the catalog slot before allocating anything
        let mut slot: Option<([u8;2],usize)> = None;
        'search: for ts in self.catalog_chain(&vtoc)? {
            let dir = DirectorySector::from_bytes(&self.read_ts(ts)?)?;
            for idx in 0..DIRECTORY_ENTRIES {
                if dir.entries[idx].tsl_track==0 || dir.entries[idx].tsl_track==DELETED {
                    slot = Some((ts,idx));
                    break 'search;
                }
            }
        }
        let (dir_ts,idx) = match slot {
            Some(s) => s,
            None => return Err(Box::new(Error::DirectoryFull))
        };
        let allocate = |disk: &Self,vtoc: &mut VTOC| -> Result<[u8;2],DYNERR> {
            match disk.get_next_free_sector(vtoc) {
                Some(ts) => {
                    disk.set_sector_free(vtoc,ts,false);
                    vtoc.last_track = ts[0];
                    Ok(ts)
                },
                None => Err(Box::new(Error::DiskFull))
            }
        };
        let mut tsl_ts = Vec::new();
        for _i in 0..tslist_sectors {
            tsl_ts.push(allocate(&*self,&mut vtoc)?);
        }
        let mut data_ts = Vec::new();
        for _i in 0..data_sectors {
            data_ts.push(allocate(&*self,&mut vtoc)?);
        }
        for (i,ts) in data_ts.iter().enumerate() {
            let end = usize::min(payload.len(),(i+1)*256);
            self.write_ts(*ts,&payload[i*256..end])?;
        }
        for (i,ts) in tsl_ts.iter().enumerate() {
            let mut tslist = TrackSectorList::new();
            if i+1<tsl_ts.len() {
                tslist.next_track = tsl_ts[i+1][0];
                tslist.next_sector = tsl_ts[i+1][1];
            }
            tslist.sector_base = (i*MAX_PAIRS) as u16;
            for (p,pair) in data_ts.iter().skip(i*MAX_PAIRS).take(MAX_PAIRS).enumerate() {
                tslist.pairs[p*2] = pair[0];
                tslist.pairs[p*2+1] = pair[1];
            }
            self.write_ts(*ts,&tslist.to_bytes()?)?;
        }
        let mut dir = DirectorySector::from_bytes(&self.read_ts(dir_ts)?)?;
        dir.entries[idx].tsl_track = tsl_ts[0][0];
        dir.entries[idx].tsl_sector = tsl_ts[0][1];
        dir.entries[idx].file_type = typ as u8;
        dir.entries[idx].name = string_to_file_name(&fname);
        dir.entries[idx].sectors = (data_sectors + tslist_sectors) as u16;
        self.write_ts(dir_ts,&dir.to_bytes()?)?;
        self.save_vtoc(&vtoc)?;
        Ok(self.to_file_entry(dir_ts,idx,&dir.entries[idx]))
    }
    pub fn delete(&mut self,file: &FileEntry) -> STDRESULT {
        let (dir_ts,mut dir) = self.locate(file)?;
        let entry = dir.entries[file.slot.index];
        if entry.file_type & LOCKED > 0 {
            return Err(Box::new(Error::FileLocked));
        }
        let tsl = self.tslist_chain([entry.tsl_track,entry.tsl_sector])?;
        let mut vtoc = self.get_vtoc()?;
        for (ts,_) in &tsl {
            self.set_sector_free(&mut vtoc,*ts,true);
        }
        for ts in self.data_sectors(&tsl).into_iter().flatten() {
            self.set_sector_free(&mut vtoc,ts,true);
        }
        dir.entries[file.slot.index].name[29] = entry.tsl_track;
        dir.entries[file.slot.index].tsl_track = DELETED;
        self.write_ts(dir_ts,&dir.to_bytes()?)?;
        self.save_vtoc(&vtoc)
    }
    pub fn rename(&mut self,file: &FileEntry,new_name: &str) -> Result<FileEntry,DYNERR> {
        let fname = sanitize_name(new_name);
        let (dir_ts,mut dir) = self.locate(file)?;
        if dir.entries[file.slot.index].file_type & LOCKED > 0 {
            return Err(Box::new(Error::FileLocked));
        }
        self.check_new_name(&fname,Some(file))?;
        dir.entries[file.slot.index].name = string_to_file_name(&fname);
        self.write_ts(dir_ts,&dir.to_bytes()?)?;
        Ok(self.to_file_entry(dir_ts,file.slot.index,&dir.entries[file.slot.index]))
    }
    pub fn lock(&mut self,file: &FileEntry,locked: bool) -> Result<FileEntry,DYNERR> {
        let (dir_ts,mut dir) = self.locate(file)?;
        match locked {
            true => dir.entries[file.slot.index].file_type |= LOCKED,
            false => dir.entries[file.slot.index].file_type &= !LOCKED
        }
        self.write_ts(dir_ts,&dir.to_bytes()?)?;
        Ok(self.to_file_entry(dir_ts,file.slot.index,&dir.entries[file.slot.index]))
    }
    /// Free sectors according to the VTOC bitmap, in track order
    pub fn free_space(&self) -> Result<FreeSpace,DYNERR> {
        let vtoc = self.get_vtoc()?;
        let mut map = BitVec::from_elem(self.dev.tracks()*self.dev.sectors(),false);
        for track in 0..self.dev.tracks() {
            for sector in 0..self.dev.sectors() {
                map.set(track*self.dev.sectors()+sector,self.is_sector_free(&vtoc,[track as u8,sector as u8]));
            }
        }
        Ok(FreeSpace::from_map(&map,256))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_name("FileName"),"FILENAME");
        assert_eq!(sanitize_name("2021"),"A2021");
        assert_eq!(sanitize_name(".."),"A..");
        assert_eq!(sanitize_name("The File Name"),"THE FILE NAME");
        assert_eq!(sanitize_name("\t hidden tab"),"A\t HIDDEN TAB");
        assert_eq!(sanitize_name(""),"A");
        assert_eq!(sanitize_name("A,B"),"AB");
        assert_eq!(sanitize_name(&"X".repeat(40)).len(),30);
    }

    #[test]
    fn names_are_negative_ascii() {
        let fname = string_to_file_name("HELLO");
        assert_eq!(fname[0],0xc8);
        assert_eq!(fname[5],0xa0);
        assert_eq!(file_name_to_string(&fname),"HELLO");
    }

    #[test]
    fn masks() {
        assert_eq!(track_mask(16),0xffff0000);
        assert_eq!(track_mask(32),0xffffffff);
    }
}
