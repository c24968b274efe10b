//! # File System Module
//!
//! File system modules handle interactions with directories and files.  There is a sub-module for
//! each supported file system.
//!
//! Every file system takes ownership of a `bios::device::Device`, which it uses as storage.
//! Changes are written through to the device immediately.  The variants are collected in the
//! `FileSystem` enumeration, which presents the same file table to callers regardless of the
//! file system that produced it.  Files are described by `FileEntry`.
//!
//! File systems are detected by running `FsKind::check` against a device in the order
//! given by `FS_ORDER`.  That order matters, since each check is a heuristic.

pub mod dos33;
pub mod prodos;
pub mod pascal;
pub mod cpm;

use std::fmt;
use bit_vec::BitVec;
use crate::bios::device::Device;
use crate::bios::Order;
use crate::{STDRESULT,DYNERR};

/// Enumerates file system errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("no filesystem detected")]
    NoFilesystemMatch,
    #[error("insufficient space")]
    DiskFull,
    #[error("file exceeds the size limit")]
    FileTooLarge,
    #[error("directory is full")]
    DirectoryFull,
    #[error("directory structure is corrupt")]
    CorruptDirectory,
    #[error("file not found")]
    FileNotFound,
    #[error("duplicate file name")]
    DuplicateFilename,
    #[error("file type mismatch")]
    FileTypeMismatch,
    #[error("invalid file name")]
    InvalidName,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("file is locked")]
    FileLocked,
    #[error("operation not supported by this file system")]
    Unsupported
}

/// Where the data of a file begins, in the file system's own addressing
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Start {
    /// value is [track,sector]
    TrackSector([usize;2]),
    /// value is a block number in the file system's allocation unit
    Block(usize)
}

/// Where the catalog entry itself lives.
/// * DOS 3.3: `block` is the catalog sector as `track*sectors+sector`, `index` counts from 0
/// * ProDOS: `block` is the directory block, `index` is the entry number counting the header as 1
/// * Pascal: `block` is the first directory block, `index` counts files from 1
/// * CP/M: `block` is 0, `index` is the slot of the first extent
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Slot {
    pub block: usize,
    pub index: usize
}

/// One catalog entry, as seen by callers
#[derive(Clone,Debug,PartialEq)]
pub struct FileEntry {
    /// name as stored on disk, including padding
    pub raw_name: Vec<u8>,
    /// name for display and lookup
    pub name: String,
    /// directory path including the name, separated by `/`, no leading separator
    pub path: String,
    pub type_code: u8,
    pub type_name: String,
    /// load address, record length, or other auxiliary value, if the file system has one
    pub aux: u16,
    /// size in the file system's allocation units (sectors or blocks)
    pub blocks: usize,
    /// length in bytes, if the file system records it
    pub eof: Option<usize>,
    pub start: Start,
    pub slot: Slot,
    pub deleted: bool,
    pub locked: bool,
    pub is_dir: bool,
    /// CP/M user number
    pub user: Option<u8>
}

/// Free space accounting in the file system's allocation units
#[derive(Clone,Debug,PartialEq)]
pub struct FreeSpace {
    pub unit_bytes: usize,
    pub total_units: usize,
    pub free_units: usize,
    pub largest_free_run: usize
}

impl FreeSpace {
    /// Build from a map where a set bit means the unit is free
    pub fn from_map(free: &BitVec,unit_bytes: usize) -> Self {
        let mut free_units = 0;
        let mut largest_free_run = 0;
        let mut run = 0;
        for bit in free.iter() {
            if bit {
                free_units += 1;
                run += 1;
                largest_free_run = usize::max(largest_free_run,run);
            } else {
                run = 0;
            }
        }
        Self {
            unit_bytes,
            total_units: free.len(),
            free_units,
            largest_free_run
        }
    }
    pub fn free_bytes(&self) -> usize {
        self.free_units * self.unit_bytes
    }
}

/// Enumerates the supported file systems
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum FsKind {
    Dos33,
    Prodos,
    Pascal,
    Cpm
}

/// The order in which file systems are tried on a device.
/// The first successful check wins, so do not reorder without checking detection results.
pub const FS_ORDER: [FsKind;4] = [FsKind::Dos33,FsKind::Prodos,FsKind::Pascal,FsKind::Cpm];

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dos33 => write!(f,"DOS 3.3"),
            Self::Prodos => write!(f,"ProDOS"),
            Self::Pascal => write!(f,"Pascal"),
            Self::Cpm => write!(f,"CP/M")
        }
    }
}

impl FsKind {
    /// Cheap structural test, never fails loudly
    pub fn check(&self,dev: &Device) -> bool {
        match self {
            Self::Dos33 => dos33::Disk::test_img(dev),
            Self::Prodos => prodos::Disk::test_img(dev),
            Self::Pascal => pascal::Disk::test_img(dev),
            Self::Cpm => cpm::Disk::test_img(dev)
        }
    }
    /// Full catalog walk, to be called after `check` succeeds
    pub fn parse(&self,dev: Device) -> Result<FileSystem,DYNERR> {
        Ok(match self {
            Self::Dos33 => FileSystem::Dos33(dos33::Disk::parse(dev)?),
            Self::Prodos => FileSystem::Prodos(prodos::Disk::parse(dev)?),
            Self::Pascal => FileSystem::Pascal(pascal::Disk::parse(dev)?),
            Self::Cpm => FileSystem::Cpm(cpm::Disk::parse(dev)?)
        })
    }
    /// Put an empty file system on the device.  The volume name is ignored by DOS 3.3 and CP/M,
    /// DOS 3.3 always gets volume 254.
    pub fn format(&self,dev: Device,vol_name: &str) -> Result<FileSystem,DYNERR> {
        Ok(match self {
            Self::Dos33 => {
                let mut disk = dos33::Disk::from_device(dev);
                disk.format(254)?;
                FileSystem::Dos33(disk)
            },
            Self::Prodos => {
                let mut disk = prodos::Disk::from_device(dev);
                disk.format(vol_name,chrono::Local::now().naive_local())?;
                FileSystem::Prodos(disk)
            },
            Self::Pascal => {
                let mut disk = pascal::Disk::from_device(dev);
                disk.format(vol_name,chrono::Local::now().naive_local())?;
                FileSystem::Pascal(disk)
            },
            Self::Cpm => {
                let mut disk = cpm::Disk::from_device(dev);
                disk.format()?;
                FileSystem::Cpm(disk)
            }
        })
    }
    /// Turn an arbitrary string into a name this file system accepts
    pub fn sanitize_name(&self,raw: &str) -> String {
        match self {
            Self::Dos33 => dos33::sanitize_name(raw),
            Self::Prodos => prodos::sanitize_name(raw),
            Self::Pascal => pascal::sanitize_name(raw),
            Self::Cpm => cpm::sanitize_name(raw)
        }
    }
}

/// A file system found on (or put on) a device
pub enum FileSystem {
    Dos33(dos33::Disk),
    Prodos(prodos::Disk),
    Pascal(pascal::Disk),
    Cpm(cpm::Disk)
}

/// Split a path into its directory part and the final name, stripping separators
fn split_path(path: &str) -> (String,String) {
    let trimmed = path.trim_matches('/');
    match trimmed.rfind('/') {
        Some(i) => (trimmed[..i].to_string(),trimmed[i+1..].to_string()),
        None => (String::new(),trimmed.to_string())
    }
}

/// Only ProDOS has directories, others must be given the root
fn require_root(path: &str) -> STDRESULT {
    if path.trim_matches('/').len()>0 {
        log::error!("directory {} not found",path);
        return Err(Box::new(Error::FileNotFound));
    }
    Ok(())
}

impl FileSystem {
    pub fn kind(&self) -> FsKind {
        match self {
            Self::Dos33(_) => FsKind::Dos33,
            Self::Prodos(_) => FsKind::Prodos,
            Self::Pascal(_) => FsKind::Pascal,
            Self::Cpm(_) => FsKind::Cpm
        }
    }
    pub fn device(&self) -> &Device {
        match self {
            Self::Dos33(d) => d.device(),
            Self::Prodos(d) => d.device(),
            Self::Pascal(d) => d.device(),
            Self::Cpm(d) => d.device()
        }
    }
    /// Addressing strategy under which this file system was found
    pub fn order(&self) -> Order {
        self.device().order()
    }
    pub fn volume_name(&self) -> Result<String,DYNERR> {
        match self {
            Self::Dos33(d) => Ok(format!("DISK VOLUME {}",d.volume_number()?)),
            Self::Prodos(d) => d.volume_name(),
            Self::Pascal(d) => d.volume_name(),
            Self::Cpm(_) => Ok("CP/M".to_string())
        }
    }
    /// List the active files in a directory, use "" or "/" for the root
    pub fn list(&self,path: &str) -> Result<Vec<FileEntry>,DYNERR> {
        match self {
            Self::Prodos(d) => d.list(path),
            Self::Dos33(d) => { require_root(path)?; d.list() },
            Self::Pascal(d) => { require_root(path)?; d.list() },
            Self::Cpm(d) => { require_root(path)?; d.list() }
        }
    }
    /// List entries that were deleted but are still visible in the catalog
    pub fn list_deleted(&self) -> Result<Vec<FileEntry>,DYNERR> {
        match self {
            Self::Dos33(d) => d.list_deleted(),
            Self::Cpm(d) => d.list_deleted(),
            Self::Prodos(_) | Self::Pascal(_) => Ok(Vec::new())
        }
    }
    /// Find an active file by path, names are compared after sanitizing
    pub fn find(&self,path: &str) -> Result<FileEntry,DYNERR> {
        let (dir,name) = split_path(path);
        let name = self.kind().sanitize_name(&name);
        for entry in self.list(&dir)? {
            if entry.name==name {
                return Ok(entry);
            }
        }
        log::debug!("{} not found",path);
        Err(Box::new(Error::FileNotFound))
    }
    /// Read the file's payload, interpreting any headers the file type carries
    pub fn read(&self,entry: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        match self {
            Self::Dos33(d) => d.read(entry),
            Self::Prodos(d) => d.read(entry),
            Self::Pascal(d) => d.read(entry),
            Self::Cpm(d) => d.read(entry)
        }
    }
    /// Read every allocated data sector or block of the file
    pub fn read_raw(&self,entry: &FileEntry) -> Result<Vec<u8>,DYNERR> {
        match self {
            Self::Dos33(d) => d.read_raw(entry),
            Self::Prodos(d) => d.read_raw(entry),
            Self::Pascal(d) => d.read_raw(entry),
            Self::Cpm(d) => d.read_raw(entry)
        }
    }
    /// Write a new binary file, the name is sanitized first.  Reading it back returns the same bytes.
    pub fn write(&mut self,path: &str,dat: &[u8]) -> Result<FileEntry,DYNERR> {
        let (dir,name) = split_path(path);
        match self {
            Self::Dos33(d) => { require_root(&dir)?; d.save(&name,dat,dos33::types::FileType::Binary,0) },
            Self::Prodos(d) => d.save(path,dat,prodos::types::FileType::Binary as u8,0),
            Self::Pascal(d) => { require_root(&dir)?; d.save(&name,dat,pascal::types::FileType::Data) },
            Self::Cpm(d) => { require_root(&dir)?; d.save(&name,dat,0) }
        }
    }
    pub fn delete(&mut self,entry: &FileEntry) -> STDRESULT {
        match self {
            Self::Dos33(d) => d.delete(entry),
            Self::Prodos(d) => d.delete(entry),
            Self::Pascal(d) => d.delete(entry),
            Self::Cpm(d) => d.delete(entry)
        }
    }
    /// Rename in place, the new name is sanitized first
    pub fn rename(&mut self,entry: &FileEntry,new_name: &str) -> Result<FileEntry,DYNERR> {
        match self {
            Self::Dos33(d) => d.rename(entry,new_name),
            Self::Prodos(d) => d.rename(entry,new_name),
            Self::Pascal(d) => d.rename(entry,new_name),
            Self::Cpm(d) => d.rename(entry,new_name)
        }
    }
    pub fn lock(&mut self,entry: &FileEntry,locked: bool) -> Result<FileEntry,DYNERR> {
        match self {
            Self::Dos33(d) => d.lock(entry,locked),
            Self::Prodos(d) => d.lock(entry,locked),
            Self::Cpm(d) => d.lock(entry,locked),
            Self::Pascal(_) => Err(Box::new(Error::Unsupported))
        }
    }
    /// Create a subdirectory, ProDOS only
    pub fn create_dir(&mut self,path: &str) -> Result<FileEntry,DYNERR> {
        match self {
            Self::Prodos(d) => d.create_dir(path),
            _ => Err(Box::new(Error::Unsupported))
        }
    }
    pub fn free_space(&self) -> Result<FreeSpace,DYNERR> {
        match self {
            Self::Dos33(d) => d.free_space(),
            Self::Prodos(d) => d.free_space(),
            Self::Pascal(d) => d.free_space(),
            Self::Cpm(d) => d.free_space()
        }
    }
    pub fn sanitize_name(&self,raw: &str) -> String {
        self.kind().sanitize_name(raw)
    }
    fn tree_node(&self,path: &str) -> Result<json::JsonValue,DYNERR> {
        let mut files = json::JsonValue::new_object();
        for entry in self.list(path)? {
            let mut node = json::JsonValue::new_object();
            node["type"] = json::JsonValue::String(entry.type_name.clone());
            node["blocks"] = entry.blocks.into();
            if let Some(eof) = entry.eof {
                node["eof"] = eof.into();
            }
            node["aux"] = json::JsonValue::String(hex::encode_upper(entry.aux.to_be_bytes()));
            node["locked"] = entry.locked.into();
            if entry.is_dir {
                node["files"] = self.tree_node(&entry.path)?;
            }
            // CP/M names are only unique within a user area
            let key = match entry.user {
                Some(user) => {
                    node["user"] = user.into();
                    format!("{}:{}",user,entry.name)
                },
                None => entry.name.clone()
            };
            files[key.as_str()] = node;
        }
        Ok(files)
    }
    /// Catalog as a JSON string, if indent=0 use unpretty form
    pub fn tree(&self,indent: u16) -> Result<String,DYNERR> {
        let mut tree = json::JsonValue::new_object();
        tree["file_system"] = json::JsonValue::String(self.kind().to_string());
        tree["order"] = json::JsonValue::String(self.order().name());
        tree["label"] = json::JsonValue::new_object();
        tree["label"]["name"] = json::JsonValue::String(self.volume_name()?);
        tree["files"] = self.tree_node("")?;
        if indent > 0 {
            Ok(json::stringify_pretty(tree,indent))
        } else {
            Ok(json::stringify(tree))
        }
    }
}

#[test]
fn free_space_runs() {
    let mut map = BitVec::from_elem(10,true);
    map.set(3,false);
    map.set(4,false);
    let free = FreeSpace::from_map(&map,512);
    assert_eq!(free.free_units,8);
    assert_eq!(free.largest_free_run,5);
    assert_eq!(free.free_bytes(),4096);
}

#[test]
fn paths_split_at_last_separator() {
    assert_eq!(split_path("/A/B/C"),("A/B".to_string(),"C".to_string()));
    assert_eq!(split_path("NAME"),("".to_string(),"NAME".to_string()));
}
