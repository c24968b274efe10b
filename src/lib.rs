//! # `a2vol` main library
//!
//! This library finds and manipulates the file systems on Apple II disk images.
//! Given the bytes of an image file, it works out the container, the way sectors are
//! ordered within it, and the file system(s) it holds, then presents the files in a uniform table.
//!
//! ## Architecture
//!
//! Detection and access are layered:
//! * `img` recognizes the container and unwraps it into a flat `img::ByteSource`
//! * `bios` maps tracks, sectors and blocks onto the flat buffer using an addressing strategy (`bios::Order`)
//! * `fs` imposes a file system on a `bios::device::Device`
//!
//! When a file system is found it takes ownership of a device, which shares the byte source with
//! any other logical disk in the same image.  Changes are written through immediately, but they
//! are not permanent until the image is saved to whatever file system is hosting a2vol.
//!
//! ## File Systems
//!
//! * DOS 3.3, including the two logical disks of 800K UniDOS and OzDOS images
//! * ProDOS
//! * Pascal File System
//! * CP/M 2 on 5.25 inch disks
//!
//! ## Disk Images
//!
//! * 2MG
//! * DiskCopy 4.2
//! * NIB, NB2
//! * DSK, DO, PO

pub mod bios;
pub mod img;
pub mod fs;

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use binrw::{BinRead,BinWrite};
use log::{debug,info,warn,error};
use bios::Order;
use bios::device::Device;
use img::{ByteSource,DiskImageType,Envelope,Hints};

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const KNOWN_FILE_EXTENSIONS: &str = "2mg,2img,dsk,do,po,hdv,nib,nb2,dc,dc42,image";

/// Fixed layout structures that go to and from disk.  This is implemented for everything
/// that `binrw` can read and write without arguments.
pub trait DiskStruct: Sized {
    /// Create the structure from bytes, which must be at least as long as the structure
    fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR>;
    fn to_bytes(&self) -> Result<Vec<u8>,DYNERR>;
}

impl<T> DiskStruct for T where T: for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()> {
    fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        let mut cursor = Cursor::new(buf);
        Ok(T::read_le(&mut cursor)?)
    }
    fn to_bytes(&self) -> Result<Vec<u8>,DYNERR> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Options that steer detection
#[derive(Clone,Debug)]
pub struct DetectOptions {
    /// file extension, only used to break ties between orders
    pub maybe_ext: Option<String>,
    /// verify container checksums where the container has them
    pub verify_checksums: bool
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            maybe_ext: None,
            verify_checksums: true
        }
    }
}

/// Outcome of a successful detection.  There is one file system per logical disk that was found,
/// i.e., two at most, in the case of a UniDOS or OzDOS image.
pub struct Detection {
    pub image_type: DiskImageType,
    pub hints: Hints,
    pub volumes: Vec<fs::FileSystem>,
    envelope: Envelope,
    source: Rc<RefCell<ByteSource>>
}

impl Detection {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    /// The first (often only) file system
    pub fn primary(&self) -> &fs::FileSystem {
        &self.volumes[0]
    }
    pub fn primary_mut(&mut self) -> &mut fs::FileSystem {
        &mut self.volumes[0]
    }
    /// Sectors that a nibble capture could not decode
    pub fn unreadable_sectors(&self) -> usize {
        self.source.borrow().unreadable_count()
    }
    /// The image file bytes, with all changes, wrapped in the original container
    pub fn to_bytes(&self) -> Result<Vec<u8>,DYNERR> {
        self.envelope.wrap(self.source.borrow().as_bytes())
    }
}

/// Group the candidate orders so that the two logical disks of a dual disk image are tried together
fn order_families(orders: &[Order]) -> Vec<Vec<Order>> {
    let same_family = |a: &Order,b: &Order| match (a,b) {
        (Order::UniDos(_),Order::UniDos(_)) => true,
        (Order::OzDos(_),Order::OzDos(_)) => true,
        _ => false
    };
    let mut ans: Vec<Vec<Order>> = Vec::new();
    for order in orders {
        if let Some(family) = ans.last_mut().filter(|f| same_family(&f[0],order)) {
            family.push(*order);
        } else {
            ans.push(vec![*order]);
        }
    }
    ans
}

/// Find the file system on a device, trying each in `fs::FS_ORDER`.
/// A parse failure after a successful check is returned as an error.
fn try_device(dev: &Device) -> Result<Option<fs::FileSystem>,DYNERR> {
    for kind in fs::FS_ORDER {
        if kind.check(dev) {
            info!("identified {} file system using {}",kind,dev.order());
            return Ok(Some(kind.parse(dev.clone())?));
        }
    }
    Ok(None)
}

/// Work out the container, the order, and the file systems.
/// Detection stops at the first order (or dual disk family) that yields a file system.
pub fn detect(buf: &[u8],opts: &DetectOptions) -> Result<Detection,DYNERR> {
    let norm = match img::identify(buf,opts.maybe_ext.as_deref(),opts.verify_checksums)? {
        Some(norm) => norm,
        None => {
            warn!("cannot match any image format");
            return Err(Box::new(fs::Error::NoFilesystemMatch));
        }
    };
    let mut hints = norm.hints;
    let src = Rc::new(RefCell::new(norm.source));
    for family in order_families(&norm.orders) {
        let mut volumes = Vec::new();
        for order in family {
            debug!("trying {}",order);
            let dev = match Device::new(Rc::clone(&src),order) {
                Ok(dev) => dev,
                Err(_) => continue
            };
            if let Some(vol) = try_device(&dev)? {
                hints.record_order(&order);
                volumes.push(vol);
            }
        }
        if volumes.len() > 0 {
            return Ok(Detection {
                image_type: norm.envelope.image_type(),
                hints,
                volumes,
                envelope: norm.envelope,
                source: src
            });
        }
    }
    warn!("cannot match any file system");
    Err(Box::new(fs::Error::NoFilesystemMatch))
}

/// Save the image file (make changes permanent)
pub fn save_img(disk: &Detection,img_path: &str) -> STDRESULT {
    std::fs::write(img_path,disk.to_bytes()?)?;
    Ok(())
}

/// Given a bytestream return the detected file systems, or Err if the bytestream cannot be interpreted.
/// Optional `maybe_ext` is used to prefer one order over another when the size is ambiguous.
pub fn create_fs_from_bytestream(disk_img_data: &[u8],maybe_ext: Option<&str>) -> Result<Detection,DYNERR> {
    let opts = DetectOptions {
        maybe_ext: maybe_ext.map(|x| x.to_string()),
        ..DetectOptions::default()
    };
    detect(disk_img_data,&opts)
}

/// Calls `create_fs_from_bytestream` getting the bytes from a file.
/// The file extension is passed along only if it is one we know.
pub fn create_fs_from_file(img_path: &str) -> Result<Detection,DYNERR> {
    match std::fs::read(img_path) {
        Ok(disk_img_data) => {
            let mut maybe_ext = img_path.split('.').last().map(|x| x.to_lowercase());
            if let Some(ext) = &maybe_ext {
                if !KNOWN_FILE_EXTENSIONS.split(',').any(|k| k==ext) {
                    maybe_ext = None;
                }
            }
            create_fs_from_bytestream(&disk_img_data,maybe_ext.as_deref())
        },
        Err(e) => {
            error!("could not read {}",img_path);
            Err(Box::new(e))
        }
    }
}

#[test]
fn dual_disk_orders_are_grouped() {
    let fam = order_families(&img::dsk::candidate_orders(img::dsk::SIZE_800K,None));
    assert_eq!(fam,vec![
        vec![Order::ProdosOrder(1600)],
        vec![Order::UniDos(1),Order::UniDos(2)],
        vec![Order::OzDos(1),Order::OzDos(2)]
    ]);
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(BinRead)]
    struct Unwritable {
        _val: u8
    }

    impl BinWrite for Unwritable {
        type Args<'a> = ();
        fn write_options<W: std::io::Write + std::io::Seek>(&self,_writer: &mut W,_endian: binrw::Endian,_args: ()) -> binrw::BinResult<()> {
            Err(binrw::Error::AssertFail { pos: 0, message: "cannot be written".to_string() })
        }
    }

    #[test]
    fn serialization_errors_propagate() {
        let x = Unwritable::from_bytes(&[1]).expect("read failed");
        assert!(x.to_bytes().is_err());
    }
}
