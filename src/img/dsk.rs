//! ## Support for plain sector dumps (DSK, DO, PO)
//!
//! DSK images are a simple sequential dump of the already-decoded sector data.
//! The sector order cannot be verified until we get up to the file system layer,
//! so this module only proposes the orders that are plausible for the image size.

use log::debug;
use crate::bios::Order;
use super::{ByteSource,Envelope,Hints,NormalizedImage};

const MAX_BLOCKS: usize = 65535;
/// 5.25 inch disk, 35 tracks
pub const SIZE_140K: usize = 143360;
/// 5.25 inch disk, 40 tracks
pub const SIZE_160K: usize = 163840;
/// 3.5 inch disk, or two 400K logical disks
pub const SIZE_800K: usize = 819200;

pub fn file_extensions() -> Vec<String> {
    vec!["dsk".to_string(),"do".to_string(),"po".to_string(),"hdv".to_string()]
}

/// Addressing strategies worth trying for a buffer of `len` bytes, most likely first.
/// The extension, if any, can promote ProDOS order on 5.25 inch sizes.
pub fn candidate_orders(len: usize,maybe_ext: Option<&str>) -> Vec<Order> {
    match len {
        SIZE_140K | SIZE_160K => {
            let tracks = len/4096;
            if maybe_ext==Some("po") {
                vec![Order::ProdosOrder(tracks*8),Order::DosOrder(tracks)]
            } else {
                vec![Order::DosOrder(tracks),Order::ProdosOrder(tracks*8)]
            }
        },
        SIZE_800K => vec![
            Order::ProdosOrder(1600),
            Order::UniDos(1),
            Order::UniDos(2),
            Order::OzDos(1),
            Order::OzDos(2)
        ],
        l if l>0 && l%512==0 && l/512<=MAX_BLOCKS => vec![Order::ProdosOrder(l/512)],
        _ => Vec::new()
    }
}

/// Orders for a container that declares its payload to be ProDOS ordered blocks
pub fn block_orders(len: usize) -> Vec<Order> {
    candidate_orders(len,Some("po")).into_iter().filter(|o| !matches!(o,Order::DosOrder(_))).collect()
}

/// Accept any buffer with a length for which some order is plausible
pub fn unwrap(buf: &[u8],maybe_ext: Option<&str>) -> Option<NormalizedImage> {
    let orders = candidate_orders(buf.len(),maybe_ext);
    if orders.is_empty() {
        debug!("buffer size {} does not fit a sector image",buf.len());
        return None;
    }
    Some(NormalizedImage {
        envelope: Envelope::Plain,
        source: ByteSource::new(buf.to_vec()),
        hints: Hints::default(),
        orders
    })
}

#[test]
fn orders_by_size() {
    assert_eq!(candidate_orders(SIZE_140K,None),vec![Order::DosOrder(35),Order::ProdosOrder(280)]);
    assert_eq!(candidate_orders(SIZE_140K,Some("po")),vec![Order::ProdosOrder(280),Order::DosOrder(35)]);
    assert_eq!(candidate_orders(SIZE_800K,None).len(),5);
    assert_eq!(candidate_orders(32*1024*1024-512,None),vec![Order::ProdosOrder(65535)]);
    assert!(candidate_orders(1000,None).is_empty());
    assert!(candidate_orders(0,None).is_empty());
    assert_eq!(block_orders(SIZE_140K),vec![Order::ProdosOrder(280)]);
}
