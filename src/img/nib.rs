//! ## Support for NIB disk images
//!
//! NIB tracks contain the disk bytes as they come through the soft latch, with sync bits thrown out.
//! Each of the 35 tracks is searched for address and data fields, and every sector that decodes is
//! put into a flat buffer in physical order, i.e., `track*16 + sector` where the sector is the one
//! given in the address field.  The capture is retained so that updated sectors can be
//! encoded back into the same places.

use log::{debug,warn,error};
use crate::bios::Order;
use crate::img;
use crate::img::disk525;
use super::{ByteSource,Envelope,Hints,NormalizedImage};
use crate::DYNERR;

pub const TRACK_BYTE_CAPACITY_NIB: usize = 6656;
pub const TRACK_BYTE_CAPACITY_NB2: usize = 6384;
pub const TRACKS: usize = 35;
const SECTORS: usize = 16;
/// how far past an address field to look for the data prolog
const DATA_SEARCH_WINDOW: usize = 64;
const LEADING_GAP: usize = 48;
const GAP2: usize = 6;
const GAP3: usize = 27;

pub fn file_extensions() -> Vec<String> {
    vec!["nib".to_string(),"nb2".to_string()]
}

pub struct Nib {
    trk_cap: usize,
    data: Vec<u8>,
    /// position of the first data nibble of each physical sector, if it decoded
    sector_pos: Vec<Option<usize>>,
    volume: Option<u8>
}

/// Positions just after every occurrence of `patt` in one revolution
fn prolog_positions(track: &[u8],patt: &[u8]) -> Vec<usize> {
    let n = track.len();
    (0..n).filter(|i| (0..patt.len()).all(|j| track[(i+j)%n]==patt[j]))
        .map(|i| (i+patt.len())%n).collect()
}

impl Nib {
    /// Decode every sector that can be found.  Returns `None` if the length does not match
    /// a nibble capture, or if not a single sector could be decoded.
    pub fn decode(buf: &[u8]) -> Option<(Self,ByteSource)> {
        let trk_cap = match buf.len() {
            l if l==TRACKS*TRACK_BYTE_CAPACITY_NIB => TRACK_BYTE_CAPACITY_NIB,
            l if l==TRACKS*TRACK_BYTE_CAPACITY_NB2 => TRACK_BYTE_CAPACITY_NB2,
            l => {
                debug!("buffer size {} does not fit a nibble capture",l);
                return None;
            }
        };
        let mut physical = vec![0;TRACKS*SECTORS*256];
        let mut sector_pos: Vec<Option<usize>> = vec![None;TRACKS*SECTORS];
        let mut volume = None;
        for track in 0..TRACKS {
            let trk = &buf[track*trk_cap..(track+1)*trk_cap];
            for addr_pos in prolog_positions(trk,&disk525::ADDR_PROLOG) {
                let addr = match disk525::decode_address(trk,addr_pos) {
                    Ok(a) => a,
                    Err(e) => {
                        debug!("track {}: address field at {}: {}",track,addr_pos,e);
                        continue;
                    }
                };
                if addr.track as usize != track || addr.sector as usize >= SECTORS {
                    debug!("track {}: skipping address field for {},{}",track,addr.track,addr.sector);
                    continue;
                }
                let idx = track*SECTORS + addr.sector as usize;
                if sector_pos[idx].is_some() {
                    continue;
                }
                let window = disk525::cyclic_read(trk,addr_pos+8,DATA_SEARCH_WINDOW);
                let dat_pos = match disk525::find_pattern(&window,0,&disk525::DATA_PROLOG) {
                    Some(p) if p>=disk525::DATA_PROLOG.len() => (addr_pos + 8 + p) % trk_cap,
                    _ => {
                        debug!("track {} sector {}: data field not found",track,addr.sector);
                        continue;
                    }
                };
                let nibs = disk525::cyclic_read(trk,dat_pos,disk525::DATA_NIBS);
                match disk525::decode_sector(&nibs) {
                    Ok(dat) => {
                        physical[idx*256..(idx+1)*256].copy_from_slice(&dat);
                        sector_pos[idx] = Some(dat_pos);
                        if volume.is_none() {
                            volume = Some(addr.volume);
                        }
                    },
                    Err(e) => debug!("track {} sector {}: {}",track,addr.sector,e)
                }
            }
        }
        let good = sector_pos.iter().filter(|p| p.is_some()).count();
        if good==0 {
            debug!("no sectors could be decoded from nibbles");
            return None;
        }
        let mut src = ByteSource::new(physical);
        for (idx,pos) in sector_pos.iter().enumerate() {
            if pos.is_none() {
                src.mark_unreadable(idx*256);
            }
        }
        if good < TRACKS*SECTORS {
            warn!("{} of {} sectors could not be decoded",TRACKS*SECTORS-good,TRACKS*SECTORS);
        }
        Some((Self { trk_cap, data: buf.to_vec(), sector_pos, volume }, src))
    }
    pub fn unwrap(buf: &[u8]) -> Result<Option<NormalizedImage>,DYNERR> {
        if let Some((nib,source)) = Self::decode(buf) {
            let hints = Hints {
                nibble_capture: true,
                volume: nib.volume,
                ..Hints::default()
            };
            return Ok(Some(NormalizedImage {
                envelope: Envelope::Nib(nib),
                source,
                hints,
                orders: vec![Order::Nibble(TRACKS)]
            }));
        }
        Ok(None)
    }
    /// volume number found in the first good address field
    pub fn volume(&self) -> Option<u8> {
        self.volume
    }
    pub fn track_capacity(&self) -> usize {
        self.trk_cap
    }
    /// Encode each decodable sector of the physical ordered `payload` back into the capture.
    /// Sectors that never decoded are left as they were captured, `ByteSource` refuses writes to them.
    pub fn wrap(&self,payload: &[u8]) -> Result<Vec<u8>,DYNERR> {
        if payload.len() != TRACKS*SECTORS*256 {
            error!("nibble payload should be {} bytes, got {}",TRACKS*SECTORS*256,payload.len());
            return Err(Box::new(img::Error::Bounds));
        }
        let mut ans = self.data.clone();
        for (idx,maybe_pos) in self.sector_pos.iter().enumerate() {
            if let Some(pos) = maybe_pos {
                let track = idx / SECTORS;
                let nibs = disk525::encode_sector(&payload[idx*256..(idx+1)*256]);
                disk525::cyclic_write(&mut ans[track*self.trk_cap..(track+1)*self.trk_cap],*pos,&nibs);
            }
        }
        Ok(ans)
    }
}

/// Build a standard nibble image from physical ordered sector data.
/// `track_len` is normally `TRACK_BYTE_CAPACITY_NIB` or `TRACK_BYTE_CAPACITY_NB2`, tracks are padded with sync bytes.
pub fn encode_disk(physical: &[u8],vol: u8,track_len: usize) -> Vec<u8> {
    let mut ans = Vec::with_capacity(TRACKS*track_len);
    for track in 0..TRACKS {
        let mut trk = vec![0xff;LEADING_GAP];
        for sector in 0..SECTORS {
            let idx = track*SECTORS + sector;
            trk.append(&mut disk525::encode_address(vol,track as u8,sector as u8));
            trk.append(&mut vec![0xff;GAP2]);
            trk.append(&mut disk525::encode_data_field(&physical[idx*256..(idx+1)*256]));
            trk.append(&mut vec![0xff;GAP3]);
        }
        trk.resize(track_len,0xff);
        ans.append(&mut trk);
    }
    ans
}

#[cfg(test)]
mod test {
    use super::*;

    fn pattern_disk() -> Vec<u8> {
        (0..TRACKS*SECTORS*256).map(|i| ((i/256) ^ (i%256)) as u8).collect()
    }

    #[test]
    fn standard_tracks_fill_nb2() {
        let nibs = encode_disk(&pattern_disk(),254,TRACK_BYTE_CAPACITY_NB2);
        assert_eq!(nibs.len(),TRACKS*TRACK_BYTE_CAPACITY_NB2);
        assert_eq!(nibs[TRACK_BYTE_CAPACITY_NB2-1],0xff);
    }

    #[test]
    fn decode_encoded_disk() {
        let physical = pattern_disk();
        let nibs = encode_disk(&physical,100,TRACK_BYTE_CAPACITY_NIB);
        let (nib,src) = Nib::decode(&nibs).expect("nibbles did not decode");
        assert_eq!(nib.volume(),Some(100));
        assert_eq!(src.unreadable_count(),0);
        assert_eq!(src.as_bytes(),&physical[..]);
    }

    #[test]
    fn damaged_sector_is_unreadable() {
        let physical = pattern_disk();
        let mut nibs = encode_disk(&physical,254,TRACK_BYTE_CAPACITY_NIB);
        // spoil the data prolog of track 0 sector 0
        nibs[LEADING_GAP+14+GAP2] = 0xff;
        let (nib,src) = Nib::decode(&nibs).expect("nibbles did not decode");
        assert_eq!(src.unreadable_count(),1);
        assert!(src.read(0,256).is_err());
        let mut updated = physical.clone();
        updated[256*20] = 0x42;
        let rewrapped = nib.wrap(&updated).expect("wrap failed");
        let (_,src2) = Nib::decode(&rewrapped).expect("nibbles did not decode");
        assert_eq!(src2.read(256*20,1).unwrap(),vec![0x42]);
        assert!(src2.read(0,256).is_err());
    }

    #[test]
    fn damaged_sector_stays_damaged_after_save() {
        let physical = pattern_disk();
        let mut nibs = encode_disk(&physical,254,TRACK_BYTE_CAPACITY_NIB);
        nibs[LEADING_GAP+14+GAP2] = 0xff;
        let (nib,mut src) = Nib::decode(&nibs).expect("nibbles did not decode");
        assert!(src.write(0,&[0x42;256]).is_err());
        assert!(src.write(16,&[0x42;4]).is_err());
        src.write(256,&[0x43;256]).expect("write failed");
        let (_,src2) = Nib::decode(&nib.wrap(src.as_bytes()).unwrap()).expect("nibbles did not decode");
        assert_eq!(src2.unreadable_count(),1);
        assert!(src2.read(0,256).is_err());
        assert_eq!(src2.read(256,256).unwrap(),vec![0x43;256]);
    }

    #[test]
    fn wrong_size_or_noise_is_rejected() {
        assert!(Nib::decode(&vec![0xff;1000]).is_none());
        assert!(Nib::decode(&vec![0xff;TRACKS*TRACK_BYTE_CAPACITY_NIB]).is_none());
    }
}
