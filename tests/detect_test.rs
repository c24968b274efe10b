// test of file system detection
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{self,FsKind,FS_ORDER};
use a2vol::img::{DiskImageType,Hints};
use a2vol::DetectOptions;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn formatted(kind: FsKind,order: Order) -> Vec<u8> {
    let mut disk = kind.format(Device::blank(order),"TESTING").expect("format failed");
    disk.write("README",b"some bytes").expect("write failed");
    disk.device().to_bytes()
}

#[test]
fn no_cross_matches() {
    init();
    for kind in FS_ORDER {
        let disk = kind.format(Device::blank(Order::DosOrder(35)),"TESTING").unwrap();
        for other in FS_ORDER {
            assert_eq!(other.check(disk.device()),other==kind,"{} checked as {}",kind,other);
        }
    }
}

#[test]
fn every_file_system_in_dos_order() {
    init();
    for kind in FS_ORDER {
        let buf = formatted(kind,Order::DosOrder(35));
        let found = a2vol::detect(&buf,&DetectOptions::default()).expect("detection failed");
        assert_eq!(found.primary().kind(),kind);
        assert_eq!(found.primary().order(),Order::DosOrder(35));
        assert!(found.hints.dos_order);
        let readme = found.primary().find("README").unwrap();
        assert_eq!(found.primary().read(&readme).unwrap(),b"some bytes".to_vec());
    }
}

#[test]
fn block_file_systems_in_prodos_order() {
    init();
    for kind in [FsKind::Prodos,FsKind::Pascal] {
        let buf = formatted(kind,Order::ProdosOrder(280));
        for ext in [Some("po"),Some("do"),None] {
            let opts = DetectOptions { maybe_ext: ext.map(|x| x.to_string()), ..DetectOptions::default() };
            let found = a2vol::detect(&buf,&opts).expect("detection failed");
            assert_eq!(found.primary().kind(),kind);
            assert_eq!(found.primary().order(),Order::ProdosOrder(280));
        }
    }
}

#[test]
fn plain_image_hints() {
    init();
    let buf = formatted(FsKind::Pascal,Order::DosOrder(35));
    let found = a2vol::detect(&buf,&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Plain);
    assert_eq!(found.hints,Hints { dos_order: true, ..Hints::default() });
    assert_eq!(found.unreadable_sectors(),0);
}

#[test]
fn detection_is_repeatable() {
    init();
    let buf = formatted(FsKind::Prodos,Order::ProdosOrder(280));
    let first = a2vol::detect(&buf,&DetectOptions::default()).unwrap();
    let second = a2vol::detect(&buf,&DetectOptions::default()).unwrap();
    assert_eq!(first.primary().tree(0).unwrap(),second.primary().tree(0).unwrap());
    assert_eq!(first.primary().list("").unwrap(),second.primary().list("").unwrap());
    assert_eq!(first.hints,second.hints);
}

#[test]
fn corrupt_directory_is_an_error() {
    init();
    let mut disk = FsKind::Pascal.format(Device::blank(Order::DosOrder(35)),"BROKEN").unwrap();
    disk.write("A",&[0;1024]).unwrap();
    disk.write("B",&[0;1024]).unwrap();
    let mut dev = disk.device().clone();
    // make B start inside A, which the structural check does not catch
    let mut blk = dev.read_block(2).unwrap();
    let b_entry = 26*2;
    blk[b_entry] = 7;
    dev.write_block(2,&blk).unwrap();
    assert!(FsKind::Pascal.check(&dev));
    let err = a2vol::detect(&dev.to_bytes(),&DetectOptions::default()).err().expect("overlap was accepted");
    assert!(matches!(err.downcast_ref::<fs::Error>(),Some(fs::Error::CorruptDirectory)));
}

#[test]
fn nothing_to_find() {
    init();
    let noise: Vec<u8> = (0..143360).map(|i| ((i*7919) % 251) as u8).collect();
    let err = a2vol::detect(&noise,&DetectOptions::default()).err().expect("noise was detected");
    assert!(matches!(err.downcast_ref::<fs::Error>(),Some(fs::Error::NoFilesystemMatch)));
    let err = a2vol::detect(&[0;12345],&DetectOptions::default()).err().expect("odd size was detected");
    assert!(matches!(err.downcast_ref::<fs::Error>(),Some(fs::Error::NoFilesystemMatch)));
}
