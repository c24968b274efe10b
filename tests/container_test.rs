// test of img module through detection
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{self,FsKind};
use a2vol::img::{self,dc42,dot2mg,dsk,nib,DiskImageType};
use a2vol::DetectOptions;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn prodos_payload() -> Vec<u8> {
    let mut disk = FsKind::Prodos.format(Device::blank(Order::ProdosOrder(280)),"CONTAINED").unwrap();
    disk.write("HELLO",b"hello from inside").unwrap();
    disk.device().to_bytes()
}

fn dos_payload(order: Order) -> Vec<u8> {
    let mut disk = FsKind::Dos33.format(Device::blank(order),"").unwrap();
    disk.write("HELLO",b"hello from inside").unwrap();
    disk.device().to_bytes()
}

fn opts(ext: Option<&str>) -> DetectOptions {
    DetectOptions {
        maybe_ext: ext.map(|x| x.to_string()),
        ..DetectOptions::default()
    }
}

#[test]
fn plain_dos_image() {
    init();
    let buf = dos_payload(Order::DosOrder(35));
    let found = a2vol::detect(&buf,&opts(Some("dsk"))).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Plain);
    assert!(found.hints.dos_order);
    assert!(!found.hints.prodos_order);
    assert_eq!(found.volumes.len(),1);
    assert_eq!(found.primary().kind(),FsKind::Dos33);
    assert_eq!(found.primary().order(),Order::DosOrder(35));
    assert_eq!(found.to_bytes().unwrap(),buf);
}

#[test]
fn plain_prodos_image_any_extension() {
    init();
    let buf = prodos_payload();
    for ext in [Some("po"),Some("dsk"),None] {
        let found = a2vol::detect(&buf,&opts(ext)).expect("detection failed");
        assert_eq!(found.primary().kind(),FsKind::Prodos);
        assert_eq!(found.primary().order(),Order::ProdosOrder(280));
        assert!(found.hints.prodos_order);
    }
}

#[test]
fn universal_disk_image() {
    init();
    let payload = prodos_payload();
    let mut mg = dot2mg::Dot2mg::create(1,payload.len(),None);
    mg.set_comment("made for testing");
    let buf = mg.wrap(&payload).unwrap();
    let mut found = a2vol::detect(&buf,&opts(Some("2mg"))).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Dot2mg);
    assert!(found.hints.universal_disk_image);
    assert!(found.hints.prodos_order);
    found.primary_mut().write("ADDED",&[1,2,3]).expect("write failed");
    let saved = found.to_bytes().unwrap();
    assert_eq!(saved.len(),buf.len());
    let again = a2vol::detect(&saved,&DetectOptions::default()).expect("detection failed");
    let added = again.primary().find("ADDED").unwrap();
    assert_eq!(again.primary().read(&added).unwrap(),vec![1,2,3]);
    match again.envelope() {
        img::Envelope::Dot2mg(mg) => assert_eq!(mg.comment(),"made for testing"),
        _ => panic!("wrong envelope")
    }
}

#[test]
fn universal_disk_image_dos_order() {
    init();
    let payload = dos_payload(Order::DosOrder(35));
    let buf = dot2mg::Dot2mg::create(0,payload.len(),Some(254)).wrap(&payload).unwrap();
    let found = a2vol::detect(&buf,&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.primary().kind(),FsKind::Dos33);
    assert_eq!(found.hints.volume,Some(254));
    assert!(found.hints.dos_order);
}

#[test]
fn disk_copy_image() {
    init();
    let payload = prodos_payload();
    let buf = dc42::Dc42::create("CONTAINED",payload.len()).wrap(&payload).unwrap();
    assert_eq!(buf.len(),dc42::HEADER_LEN+dsk::SIZE_140K);
    let found = a2vol::detect(&buf,&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::DiskCopy);
    assert!(found.hints.disk_copy);
    assert_eq!(found.primary().volume_name().unwrap(),"CONTAINED");
    assert_eq!(found.to_bytes().unwrap(),buf);

    let mut corrupt = buf.clone();
    corrupt[dc42::HEADER_LEN+200*512] ^= 0xff;
    let err = a2vol::detect(&corrupt,&DetectOptions::default()).err().expect("checksum passed");
    assert!(matches!(err.downcast_ref::<img::Error>(),Some(img::Error::ContainerFormat)));
    let lenient = DetectOptions { verify_checksums: false, ..DetectOptions::default() };
    assert!(a2vol::detect(&corrupt,&lenient).is_ok());
}

#[test]
fn nibble_image() {
    init();
    let physical = dos_payload(Order::Nibble(35));
    let buf = nib::encode_disk(&physical,254,nib::TRACK_BYTE_CAPACITY_NIB);
    let mut found = a2vol::detect(&buf,&opts(Some("nib"))).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Nib);
    assert!(found.hints.nibble_capture);
    assert!(found.hints.nibble_order);
    assert_eq!(found.hints.volume,Some(254));
    assert_eq!(found.unreadable_sectors(),0);
    let f = found.primary().find("HELLO").unwrap();
    assert_eq!(found.primary().read(&f).unwrap(),b"hello from inside".to_vec());
    found.primary_mut().write("SECOND",&[9;700]).expect("write failed");
    let saved = found.to_bytes().unwrap();
    assert_eq!(saved.len(),buf.len());
    let again = a2vol::detect(&saved,&DetectOptions::default()).expect("detection failed");
    let second = again.primary().find("SECOND").unwrap();
    assert_eq!(again.primary().read(&second).unwrap(),vec![9;700]);
}

#[test]
fn nibble_image_nb2() {
    init();
    let physical = dos_payload(Order::Nibble(35));
    let buf = nib::encode_disk(&physical,254,nib::TRACK_BYTE_CAPACITY_NB2);
    let found = a2vol::detect(&buf,&opts(Some("nb2"))).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Nib);
    assert_eq!(found.primary().kind(),FsKind::Dos33);
}

#[test]
fn save_and_reload() {
    init();
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("disk.po");
    let path_str = path.to_str().unwrap();
    std::fs::write(&path,prodos_payload()).unwrap();
    let mut found = a2vol::create_fs_from_file(path_str).expect("detection failed");
    found.primary_mut().create_dir("SUB").unwrap();
    found.primary_mut().write("SUB/NOTE",b"saved").unwrap();
    a2vol::save_img(&found,path_str).expect("save failed");
    let again = a2vol::create_fs_from_file(path_str).expect("detection failed");
    let note = again.primary().find("SUB/NOTE").unwrap();
    assert_eq!(again.primary().read(&note).unwrap(),b"saved".to_vec());
    assert!(a2vol::create_fs_from_file(dir.path().join("missing.dsk").to_str().unwrap()).is_err());
}

#[test]
fn unrecognized_bytes() {
    init();
    for buf in [vec![0;1000],vec![0;dsk::SIZE_140K],vec![]] {
        let err = a2vol::detect(&buf,&DetectOptions::default()).err().expect("detected garbage");
        assert!(matches!(err.downcast_ref::<fs::Error>(),Some(fs::Error::NoFilesystemMatch)));
    }
}
