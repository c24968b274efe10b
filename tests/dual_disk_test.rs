// test of 800K images holding two DOS 3.3 volumes
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{FsKind,FileSystem};
use a2vol::img::DiskImageType;
use a2vol::DetectOptions;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Format both logical disks and put one distinct file on each
fn dual_image(first: Order,second: Order) -> Vec<u8> {
    let dev1 = Device::blank(first);
    let dev2 = dev1.sibling(second).expect("sibling failed");
    let mut d1 = FsKind::Dos33.format(dev1,"").expect("format failed");
    let mut d2 = FsKind::Dos33.format(dev2,"").expect("format failed");
    d1.write("ONE",&[1;300]).expect("write failed");
    d2.write("TWO",&[2;600]).expect("write failed");
    d1.device().to_bytes()
}

fn names(disk: &FileSystem) -> Vec<String> {
    disk.list("").unwrap().iter().map(|e| e.name.clone()).collect()
}

fn check_pair(buf: &[u8],first: Order,second: Order) {
    let mut found = a2vol::detect(buf,&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.image_type,DiskImageType::Plain);
    assert!(found.hints.dos_order);
    assert_eq!(found.volumes.len(),2);
    assert_eq!(found.volumes[0].order(),first);
    assert_eq!(found.volumes[1].order(),second);
    assert_eq!(names(&found.volumes[0]),vec!["ONE"]);
    assert_eq!(names(&found.volumes[1]),vec!["TWO"]);
    let two = found.volumes[1].find("TWO").unwrap();
    assert_eq!(found.volumes[1].read(&two).unwrap(),vec![2;600]);
    // writing to one logical disk leaves the other alone
    let free2 = found.volumes[1].free_space().unwrap();
    found.volumes[0].write("THREE",&[3;5000]).expect("write failed");
    assert_eq!(found.volumes[1].free_space().unwrap(),free2);
    assert_eq!(names(&found.volumes[1]),vec!["TWO"]);
    let again = a2vol::detect(&found.to_bytes().unwrap(),&DetectOptions::default()).expect("detection failed");
    assert_eq!(names(&again.volumes[0]),vec!["ONE","THREE"]);
    let three = again.volumes[0].find("THREE").unwrap();
    assert_eq!(again.volumes[0].read(&three).unwrap(),vec![3;5000]);
}

#[test]
fn geometry() {
    init();
    let disk = FsKind::Dos33.format(Device::blank(Order::UniDos(1)),"").unwrap();
    let free = disk.free_space().unwrap();
    assert_eq!(free.total_units,50*32);
    assert_eq!(free.free_units,(50-4)*32);
    assert!(FsKind::Dos33.check(disk.device()));
    assert!(!FsKind::Cpm.check(disk.device()));
}

#[test]
fn unidos() {
    init();
    let buf = dual_image(Order::UniDos(1),Order::UniDos(2));
    assert_eq!(buf.len(),819200);
    check_pair(&buf,Order::UniDos(1),Order::UniDos(2));
}

#[test]
fn ozdos() {
    init();
    let buf = dual_image(Order::OzDos(1),Order::OzDos(2));
    assert_eq!(buf.len(),819200);
    check_pair(&buf,Order::OzDos(1),Order::OzDos(2));
}

#[test]
fn only_first_disk_formatted() {
    init();
    let mut disk = FsKind::Dos33.format(Device::blank(Order::UniDos(1)),"").unwrap();
    disk.write("LONELY",&[0]).unwrap();
    let found = a2vol::detect(&disk.device().to_bytes(),&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.volumes.len(),1);
    assert_eq!(found.primary().order(),Order::UniDos(1));
}

#[test]
fn prodos_wins_on_800k() {
    init();
    let mut disk = FsKind::Prodos.format(Device::blank(Order::ProdosOrder(1600)),"BIG.ONE").unwrap();
    disk.write("HELLO",&[0;10]).unwrap();
    let found = a2vol::detect(&disk.device().to_bytes(),&DetectOptions::default()).expect("detection failed");
    assert_eq!(found.volumes.len(),1);
    assert_eq!(found.primary().kind(),FsKind::Prodos);
    assert!(found.hints.prodos_order);
    assert!(!found.hints.dos_order);
}
