// test of pascal file system module
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{pascal,FsKind,FileSystem};
use a2vol::fs::pascal::types::FileType;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_disk() -> FileSystem {
    FsKind::Pascal.format(Device::blank(Order::DosOrder(35)),"blank:").expect("format failed")
}

#[test]
fn format() {
    init();
    let disk = new_disk();
    assert!(FsKind::Pascal.check(disk.device()));
    assert!(!FsKind::Prodos.check(disk.device()));
    assert!(!FsKind::Dos33.check(disk.device()));
    assert_eq!(disk.volume_name().unwrap(),"BLANK");
    let free = disk.free_space().unwrap();
    assert_eq!(free.total_units,280);
    assert_eq!(free.free_units,280-6);
}

#[test]
fn sanitize() {
    assert_eq!(pascal::sanitize_name("The File Name"),"THEFILENAME");
    assert_eq!(pascal::sanitize_name("\t hidden tab"),"HIDDENTAB");
    assert_eq!(pascal::sanitize_name("2021"),"2021");
    assert_eq!(pascal::sanitize_name(".."),"..");
    assert_eq!(pascal::sanitize_name(""),"A");
    assert_eq!(pascal::sanitize_name("abcdefghijklmnopqrstuvwxyz"),"ABCDEFGHIJKLMNO");
}

#[test]
fn write_read_delete() {
    init();
    let mut disk = new_disk();
    let dat: Vec<u8> = (0..1300).map(|i| (i%200) as u8).collect();
    let entry = disk.write("hello.text",&dat).expect("write failed");
    assert_eq!(entry.name,"HELLO.TEXT");
    assert_eq!(entry.type_name,"DATA");
    assert_eq!(entry.blocks,3);
    assert_eq!(entry.eof,Some(1300));
    assert_eq!(entry.start,a2vol::fs::Start::Block(6));
    assert_eq!(disk.read(&entry).unwrap(),dat);
    assert_eq!(disk.read_raw(&entry).unwrap().len(),3*512);
    disk.delete(&entry).expect("delete failed");
    assert_eq!(disk.list("").unwrap().len(),0);
    assert_eq!(disk.free_space().unwrap().free_units,280-6);
}

#[test]
fn first_fit_reuses_gaps() {
    init();
    let mut disk = new_disk();
    let a = disk.write("A",&vec![1;1024]).unwrap();
    let b = disk.write("B",&vec![2;512*4]).unwrap();
    let c = disk.write("C",&vec![3;512]).unwrap();
    assert_eq!(b.start,a2vol::fs::Start::Block(8));
    disk.delete(&b).unwrap();
    // a 3 block file fits in the 4 block gap and comes between A and C in the directory
    let d = disk.write("D",&vec![4;1500]).unwrap();
    assert_eq!(d.start,a2vol::fs::Start::Block(8));
    let names: Vec<String> = disk.list("").unwrap().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names,vec!["A","D","C"]);
    assert_eq!(disk.read(&disk.find("C").unwrap()).unwrap(),vec![3;512]);
    assert_eq!(disk.read(&a).unwrap(),vec![1;1024]);
    assert!(disk.read(&b).is_err());
    assert_eq!(disk.free_space().unwrap().largest_free_run,280-13);
}

#[test]
fn typed_save_and_rename() {
    init();
    let mut disk = new_disk();
    if let FileSystem::Pascal(d) = &mut disk {
        let code = d.save("SYSTEM.APPLE",&[0;700],FileType::Code).expect("save failed");
        assert_eq!(code.type_name,"CODE");
        let renamed = d.rename(&code,"system.pascal").expect("rename failed");
        assert_eq!(renamed.name,"SYSTEM.PASCAL");
        assert_eq!(d.read(&renamed).unwrap(),vec![0;700]);
    } else {
        panic!("wrong file system");
    }
    let f = disk.find("SYSTEM.PASCAL").unwrap();
    assert!(disk.lock(&f,true).is_err());
}

#[test]
fn disk_full() {
    init();
    let mut disk = new_disk();
    assert!(disk.write("BIG",&vec![0;275*512]).is_err());
    disk.write("FITS",&vec![0;274*512]).expect("write failed");
    assert_eq!(disk.free_space().unwrap().free_units,0);
}

#[test]
fn longer_directory() {
    init();
    let disk = new_disk();
    let mut dev = disk.device().clone();
    // stretch the directory through block 9
    let mut hdr = dev.read_block(2).unwrap();
    hdr[2] = 10;
    dev.write_block(2,&hdr).unwrap();
    assert!(FsKind::Pascal.check(&dev));
    let mut disk = FsKind::Pascal.parse(dev).expect("parse failed");
    assert_eq!(disk.free_space().unwrap().free_units,280-10);
    for i in 0..100 {
        let entry = disk.write(&format!("F{}",i),&[i as u8;10]).expect("write failed");
        assert_eq!(entry.start,a2vol::fs::Start::Block(10+i));
    }
    let again = FsKind::Pascal.parse(disk.device().clone()).expect("parse failed");
    let list = again.list("").unwrap();
    assert_eq!(list.len(),100);
    assert_eq!(again.read(&again.find("F99").unwrap()).unwrap(),vec![99;10]);
    assert_eq!(again.free_space().unwrap().free_units,280-110);
}
