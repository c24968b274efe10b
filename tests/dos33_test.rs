// test of dos33 file system module
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{self,dos33,FsKind,FileSystem};
use a2vol::fs::dos33::types::FileType;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_disk() -> FileSystem {
    FsKind::Dos33.format(Device::blank(Order::DosOrder(35)),"").expect("format failed")
}

#[test]
fn format() {
    init();
    let disk = new_disk();
    assert!(FsKind::Dos33.check(disk.device()));
    assert_eq!(disk.volume_name().unwrap(),"DISK VOLUME 254");
    assert_eq!(disk.list("").unwrap().len(),0);
    let free = disk.free_space().unwrap();
    assert_eq!(free.unit_bytes,256);
    assert_eq!(free.total_units,560);
    // tracks 0-2 and 17 are not available
    assert_eq!(free.free_units,(35-4)*16);
}

#[test]
fn sanitize() {
    assert_eq!(dos33::sanitize_name("FileName"),"FILENAME");
    assert_eq!(dos33::sanitize_name("2021"),"A2021");
    assert_eq!(dos33::sanitize_name(".."),"A..");
    assert_eq!(dos33::sanitize_name("The File Name"),"THE FILE NAME");
    assert_eq!(dos33::sanitize_name("\t hidden tab"),"A\t HIDDEN TAB");
    assert_eq!(dos33::sanitize_name("a,b,c"),"ABC");
    assert_eq!(dos33::sanitize_name(""),"A");
    assert_eq!(dos33::sanitize_name(&"X".repeat(40)).len(),30);
}

#[test]
fn write_read_delete() {
    init();
    let mut disk = new_disk();
    let free_before = disk.free_space().unwrap().free_units;
    let dat: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
    let entry = disk.write("thechip",&dat).expect("write failed");
    assert_eq!(entry.name,"THECHIP");
    assert_eq!(entry.type_name,"B");
    assert_eq!(disk.read(&entry).unwrap(),dat);
    // 5004 bytes with the header is 20 data sectors and 1 list sector
    assert_eq!(entry.blocks,21);
    assert_eq!(disk.free_space().unwrap().free_units,free_before-21);
    let found = disk.find("TheChip").expect("not found");
    assert_eq!(found,entry);
    disk.delete(&entry).expect("delete failed");
    assert_eq!(disk.list("").unwrap().len(),0);
    assert_eq!(disk.free_space().unwrap().free_units,free_before);
    let deleted = disk.list_deleted().unwrap();
    assert_eq!(deleted.len(),1);
    assert_eq!(deleted[0].name,"THECHIP");
    assert!(deleted[0].deleted);
}

#[test]
fn typed_files() {
    init();
    let mut disk = new_disk();
    if let FileSystem::Dos33(d) = &mut disk {
        let bin = d.save("hello.bin",&[6,5,0,2],FileType::Binary,768).expect("save failed");
        assert_eq!(d.read(&bin).unwrap(),vec![6,5,0,2]);
        assert_eq!(&d.read_raw(&bin).unwrap()[0..8],&[0,3,4,0,6,5,0,2]);
        let txt = d.save("thetext",b"HELLO\x8d",FileType::Text,0).expect("save failed");
        assert_eq!(txt.type_name,"T");
        assert_eq!(d.read(&txt).unwrap(),b"HELLO\x8d".to_vec());
        let bas = d.save("hello",&[1,8,2,8],FileType::Applesoft,0).expect("save failed");
        assert_eq!(d.read(&bas).unwrap(),vec![1,8,2,8]);
        assert_eq!(d.list().unwrap().len(),3);
        let err = d.save("too.big",&vec![0;70000],FileType::Binary,0x2000).unwrap_err();
        assert!(matches!(err.downcast_ref::<fs::Error>(),Some(fs::Error::FileTooLarge)));
        assert_eq!(d.list().unwrap().len(),3);
    } else {
        panic!("wrong file system");
    }
}

#[test]
fn large_file_needs_two_lists() {
    init();
    let mut disk = new_disk();
    let dat: Vec<u8> = (0..160*256).map(|i| (i/256) as u8).collect();
    let entry = disk.write("BIG",&dat).expect("write failed");
    // 161 data sectors need 2 track-sector lists
    assert_eq!(entry.blocks,163);
    assert_eq!(disk.read(&entry).unwrap(),dat);
    let too_big = vec![0;400*256];
    assert!(disk.write("HUGE",&too_big).is_err());
    assert_eq!(disk.list("").unwrap().len(),1);
}

#[test]
fn rename_and_lock() {
    init();
    let mut disk = new_disk();
    let first = disk.write("FIRST",&[1,2,3]).unwrap();
    let second = disk.write("SECOND",&[4,5,6]).unwrap();
    assert!(disk.write("first",&[0]).is_err());
    assert!(disk.rename(&second,"first").is_err());
    let renamed = disk.rename(&second,"third").expect("rename failed");
    assert_eq!(renamed.name,"THIRD");
    assert_eq!(disk.read(&renamed).unwrap(),vec![4,5,6]);
    let locked = disk.lock(&first,true).expect("lock failed");
    assert!(locked.locked);
    assert!(disk.delete(&locked).is_err());
    assert!(disk.rename(&locked,"OTHER").is_err());
    let unlocked = disk.lock(&locked,false).expect("unlock failed");
    disk.delete(&unlocked).expect("delete failed");
    let names: Vec<String> = disk.list("").unwrap().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names,vec!["THIRD"]);
}

#[test]
fn catalog_fills_up() {
    init();
    let mut disk = new_disk();
    for i in 0..105 {
        disk.write(&format!("F{}",i),&[i as u8]).expect("write failed");
    }
    assert!(matches!(
        disk.write("ONE.MORE",&[0]).unwrap_err().downcast_ref::<fs::Error>(),
        Some(fs::Error::DirectoryFull)
    ));
}

#[test]
fn catalog_loop_is_rejected() {
    init();
    let disk = new_disk();
    let mut dev = disk.device().clone();
    // point the last catalog sector back at the first
    let mut sec = dev.read_sector(17,1).unwrap();
    sec[1] = 17;
    sec[2] = 15;
    dev.write_sector(17,1,&sec).unwrap();
    assert!(!FsKind::Dos33.check(&dev));
}

#[test]
fn json_catalog() {
    init();
    let mut disk = new_disk();
    disk.write("HELLO",&[0;10]).unwrap();
    let tree = json::parse(&disk.tree(0).unwrap()).unwrap();
    assert_eq!(tree["file_system"].as_str(),Some("DOS 3.3"));
    assert_eq!(tree["files"]["HELLO"]["type"].as_str(),Some("B"));
    assert_eq!(tree["files"]["HELLO"]["blocks"].as_usize(),Some(2));
}
