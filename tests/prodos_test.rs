// test of prodos file system module
use a2vol::bios::Order;
use a2vol::bios::device::Device;
use a2vol::fs::{self,prodos,FsKind,FileSystem};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_disk(blocks: usize) -> FileSystem {
    FsKind::Prodos.format(Device::blank(Order::ProdosOrder(blocks)),"NEW.DISK").expect("format failed")
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i*13 + i/512) % 256) as u8).collect()
}

fn is_err_kind(res: Result<fs::FileEntry,a2vol::DYNERR>,kind: fs::Error) -> bool {
    match res {
        Err(e) => e.downcast_ref::<fs::Error>().map(|x| x.to_string())==Some(kind.to_string()),
        Ok(_) => false
    }
}

#[test]
fn format() {
    init();
    let disk = new_disk(280);
    assert!(FsKind::Prodos.check(disk.device()));
    assert_eq!(disk.volume_name().unwrap(),"NEW.DISK");
    let free = disk.free_space().unwrap();
    assert_eq!(free.total_units,280);
    // boot blocks, 4 directory blocks, 1 bitmap block
    assert_eq!(free.free_units,273);
    assert_eq!(free.largest_free_run,273);
    let big = new_disk(1600);
    assert_eq!(big.free_space().unwrap().free_units,1593);
    assert!(FsKind::Prodos.format(Device::blank(Order::ProdosOrder(280)),"9BAD").is_err());
}

#[test]
fn storage_types() {
    init();
    let mut disk = new_disk(1600);
    let free0 = disk.free_space().unwrap().free_units;
    let seed = disk.write("SEED",&pattern(200)).unwrap();
    let sap = disk.write("SAPLING",&pattern(20000)).unwrap();
    let tree = disk.write("TREE",&pattern(140000)).unwrap();
    let empty = disk.write("EMPTY",&[]).unwrap();
    assert_eq!(seed.blocks,1);
    assert_eq!(sap.blocks,40+1);
    // 274 data blocks, 2 index blocks, 1 master index
    assert_eq!(tree.blocks,274+2+1);
    assert_eq!(empty.blocks,1);
    assert_eq!(disk.read(&seed).unwrap(),pattern(200));
    assert_eq!(disk.read(&sap).unwrap(),pattern(20000));
    assert_eq!(disk.read(&tree).unwrap(),pattern(140000));
    assert_eq!(disk.read(&empty).unwrap().len(),0);
    assert_eq!(disk.read_raw(&sap).unwrap().len(),40*512);
    assert_eq!(tree.eof,Some(140000));
    let used = 1 + 41 + 277 + 1;
    assert_eq!(disk.free_space().unwrap().free_units,free0-used);
    for f in [&seed,&sap,&tree,&empty] {
        disk.delete(f).expect("delete failed");
    }
    assert_eq!(disk.free_space().unwrap().free_units,free0);
    assert_eq!(disk.list("").unwrap().len(),0);
}

#[test]
fn typed_save() {
    init();
    let mut disk = new_disk(280);
    if let FileSystem::Prodos(d) = &mut disk {
        let sys = d.save("PRODOS",&[0x4c,0,0x20],0xff,0x2000).expect("save failed");
        assert_eq!(sys.type_name,"SYS");
        assert_eq!(sys.aux,0x2000);
        assert!(d.save("DIR",&[0],prodos::types::FileType::Directory as u8,0).is_err());
    } else {
        panic!("wrong file system");
    }
}

#[test]
fn subdirectories() {
    init();
    let mut disk = new_disk(280);
    let dir = disk.create_dir("inner dirs").expect("create failed");
    assert_eq!(dir.name,"INNER.DIRS");
    assert!(dir.is_dir);
    disk.create_dir("INNER.DIRS/DEEPER").expect("create failed");
    let f = disk.write("INNER.DIRS/DEEPER/HELLO",&pattern(1000)).expect("write failed");
    assert_eq!(f.path,"INNER.DIRS/DEEPER/HELLO");
    let found = disk.find("/inner.dirs/deeper/hello").expect("not found");
    assert_eq!(disk.read(&found).unwrap(),pattern(1000));
    assert!(disk.write("NO.SUCH.DIR/HELLO",&[0]).is_err());
    // fill the subdirectory past one block so it has to grow
    for i in 0..30 {
        disk.write(&format!("INNER.DIRS/F{}",i),&[i as u8]).expect("write failed");
    }
    assert_eq!(disk.list("INNER.DIRS").unwrap().len(),31);
    let parent = disk.list("").unwrap();
    assert_eq!(parent[0].blocks,3);
    assert_eq!(parent[0].eof,Some(3*512));
    // reparse from scratch
    let dev = disk.device().clone();
    assert!(FsKind::Prodos.check(&dev));
    let again = FsKind::Prodos.parse(dev).expect("parse failed");
    assert_eq!(again.list("INNER.DIRS/DEEPER").unwrap().len(),1);
    let tree = json::parse(&again.tree(2).unwrap()).unwrap();
    assert!(tree["files"]["INNER.DIRS"]["files"]["DEEPER"]["files"]["HELLO"].is_object());
}

#[test]
fn delete_directory_only_when_empty() {
    init();
    let mut disk = new_disk(280);
    let free0 = disk.free_space().unwrap().free_units;
    let dir = disk.create_dir("SUB").unwrap();
    let f = disk.write("SUB/FILE",&[1,2,3]).unwrap();
    assert!(disk.delete(&dir).is_err());
    disk.delete(&f).unwrap();
    let dir = disk.find("SUB").unwrap();
    disk.delete(&dir).expect("delete failed");
    assert_eq!(disk.free_space().unwrap().free_units,free0);
}

#[test]
fn volume_directory_fills_up() {
    init();
    let mut disk = new_disk(280);
    // 12 slots in the key block and 13 in each of the other 3
    for i in 0..51 {
        disk.write(&format!("F{}",i),&[0]).expect("write failed");
    }
    assert!(is_err_kind(disk.write("LAST",&[0]),fs::Error::DirectoryFull));
}

#[test]
fn locks_and_names() {
    init();
    let mut disk = new_disk(280);
    let a = disk.write("A",&[1]).unwrap();
    let b = disk.write("B",&[2]).unwrap();
    assert!(is_err_kind(disk.write("a",&[0]),fs::Error::DuplicateFilename));
    assert!(is_err_kind(disk.rename(&b,"A"),fs::Error::DuplicateFilename));
    let locked = disk.lock(&a,true).unwrap();
    assert!(locked.locked);
    assert!(disk.delete(&locked).is_err());
    assert!(is_err_kind(disk.rename(&locked,"C"),fs::Error::FileLocked));
    let unlocked = disk.lock(&locked,false).unwrap();
    let renamed = disk.rename(&unlocked,"new name").unwrap();
    assert_eq!(renamed.name,"NEW.NAME");
    assert_eq!(disk.read(&renamed).unwrap(),vec![1]);
}

#[test]
fn disk_full_writes_nothing() {
    init();
    let mut disk = new_disk(280);
    let free0 = disk.free_space().unwrap().free_units;
    assert!(is_err_kind(disk.write("BIG",&vec![0;300*512]),fs::Error::DiskFull));
    assert_eq!(disk.free_space().unwrap().free_units,free0);
    assert_eq!(disk.list("").unwrap().len(),0);
}
