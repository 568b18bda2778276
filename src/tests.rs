use std::fs;
use std::io::Write;
use std::sync::atomic::AtomicBool;

use tempfile::{tempdir, NamedTempFile};

use crate::tester::tests::content;
use crate::{plan, BlockDevice, BlockTester, FileDevice, Quantity, Range, TestError};

fn image(len: usize) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&content(len)).unwrap();
    tmp.flush().unwrap();
    tmp
}

#[test]
fn whole_image_round_trip() {
    let tmp = image(64 * 1024);
    let mut dev = FileDevice::open(tmp.path()).unwrap();
    let disksize = dev.size().unwrap();

    let p = plan(disksize, &Quantity::parse("0").unwrap(), &Range::parse("+100%").unwrap(), 4096, true)
        .unwrap();
    assert_eq!(p.block_count(), 16);

    let mut tester = BlockTester::new(dev);
    let summary = tester.run(&p, &AtomicBool::new(false), |_| {}).unwrap();
    assert_eq!(summary.bytes_tested, 64 * 1024);
    drop(tester);

    assert_eq!(fs::read(tmp.path()).unwrap(), content(64 * 1024));
}

#[test]
fn window_around_percent_origin() {
    let tmp = image(100_000);
    let mut dev = FileDevice::open(tmp.path()).unwrap();
    let disksize = dev.size().unwrap();

    let p = plan(disksize, &Quantity::parse("50%").unwrap(), &Range::parse("10s").unwrap(), 1000, true)
        .unwrap();
    assert_eq!(p.origin, 50_000);
    assert_eq!((p.window.min, p.window.max), (44_000, 56_000));

    let mut tester = BlockTester::new(dev);
    let summary = tester.run(&p, &AtomicBool::new(false), |_| {}).unwrap();
    assert_eq!(summary.blocks_tested, 12);
    drop(tester);

    assert_eq!(fs::read(tmp.path()).unwrap(), content(100_000));
}

#[test]
fn aligned_window_past_end_fails_without_growing_the_image() {
    let tmp = image(10_000);
    let mut dev = FileDevice::open(tmp.path()).unwrap();
    let disksize = dev.size().unwrap();

    let p = plan(disksize, &Quantity::bytes(0), &Range::parse("+100%").unwrap(), 4096, true).unwrap();
    assert_eq!(p.window.max, 12_288);

    let mut tester = BlockTester::new(dev);
    let err = tester.run(&p, &AtomicBool::new(false), |_| {}).unwrap_err();
    assert!(matches!(err, TestError::ShortRead { offset: 8192, expected: 4096, actual: 1808 }));
    drop(tester);

    assert_eq!(fs::read(tmp.path()).unwrap(), content(10_000));
}

#[test]
fn unaligned_window_tests_the_tail() {
    let tmp = image(10_000);
    let mut dev = FileDevice::open(tmp.path()).unwrap();
    let disksize = dev.size().unwrap();

    let p = plan(disksize, &Quantity::bytes(0), &Range::parse("+100%").unwrap(), 4096, false).unwrap();
    let lens: Vec<u64> = p.blocks().map(|b| b.len).collect();
    assert_eq!(lens, vec![4096, 4096, 1808]);

    let mut tester = BlockTester::new(dev);
    tester.run(&p, &AtomicBool::new(false), |_| {}).unwrap();
    drop(tester);

    assert_eq!(fs::read(tmp.path()).unwrap(), content(10_000));
}

#[test]
fn empty_image_is_not_testable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.img");
    fs::File::create(&path).unwrap();

    let mut dev = FileDevice::open(&path).unwrap();
    let disksize = dev.size().unwrap();
    let err = plan(disksize, &Quantity::bytes(0), &Range::parse("+100%").unwrap(), 4096, true);
    assert_eq!(err, Err(crate::PlanError::EmptyDevice));
}
