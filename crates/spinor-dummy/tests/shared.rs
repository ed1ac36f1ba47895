//! A device shared between threads

use std::thread;

use spinor_core::capability::{FlashConfig, RuntimeDiscovered};
use spinor_core::flash::{
    CriticalSectionRawMutex, NoopRawMutex, NorFlash, RawMutex, SequencerState, SharedNorFlash,
};
use spinor_core::spi::opcodes;
use spinor_dummy::{DummyConfig, DummyFlash};

const SECTOR: u32 = 0x1000;

fn shared<M: RawMutex>() -> SharedNorFlash<M, DummyFlash> {
    let flash = NorFlash::discover(
        DummyFlash::new(DummyConfig::default()),
        &RuntimeDiscovered,
        &FlashConfig::default(),
    )
    .unwrap();
    SharedNorFlash::new(flash)
}

#[test]
fn threads_write_disjoint_sectors() {
    let flash = shared::<CriticalSectionRawMutex>();

    thread::scope(|s| {
        for n in 0..4u32 {
            let flash = &flash;
            s.spawn(move || {
                let offset = n * SECTOR;
                flash.erase(offset, SECTOR).unwrap();
                let data = vec![n as u8; 600];
                flash.write(offset, &data).unwrap();
            });
        }
    });

    for n in 0..4u32 {
        let mut back = vec![0u8; 600];
        flash.read(n * SECTOR, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == n as u8), "sector {}", n);
    }

    let flash = flash.into_inner();
    assert_eq!(flash.state(), SequencerState::Idle);
    let dummy = flash.release();
    assert_eq!(dummy.count(opcodes::SE_20), 4);
    // 600 bytes from a page boundary take three programs
    assert_eq!(dummy.count(opcodes::PP), 12);
}

#[test]
fn every_cycle_runs_under_the_lock() {
    let flash = shared::<CriticalSectionRawMutex>();
    thread::scope(|s| {
        for n in 0..2u32 {
            let flash = &flash;
            s.spawn(move || flash.erase(n * SECTOR, SECTOR).unwrap());
        }
    });

    let dummy = flash.into_inner().release();
    let ops = dummy.opcodes();
    // Cycles never interleave: each erase directly follows its WREN and WEL check
    for (i, _) in ops.iter().enumerate().filter(|(_, &op)| op == opcodes::SE_20) {
        assert_eq!(ops[i - 2..i], [opcodes::WREN, opcodes::RDSR]);
    }
    assert_eq!(ops.iter().filter(|&&op| op == opcodes::WREN).count(), 2);
}

#[test]
fn capabilities_are_readable_while_shared() {
    let flash = shared::<NoopRawMutex>();
    let caps = flash.capabilities();
    assert_eq!(caps.size, 16 * 1024 * 1024);
    assert_eq!(flash.lock(|f| f.size()), caps.size);
}

#[test]
#[should_panic]
fn reentrant_lock_panics() {
    let flash = shared::<NoopRawMutex>();
    flash.lock(|_| {
        let mut buf = [0u8; 4];
        let _ = flash.read(0, &mut buf);
    });
}
