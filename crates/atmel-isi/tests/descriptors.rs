// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// ISI Descriptor Pool Tests
//
// TESTING LAYERS:
//
// Layer 1 (Pool only - No hardware required):
//   - Acquire/release conservation under random workloads
//
// Layer 2 (Simulated controller - No hardware required):
//   - Sticky binding through register/prepare/unregister
//   - Exhaustion after 32 bound buffers
//
// RUN:
//   cargo test -p atmel-isi --test descriptors

use atmel_isi::{
    buffer::Plane,
    descriptor::{DescriptorHandle, DescriptorPool, DescriptorTable, MAX_BUFFER_NUM},
    device::{Isi, IsiConfig, PixFormat},
    fourcc::FourCC,
    regs::dma,
    sim::{SimSensor, SimulatedIsi},
    Error,
};
use rand::Rng;
use std::sync::{mpsc, Arc};

#[test]
fn test_pool_conservation_random() {
    let mut rng = rand::rng();
    let mut pool = DescriptorPool::new(DescriptorTable::new(0x2ff0_0000));

    for _ in 0..50 {
        let n = rng.random_range(1..=MAX_BUFFER_NUM);
        let mut handles: Vec<DescriptorHandle> = (0..n).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.free_count(), MAX_BUFFER_NUM - n);

        while !handles.is_empty() {
            let handle = handles.swap_remove(rng.random_range(0..handles.len()));
            pool.release(handle);
        }
        assert_eq!(pool.free_count(), MAX_BUFFER_NUM);
        assert_eq!(pool.in_use_count(), 0);
    }
}

#[test]
fn test_pool_exhaustion() {
    let mut pool = DescriptorPool::new(DescriptorTable::new(0x2ff0_0000));
    let handles: Vec<_> = (0..MAX_BUFFER_NUM).map(|_| pool.acquire().unwrap()).collect();
    assert!(matches!(pool.acquire(), Err(Error::NoDescriptors)));

    let mut phys: Vec<u32> = handles.iter().map(|h| h.phys()).collect();
    phys.sort_unstable();
    phys.dedup();
    assert_eq!(phys.len(), MAX_BUFFER_NUM);

    for handle in handles {
        pool.release(handle);
    }
    assert!(pool.acquire().is_ok());
}

#[test]
fn test_bind_writes_descriptor() {
    let table = DescriptorTable::new(0x2ff0_0000);
    let mut pool = DescriptorPool::new(table.clone());
    let handle = pool.acquire().unwrap();
    pool.bind(&handle, 0x2100_0000);

    let fbd = table.fetch(handle.phys()).unwrap();
    assert_eq!(fbd.fb_address, 0x2100_0000);
    assert_eq!(fbd.dma_ctrl, dma::CTRL_WB);
    assert_eq!(fbd.next_fbd_address, 0);
}

fn controller() -> (Arc<Isi<SimulatedIsi>>, usize) {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = IsiConfig::default();
    let table = config.descriptor_table();
    let hw = Arc::new(SimulatedIsi::new(table.clone()));
    let (tx, _rx) = mpsc::channel();
    let isi = Arc::new(Isi::new(hw.clone(), table, config, tx).unwrap());
    hw.connect(&isi);
    isi.attach(Box::new(SimSensor::default())).unwrap();
    let mut pix = PixFormat::new(160, 120, FourCC::YUYV);
    isi.set_format(&mut pix).unwrap();
    (isi, pix.size_image)
}

#[test]
fn test_controller_exhaustion() {
    let (isi, size) = controller();
    let (count, _) = isi.queue_setup(0).unwrap();
    assert_eq!(count as usize, MAX_BUFFER_NUM);

    for n in 0..MAX_BUFFER_NUM as u32 {
        let id = isi
            .register_buffer(Plane::new(0x2000_0000 + n * 0x10_0000, size))
            .unwrap();
        isi.prepare_buffer(id).unwrap();
    }
    assert_eq!(isi.free_descriptors(), 0);

    // registration succeeds, binding the 33rd buffer does not
    let extra = isi.register_buffer(Plane::new(0x2000_0000, size)).unwrap();
    assert!(matches!(isi.prepare_buffer(extra), Err(Error::NoDescriptors)));
    assert!(matches!(isi.queue_buffer(extra), Err(Error::NoDescriptors)));
}

#[test]
fn test_controller_conservation_random() {
    let (isi, size) = controller();
    let mut rng = rand::rng();

    for _ in 0..20 {
        let n = rng.random_range(1..=MAX_BUFFER_NUM as u32);
        let ids: Vec<_> = (0..n)
            .map(|k| {
                let id = isi
                    .register_buffer(Plane::new(0x2000_0000 + k * 0x10_0000, size))
                    .unwrap();
                if rng.random::<bool>() {
                    isi.prepare_buffer(id).unwrap();
                }
                id
            })
            .collect();
        assert!(isi.free_descriptors() >= MAX_BUFFER_NUM - n as usize);

        for id in ids {
            isi.unregister_buffer(id).unwrap();
        }
        assert_eq!(isi.free_descriptors(), MAX_BUFFER_NUM);
    }
}
