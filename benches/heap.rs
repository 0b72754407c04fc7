#![feature(test)]
extern crate tagalloc;
extern crate test;
#[macro_use]
extern crate trackable;

use tagalloc::arena::MemoryArena;
use tagalloc::heap::{Address, Heap, HeapBuilder};
use test::Bencher;

fn heap() -> Heap<MemoryArena> {
    track_try_unwrap!(Heap::new(MemoryArena::new(1024 * 1024 * 1024)))
}

#[bench]
fn alloc_and_free_small(b: &mut Bencher) {
    let mut heap = heap();
    b.iter(|| {
        let p = track_try_unwrap!(heap.try_alloc(24));
        track_try_unwrap!(heap.free(p));
    });
}

#[bench]
fn alloc_and_free_fragmented(b: &mut Bencher) {
    let mut heap = heap();

    // 空きブロックと割当済みブロックを交互に並べる
    let blocks = (0..1000)
        .map(|_| track_try_unwrap!(heap.try_alloc(16)))
        .collect::<Vec<_>>();
    for p in blocks.iter().step_by(2) {
        track_try_unwrap!(heap.free(*p));
    }

    b.iter(|| {
        let p = track_try_unwrap!(heap.try_alloc(64));
        track_try_unwrap!(heap.free(p));
    });
}

#[bench]
fn realloc_growing(b: &mut Bencher) {
    let mut heap = heap();
    let mut p: Option<Address> = None;
    let mut size = 8;
    b.iter(|| {
        if size > 64 * 1024 {
            track_try_unwrap!(heap.realloc(p.take(), 0));
            size = 8;
        }
        p = track_try_unwrap!(heap.realloc(p, size));
        size *= 2;
    });
}

#[bench]
fn checked_alloc_and_free(b: &mut Bencher) {
    let mut heap = track_try_unwrap!(HeapBuilder::new()
        .check_consistency(true)
        .build(MemoryArena::unbounded()));
    for _ in 0..100 {
        track_try_unwrap!(heap.try_alloc(32));
    }
    b.iter(|| {
        let p = track_try_unwrap!(heap.try_alloc(24));
        track_try_unwrap!(heap.free(p));
    });
}
