/// Kernel heap: a buddy allocator over a static arena.
///
/// Storage only needs the heap for table listings, file contents and
/// snapshots, so a fixed arena in .bss is enough.
use buddy_system_allocator::LockedHeap;

use crate::config::KERNEL_HEAP_SIZE;

#[global_allocator]
static HEAP: LockedHeap<32> = LockedHeap::empty();

static mut HEAP_SPACE: [u8; KERNEL_HEAP_SIZE] = [0; KERNEL_HEAP_SIZE];

/// Hand the arena to the allocator. Call once, before anything allocates.
pub fn init_heap() {
    unsafe {
        let start = core::ptr::addr_of_mut!(HEAP_SPACE) as usize;
        HEAP.lock().init(start, KERNEL_HEAP_SIZE);
    }
}

/// Bytes currently handed out by the heap.
pub fn heap_used() -> usize {
    HEAP.lock().stats_alloc_actual()
}
