//! ZurOS kernel entry point.
//!
//! Booted by the Limine bootloader. Limine sets up long mode and page
//! tables and jumps to kmain, which mounts the flat filesystem on the
//! primary ATA disk and hands it to whoever consumes the storage API.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod kernel {
    use core::panic::PanicInfo;

    use limine::BaseRevision;
    use limine::request::{RequestsEndMarker, RequestsStartMarker};
    use log::{error, info};
    use spin::Mutex;

    use zuros_kernel::arch::x86_64::{self, serial};
    use zuros_kernel::config::{PollLimits, StorageLayout};
    use zuros_kernel::drivers::ata::AtaPio;
    use zuros_kernel::storage::FlatFs;
    use zuros_kernel::{logging, mem, serial_println};

    // ---- Limine requests ----
    // Must be #[used] and in .requests section for Limine to discover them.

    #[used]
    #[link_section = ".requests"]
    static BASE_REVISION: BaseRevision = BaseRevision::new();

    #[used]
    #[link_section = ".requests_start_marker"]
    static _START_MARKER: RequestsStartMarker = RequestsStartMarker::new();

    #[used]
    #[link_section = ".requests_end_marker"]
    static _END_MARKER: RequestsEndMarker = RequestsEndMarker::new();

    /// The mounted filesystem. Table and bitmap are locked together.
    pub static STORAGE: Mutex<Option<FlatFs<AtaPio>>> = Mutex::new(None);

    /// Kernel entry point, called by Limine after setting up long mode,
    /// page tables and a stack.
    #[no_mangle]
    pub extern "C" fn kmain() -> ! {
        // Everything below polls; nothing runs on interrupts.
        x86_64::cli();

        // 1. Serial console first, then logging on top of it
        serial::SERIAL.lock().init();
        serial_println!("ZurOS booting...");
        logging::init();

        assert!(BASE_REVISION.is_supported(), "Limine base revision not supported");
        info!("boot: Limine protocol OK");

        // 2. Heap
        mem::init_heap();
        info!("mem: heap ready");

        // 3. Storage
        init_storage();

        serial_println!("ZurOS boot complete.");
        loop {
            x86_64::hlt();
        }
    }

    /// Mount the flat filesystem on the primary ATA master.
    fn init_storage() {
        let layout = StorageLayout::REFERENCE;
        let ata = AtaPio::new(PollLimits::DEFAULT, layout.total_blocks);

        match FlatFs::mount(ata, layout) {
            Ok(fs) => {
                for file in fs.list() {
                    info!("storage: {:<15} {:>8} bytes", file.name, file.size);
                }
                let usage = fs.usage();
                info!(
                    "storage: {} files, {} free blocks, heap {} bytes in use",
                    usage.files,
                    usage.free_blocks,
                    mem::heap_used()
                );
                *STORAGE.lock() = Some(fs);
            }
            Err(e) => error!("storage: mount failed: {}", e),
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        serial_println!("!!! KERNEL PANIC !!!");
        serial_println!("{}", info);
        loop {
            x86_64::hlt();
        }
    }
}

/// Host builds have nothing to boot; the kernel only runs on bare metal.
#[cfg(not(target_os = "none"))]
fn main() {}
