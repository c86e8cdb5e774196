#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod storage;

// Hardware-dependent modules are only compiled for the kernel, not for
// host-target unit tests. Storage is generic over BlockDevice and runs
// against RamDisk there.
#[cfg(all(not(test), target_arch = "x86_64"))]
pub mod arch;
#[cfg(all(not(test), target_arch = "x86_64"))]
pub mod drivers;
#[cfg(all(not(test), target_arch = "x86_64"))]
pub mod logging;
#[cfg(all(not(test), target_os = "none"))]
pub mod mem;
