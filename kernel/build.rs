/// ZurOS kernel build script.
///
/// Links the kernel binary with the Limine-compatible linker script.
fn main() {
    // Host target (unit tests) links normally.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "none" {
        return;
    }

    let dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    println!("cargo:rustc-link-arg-bins=-T{}/linker.ld", dir);
    println!("cargo:rerun-if-changed=linker.ld");
}
