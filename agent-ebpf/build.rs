/// Build script for the eBPF program
///
/// Exposes the target kernel architecture as `bpf_target_arch` so register
/// offsets can be selected at compile time.
use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_CFG_BPF_TARGET_ARCH");

    let arch = match env::var("CARGO_CFG_BPF_TARGET_ARCH") {
        Ok(arch) => arch,
        Err(_) => {
            let host = env::var("HOST").unwrap_or_default();
            host.split('-').next().unwrap_or("x86_64").to_owned()
        }
    };
    println!("cargo:rustc-cfg=bpf_target_arch=\"{}\"", arch);
}
