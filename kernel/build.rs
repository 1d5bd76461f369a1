use std::env;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    // Each board loads the image at a different RAM address
    let script = if env::var_os("CARGO_FEATURE_BOARD_VERSATILEPB").is_some() {
        "versatilepb.ld"
    } else {
        "vexpress-a9.ld"
    };
    let script = manifest_dir.join("link").join(script);

    println!("cargo:rustc-link-arg-bins=-T{}", script.display());
    println!("cargo:rerun-if-changed={}", script.display());
    println!("cargo:rerun-if-changed=link/common.ld");
    println!("cargo:rustc-link-search={}", manifest_dir.join("link").display());
}
