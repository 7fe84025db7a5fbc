fn main() {
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_else(|_| cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("RIFTLAG_H".into()),
        // Raw values accepted by rl_lab_apply and the eye getters.
        export: cbindgen::ExportConfig {
            include: vec!["Command".into(), "Eye".into()],
            ..Default::default()
        },
        ..Default::default()
    });

    println!("cargo:rerun-if-changed=src/ffi.rs");

    if let Ok(bindings) = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        bindings.write_to_file(format!("{}/include/riftlag.h", crate_dir));
    }
}
