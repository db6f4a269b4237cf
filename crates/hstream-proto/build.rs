fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Vendored `protoc` so the build does not depend on a system toolchain.
    let protoc_path = protoc_bin_vendored::protoc_bin_path()?;
    unsafe {
        std::env::set_var("PROTOC", protoc_path);
    }
    // Include path for google/protobuf/empty.proto
    let include_path = protoc_bin_vendored::include_path()?;
    unsafe {
        std::env::set_var("PROTOC_INCLUDE", include_path.as_os_str());
    }

    println!("cargo:rerun-if-changed=proto/hstream.proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["proto/hstream.proto"],
            &["proto", &include_path.to_string_lossy()],
        )?;
    Ok(())
}
