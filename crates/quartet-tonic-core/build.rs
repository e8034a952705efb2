//! Builds the gRPC client and server bindings for the three service contracts
//! (`greet`, `calculator`, `blog`) using `tonic-prost-build`.
//!
//! A file descriptor set is written next to the generated code so the server
//! binary can register it with the gRPC reflection service.
use std::env;
use std::path::PathBuf;

fn main() {
    // Supply a protoc binary when one is not already on the PATH / PROTOC env.
    if env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            unsafe {
                env::set_var("PROTOC", protoc);
            }
        }
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("quartet_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(
            config,
            &[
                "proto/greet.proto",
                "proto/calculator.proto",
                "proto/blog.proto",
            ],
            &["proto"],
        )
        .unwrap();
}
