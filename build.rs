fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/iot/iot.proto");

    prost_build::compile_protos(&["proto/iot/iot.proto"], &["proto"])?;

    Ok(())
}
