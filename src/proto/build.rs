fn main() -> Result<(), Box<dyn std::error::Error>> {
	tonic_build::configure().compile(&["protos/render.proto"], &["protos"])?;
	Ok(())
}
