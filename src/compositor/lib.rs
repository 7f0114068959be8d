//! Pure compositor: decodes aligned PNG/JPEG/EXR rasters, averages them with
//! integer weights, and re-encodes the result (§4.7). Knows nothing about
//! files, workers or RPC — `Compose` on the worker side is the only caller.
mod codec;

use rfarm_proto::ImageType;
use rfarm_util::error::Error;

/// Linear RGBA raster, one `[r, g, b, a]` per pixel, decoded to `f64` so PNG
/// (8 bpc), JPEG (8 bpc, synthesized alpha) and EXR (float) can be summed on
/// a common scale.
pub(crate) struct Raster {
	pub(crate) width: u32,
	pub(crate) height: u32,
	pub(crate) pixels: Vec<[f64; 4]>,
}

/// One input to `compose`: its encoded bytes, declared type, and weight.
pub struct WeightedImage {
	pub bytes: Vec<u8>,
	pub image_type: ImageType,
	pub weight: u32,
}

/// Average `images`, weighted, and re-encode the result as `output_type`.
///
/// All inputs must share the same `width x height` (`INTERNAL` otherwise).
/// Weights are non-negative; their sum must be positive (`INVALID_ARGUMENT`
/// otherwise).
pub fn compose(images: &[WeightedImage], output_type: ImageType) -> Result<Vec<u8>, Error> {
	if images.is_empty() {
		return Err(Error::InvalidArgument(
			"compose requires at least one input image".to_string(),
		));
	}

	let weight_sum: u64 = images.iter().map(|i| i.weight as u64).sum();
	if weight_sum == 0 {
		return Err(Error::InvalidArgument(
			"sum of compose weights must be greater than zero".to_string(),
		));
	}

	let rasters: Vec<Raster> = images
		.iter()
		.map(|i| codec::decode(&i.bytes, i.image_type))
		.collect::<Result<_, _>>()?;

	let (width, height) = (rasters[0].width, rasters[0].height);
	for raster in &rasters {
		if raster.width != width || raster.height != height {
			return Err(Error::Internal(format!(
				"compose inputs disagree on geometry: {}x{} vs {}x{}",
				width, height, raster.width, raster.height
			)));
		}
	}

	let pixel_count = (width as usize) * (height as usize);
	let mut accum = vec![[0f64; 4]; pixel_count];
	for (raster, image) in rasters.iter().zip(images.iter()) {
		let w = image.weight as f64;
		for (acc, px) in accum.iter_mut().zip(raster.pixels.iter()) {
			acc[0] += px[0] * w;
			acc[1] += px[1] * w;
			acc[2] += px[2] * w;
			acc[3] += px[3] * w;
		}
	}

	let denom = weight_sum as f64;
	for px in accum.iter_mut() {
		px[0] /= denom;
		px[1] /= denom;
		px[2] /= denom;
		px[3] /= denom;
	}

	let out = Raster {
		width,
		height,
		pixels: accum,
	};
	codec::encode(&out, output_type)
}
