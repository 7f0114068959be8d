use rfarm_proto::ImageType;
use rfarm_util::error::Error;

use crate::Raster;

pub(crate) fn decode(bytes: &[u8], image_type: ImageType) -> Result<Raster, Error> {
	match image_type {
		ImageType::Png => decode_with_image_crate(bytes),
		ImageType::Jpeg => decode_with_image_crate(bytes),
		ImageType::Exr => decode_exr(bytes),
		ImageType::ImageTypeUnspecified => Err(Error::InvalidArgument(
			"compose input is missing an image type".to_string(),
		)),
	}
}

pub(crate) fn encode(raster: &Raster, image_type: ImageType) -> Result<Vec<u8>, Error> {
	match image_type {
		ImageType::Png => encode_png(raster),
		ImageType::Jpeg => encode_jpeg(raster),
		ImageType::Exr => encode_exr(raster),
		ImageType::ImageTypeUnspecified => Err(Error::InvalidArgument(
			"compose output type was not specified".to_string(),
		)),
	}
}

/// PNG (8 bpc RGBA) and JPEG (8 bpc RGB, alpha synthesized at 255) both
/// decode through the `image` crate's `DynamicImage`.
fn decode_with_image_crate(bytes: &[u8]) -> Result<Raster, Error> {
	let decoded = image::load_from_memory(bytes)
		.map_err(|e| Error::Internal(format!("failed to decode image: {}", e)))?
		.to_rgba8();
	let (width, height) = (decoded.width(), decoded.height());
	let pixels = decoded
		.pixels()
		.map(|p| [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64])
		.collect();
	Ok(Raster {
		width,
		height,
		pixels,
	})
}

fn encode_png(raster: &Raster) -> Result<Vec<u8>, Error> {
	let mut img = image::RgbaImage::new(raster.width, raster.height);
	for (px, out) in raster.pixels.iter().zip(img.pixels_mut()) {
		*out = image::Rgba([
			truncate_to_u8(px[0]),
			truncate_to_u8(px[1]),
			truncate_to_u8(px[2]),
			truncate_to_u8(px[3]),
		]);
	}
	let mut bytes = Vec::new();
	image::DynamicImage::ImageRgba8(img)
		.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
		.map_err(|e| Error::Internal(format!("failed to encode PNG: {}", e)))?;
	Ok(bytes)
}

fn encode_jpeg(raster: &Raster) -> Result<Vec<u8>, Error> {
	let mut img = image::RgbImage::new(raster.width, raster.height);
	for (px, out) in raster.pixels.iter().zip(img.pixels_mut()) {
		*out = image::Rgb([truncate_to_u8(px[0]), truncate_to_u8(px[1]), truncate_to_u8(px[2])]);
	}
	let mut bytes = Vec::new();
	image::DynamicImage::ImageRgb8(img)
		.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
		.map_err(|e| Error::Internal(format!("failed to encode JPEG: {}", e)))?;
	Ok(bytes)
}

fn truncate_to_u8(v: f64) -> u8 {
	v.round().clamp(0.0, 255.0) as u8
}

fn decode_exr(bytes: &[u8]) -> Result<Raster, Error> {
	use exr::prelude::*;

	// Storage is row-major so `set_pixel` never needs the image width, only
	// the per-row vector it's given.
	let image = read()
		.no_deep_data()
		.largest_resolution_level()
		.rgba_channels(
			|resolution, _channels| vec![vec![[0f32; 4]; resolution.width()]; resolution.height()],
			|rows, position, (r, g, b, a): (f32, f32, f32, f32)| {
				rows[position.y()][position.x()] = [r, g, b, a];
			},
		)
		.first_valid_layer()
		.all_attributes()
		.from_buffered(std::io::Cursor::new(bytes))
		.map_err(|e| Error::Internal(format!("failed to decode EXR: {}", e)))?;

	let layer = image.layer_data;
	let size = layer.size;
	let pixels = layer
		.channel_data
		.storage
		.into_iter()
		.flatten()
		.map(|[r, g, b, a]| [r as f64, g as f64, b as f64, a as f64])
		.collect();

	Ok(Raster {
		width: size.width() as u32,
		height: size.height() as u32,
		pixels,
	})
}

fn encode_exr(raster: &Raster) -> Result<Vec<u8>, Error> {
	use exr::prelude::*;

	let width = raster.width as usize;
	let height = raster.height as usize;
	let pixels = &raster.pixels;

	let channels = SpecificChannels::rgba(|position: Vec2<usize>| {
		let idx = position.y() * width + position.x();
		let px = pixels[idx];
		(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32)
	});

	let image = Image::from_channels((width, height), channels);

	let mut bytes = Vec::new();
	image
		.write()
		.to_buffered(std::io::Cursor::new(&mut bytes))
		.map_err(|e| Error::Internal(format!("failed to encode EXR: {}", e)))?;
	Ok(bytes)
}
