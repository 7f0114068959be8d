//! AOBENCH: a small self-contained ambient-occlusion path tracer. Takes no
//! input files and always produces a 256x256 PNG (§4.2).
use std::io::Cursor;

use image::{ImageEncoder, RgbImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use rfarm_block::WorkerFileStore;
use rfarm_proto::ImageType;
use rfarm_util::error::Error;

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;
const NUM_SAMPLES: u32 = 8;
const NUM_SPHERES: usize = 3;

#[derive(Clone, Copy)]
struct Vec3 {
	x: f64,
	y: f64,
	z: f64,
}

impl Vec3 {
	fn new(x: f64, y: f64, z: f64) -> Self {
		Vec3 { x, y, z }
	}
	fn dot(self, o: Vec3) -> f64 {
		self.x * o.x + self.y * o.y + self.z * o.z
	}
	fn sub(self, o: Vec3) -> Vec3 {
		Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
	}
	fn add(self, o: Vec3) -> Vec3 {
		Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
	}
	fn scale(self, s: f64) -> Vec3 {
		Vec3::new(self.x * s, self.y * s, self.z * s)
	}
	fn normalize(self) -> Vec3 {
		let len = self.dot(self).sqrt();
		if len > 1e-17 {
			self.scale(1.0 / len)
		} else {
			self
		}
	}
	fn cross(self, o: Vec3) -> Vec3 {
		Vec3::new(
			self.y * o.z - self.z * o.y,
			self.z * o.x - self.x * o.z,
			self.x * o.y - self.y * o.x,
		)
	}
}

struct Sphere {
	center: Vec3,
	radius: f64,
}

struct Plane {
	point: Vec3,
	normal: Vec3,
}

struct Isect {
	t: f64,
	hit: bool,
	pos: Vec3,
	normal: Vec3,
}

fn ray_sphere(ray_org: Vec3, ray_dir: Vec3, sphere: &Sphere, isect: &mut Isect) {
	let rs = ray_org.sub(sphere.center);
	let b = rs.dot(ray_dir);
	let c = rs.dot(rs) - sphere.radius * sphere.radius;
	let d = b * b - c;
	if d > 0.0 {
		let t = -b - d.sqrt();
		if t > 1.0e-6 && t < isect.t {
			isect.t = t;
			isect.hit = true;
			isect.pos = ray_org.add(ray_dir.scale(t));
			isect.normal = isect.pos.sub(sphere.center).normalize();
		}
	}
}

fn ray_plane(ray_org: Vec3, ray_dir: Vec3, plane: &Plane, isect: &mut Isect) {
	let d = -plane.point.dot(plane.normal);
	let v = ray_dir.dot(plane.normal);
	if v.abs() < 1.0e-17 {
		return;
	}
	let t = -(ray_org.dot(plane.normal) + d) / v;
	if t > 1.0e-6 && t < isect.t {
		isect.t = t;
		isect.hit = true;
		isect.pos = ray_org.add(ray_dir.scale(t));
		isect.normal = plane.normal;
	}
}

fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
	let basis = if n.x.abs() > 0.1 {
		Vec3::new(0.0, 1.0, 0.0)
	} else {
		Vec3::new(1.0, 0.0, 0.0)
	};
	let tangent = basis.cross(n).normalize();
	let bitangent = n.cross(tangent).normalize();
	(tangent, bitangent)
}

fn ambient_occlusion(isect: &Isect, spheres: &[Sphere; NUM_SPHERES], plane: &Plane, rng: &mut SmallRng) -> f64 {
	const NTHETA: u32 = 8;
	const NPHI: u32 = 8;
	const EPS: f64 = 1.0e-4;

	let p = isect.pos.add(isect.normal.scale(EPS));
	let (tangent, bitangent) = orthonormal_basis(isect.normal);

	let mut occlusion = 0.0;
	for _ in 0..NTHETA {
		for _ in 0..NPHI {
			let r: f64 = rng.gen();
			let phi: f64 = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
			let x = phi.cos() * r.sqrt();
			let y = phi.sin() * r.sqrt();
			let z = (1.0 - r).sqrt();

			let dir = tangent
				.scale(x)
				.add(bitangent.scale(y))
				.add(isect.normal.scale(z));

			let mut occ_isect = Isect {
				t: 1.0e17,
				hit: false,
				pos: Vec3::new(0.0, 0.0, 0.0),
				normal: Vec3::new(0.0, 0.0, 0.0),
			};
			for sphere in spheres {
				ray_sphere(p, dir, sphere, &mut occ_isect);
			}
			ray_plane(p, dir, plane, &mut occ_isect);

			if occ_isect.hit {
				occlusion += 1.0;
			}
		}
	}

	let total = (NTHETA * NPHI) as f64;
	(total - occlusion) / total
}

fn render_pixel(x: u32, y: u32, spheres: &[Sphere; NUM_SPHERES], plane: &Plane, rng: &mut SmallRng) -> f64 {
	let mut accum = 0.0;
	for sub_y in 0..2u32 {
		for sub_x in 0..2u32 {
			let px = (x as f64 + (sub_x as f64 / 2.0) - (WIDTH as f64 / 2.0)) / (WIDTH as f64 / 2.0);
			let py = -(y as f64 + (sub_y as f64 / 2.0) - (HEIGHT as f64 / 2.0)) / (HEIGHT as f64 / 2.0);

			let ray_dir = Vec3::new(px, py, -1.0).normalize();
			let ray_org = Vec3::new(0.0, 0.0, 0.0);

			let mut isect = Isect {
				t: 1.0e17,
				hit: false,
				pos: Vec3::new(0.0, 0.0, 0.0),
				normal: Vec3::new(0.0, 0.0, 0.0),
			};
			for sphere in spheres {
				ray_sphere(ray_org, ray_dir, sphere, &mut isect);
			}
			ray_plane(ray_org, ray_dir, plane, &mut isect);

			if isect.hit {
				accum += ambient_occlusion(&isect, spheres, plane, rng);
			}
		}
	}
	accum / 4.0
}

fn trace() -> RgbImage {
	let spheres = [
		Sphere {
			center: Vec3::new(-2.0, 0.0, -3.5),
			radius: 0.5,
		},
		Sphere {
			center: Vec3::new(-0.5, 0.0, -3.0),
			radius: 0.5,
		},
		Sphere {
			center: Vec3::new(1.0, 0.0, -2.2),
			radius: 0.5,
		},
	];
	let plane = Plane {
		point: Vec3::new(0.0, -0.5, 0.0),
		normal: Vec3::new(0.0, 1.0, 0.0),
	};

	// Fixed seed: AOBENCH takes no input files, so its output must be
	// reproducible run to run.
	let mut rng = SmallRng::seed_from_u64(0xA0BE_5eed);

	let mut img = RgbImage::new(WIDTH, HEIGHT);
	for y in 0..HEIGHT {
		for x in 0..WIDTH {
			let mut c = 0.0;
			for _ in 0..NUM_SAMPLES {
				c += render_pixel(x, y, &spheres, &plane, &mut rng);
			}
			c /= NUM_SAMPLES as f64;
			let v = (c.clamp(0.0, 1.0) * 255.0) as u8;
			img.put_pixel(x, y, image::Rgb([v, v, v]));
		}
	}
	img
}

pub async fn render(store: &WorkerFileStore) -> Result<(rfarm_util::data::FileId, u64, ImageType), Error> {
	let img = tokio::task::spawn_blocking(trace)
		.await
		.map_err(|e| Error::Internal(format!("aobench render task panicked: {}", e)))?;

	let mut png_bytes = Vec::new();
	image::codecs::png::PngEncoder::new(Cursor::new(&mut png_bytes))
		.write_image(img.as_raw(), WIDTH, HEIGHT, image::ExtendedColorType::Rgb8)
		.map_err(|e| Error::Internal(format!("failed to encode PNG: {}", e)))?;

	let (id, size) = store.put(bytes::Bytes::from(png_bytes)).await?;
	Ok((id, size, ImageType::Png))
}
