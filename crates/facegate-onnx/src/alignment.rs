//! Face alignment via 4-DOF similarity transform.
//!
//! Warps an RGB image so that five facial landmarks land on the canonical
//! ArcFace positions of a 112×112 crop. Also provides canonical landmarks
//! for a bare box and the seeded perturbation used for jittered passes.

use facegate_core::{FaceBox, Image};
use image::{Rgb, RgbImage};
use rand::Rng;

/// ArcFace reference landmarks for a 112×112 output.
pub(crate) const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub(crate) const ALIGNED_SIZE: u32 = 112;

/// Maximum landmark shift for a jittered pass, as a fraction of face width.
const JITTER_SHIFT: f32 = 0.03;
/// Maximum relative scale change for a jittered pass.
const JITTER_SCALE: f32 = 0.05;

pub type Landmarks = [(f32, f32); 5];

/// Estimate a 2×3 similarity transform (scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks by least squares.
///
/// Returns [a, -b, tx, b, a, ty].
fn estimate_similarity_transform(src: &Landmarks, dst: &Landmarks) -> [f32; 6] {
    // Normal equations for A * [a, b, tx, ty]^T = B, two rows per point:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for ((sx, sy), (dx, dy)) in src.iter().copied().zip(dst.iter().copied()) {
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];
        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let [a, b, tx, ty] = solve_4x4(&ata, &atb);
    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&ata[i * 4..i * 4 + 4]);
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let max_row = (col..4)
            .max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))
            .unwrap_or(col);
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate landmarks: fall back to identity scale.
            return [1.0, 0.0, 0.0, 0.0];
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Warp `image` through the similarity `matrix` into an `out_size` square.
///
/// Bilinear sampling; pixels mapped from outside the source are black.
fn warp_affine(image: &Image, matrix: &[f32; 6], out_size: u32) -> RgbImage {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);
    let mut output = RgbImage::new(out_size, out_size);

    // Inverse of [[a, -b], [b, a]] is [[a, b], [-b, a]] / (a² + b²).
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return output;
    }
    let ia = a / det;
    let ib = b / det;
    let (w, h) = (image.width() as i64, image.height() as i64);

    let sample = |x: i64, y: i64| -> [f32; 3] {
        if x >= 0 && x < w && y >= 0 && y < h {
            let [r, g, b] = image.get_pixel(x as u32, y as u32).0;
            [r as f32, g as f32, b as f32]
        } else {
            [0.0; 3]
        }
    };

    for (ox, oy, px) in output.enumerate_pixels_mut() {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let (tl, tr) = (sample(x0, y0), sample(x0 + 1, y0));
        let (bl, br) = (sample(x0, y0 + 1), sample(x0 + 1, y0 + 1));
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = tl[c] * (1.0 - fx) * (1.0 - fy)
                + tr[c] * fx * (1.0 - fy)
                + bl[c] * (1.0 - fx) * fy
                + br[c] * fx * fy;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        *px = Rgb(out);
    }

    output
}

/// Align a face to the canonical 112×112 ArcFace crop.
pub fn align_face(image: &Image, landmarks: &Landmarks) -> RgbImage {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(image, &matrix, ALIGNED_SIZE)
}

/// Canonical landmark positions scaled into a face box.
///
/// Used when a box comes without detector landmarks.
pub fn box_landmarks(face: &FaceBox) -> Landmarks {
    let (w, h) = (face.width() as f32, face.height() as f32);
    REFERENCE_LANDMARKS_112.map(|(rx, ry)| {
        (
            face.left as f32 + rx / ALIGNED_SIZE as f32 * w,
            face.top as f32 + ry / ALIGNED_SIZE as f32 * h,
        )
    })
}

/// Randomly shift and rescale landmarks around their centroid.
pub fn jitter_landmarks<R: Rng>(landmarks: &Landmarks, face_width: f32, rng: &mut R) -> Landmarks {
    let (cx, cy) = landmarks
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x / 5.0, sy + y / 5.0));
    let shift = JITTER_SHIFT * face_width;
    let dx = rng.gen_range(-shift..=shift);
    let dy = rng.gen_range(-shift..=shift);
    let scale = 1.0 + rng.gen_range(-JITTER_SCALE..=JITTER_SCALE);

    landmarks.map(|(x, y)| (cx + (x - cx) * scale + dx, cy + (y - cy) * scale + dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_identity_transform() {
        let pts = REFERENCE_LANDMARKS_112;
        let m = estimate_similarity_transform(&pts, &pts);
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!(m[3].abs() < 1e-4, "b = {}", m[3]);
        assert!(m[5].abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn test_half_scale_transform() {
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0, y * 2.0));
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_112);
        assert!((m[0] - 0.5).abs() < 0.01, "a = {}, expected ~0.5", m[0]);
    }

    #[test]
    fn test_align_face_output_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([128, 64, 32]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS_112);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        // Inside the source, colour is preserved per channel.
        assert_eq!(aligned.get_pixel(56, 56).0, [128, 64, 32]);
    }

    #[test]
    fn test_landmark_roundtrip() {
        // A red patch at the left eye should land near the reference left eye.
        let mut image = RgbImage::new(200, 200);
        let src: Landmarks = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for y in 58..63 {
            for x in 78..83 {
                image.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }

        let aligned = align_face(&image, &src);
        let rx = REFERENCE_LANDMARKS_112[0].0.round() as u32;
        let ry = REFERENCE_LANDMARKS_112[0].1.round() as u32;
        let mut max_red = 0u8;
        for y in ry - 1..=ry + 1 {
            for x in rx - 1..=rx + 1 {
                max_red = max_red.max(aligned.get_pixel(x, y).0[0]);
            }
        }
        assert!(max_red > 100, "expected red patch near ({rx}, {ry}), max={max_red}");
    }

    #[test]
    fn test_box_landmarks_full_crop_is_reference() {
        let face = FaceBox { top: 0, left: 0, right: 111, bottom: 111 };
        let lms = box_landmarks(&face);
        for (got, want) in lms.iter().zip(REFERENCE_LANDMARKS_112.iter()) {
            assert!((got.0 - want.0).abs() < 1e-3);
            assert!((got.1 - want.1).abs() < 1e-3);
        }
    }

    #[test]
    fn test_jitter_is_seeded_and_bounded() {
        let base = REFERENCE_LANDMARKS_112;
        let a = jitter_landmarks(&base, 100.0, &mut StdRng::seed_from_u64(7));
        let b = jitter_landmarks(&base, 100.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        for (j, o) in a.iter().zip(base.iter()) {
            assert!((j.0 - o.0).abs() < 10.0);
            assert!((j.1 - o.1).abs() < 10.0);
        }
    }
}
