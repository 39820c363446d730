//! Grayscale raster helpers shared by the face and blur analyzers.
//!
//! All routines work on `image::GrayImage` buffers. Convolution output is
//! clamped to the 0-255 range; the border row/column is copied through
//! unchanged so output dimensions match the input.

use image::GrayImage;

/// 3x3 sharpening (high-pass) kernel.
pub const HIGH_PASS: [[f32; 3]; 3] = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

/// 3x3 eight-neighbor Laplacian kernel.
pub const LAPLACIAN: [[f32; 3]; 3] = [
    [-1.0, -1.0, -1.0],
    [-1.0, 8.0, -1.0],
    [-1.0, -1.0, -1.0],
];

/// Sobel horizontal-gradient kernel.
pub const SOBEL_X: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

/// Sobel vertical-gradient kernel.
pub const SOBEL_Y: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Mean and population standard deviation of a grayscale buffer.
pub fn mean_stddev(gray: &GrayImage) -> (f64, f64) {
    let data = gray.as_raw();
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Convolve with a 3x3 kernel, clamping each response to 0-255.
///
/// The one-pixel border has no full neighborhood and is left at zero.
pub fn convolve3x3(gray: &GrayImage, kernel: &[[f32; 3]; 3]) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }
    let src = gray.as_raw();
    let dst: &mut [u8] = &mut out;
    let w = w as usize;
    let h = h as usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = 0.0f32;
            for (ky, row) in kernel.iter().enumerate() {
                let base = (y + ky - 1) * w + x - 1;
                for (kx, &k) in row.iter().enumerate() {
                    acc += k * src[base + kx] as f32;
                }
            }
            dst[y * w + x] = acc.clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Sum of absolute responses for the horizontal and vertical Sobel kernels.
pub fn sobel_sums(gray: &GrayImage) -> (f64, f64) {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return (0.0, 0.0);
    }
    let src = gray.as_raw();
    let w = w as usize;
    let h = h as usize;
    let mut sum_h = 0.0f64;
    let mut sum_v = 0.0f64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut gx = 0.0f32;
            let mut gy = 0.0f32;
            for ky in 0..3 {
                let base = (y + ky - 1) * w + x - 1;
                for kx in 0..3 {
                    let v = src[base + kx] as f32;
                    gx += SOBEL_X[ky][kx] * v;
                    gy += SOBEL_Y[ky][kx] * v;
                }
            }
            sum_h += gx.abs() as f64;
            sum_v += gy.abs() as f64;
        }
    }
    (sum_h, sum_v)
}

/// Per-block population variances over square blocks of the given side.
///
/// Trailing partial blocks at the right/bottom edges are included.
pub fn block_variances(gray: &GrayImage, block: usize) -> Vec<f64> {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let block = block.max(1);
    let src = gray.as_raw();
    let mut vars = Vec::new();
    let mut by = 0;
    while by < h {
        let bh = block.min(h - by);
        let mut bx = 0;
        while bx < w {
            let bw = block.min(w - bx);
            let n = (bw * bh) as f64;
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let v = src[y * w + x] as f64;
                    sum += v;
                    sum_sq += v * v;
                }
            }
            let mean = sum / n;
            vars.push((sum_sq / n - mean * mean).max(0.0));
            bx += block;
        }
        by += block;
    }
    vars
}

/// Mean intensity of each cell in a `cells_x` x `cells_y` grid, row-major.
///
/// Cells cover the buffer completely; the last row/column of cells absorbs
/// the remainder when dimensions do not divide evenly.
pub fn cell_means(gray: &GrayImage, cells_x: u32, cells_y: u32) -> Vec<f64> {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let (cells_x, cells_y) = (cells_x.max(1) as usize, cells_y.max(1) as usize);
    let src = gray.as_raw();
    let mut means = Vec::with_capacity(cells_x * cells_y);
    for cy in 0..cells_y {
        let y0 = cy * h / cells_y;
        let y1 = if cy + 1 == cells_y { h } else { (cy + 1) * h / cells_y };
        for cx in 0..cells_x {
            let x0 = cx * w / cells_x;
            let x1 = if cx + 1 == cells_x { w } else { (cx + 1) * w / cells_x };
            let n = ((x1 - x0) * (y1 - y0)).max(1) as f64;
            let mut sum = 0.0f64;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += src[y * w + x] as f64;
                }
            }
            means.push(sum / n);
        }
    }
    means
}

/// Mean and population standard deviation of a plain f64 slice.
pub fn slice_mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    #[test]
    fn mean_stddev_uniform_is_flat() {
        let img = uniform(16, 16, 120);
        let (mean, sigma) = mean_stddev(&img);
        assert_eq!(mean, 120.0);
        assert_eq!(sigma, 0.0);
    }

    #[test]
    fn mean_stddev_two_levels() {
        let mut img = uniform(2, 1, 0);
        img.put_pixel(1, 0, Luma([200]));
        let (mean, sigma) = mean_stddev(&img);
        assert_eq!(mean, 100.0);
        assert_eq!(sigma, 100.0);
    }

    #[test]
    fn high_pass_preserves_uniform_interior() {
        let img = uniform(8, 8, 77);
        let out = convolve3x3(&img, &HIGH_PASS);
        // 5*77 - 4*77 = 77 everywhere in the interior; border stays zero.
        for y in 1..7 {
            for x in 1..7 {
                assert_eq!(out.get_pixel(x, y).0[0], 77);
            }
        }
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn laplacian_zero_on_uniform() {
        let img = uniform(8, 8, 150);
        let out = convolve3x3(&img, &LAPLACIAN);
        for y in 1..7 {
            for x in 1..7 {
                assert_eq!(out.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn sobel_sums_zero_on_uniform_and_positive_on_step() {
        let img = uniform(10, 10, 64);
        let (h, v) = sobel_sums(&img);
        assert_eq!(h, 0.0);
        assert_eq!(v, 0.0);

        // Vertical step edge: strong horizontal gradient, none vertical.
        let mut img = uniform(10, 10, 0);
        for y in 0..10 {
            for x in 5..10 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let (h, v) = sobel_sums(&img);
        assert!(h > 0.0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn block_variances_cover_whole_buffer() {
        let img = uniform(25, 25, 10);
        let vars = block_variances(&img, 10);
        // 3x3 blocks including trailing partials.
        assert_eq!(vars.len(), 9);
        assert!(vars.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn cell_means_pick_up_a_bright_quadrant() {
        let mut img = uniform(40, 40, 0);
        for y in 0..20 {
            for x in 0..20 {
                img.put_pixel(x, y, Luma([200]));
            }
        }
        let means = cell_means(&img, 2, 2);
        assert_eq!(means.len(), 4);
        assert_eq!(means[0], 200.0);
        assert_eq!(means[1], 0.0);
        assert_eq!(means[2], 0.0);
        assert_eq!(means[3], 0.0);
    }

    #[test]
    fn slice_stats() {
        let (mean, sigma) = slice_mean_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(sigma, 2.0);
    }
}
