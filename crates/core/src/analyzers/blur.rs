//! Blur-heuristic stage.
//!
//! Voting ensemble of four independent tests over the grayscale image;
//! two votes reject. A strongly directional gradient imbalance flags
//! motion blur and rejects on its own.

use serde_json::json;

use crate::config::BlurConfig;
use crate::error::AnalyzerError;
use crate::raster;
use crate::verdict::{RejectionCode, Verdict};

const REJECT_MESSAGE: &str = "Image is too blurry. Please upload a clearer photo.";

/// Run the blur ensemble. On an analyzer error the stage degrades to a
/// single grayscale-sigma test instead of failing the pipeline.
pub fn analyze(bytes: &[u8], cfg: &BlurConfig) -> Result<Verdict, AnalyzerError> {
    match ensemble(bytes, cfg) {
        Ok(verdict) => Ok(verdict),
        Err(_) => fallback(bytes, cfg),
    }
}

fn ensemble(bytes: &[u8], cfg: &BlurConfig) -> Result<Verdict, AnalyzerError> {
    let img = image::load_from_memory(bytes)?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Err(AnalyzerError::Internal(format!(
            "image too small for blur analysis: {w}x{h}"
        )));
    }

    // 1. Sharpening response: how much a high-pass kernel inflates sigma.
    let (_, sigma0) = raster::mean_stddev(&gray);
    let sharpened = raster::convolve3x3(&gray, &raster::HIGH_PASS);
    let (_, sigma1) = raster::mean_stddev(&sharpened);
    let sharpen_ratio = if sigma0 > f64::EPSILON {
        (sigma1 - sigma0) / sigma0
    } else {
        0.0
    };
    let vote_sharpen = sharpen_ratio > cfg.sharpen_ratio_threshold;

    // 2. Local variance: fraction of Laplacian blocks that carry detail.
    let laplacian = raster::convolve3x3(&gray, &raster::LAPLACIAN);
    let block = ((w.min(h) / 20).max(10)) as usize;
    let variances = raster::block_variances(&laplacian, block);
    let sharp_blocks = variances
        .iter()
        .filter(|&&v| v > cfg.block_variance_threshold)
        .count();
    let sharp_fraction = sharp_blocks as f64 / variances.len().max(1) as f64;
    let vote_blocks = sharp_fraction < cfg.sharp_block_min_fraction;

    // 3. Edge histogram on the same Laplacian output.
    let edge_pixels = laplacian
        .as_raw()
        .iter()
        .filter(|&&v| f64::from(v) > cfg.edge_response_threshold)
        .count();
    let edge_fraction = edge_pixels as f64 / laplacian.as_raw().len().max(1) as f64;
    let vote_edges = edge_fraction < cfg.edge_min_fraction;

    // 4. Gradient sum against a resolution-scaled threshold.
    let (sum_h, sum_v) = raster::sobel_sums(&gray);
    let threshold = cfg.gradient_threshold_factor * f64::from(w) * f64::from(h);
    let vote_gradient = sum_h < threshold && sum_v < threshold;

    // Directional imbalance with at least one weak axis reads as motion blur.
    let (hi, lo) = if sum_h >= sum_v {
        (sum_h, sum_v)
    } else {
        (sum_v, sum_h)
    };
    let imbalance = if lo > 0.0 {
        hi / lo
    } else if hi > 0.0 {
        f64::INFINITY
    } else {
        1.0
    };
    let motion_blur = imbalance > cfg.motion_ratio_threshold
        && (sum_h < threshold || sum_v < threshold);

    let votes = [vote_sharpen, vote_blocks, vote_edges, vote_gradient]
        .iter()
        .filter(|&&v| v)
        .count();
    let blurry = votes >= 2 || motion_blur;

    let diagnostics = json!({
        "votes": votes,
        "motionBlur": motion_blur,
        "sharpenResponse": { "vote": vote_sharpen, "ratio": sharpen_ratio },
        "localVariance": { "vote": vote_blocks, "sharpFraction": sharp_fraction },
        "edgeHistogram": { "vote": vote_edges, "edgeFraction": edge_fraction },
        "gradientSum": {
            "vote": vote_gradient,
            "horizontal": sum_h,
            "vertical": sum_v,
            "threshold": threshold,
        },
    });

    if blurry {
        Ok(Verdict::reject(
            RejectionCode::BlurryImageDetected,
            REJECT_MESSAGE,
            diagnostics,
        ))
    } else {
        Ok(Verdict::accept(diagnostics))
    }
}

/// Single-test fallback: a nearly flat grayscale distribution is blurry.
fn fallback(bytes: &[u8], cfg: &BlurConfig) -> Result<Verdict, AnalyzerError> {
    let gray = image::load_from_memory(bytes)?.to_luma8();
    let (_, sigma) = raster::mean_stddev(&gray);
    let diagnostics = json!({ "fallback": true, "sigma": sigma });
    if sigma < cfg.fallback_sigma_threshold {
        Ok(Verdict::reject(
            RejectionCode::BlurryImageDetected,
            REJECT_MESSAGE,
            diagnostics,
        ))
    } else {
        Ok(Verdict::accept(diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlurConfig;
    use image::codecs::png::PngEncoder;
    use image::{DynamicImage, GrayImage, Luma};

    fn encode(gray: GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_with_encoder(PngEncoder::new(&mut buf))
            .unwrap();
        buf
    }

    fn expect_reject(bytes: &[u8]) -> serde_json::Value {
        match analyze(bytes, &BlurConfig::default()).unwrap() {
            Verdict::Reject {
                code,
                message,
                diagnostics,
            } => {
                assert_eq!(code, RejectionCode::BlurryImageDetected);
                assert_eq!(message, REJECT_MESSAGE);
                diagnostics
            }
            Verdict::Accept { .. } => panic!("expected reject"),
        }
    }

    #[test]
    fn flat_image_is_blurry() {
        let bytes = encode(GrayImage::from_pixel(300, 300, Luma([128])));
        let diagnostics = expect_reject(&bytes);
        // No detail anywhere: block, edge, and gradient tests all vote.
        assert!(diagnostics["votes"].as_u64().unwrap() >= 2);
    }

    #[test]
    fn checkerboard_is_sharp() {
        let mut img = GrayImage::new(320, 320);
        for y in 0..320 {
            for x in 0..320 {
                let v = if ((x / 8) + (y / 8)) % 2 == 0 { 255 } else { 0 };
                img.put_pixel(x, y, Luma([v]));
            }
        }
        let verdict = analyze(&encode(img), &BlurConfig::default()).unwrap();
        match verdict {
            Verdict::Accept { diagnostics } => {
                assert_eq!(diagnostics["motionBlur"], false);
                assert!(diagnostics["votes"].as_u64().unwrap() < 2);
            }
            Verdict::Reject { diagnostics, .. } => {
                panic!("expected accept, diagnostics: {diagnostics}")
            }
        }
    }

    #[test]
    fn horizontal_gradient_flags_motion_blur() {
        let mut img = GrayImage::new(300, 300);
        for y in 0..300 {
            for x in 0..300 {
                img.put_pixel(x, y, Luma([(x * 255 / 299) as u8]));
            }
        }
        let diagnostics = expect_reject(&encode(img));
        assert_eq!(diagnostics["motionBlur"], true);
    }

    #[test]
    fn smooth_wide_ramp_votes_blurry() {
        // Slow ramp over a large frame: every local detail test fails.
        let mut img = GrayImage::new(900, 900);
        for y in 0..900 {
            for x in 0..900 {
                img.put_pixel(x, y, Luma([(x * 255 / 899) as u8]));
            }
        }
        let diagnostics = expect_reject(&encode(img));
        assert!(diagnostics["votes"].as_u64().unwrap() >= 2);
    }

    #[test]
    fn tiny_image_uses_sigma_fallback() {
        let bytes = encode(GrayImage::from_pixel(2, 2, Luma([128])));
        match analyze(&bytes, &BlurConfig::default()).unwrap() {
            Verdict::Reject { diagnostics, .. } => assert_eq!(diagnostics["fallback"], true),
            Verdict::Accept { .. } => panic!("expected fallback reject"),
        }
    }

    #[test]
    fn undecodable_bytes_error() {
        assert!(analyze(b"junk", &BlurConfig::default()).is_err());
    }
}
