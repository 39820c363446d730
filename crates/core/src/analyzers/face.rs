//! Face-count heuristic stage.
//!
//! Produces a conservative estimate in {0, 1, 2} of the number of human
//! subjects using only statistical image analysis - no trained model. The
//! goal is to reject obvious multi-subject photographs while tolerating
//! single portraits; every threshold lives in [`FaceConfig`].

use serde_json::json;

use crate::config::FaceConfig;
use crate::error::AnalyzerError;
use crate::raster;
use crate::verdict::{RejectionCode, Verdict};

/// A retained feature cell, positioned at its cell center in downscaled
/// pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct Feature {
    x: f64,
    y: f64,
}

/// Run the face heuristic without the portrait override.
pub fn analyze(bytes: &[u8], cfg: &FaceConfig) -> Result<Verdict, AnalyzerError> {
    let (estimate, diagnostics) = estimate_subjects(bytes, cfg);
    if estimate > 1 {
        let message = format!(
            "Multiple faces detected ({estimate}). Please upload a photo with only one person."
        );
        Ok(Verdict::reject(
            RejectionCode::MultipleFacesDetected,
            message,
            diagnostics,
        ))
    } else {
        Ok(Verdict::accept(diagnostics))
    }
}

/// Pipeline variant: re-examines a Reject and overrides to Accept for
/// likely single-subject portraits (portrait orientation or small frame,
/// or a near-monochrome background).
pub fn analyze_guarded(bytes: &[u8], cfg: &FaceConfig) -> Result<Verdict, AnalyzerError> {
    let verdict = analyze(bytes, cfg)?;
    let Verdict::Reject { diagnostics, .. } = &verdict else {
        return Ok(verdict);
    };

    if let Ok((w, h)) = super::size::read_dimensions(bytes) {
        let small_frame = h > w || (w < cfg.override_max_dim && h < cfg.override_max_dim);
        let flat_color = color_sigma(bytes, cfg)
            .map(|s| s < cfg.override_color_sigma)
            .unwrap_or(false);
        if small_frame || flat_color {
            let mut diag = diagnostics.clone();
            if let Some(map) = diag.as_object_mut() {
                map.insert("portraitOverride".into(), json!(true));
            }
            return Ok(Verdict::accept(diag));
        }
    }

    Ok(verdict)
}

/// Estimate the subject count. Never fails: analyzer errors degrade to the
/// edge-density fallback, and a failing fallback reads as a single subject.
fn estimate_subjects(bytes: &[u8], cfg: &FaceConfig) -> (u32, serde_json::Value) {
    match cluster_estimate(bytes, cfg) {
        Ok(result) => result,
        Err(_) => match edge_density_estimate(bytes, cfg) {
            Ok(result) => result,
            Err(_) => (1, json!({ "estimate": 1, "fallback": "fail-open" })),
        },
    }
}

/// Main path: high-resolution short-circuits, complex-scene gate, then
/// cell-grid feature clustering.
fn cluster_estimate(
    bytes: &[u8],
    cfg: &FaceConfig,
) -> Result<(u32, serde_json::Value), AnalyzerError> {
    let (width, height) = super::size::read_dimensions(bytes)?;
    let aspect = width as f64 / height as f64;

    if let Some(estimate) = metadata_estimate(width, height, cfg) {
        return Ok((
            estimate,
            json!({
                "estimate": estimate,
                "shortCircuit": true,
                "width": width,
                "height": height,
            }),
        ));
    }

    let img = image::load_from_memory(bytes)?;
    let small = if width > cfg.downscale_max || height > cfg.downscale_max {
        img.thumbnail(cfg.downscale_max, cfg.downscale_max)
    } else {
        img
    };
    let gray = small.to_luma8();
    let (_, sigma) = raster::mean_stddev(&gray);

    if sigma > cfg.complex_scene_sigma
        && width > cfg.complex_scene_min_width
        && height > cfg.complex_scene_min_height
    {
        return Ok((
            2,
            json!({ "estimate": 2, "complexScene": true, "sigma": sigma }),
        ));
    }

    let features = extract_features(&gray, cfg);
    let clusters = cluster(&features, cfg.cluster_distance);
    let mut estimate = clusters.len() as u32;

    // Post-hoc adjustments.
    if clusters.len() == 1 {
        let members = &clusters[0];
        if members.len() >= cfg.wide_cluster_min_features {
            let (bw, bh) = bounding_box(members, &features);
            if bh > 0.0 && bw / bh > cfg.wide_cluster_aspect {
                estimate = 2;
            }
        }
    }
    if features.len() > cfg.many_features_floor {
        estimate = estimate.max(2);
    }
    if features.len() > cfg.some_features_raise && estimate == 0 {
        estimate = 1;
    }
    if estimate == 0 && aspect > cfg.landscape_aspect && width > cfg.landscape_min_width {
        estimate = 1;
    }

    let estimate = estimate.min(2);
    Ok((
        estimate,
        json!({
            "estimate": estimate,
            "sigma": sigma,
            "features": features.len(),
            "clusters": clusters.len(),
        }),
    ))
}

/// Short-circuits that need only the header dimensions.
fn metadata_estimate(width: u32, height: u32, cfg: &FaceConfig) -> Option<u32> {
    let aspect = width as f64 / height as f64;
    if (width > cfg.panorama_min_width || height > cfg.panorama_min_height)
        && aspect > cfg.panorama_aspect
    {
        return Some(2);
    }
    if u64::from(width) * u64::from(height) > cfg.megapixel_limit && width >= height {
        return Some(2);
    }
    None
}

/// Mark grid cells whose intensity stands out from their 4-neighborhood,
/// then keep the confident ones.
fn extract_features(gray: &image::GrayImage, cfg: &FaceConfig) -> Vec<Feature> {
    let cells = cfg.grid_cells.max(1);
    let means = raster::cell_means(gray, cells, cells);
    let (_, sigma_cells) = raster::slice_mean_stddev(&means);
    if sigma_cells <= f64::EPSILON {
        return Vec::new();
    }

    let (w, h) = gray.dimensions();
    let n = cells as usize;
    let mut features = Vec::new();
    for cy in 0..n {
        for cx in 0..n {
            let here = means[cy * n + cx];
            let mut delta_sum = 0.0;
            let mut neighbors = 0u32;
            if cx > 0 {
                delta_sum += (here - means[cy * n + cx - 1]).abs();
                neighbors += 1;
            }
            if cx + 1 < n {
                delta_sum += (here - means[cy * n + cx + 1]).abs();
                neighbors += 1;
            }
            if cy > 0 {
                delta_sum += (here - means[(cy - 1) * n + cx]).abs();
                neighbors += 1;
            }
            if cy + 1 < n {
                delta_sum += (here - means[(cy + 1) * n + cx]).abs();
                neighbors += 1;
            }
            let delta = delta_sum / neighbors.max(1) as f64;
            if delta <= cfg.feature_delta_factor * sigma_cells {
                continue;
            }
            let ratio = delta / sigma_cells;
            let confidence = (ratio / 2.0).min(0.95);
            if confidence > cfg.feature_min_confidence {
                features.push(Feature {
                    x: (cx as f64 + 0.5) * w as f64 / n as f64,
                    y: (cy as f64 + 0.5) * h as f64 / n as f64,
                });
            }
        }
    }
    features
}

/// Group features by proximity; each group is one subject candidate.
/// Plain union-find over pairwise distances - the grid caps the input at
/// a few hundred features.
fn cluster(features: &[Feature], max_distance: f64) -> Vec<Vec<usize>> {
    let n = features.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let up = parent[i];
            let root = find(parent, up);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = features[i].x - features[j].x;
            let dy = features[i].y - features[j].y;
            if (dx * dx + dy * dy).sqrt() <= max_distance {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// Width and height of the bounding box of a cluster's features.
fn bounding_box(members: &[usize], features: &[Feature]) -> (f64, f64) {
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;
    for &i in members {
        min_x = min_x.min(features[i].x);
        max_x = max_x.max(features[i].x);
        min_y = min_y.min(features[i].y);
        max_y = max_y.max(features[i].y);
    }
    ((max_x - min_x).max(0.0), (max_y - min_y).max(0.0))
}

/// Fallback estimate: density of strong Laplacian responses.
fn edge_density_estimate(
    bytes: &[u8],
    cfg: &FaceConfig,
) -> Result<(u32, serde_json::Value), AnalyzerError> {
    let img = image::load_from_memory(bytes)?;
    let small = img.thumbnail(cfg.downscale_max, cfg.downscale_max);
    let gray = small.to_luma8();
    let edges = raster::convolve3x3(&gray, &raster::LAPLACIAN);
    let strong = edges
        .as_raw()
        .iter()
        .filter(|&&v| f64::from(v) > cfg.edge_strong_threshold)
        .count();
    let density = strong as f64 / edges.as_raw().len().max(1) as f64;
    let estimate = (density * cfg.edge_density_scale).min(2.0).round() as u32;
    Ok((
        estimate,
        json!({ "estimate": estimate, "fallback": "edge-density", "edgeDensity": density }),
    ))
}

/// Mean per-channel standard deviation over RGB at full resolution.
/// Downscaling first would average grain away and overstate flatness, so
/// the override works on the original pixels.
fn color_sigma(bytes: &[u8], _cfg: &FaceConfig) -> Result<f64, AnalyzerError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img.to_rgb8();
    let n = (rgb.width() * rgb.height()) as f64;
    if n == 0.0 {
        return Err(AnalyzerError::Internal("empty image".into()));
    }

    let mut sums = [0.0f64; 3];
    let mut sum_sqs = [0.0f64; 3];
    for pixel in rgb.pixels() {
        for c in 0..3 {
            let v = f64::from(pixel.0[c]);
            sums[c] += v;
            sum_sqs[c] += v * v;
        }
    }
    let sigma_sum: f64 = (0..3)
        .map(|c| {
            let mean = sums[c] / n;
            (sum_sqs[c] / n - mean * mean).max(0.0).sqrt()
        })
        .sum();
    Ok(sigma_sum / 3.0)
}
