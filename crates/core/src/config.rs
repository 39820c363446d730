//! Analyzer tunables.
//!
//! Every numeric threshold used by the analyzer stages is a field here so
//! operators can adjust sensitivity without a rebuild. The structs
//! deserialize from JSON (see `ANALYZER_CONFIG` in the server config);
//! `Default` gives the shipped values, and partial files override only the
//! keys they name.

use serde::Deserialize;

/// Top-level analyzer configuration, one section per stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    pub size: SizeConfig,
    pub face: FaceConfig,
    pub blur: BlurConfig,
    pub duplicate: DuplicateConfig,
    pub derivative: DerivativeConfig,
}

/// Size/resolution stage thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SizeConfig {
    /// Minimum accepted width in pixels.
    pub min_width: u32,
    /// Minimum accepted height in pixels.
    pub min_height: u32,
    /// Minimum accepted file size in bytes.
    pub min_bytes: u64,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            min_width: 800,
            min_height: 800,
            min_bytes: 100 * 1024,
        }
    }
}

/// Face-count heuristic thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceConfig {
    /// Width above which the wide-panorama short-circuit may fire.
    pub panorama_min_width: u32,
    /// Height above which the wide-panorama short-circuit may fire.
    pub panorama_min_height: u32,
    /// Aspect ratio (w/h) the panorama short-circuit requires.
    pub panorama_aspect: f64,
    /// Total pixel count above which a non-portrait image short-circuits.
    pub megapixel_limit: u64,
    /// Working-buffer bound; images are downscaled to fit this square.
    pub downscale_max: u32,
    /// Grayscale sigma above which a large image counts as a complex scene.
    pub complex_scene_sigma: f64,
    /// Minimum original width for the complex-scene gate to apply.
    pub complex_scene_min_width: u32,
    /// Minimum original height for the complex-scene gate to apply.
    pub complex_scene_min_height: u32,
    /// Cell grid dimension (grid_cells x grid_cells).
    pub grid_cells: u32,
    /// Factor of the cross-cell sigma a neighbor delta must exceed to mark
    /// a cell as a feature.
    pub feature_delta_factor: f64,
    /// Minimum confidence for a feature to be retained.
    pub feature_min_confidence: f64,
    /// Maximum Euclidean distance (downscaled pixels) between features in
    /// one cluster.
    pub cluster_distance: f64,
    /// Cluster size from which the stretched-cluster reclassification applies.
    pub wide_cluster_min_features: usize,
    /// Bounding-box aspect above which a single cluster reads as two subjects.
    pub wide_cluster_aspect: f64,
    /// Retained-feature count that floors the estimate at two.
    pub many_features_floor: usize,
    /// Retained-feature count that raises a zero estimate to one.
    pub some_features_raise: usize,
    /// Aspect ratio above which a wide zero-estimate image counts as one face.
    pub landscape_aspect: f64,
    /// Minimum width for the landscape raise to apply.
    pub landscape_min_width: u32,
    /// Normalized edge response (0-255) counted as strong in the fallback pass.
    pub edge_strong_threshold: f64,
    /// Scale applied to edge density when deriving the fallback estimate.
    pub edge_density_scale: f64,
    /// Portrait override: both dimensions under this accept a rejected image.
    pub override_max_dim: u32,
    /// Portrait override: mean per-channel color sigma under this accepts.
    pub override_color_sigma: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            panorama_min_width: 5000,
            panorama_min_height: 4000,
            panorama_aspect: 2.0,
            megapixel_limit: 12_000_000,
            downscale_max: 800,
            complex_scene_sigma: 90.0,
            complex_scene_min_width: 800,
            complex_scene_min_height: 700,
            grid_cells: 20,
            feature_delta_factor: 0.45,
            feature_min_confidence: 0.65,
            cluster_distance: 60.0,
            wide_cluster_min_features: 10,
            wide_cluster_aspect: 2.5,
            many_features_floor: 20,
            some_features_raise: 12,
            landscape_aspect: 1.8,
            landscape_min_width: 1500,
            edge_strong_threshold: 200.0,
            edge_density_scale: 40.0,
            override_max_dim: 1200,
            override_color_sigma: 60.0,
        }
    }
}

/// Blur-ensemble thresholds. Two votes reject.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlurConfig {
    /// Relative sigma gain of the sharpening kernel above which the
    /// sharpening-response test votes blurry.
    pub sharpen_ratio_threshold: f64,
    /// Per-block Laplacian variance that counts a block as sharp.
    pub block_variance_threshold: f64,
    /// Minimum fraction of sharp blocks; below this the block test votes blurry.
    pub sharp_block_min_fraction: f64,
    /// Laplacian response that counts a pixel as an edge.
    pub edge_response_threshold: f64,
    /// Minimum fraction of edge pixels; below this the edge test votes blurry.
    pub edge_min_fraction: f64,
    /// Gradient-sum threshold factor: T = factor * w * h.
    pub gradient_threshold_factor: f64,
    /// Directional gradient imbalance that flags motion blur.
    pub motion_ratio_threshold: f64,
    /// Grayscale sigma used by the single-test fallback on analyzer error.
    pub fallback_sigma_threshold: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            sharpen_ratio_threshold: 0.2,
            block_variance_threshold: 100.0,
            sharp_block_min_fraction: 0.15,
            edge_response_threshold: 50.0,
            edge_min_fraction: 0.03,
            gradient_threshold_factor: 5.0,
            motion_ratio_threshold: 3.0,
            fallback_sigma_threshold: 25.0,
        }
    }
}

/// Perceptual-hash duplicate detection thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DuplicateConfig {
    /// Side length of the fingerprint working buffer.
    pub hash_size: u32,
    /// Maximum Hamming distance (over hex-digit bit expansions) that still
    /// counts as a duplicate.
    pub max_hamming_distance: u32,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            hash_size: 32,
            max_hamming_distance: 3,
        }
    }
}

/// Canonical-derivative parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DerivativeConfig {
    /// Derivatives fit within a square of this side; never enlarged.
    pub max_dimension: u32,
    /// JPEG encode quality.
    pub jpeg_quality: u8,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            jpeg_quality: 80,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_thresholds() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.size.min_width, 800);
        assert_eq!(cfg.size.min_bytes, 102_400);
        assert_eq!(cfg.face.grid_cells, 20);
        assert_eq!(cfg.blur.sharpen_ratio_threshold, 0.2);
        assert_eq!(cfg.duplicate.max_hamming_distance, 3);
        assert_eq!(cfg.derivative.jpeg_quality, 80);
    }

    #[test]
    fn partial_json_overrides_only_named_keys() {
        let cfg: AnalyzerConfig = serde_json::from_str(
            r#"{ "size": { "minBytes": 1024 }, "blur": { "motionRatioThreshold": 4.5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.size.min_bytes, 1024);
        assert_eq!(cfg.size.min_width, 800);
        assert_eq!(cfg.blur.motion_ratio_threshold, 4.5);
        assert_eq!(cfg.face.cluster_distance, 60.0);
    }
}
