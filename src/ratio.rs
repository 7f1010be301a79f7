/// Aspect-ratio catalog used to bucket videos by shape.
///
/// Every video is matched to the nearest of a fixed set of canonical aspect
/// ratios. Each bucket knows which subdirectory its videos belong in and the
/// bitrate a video of that shape should be encoded at.
///
/// # Examples
///
/// ```
/// use vidtidy::ratio::RatioCatalog;
///
/// let closest = RatioCatalog::closest(1920.0 / 1080.0);
/// assert_eq!(closest.bucket_id, "16:9");
/// assert_eq!(RatioCatalog::directory_for("16:9").unwrap(), "16-9");
/// ```
use thiserror::Error;

/// A canonical aspect-ratio category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioBucket {
    /// Catalog key, e.g. `"16:9"`.
    pub id: &'static str,
    pub numerator: u32,
    pub denominator: u32,
    /// Subdirectory that videos of this shape are moved into.
    pub dir_name: &'static str,
    /// Target video bitrate in kbps for this shape.
    pub target_bitrate_kbps: u32,
    /// A typical resolution of this shape, width by height.
    pub approx_resolution: (u32, u32),
}

impl RatioBucket {
    /// Returns the ratio as a float (width / height).
    pub fn value(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// The reference resolution as `WIDTHxHEIGHT`.
    pub fn resolution_label(&self) -> String {
        let (width, height) = self.approx_resolution;
        format!("{width}x{height}")
    }
}

const fn bucket(
    id: &'static str,
    numerator: u32,
    denominator: u32,
    dir_name: &'static str,
    target_bitrate_kbps: u32,
    approx_resolution: (u32, u32),
) -> RatioBucket {
    RatioBucket {
        id,
        numerator,
        denominator,
        dir_name,
        target_bitrate_kbps,
        approx_resolution,
    }
}

/// Portrait to landscape. Order matters: ties resolve to the earlier bucket.
const BUCKETS: [RatioBucket; 13] = [
    bucket("1:2", 1, 2, "rev 2-1", 1650, (720, 1440)),
    bucket("9:16", 9, 16, "rev 16-9", 1550, (720, 1280)),
    bucket("3:5", 3, 5, "rev 5-3", 1550, (768, 1280)),
    bucket("2:3", 2, 3, "rev 3-2", 1600, (800, 1200)),
    bucket("3:4", 3, 4, "rev 4-3", 1350, (768, 1024)),
    bucket("4:5", 4, 5, "rev 5-4", 1400, (820, 1025)),
    bucket("1:1", 1, 1, "1-1", 1550, (960, 960)),
    bucket("5:4", 5, 4, "5-4", 1400, (1025, 820)),
    bucket("4:3", 4, 3, "4-3", 1350, (1024, 768)),
    bucket("3:2", 3, 2, "3-2", 1600, (1200, 800)),
    bucket("5:3", 5, 3, "5-3", 1550, (1280, 768)),
    bucket("16:9", 16, 9, "16-9", 1550, (1280, 720)),
    bucket("2:1", 2, 1, "2-1", 1650, (1440, 720)),
];

/// The bucket nearest to some measured ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestRatio {
    pub bucket_id: &'static str,
    pub bucket_value: f64,
    /// `|ratio - bucket_value|`
    pub difference: f64,
}

/// Errors raised by catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The id does not name any bucket in the catalog.
    #[error("Unknown ratio bucket '{0}'")]
    UnknownBucket(String),
}

/// Lookup functions over the fixed bucket table.
pub struct RatioCatalog;

impl RatioCatalog {
    /// All buckets, in iteration order.
    pub fn buckets() -> &'static [RatioBucket] {
        &BUCKETS
    }

    /// Finds the bucket whose value is nearest to `ratio`.
    ///
    /// The first bucket with the minimal distance wins, so the result is
    /// stable for ratios that sit exactly between two buckets.
    pub fn closest(ratio: f64) -> ClosestRatio {
        let mut best = &BUCKETS[0];
        let mut best_diff = (ratio - best.value()).abs();

        for candidate in &BUCKETS[1..] {
            let diff = (ratio - candidate.value()).abs();
            if diff < best_diff {
                best = candidate;
                best_diff = diff;
            }
        }

        ClosestRatio {
            bucket_id: best.id,
            bucket_value: best.value(),
            difference: best_diff,
        }
    }

    /// Looks up a bucket by id.
    pub fn bucket(id: &str) -> Result<&'static RatioBucket, CatalogError> {
        BUCKETS
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| CatalogError::UnknownBucket(id.to_string()))
    }

    /// Returns the destination directory name for a bucket.
    pub fn directory_for(id: &str) -> Result<&'static str, CatalogError> {
        Self::bucket(id).map(|b| b.dir_name)
    }

    /// Returns the target bitrate (kbps) for a bucket.
    pub fn target_bitrate_for(id: &str) -> Result<u32, CatalogError> {
        Self::bucket(id).map(|b| b.target_bitrate_kbps)
    }
}
