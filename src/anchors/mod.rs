//! Anchor-shape derivation via overlap-based clustering.
//!
//! This module implements the one genuine algorithm in anchorkit: a k-means
//! variant over (width, height) pairs whose distance is `1 - overlap`, where
//! overlap is the intersection-over-union of two rectangles anchored at a
//! shared corner. Positions are ignored on purpose; only the shapes matter
//! for anchor selection.

pub mod draw;
pub mod persist;

use std::fmt;
use std::path::Path;

use rand::{rngs::StdRng, Rng, RngExt, SeedableRng};
use serde::Serialize;

use crate::error::AnchorkitError;
use crate::voc;

/// A bounding-box shape: a (width, height) pair with positions stripped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoxShape {
    pub w: f64,
    pub h: f64,
}

impl BoxShape {
    /// Creates a new shape with the given width and height.
    #[inline]
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// Builds a shape from corner coordinates.
    ///
    /// Corner ordering in annotation sources is not guaranteed, so both
    /// dimensions are taken as absolute differences.
    #[inline]
    pub fn from_corners(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            w: (xmax - xmin).abs(),
            h: (ymax - ymin).abs(),
        }
    }

    /// Returns true if the shape cannot participate in the overlap metric
    /// (zero or negative area, or non-finite dimensions).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.w.is_finite() && self.h.is_finite() && self.w > 0.0 && self.h > 0.0)
    }
}

impl fmt::Display for BoxShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Corner-anchored IOU between a box and a single centroid.
///
/// Both rectangles are treated as sharing the same top-left corner, so the
/// intersection reduces to a four-way case split on which dimensions the
/// centroid exceeds. The result is in (0, 1], and exactly 1.0 when the two
/// shapes are equal.
///
/// Callers must not pass degenerate shapes; the engine validates its inputs
/// before this runs.
pub fn overlap_pair(x: BoxShape, c: BoxShape) -> f64 {
    let (w, h) = (x.w, x.h);
    let (cw, ch) = (c.w, c.h);

    if cw >= w && ch >= h {
        // centroid contains the box
        (w * h) / (cw * ch)
    } else if cw >= w && ch <= h {
        // centroid wider, box taller
        (w * ch) / (w * h + ch * (cw - w))
    } else if cw <= w && ch >= h {
        // centroid taller, box wider
        (cw * h) / (w * h + cw * (ch - h))
    } else {
        // box contains the centroid
        (cw * ch) / (w * h)
    }
}

/// Corner-anchored IOU between a box and each centroid, in centroid order.
pub fn overlap(x: BoxShape, centroids: &[BoxShape]) -> Vec<f64> {
    centroids.iter().map(|&c| overlap_pair(x, c)).collect()
}

/// What to do with a centroid whose cluster receives no boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptyClusterPolicy {
    /// Leave the centroid unchanged. A dead centroid can stay dead for the
    /// rest of the run; this matches the historical behavior.
    Keep,
    /// Move the centroid onto the corpus box farthest from its currently
    /// assigned centroid.
    Reseed,
}

/// Options for the clustering engine.
#[derive(Clone, Debug)]
pub struct ClusterOptions {
    /// Convergence threshold on the L1 delta of the full distance matrix
    /// between consecutive iterations. The delta is NOT normalized by
    /// corpus size, so larger corpora need proportionally smaller values
    /// to reach the same practical convergence.
    pub eps: f64,
    /// Iteration budget. Exhausting it is not an error; the engine returns
    /// its best-effort centroids with `converged == false`.
    pub max_iterations: usize,
    pub empty_cluster: EmptyClusterPolicy,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            eps: 0.05,
            max_iterations: 100,
            empty_cluster: EmptyClusterPolicy::Keep,
        }
    }
}

/// Result of a clustering run.
#[derive(Clone, Debug, Serialize)]
pub struct ClusterOutcome {
    pub centroids: Vec<BoxShape>,
    /// Number of iterations performed, counting the final convergence check.
    pub iterations: usize,
    /// True if the eps threshold was reached, false if the iteration budget
    /// ran out first.
    pub converged: bool,
}

/// Draws `k` initial centroids from the corpus.
///
/// Indices are drawn independently, so duplicate initial centroids are
/// possible; they separate after the first update.
pub fn init_centroids<R: Rng + ?Sized>(
    corpus: &[BoxShape],
    k: usize,
    rng: &mut R,
) -> Result<Vec<BoxShape>, AnchorkitError> {
    if k == 0 {
        return Err(AnchorkitError::InvalidClusterParams {
            message: "number of anchors must be greater than 0".to_string(),
        });
    }
    if k > corpus.len() {
        return Err(AnchorkitError::InvalidClusterParams {
            message: format!(
                "number of anchors ({}) exceeds corpus size ({})",
                k,
                corpus.len()
            ),
        });
    }

    Ok((0..k)
        .map(|_| corpus[rng.random_range(0..corpus.len())])
        .collect())
}

fn validate_cluster_inputs(
    corpus: &[BoxShape],
    centroids: &[BoxShape],
) -> Result<(), AnchorkitError> {
    if corpus.is_empty() {
        return Err(AnchorkitError::InvalidClusterParams {
            message: "corpus is empty".to_string(),
        });
    }
    if centroids.is_empty() {
        return Err(AnchorkitError::InvalidClusterParams {
            message: "centroid set is empty".to_string(),
        });
    }
    if centroids.len() > corpus.len() {
        return Err(AnchorkitError::InvalidClusterParams {
            message: format!(
                "centroid count ({}) exceeds corpus size ({})",
                centroids.len(),
                corpus.len()
            ),
        });
    }

    for (idx, shape) in corpus.iter().enumerate() {
        if shape.is_degenerate() {
            return Err(AnchorkitError::DegenerateBox {
                message: format!("corpus box {} has invalid dimensions {}", idx, shape),
            });
        }
    }
    for (idx, shape) in centroids.iter().enumerate() {
        if shape.is_degenerate() {
            return Err(AnchorkitError::DegenerateBox {
                message: format!("centroid {} has invalid dimensions {}", idx, shape),
            });
        }
    }

    Ok(())
}

fn distance_matrix(corpus: &[BoxShape], centroids: &[BoxShape]) -> Vec<Vec<f64>> {
    corpus
        .iter()
        .map(|&shape| {
            overlap(shape, centroids)
                .into_iter()
                .map(|score| 1.0 - score)
                .collect()
        })
        .collect()
}

fn l1_delta(current: &[Vec<f64>], previous: &[Vec<f64>]) -> f64 {
    current
        .iter()
        .zip(previous)
        .map(|(row, prev_row)| {
            row.iter()
                .zip(prev_row)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
        })
        .sum()
}

/// Assigns each box to its nearest centroid. Ties break toward the lowest
/// centroid index (first minimum wins).
fn assign(distances: &[Vec<f64>]) -> Vec<usize> {
    distances
        .iter()
        .map(|row| {
            let mut best = 0;
            for (idx, &d) in row.iter().enumerate() {
                if d < row[best] {
                    best = idx;
                }
            }
            best
        })
        .collect()
}

/// Produces a refined centroid set: each centroid becomes the coordinate-wise
/// arithmetic mean of the boxes assigned to it. Returns a new set rather than
/// mutating in place.
fn refine(
    corpus: &[BoxShape],
    centroids: &[BoxShape],
    assignments: &[usize],
    distances: &[Vec<f64>],
    policy: EmptyClusterPolicy,
) -> Vec<BoxShape> {
    let k = centroids.len();
    let mut sums = vec![(0.0f64, 0.0f64); k];
    let mut counts = vec![0usize; k];

    for (&cluster, shape) in assignments.iter().zip(corpus) {
        sums[cluster].0 += shape.w;
        sums[cluster].1 += shape.h;
        counts[cluster] += 1;
    }

    let mut refined = Vec::with_capacity(k);
    let mut claimed: Vec<usize> = Vec::new();

    for j in 0..k {
        if counts[j] > 0 {
            let n = counts[j] as f64;
            refined.push(BoxShape::new(sums[j].0 / n, sums[j].1 / n));
            continue;
        }

        match policy {
            EmptyClusterPolicy::Keep => refined.push(centroids[j]),
            EmptyClusterPolicy::Reseed => {
                // Farthest box from its assigned centroid, skipping boxes
                // already claimed by another dead cluster this round.
                let farthest = assignments
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !claimed.contains(i))
                    .max_by(|(i, &a), (j_idx, &b)| {
                        distances[*i][a]
                            .partial_cmp(&distances[*j_idx][b])
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(i, _)| i);

                match farthest {
                    Some(i) => {
                        claimed.push(i);
                        refined.push(corpus[i]);
                    }
                    None => refined.push(centroids[j]),
                }
            }
        }
    }

    refined
}

/// Runs the clustering loop until convergence or budget exhaustion.
///
/// Convergence is checked on the distances computed from the previous
/// iteration's centroids, before any update, so the returned centroids are
/// the pre-update set of the converging iteration. The first iteration never
/// converges (there is no previous matrix to compare against).
pub fn cluster(
    corpus: &[BoxShape],
    initial: Vec<BoxShape>,
    opts: &ClusterOptions,
) -> Result<ClusterOutcome, AnchorkitError> {
    validate_cluster_inputs(corpus, &initial)?;

    let mut centroids = initial;
    let mut previous: Option<Vec<Vec<f64>>> = None;
    let mut iteration = 0usize;

    loop {
        iteration += 1;

        let distances = distance_matrix(corpus, &centroids);

        if let Some(prev) = &previous {
            if l1_delta(&distances, prev) < opts.eps {
                return Ok(ClusterOutcome {
                    centroids,
                    iterations: iteration,
                    converged: true,
                });
            }
        }

        if iteration > opts.max_iterations {
            return Ok(ClusterOutcome {
                centroids,
                iterations: iteration,
                converged: false,
            });
        }

        let assignments = assign(&distances);
        centroids = refine(corpus, &centroids, &assignments, &distances, opts.empty_cluster);
        previous = Some(distances);
    }
}

/// Scales anchors from image pixels to feature-map grid units.
pub fn normalize_anchors(
    anchors: &[BoxShape],
    image_size: (f64, f64),
    map_size: (f64, f64),
) -> Vec<BoxShape> {
    let rw = map_size.0 / image_size.0;
    let rh = map_size.1 / image_size.1;

    anchors
        .iter()
        .map(|a| BoxShape::new(a.w * rw, a.h * rh))
        .collect()
}

/// Options for the full anchor-derivation pipeline.
#[derive(Clone, Debug)]
pub struct AnchorOptions {
    pub num_anchors: usize,
    pub eps: f64,
    pub max_iterations: usize,
    pub seed: Option<u64>,
    pub empty_cluster: EmptyClusterPolicy,
    /// Optional (image_size, map_size) pair, each as (width, height).
    pub normalize: Option<((f64, f64), (f64, f64))>,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            num_anchors: 5,
            eps: 0.05,
            max_iterations: 100,
            seed: None,
            empty_cluster: EmptyClusterPolicy::Keep,
            normalize: None,
        }
    }
}

/// Report produced by [`derive_anchors`].
#[derive(Clone, Debug, Serialize)]
pub struct AnchorReport {
    pub corpus_size: usize,
    pub skipped_degenerate: usize,
    pub num_anchors: usize,
    pub iterations: usize,
    pub converged: bool,
    pub centroids: Vec<BoxShape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<Vec<BoxShape>>,
}

impl fmt::Display for AnchorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Clustered {} boxes into {} anchors in {} iteration(s) ({})",
            self.corpus_size,
            self.num_anchors,
            self.iterations,
            if self.converged {
                "converged"
            } else {
                "iteration budget exhausted"
            }
        )?;
        if self.skipped_degenerate > 0 {
            writeln!(
                f,
                "Skipped {} degenerate (zero-area) box(es)",
                self.skipped_degenerate
            )?;
        }
        for anchor in &self.centroids {
            writeln!(f, "  {}", anchor)?;
        }
        if let Some(normalized) = &self.normalized {
            writeln!(f, "Normalized to feature-map units:")?;
            for anchor in normalized {
                writeln!(f, "  {}", anchor)?;
            }
        }
        Ok(())
    }
}

/// Loads every VOC annotation under `dir`, builds the box corpus, and runs
/// the clustering engine.
///
/// Zero-area boxes are filtered out of the corpus before clustering and
/// counted in the report; a directory with no XML files, or whose files
/// contain no usable boxes, is an [`AnchorkitError::EmptyCorpus`].
pub fn derive_anchors(dir: &Path, opts: &AnchorOptions) -> Result<AnchorReport, AnchorkitError> {
    let files = voc::collect_xml_files(dir)?;
    if files.is_empty() {
        return Err(AnchorkitError::EmptyCorpus {
            path: dir.to_path_buf(),
        });
    }

    let mut corpus = Vec::new();
    let mut skipped_degenerate = 0usize;

    for file in &files {
        let parsed = voc::parse_voc_file(file)?;
        for bbox in &parsed.boxes {
            let shape = BoxShape::from_corners(bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax);
            if shape.is_degenerate() {
                skipped_degenerate += 1;
            } else {
                corpus.push(shape);
            }
        }
    }

    if corpus.is_empty() {
        return Err(AnchorkitError::EmptyCorpus {
            path: dir.to_path_buf(),
        });
    }

    let initial = match opts.seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            init_centroids(&corpus, opts.num_anchors, &mut rng)?
        }
        None => {
            let mut rng = rand::rng();
            init_centroids(&corpus, opts.num_anchors, &mut rng)?
        }
    };

    let outcome = cluster(
        &corpus,
        initial,
        &ClusterOptions {
            eps: opts.eps,
            max_iterations: opts.max_iterations,
            empty_cluster: opts.empty_cluster,
        },
    )?;

    let normalized = opts
        .normalize
        .map(|(image_size, map_size)| normalize_anchors(&outcome.centroids, image_size, map_size));

    Ok(AnchorReport {
        corpus_size: corpus.len(),
        skipped_degenerate,
        num_anchors: opts.num_anchors,
        iterations: outcome.iterations,
        converged: outcome.converged,
        centroids: outcome.centroids,
        normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_of_identical_shapes_is_one() {
        let x = BoxShape::new(10.0, 20.0);
        assert_eq!(overlap_pair(x, x), 1.0);
    }

    #[test]
    fn overlap_branches_cover_all_orderings() {
        let x = BoxShape::new(10.0, 20.0);

        // centroid contains the box: intersection is the box itself
        assert!((overlap_pair(x, BoxShape::new(20.0, 40.0)) - 0.25).abs() < 1e-12);
        // box contains the centroid: intersection is the centroid
        assert!((overlap_pair(x, BoxShape::new(5.0, 10.0)) - 0.25).abs() < 1e-12);
        // mixed: centroid wider, box taller
        let mixed = overlap_pair(x, BoxShape::new(20.0, 10.0));
        assert!((mixed - 100.0 / (200.0 + 100.0)).abs() < 1e-12);
    }

    #[test]
    fn from_corners_tolerates_swapped_corners() {
        let a = BoxShape::from_corners(10.0, 10.0, 30.0, 50.0);
        let b = BoxShape::from_corners(30.0, 50.0, 10.0, 10.0);
        assert_eq!(a, b);
        assert_eq!(a.w, 20.0);
        assert_eq!(a.h, 40.0);
    }

    #[test]
    fn init_rejects_zero_and_oversized_k() {
        let corpus = vec![BoxShape::new(1.0, 1.0); 3];
        let mut rng = StdRng::seed_from_u64(7);
        assert!(init_centroids(&corpus, 0, &mut rng).is_err());
        assert!(init_centroids(&corpus, 4, &mut rng).is_err());
        assert!(init_centroids(&corpus, 3, &mut rng).is_ok());
    }

    #[test]
    fn cluster_rejects_degenerate_corpus() {
        let corpus = vec![BoxShape::new(10.0, 10.0), BoxShape::new(0.0, 5.0)];
        let initial = vec![BoxShape::new(10.0, 10.0)];
        let err = cluster(&corpus, initial, &ClusterOptions::default()).unwrap_err();
        assert!(matches!(err, AnchorkitError::DegenerateBox { .. }));
    }

    #[test]
    fn identical_corpus_converges_immediately() {
        let corpus = vec![BoxShape::new(10.0, 20.0); 40];
        let mut rng = StdRng::seed_from_u64(1);
        let initial = init_centroids(&corpus, 3, &mut rng).unwrap();

        let outcome = cluster(&corpus, initial, &ClusterOptions::default()).unwrap();
        assert!(outcome.converged);
        assert!(outcome.iterations <= 2);
        for c in &outcome.centroids {
            assert_eq!(*c, BoxShape::new(10.0, 20.0));
        }
    }

    #[test]
    fn normalize_scales_per_axis() {
        let anchors = vec![BoxShape::new(416.0, 208.0)];
        let normalized = normalize_anchors(&anchors, (416.0, 416.0), (13.0, 13.0));
        assert_eq!(normalized[0], BoxShape::new(13.0, 6.5));
    }

    #[test]
    fn reseed_moves_dead_centroid_onto_farthest_box() {
        let corpus = vec![
            BoxShape::new(10.0, 10.0),
            BoxShape::new(11.0, 11.0),
            BoxShape::new(100.0, 100.0),
        ];
        // Both centroids sit on the small cluster; with Keep, the duplicate
        // would shadow its twin and the far box dominates one mean. Force
        // the dead-cluster path with a centroid nothing is nearest to.
        let centroids = vec![BoxShape::new(10.0, 10.0), BoxShape::new(10.0, 10.0)];
        let distances = distance_matrix(&corpus, &centroids);
        let assignments = assign(&distances);
        // Ties break to index 0, so cluster 1 is empty.
        assert!(assignments.iter().all(|&a| a == 0));

        let kept = refine(
            &corpus,
            &centroids,
            &assignments,
            &distances,
            EmptyClusterPolicy::Keep,
        );
        assert_eq!(kept[1], BoxShape::new(10.0, 10.0));

        let reseeded = refine(
            &corpus,
            &centroids,
            &assignments,
            &distances,
            EmptyClusterPolicy::Reseed,
        );
        assert_eq!(reseeded[1], BoxShape::new(100.0, 100.0));
    }
}
