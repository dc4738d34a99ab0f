//! Train/test dataset splitting.
//!
//! Pairs each annotation file with its image, shuffles the pairs with a
//! caller-seedable RNG, splits by ratio, and copies both halves into a
//! `{train,test}/{annotations,images}` layout under the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::error::AnchorkitError;
use crate::voc;

/// Options for dataset splitting.
#[derive(Clone, Debug)]
pub struct SplitOptions {
    /// Fraction of the dataset that goes to the train subset, in (0, 1).
    pub train_ratio: f64,
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: None,
        }
    }
}

/// Result of a split run.
#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    pub train: usize,
    pub test: usize,
    /// Annotation files dropped because no matching image was found.
    pub skipped_missing_image: usize,
}

struct DatasetPair {
    annotation: PathBuf,
    image: PathBuf,
}

/// Splits the dataset under `annotations_dir`/`images_dir` into train and
/// test subsets under `out_dir`.
pub fn split_dataset(
    annotations_dir: &Path,
    images_dir: &Path,
    out_dir: &Path,
    opts: &SplitOptions,
) -> Result<SplitReport, AnchorkitError> {
    if !(0.0 < opts.train_ratio && opts.train_ratio < 1.0) {
        return Err(AnchorkitError::SplitFailed {
            message: "--ratio must be in the interval (0.0, 1.0)".to_string(),
        });
    }
    if !images_dir.is_dir() {
        return Err(AnchorkitError::SplitFailed {
            message: format!("images directory {} does not exist", images_dir.display()),
        });
    }

    let annotation_files = voc::collect_xml_files(annotations_dir)?;
    if annotation_files.is_empty() {
        return Err(AnchorkitError::SplitFailed {
            message: format!(
                "no annotation files found under {}",
                annotations_dir.display()
            ),
        });
    }

    let mut pairs = Vec::new();
    let mut skipped_missing_image = 0usize;

    for annotation in annotation_files {
        match locate_image(&annotation, images_dir)? {
            Some(image) => pairs.push(DatasetPair { annotation, image }),
            None => {
                eprintln!(
                    "Warning: no image found for {}; skipping",
                    annotation.display()
                );
                skipped_missing_image += 1;
            }
        }
    }

    if pairs.is_empty() {
        return Err(AnchorkitError::SplitFailed {
            message: "no annotation file has a matching image".to_string(),
        });
    }

    if let Some(seed) = opts.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        pairs.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        pairs.shuffle(&mut rng);
    }

    let train_count = (pairs.len() as f64 * opts.train_ratio) as usize;
    let (train_pairs, test_pairs) = pairs.split_at(train_count);

    copy_subset(train_pairs, out_dir, "train")?;
    copy_subset(test_pairs, out_dir, "test")?;

    Ok(SplitReport {
        train: train_pairs.len(),
        test: test_pairs.len(),
        skipped_missing_image,
    })
}

/// Finds the image an annotation file refers to.
///
/// Prefers the `<filename>` recorded inside the XML; falls back to the
/// annotation's own stem with a `.jpg` extension, which is how older VOC
/// dumps pair files.
fn locate_image(
    annotation: &Path,
    images_dir: &Path,
) -> Result<Option<PathBuf>, AnchorkitError> {
    let parsed = voc::parse_voc_file(annotation)?;

    let by_filename = images_dir.join(&parsed.image);
    if by_filename.is_file() {
        return Ok(Some(by_filename));
    }

    if let Some(stem) = annotation.file_stem() {
        let by_stem = images_dir.join(Path::new(stem).with_extension("jpg"));
        if by_stem.is_file() {
            return Ok(Some(by_stem));
        }
    }

    Ok(None)
}

fn copy_subset(pairs: &[DatasetPair], out_dir: &Path, subset: &str) -> Result<(), AnchorkitError> {
    let annotations_dir = out_dir.join(subset).join("annotations");
    let images_dir = out_dir.join(subset).join("images");

    fs::create_dir_all(&annotations_dir).map_err(AnchorkitError::Io)?;
    fs::create_dir_all(&images_dir).map_err(AnchorkitError::Io)?;

    for pair in pairs {
        copy_into(&pair.annotation, &annotations_dir)?;
        copy_into(&pair.image, &images_dir)?;
    }

    Ok(())
}

fn copy_into(source: &Path, target_dir: &Path) -> Result<(), AnchorkitError> {
    let name = source
        .file_name()
        .ok_or_else(|| AnchorkitError::SplitFailed {
            message: format!("{} has no file name", source.display()),
        })?;
    fs::copy(source, target_dir.join(name)).map_err(AnchorkitError::Io)?;
    Ok(())
}
