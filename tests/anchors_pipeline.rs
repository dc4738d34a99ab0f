use std::fs;
use std::path::Path;

use anchorkit::anchors::persist::{read_anchors, write_anchors, OverwritePolicy};
use anchorkit::anchors::{derive_anchors, AnchorOptions, BoxShape};
use anchorkit::AnchorkitError;

fn write_annotation(dir: &Path, stem: &str, boxes: &[(i64, i64, i64, i64)]) {
    let mut xml = String::from("<annotation>\n");
    xml.push_str(&format!("  <filename>{stem}.jpg</filename>\n"));
    for (xmin, ymin, xmax, ymax) in boxes {
        xml.push_str(&format!(
            "  <object><name>thing</name><bndbox>\
             <xmin>{xmin}</xmin><ymin>{ymin}</ymin>\
             <xmax>{xmax}</xmax><ymax>{ymax}</ymax>\
             </bndbox></object>\n"
        ));
    }
    xml.push_str("</annotation>\n");
    fs::write(dir.join(format!("{stem}.xml")), xml).expect("write annotation");
}

#[test]
fn derives_anchors_from_voc_directory() {
    let temp = tempfile::tempdir().expect("create temp dir");

    // Two shape populations: 20x20-ish and 100x40-ish.
    for i in 0..10 {
        write_annotation(
            temp.path(),
            &format!("small{i}"),
            &[(0, 0, 20 + i, 20 + i)],
        );
        write_annotation(
            temp.path(),
            &format!("large{i}"),
            &[(0, 0, 100 + i, 40 + i)],
        );
    }

    let report = derive_anchors(
        temp.path(),
        &AnchorOptions {
            num_anchors: 2,
            seed: Some(42),
            ..AnchorOptions::default()
        },
    )
    .expect("derive anchors");

    assert_eq!(report.corpus_size, 20);
    assert_eq!(report.num_anchors, 2);
    assert_eq!(report.centroids.len(), 2);
    assert!(report.iterations >= 1);
    for centroid in &report.centroids {
        assert!(centroid.w > 0.0 && centroid.h > 0.0);
    }
}

#[test]
fn zero_area_boxes_are_filtered_and_counted() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_annotation(temp.path(), "ok", &[(0, 0, 30, 40), (5, 5, 50, 60)]);
    // Degenerate: xmin == xmax.
    write_annotation(temp.path(), "flat", &[(10, 10, 10, 40)]);

    let report = derive_anchors(
        temp.path(),
        &AnchorOptions {
            num_anchors: 2,
            seed: Some(1),
            ..AnchorOptions::default()
        },
    )
    .expect("derive anchors");

    assert_eq!(report.corpus_size, 2);
    assert_eq!(report.skipped_degenerate, 1);
}

#[test]
fn empty_directory_is_an_empty_corpus_error() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let err = derive_anchors(temp.path(), &AnchorOptions::default()).unwrap_err();
    assert!(matches!(err, AnchorkitError::EmptyCorpus { .. }));
}

#[test]
fn annotations_without_objects_are_an_empty_corpus_error() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_annotation(temp.path(), "empty", &[]);

    let err = derive_anchors(temp.path(), &AnchorOptions::default()).unwrap_err();
    assert!(matches!(err, AnchorkitError::EmptyCorpus { .. }));
}

#[test]
fn corner_order_does_not_matter() {
    let temp = tempfile::tempdir().expect("create temp dir");
    // Corners deliberately swapped; widths/heights must come out positive.
    write_annotation(temp.path(), "swapped", &[(30, 40, 10, 10), (10, 10, 30, 40)]);

    let report = derive_anchors(
        temp.path(),
        &AnchorOptions {
            num_anchors: 1,
            seed: Some(9),
            ..AnchorOptions::default()
        },
    )
    .expect("derive anchors");

    assert_eq!(report.centroids[0], BoxShape::new(20.0, 30.0));
}

#[test]
fn normalization_is_reported_alongside_raw_centroids() {
    let temp = tempfile::tempdir().expect("create temp dir");
    for i in 0..4 {
        write_annotation(temp.path(), &format!("f{i}"), &[(0, 0, 416, 208)]);
    }

    let report = derive_anchors(
        temp.path(),
        &AnchorOptions {
            num_anchors: 1,
            seed: Some(0),
            normalize: Some(((416.0, 416.0), (13.0, 13.0))),
            ..AnchorOptions::default()
        },
    )
    .expect("derive anchors");

    assert_eq!(report.centroids[0], BoxShape::new(416.0, 208.0));
    let normalized = report.normalized.expect("normalized anchors");
    assert_eq!(normalized[0], BoxShape::new(13.0, 6.5));
}

#[test]
fn persistence_roundtrip_preserves_pairs() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("anchors.txt");
    let anchors = vec![BoxShape::new(3.0, 4.0), BoxShape::new(5.0, 6.0)];

    write_anchors(&path, &anchors, OverwritePolicy::FailIfExists).expect("write anchors");

    let content = fs::read_to_string(&path).expect("read raw content");
    assert_eq!(content, "3,4 5,6 ");
    assert_eq!(read_anchors(&path).expect("parse anchors"), anchors);
}
