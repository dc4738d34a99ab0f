//! Pascal VOC XML annotation reader.
//!
//! anchorkit only needs two things from an annotation file: the image
//! filename and the corner coordinates of every `<bndbox>`. Class names,
//! poses, and the rest of the VOC schema are ignored. The reader scans a
//! directory flat (non-recursive), matching the layout the rest of the
//! pipeline produces.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use walkdir::WalkDir;

use crate::error::AnchorkitError;

const VOC_XML_EXTENSION: &str = "xml";

/// Corner coordinates of one annotated object.
///
/// No ordering is enforced between min and max; downstream consumers take
/// absolute differences.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxCorners {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// One parsed annotation file.
#[derive(Clone, Debug)]
pub struct VocAnnotation {
    /// Value of the `<filename>` element (the image this file annotates).
    pub image: String,
    pub boxes: Vec<BoxCorners>,
}

/// Collects the `*.xml` files directly under `dir`, sorted by file name.
///
/// Nested XML files are skipped with a warning; the VOC layouts this tool
/// works with keep all annotations flat.
pub fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, AnchorkitError> {
    if !dir.is_dir() {
        return Err(AnchorkitError::VocLayoutInvalid {
            path: dir.to_path_buf(),
            message: "input must be a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(AnchorkitError::Io)? {
        let entry = entry.map_err(AnchorkitError::Io)?;
        let path = entry.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let mut nested_xml = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).min_depth(2) {
        let entry = entry.map_err(|source| AnchorkitError::VocLayoutInvalid {
            path: dir.to_path_buf(),
            message: format!("failed while traversing annotations directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_xml_extension(entry.path()) {
            nested_xml.push(entry.path().to_path_buf());
        }
    }

    if !nested_xml.is_empty() {
        eprintln!(
            "Warning: annotation scan is flat (non-recursive); skipping {} nested .xml file(s)",
            nested_xml.len()
        );
    }

    Ok(files)
}

/// Parses one annotation file from disk.
pub fn parse_voc_file(path: &Path) -> Result<VocAnnotation, AnchorkitError> {
    let xml = fs::read_to_string(path).map_err(AnchorkitError::Io)?;
    parse_voc_str(&xml, path)
}

/// Parses VOC XML from a UTF-8 string.
///
/// This helper is primarily useful for testing/fuzzing parse behavior
/// in-memory.
pub fn from_voc_xml_str(xml: &str) -> Result<VocAnnotation, AnchorkitError> {
    parse_voc_str(xml, Path::new("<memory>"))
}

/// Parses VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<VocAnnotation, AnchorkitError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| AnchorkitError::VocXmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml)
}

fn parse_voc_str(xml: &str, path: &Path) -> Result<VocAnnotation, AnchorkitError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| AnchorkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(AnchorkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let image = required_child_text(annotation, "filename", path, "<annotation>")?;

    let mut boxes = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        boxes.push(BoxCorners {
            xmin: parse_required_f64(bndbox, "xmin", path, "<bndbox>")?,
            ymin: parse_required_f64(bndbox, "ymin", path, "<bndbox>")?,
            xmax: parse_required_f64(bndbox, "xmax", path, "<bndbox>")?,
            ymax: parse_required_f64(bndbox, "ymax", path, "<bndbox>")?,
        });
    }

    Ok(VocAnnotation { image, boxes })
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, AnchorkitError> {
    child_element(node, tag).ok_or_else(|| AnchorkitError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, AnchorkitError> {
    optional_child_text(node, tag).ok_or_else(|| AnchorkitError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn parse_required_f64(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<f64, AnchorkitError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<f64>().map_err(|_| AnchorkitError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!(
            "invalid <{tag}> value '{raw}' in {context}; expected floating-point number"
        ),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}
