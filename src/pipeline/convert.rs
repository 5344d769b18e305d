//! Format conversion: a downloaded source image → the canonical PDF.
//!
//! Two variants, one per supported source family:
//!
//! * **tiff** — delegated to the external `tiff2pdf` tool (`-z -o <dest>
//!   <src>`), the only robust path for the multi-strip/multi-compression
//!   TIFFs the county scanner produces. The invocation blocks only its own
//!   task; the process is awaited via `tokio::process`.
//! * **jpeg** — handled in-process: JPEG is already a valid PDF image
//!   encoding (DCTDecode), so the bytes are embedded verbatim as an image
//!   XObject on a single page sized to the pixel dimensions. No transcode,
//!   no quality loss.
//!
//! ## Cleanup policy
//!
//! Both variants delete the source file only after the document has been
//! fully written; on any failure the source stays on disk as a diagnostic
//! artifact. The existence check looks only for the converted form, so a
//! leftover source never suppresses the retry on the next run.

use crate::error::RecordError;
use crate::pipeline::normalize;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// A supported source image format, derived from the trailing extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.tif` / `.tiff` — converted by the external tool.
    Tiff,
    /// `.jpg` / `.jpeg` — embedded in-process.
    Jpeg,
}

impl SourceFormat {
    /// Classify a filename by its trailing extension. `None` means the
    /// record is not convertible and must be rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize::trailing_ext(name) {
            Some("tif") | Some("tiff") => Some(Self::Tiff),
            Some("jpg") | Some("jpeg") => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Convert `source` into the canonical document at `dest`, deleting the
/// source on success.
///
/// Unsupported input is rejected with [`RecordError::UnsupportedFormat`]
/// before anything touches the disk. Conversion failures leave the source
/// file in place.
pub async fn convert_to_document(
    source: &Path,
    dest: &Path,
    tiff2pdf_program: &Path,
) -> Result<(), RecordError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let format = SourceFormat::from_name(name).ok_or_else(|| RecordError::UnsupportedFormat {
        name: name.to_string(),
    })?;

    match format {
        SourceFormat::Tiff => tiff_to_pdf(source, dest, tiff2pdf_program).await?,
        SourceFormat::Jpeg => jpeg_to_pdf(source, dest).await?,
    }

    debug!("converted {} → {}", source.display(), dest.display());

    if let Err(e) = tokio::fs::remove_file(source).await {
        // The document is already in place; a lingering source only costs
        // disk space and is picked up by hand.
        warn!("could not remove source {}: {e}", source.display());
    }
    Ok(())
}

/// Run the external tiff converter against the source path.
async fn tiff_to_pdf(source: &Path, dest: &Path, program: &Path) -> Result<(), RecordError> {
    let output = Command::new(program)
        .arg("-z")
        .arg("-o")
        .arg(dest)
        .arg(source)
        .output()
        .await
        .map_err(|e| RecordError::Conversion {
            path: source.to_path_buf(),
            reason: format!("failed to run {}: {e}", program.display()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("{} exited with {}", program.display(), output.status)
        } else {
            stderr
        };
        return Err(RecordError::Conversion {
            path: source.to_path_buf(),
            reason,
        });
    }
    Ok(())
}

/// Embed the jpeg bytes in a single-page PDF, written atomically to `dest`.
async fn jpeg_to_pdf(source: &Path, dest: &Path) -> Result<(), RecordError> {
    let conversion_err = |reason: String| RecordError::Conversion {
        path: source.to_path_buf(),
        reason,
    };

    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| conversion_err(format!("read source: {e}")))?;

    // PDF assembly is CPU work; keep it off the async workers.
    let pdf = tokio::task::spawn_blocking(move || build_jpeg_document(&bytes))
        .await
        .map_err(|e| conversion_err(format!("encode task panicked: {e}")))?
        .map_err(conversion_err)?;

    let tmp = dest.with_extension("pdf.tmp");
    tokio::fs::write(&tmp, &pdf)
        .await
        .map_err(|e| conversion_err(format!("write document: {e}")))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(|e| conversion_err(format!("rename document: {e}")))?;
    Ok(())
}

/// Build a one-page PDF carrying the jpeg as a DCTDecode image XObject.
///
/// The page media box matches the pixel dimensions (1 px = 1 pt), the same
/// sizing the published viewers expect.
fn build_jpeg_document(jpeg: &[u8]) -> Result<Vec<u8>, String> {
    let decoded = image::load_from_memory(jpeg).map_err(|e| format!("decode jpeg: {e}"))?;
    let (width, height) = (decoded.width() as i64, decoded.height() as i64);
    let color_space = if decoded.color().channel_count() == 1 {
        "DeviceGray"
    } else {
        "DeviceRGB"
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().map_err(|e| format!("encode content: {e}"))?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| format!("serialise pdf: {e}"))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn sample_jpeg() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 30, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .expect("encode sample jpeg");
        buf
    }

    #[test]
    fn format_detection() {
        assert_eq!(SourceFormat::from_name("a.tif"), Some(SourceFormat::Tiff));
        assert_eq!(SourceFormat::from_name("a.tiff"), Some(SourceFormat::Tiff));
        assert_eq!(SourceFormat::from_name("a.jpg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_name("a.jpeg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_name("a.bmp"), None);
        assert_eq!(SourceFormat::from_name("a"), None);
        // Detection is on the trailing extension only.
        assert_eq!(SourceFormat::from_name("a.tif.bmp"), None);
    }

    #[test]
    fn jpeg_document_is_a_pdf() {
        let pdf = build_jpeg_document(&sample_jpeg()).expect("build document");
        assert!(pdf.starts_with(b"%PDF"), "output must carry the PDF magic");
        // The jpeg bytes are embedded verbatim (DCTDecode, no transcode).
        let jpeg = sample_jpeg();
        assert!(
            pdf.windows(jpeg.len()).any(|w| w == jpeg.as_slice()),
            "jpeg payload must appear unmodified in the document"
        );
    }

    #[test]
    fn garbage_jpeg_is_rejected() {
        let err = build_jpeg_document(b"not a jpeg").unwrap_err();
        assert!(err.contains("decode"), "got: {err}");
    }

    #[tokio::test]
    async fn unsupported_input_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.bmp");
        std::fs::write(&source, b"BM").unwrap();

        let err = convert_to_document(&source, &dir.path().join("scan.pdf"), Path::new("tiff2pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::UnsupportedFormat { .. }));
        assert!(source.exists(), "rejected input must not be deleted");
        assert!(!dir.path().join("scan.pdf").exists());
    }

    #[tokio::test]
    async fn jpeg_conversion_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s1.jpg");
        let dest = dir.path().join("s1.pdf");
        std::fs::write(&source, sample_jpeg()).unwrap();

        convert_to_document(&source, &dest, Path::new("tiff2pdf"))
            .await
            .expect("jpeg conversion should succeed");

        assert!(dest.exists());
        assert!(!source.exists(), "source is removed after a successful convert");
        let written = std::fs::read(&dest).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn missing_tool_leaves_source_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s1.tif");
        let dest = dir.path().join("s1.pdf");
        std::fs::write(&source, b"II*\0").unwrap();

        let err = convert_to_document(&source, &dest, Path::new("no-such-converter-binary"))
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::Conversion { .. }));
        assert!(source.exists(), "failed conversion keeps the source for diagnosis");
        assert!(!dest.exists());
    }
}
