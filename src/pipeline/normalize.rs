//! Extension normalization: an image filename → its canonical document name.
//!
//! ## Why one function?
//!
//! The same name appears in three places — the existence check, the archive
//! path after conversion, and the published `SurveyUrl`. If any of those
//! computed the canonical form differently, the loop would re-download
//! documents it already holds, or publish links to files that do not exist.
//! Every caller goes through [`document_name`] so divergence is impossible.
//!
//! Only the *trailing* extension is replaced. Names can legitimately contain
//! a recognized substring earlier in the name (`1.jpg.jpeg`), and a naive
//! substring replace would corrupt the stem.

/// The document extension every recognized source format converts to.
pub const DOCUMENT_EXT: &str = "pdf";

/// Image extensions recognized as convertible sources. Case-sensitive: the
/// remote catalog names files in lowercase and the filesystem keys on the
/// exact string.
pub const SOURCE_EXTS: [&str; 4] = ["tif", "tiff", "jpg", "jpeg"];

/// Map an image filename to its canonical published form.
///
/// A trailing recognized extension is replaced with `.pdf`; any other name
/// passes through unchanged, which also makes the function idempotent
/// (`x.pdf` → `x.pdf`).
pub fn document_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if SOURCE_EXTS.contains(&ext) => format!("{stem}.{DOCUMENT_EXT}"),
        _ => name.to_string(),
    }
}

/// The trailing extension of a filename, if any.
pub fn trailing_ext(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_each_source_extension() {
        assert_eq!(document_name("survey1.tif"), "survey1.pdf");
        assert_eq!(document_name("survey1.tiff"), "survey1.pdf");
        assert_eq!(document_name("survey1.jpg"), "survey1.pdf");
        assert_eq!(document_name("survey1.jpeg"), "survey1.pdf");
    }

    #[test]
    fn only_the_trailing_extension_is_replaced() {
        assert_eq!(document_name("1.jpg.jpeg"), "1.jpg.pdf");
        assert_eq!(document_name("a.tiff.tif"), "a.tiff.pdf");
    }

    #[test]
    fn unrecognized_extensions_pass_through() {
        assert_eq!(document_name("scan.bmp"), "scan.bmp");
        assert_eq!(document_name("notes.txt"), "notes.txt");
        assert_eq!(document_name("noext"), "noext");
    }

    #[test]
    fn idempotent_on_normalized_names() {
        let once = document_name("survey1.tif");
        assert_eq!(document_name(&once), once);
    }

    #[test]
    fn case_sensitive_matching() {
        // Uppercase extensions are not in the recognized set.
        assert_eq!(document_name("SURVEY.TIF"), "SURVEY.TIF");
    }
}
