//! Requirement-document parsing: pull the text out, pull the images out,
//! leave a numbered placeholder where each image sat.
//!
//! A `.docx` is a zip package; body text lives in `word/document.xml`, image
//! relationships in `word/_rels/document.xml.rels`, and the image bytes under
//! `word/media/`. The reader walks paragraphs in document order so
//! placeholders land where the images appeared.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use zip::ZipArchive;

use caseforge_core::{CaseError, Result};

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("paragraph regex"));
static TEXT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t[^>]*>(.*?)</w:t>").expect("text run regex"));
static EMBED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"r:embed="([^"]+)""#).expect("embed regex"));
static RELATIONSHIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<Relationship[^>]*Id="([^"]+)"[^>]*Target="([^"]+)"[^>]*/>"#)
        .expect("relationship regex")
});
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{IMAGE_PLACEHOLDER_(\d+)\}\}").expect("placeholder regex"));

/// One image lifted out of the document.
#[derive(Debug, Clone)]
pub struct DocImage {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Document text split into blocks, with images replaced by
/// `{{IMAGE_PLACEHOLDER_n}}` blocks indexing into `images`.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub blocks: Vec<String>,
    pub images: Vec<DocImage>,
}

impl ParsedDocument {
    /// Text with placeholders left in place (used when no vision model is
    /// configured).
    pub fn plain_text(&self) -> String {
        self.blocks.join("\n")
    }
}

pub fn placeholder(index: usize) -> String {
    format!("{{{{IMAGE_PLACEHOLDER_{index}}}}}")
}

/// Placeholder index of a block, if the block is one.
pub fn placeholder_index(block: &str) -> Option<usize> {
    PLACEHOLDER_RE
        .captures(block)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a requirement document by extension: `.docx` and `.txt` are
/// supported; anything else is rejected at the boundary.
pub fn parse_document(path: &Path) -> Result<ParsedDocument> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "docx" => parse_docx(path),
        "txt" => {
            let content = std::fs::read_to_string(path)?;
            Ok(ParsedDocument {
                blocks: vec![content],
                images: Vec::new(),
            })
        }
        other => Err(CaseError::document(
            path,
            format!("unsupported document format: .{other}"),
        )),
    }
}

fn parse_docx(path: &Path) -> Result<ParsedDocument> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| CaseError::document(path, format!("not a docx package: {e}")))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")
        .map_err(|e| CaseError::document(path, format!("missing document body: {e}")))?;
    let rels_xml = read_entry(&mut archive, "word/_rels/document.xml.rels").unwrap_or_default();

    let mut parsed = ParsedDocument::default();

    for paragraph in PARAGRAPH_RE.find_iter(&document_xml) {
        let paragraph = paragraph.as_str();

        let text: String = TEXT_RUN_RE
            .captures_iter(paragraph)
            .map(|caps| xml_unescape(&caps[1]))
            .collect();
        let text = text.trim().to_owned();

        let mut had_image = false;
        for caps in EMBED_RE.captures_iter(paragraph) {
            if let Some(image) = load_image(&mut archive, &rels_xml, &caps[1]) {
                parsed.blocks.push(placeholder(parsed.images.len()));
                parsed.images.push(image);
                had_image = true;
            }
        }

        if !had_image && !text.is_empty() {
            parsed.blocks.push(text);
        } else if had_image && !text.is_empty() {
            // Caption-style paragraphs keep their text after the placeholder.
            parsed.blocks.push(text);
        }
    }

    tracing::debug!(
        blocks = parsed.blocks.len(),
        images = parsed.images.len(),
        "parsed docx"
    );
    Ok(parsed)
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> std::io::Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Resolve a relationship id to its media part and pull the bytes.
fn load_image(archive: &mut ZipArchive<File>, rels_xml: &str, rel_id: &str) -> Option<DocImage> {
    let target = RELATIONSHIP_RE
        .captures_iter(rels_xml)
        .find(|caps| &caps[1] == rel_id)
        .map(|caps| caps[2].to_owned())?;

    let part_name = if target.starts_with('/') {
        target.trim_start_matches('/').to_owned()
    } else {
        format!("word/{target}")
    };

    let mut entry = archive.by_name(&part_name).ok()?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).ok()?;

    let name = part_name
        .rsplit('/')
        .next()
        .unwrap_or(&part_name)
        .to_owned();
    let mime = mime_for(&name);

    Some(DocImage { name, mime, bytes })
}

fn mime_for(name: &str) -> String {
    let mime = match name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    };
    mime.to_owned()
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn write_docx(dir: &TempDir, body: &str, rels: &str, media: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.path().join("requirement.docx");
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        zip.start_file("word/_rels/document.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        for (name, bytes) in media {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_paragraph_text_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_docx(
            &dir,
            "<w:document><w:body>\
             <w:p ><w:r><w:t>需求一</w:t></w:r></w:p>\
             <w:p ><w:r><w:t>用户名长度为</w:t></w:r><w:r><w:t>3-20个字符</w:t></w:r></w:p>\
             </w:body></w:document>",
            "",
            &[],
        );

        let parsed = parse_document(&path).unwrap();
        assert_eq!(parsed.blocks, vec!["需求一", "用户名长度为3-20个字符"]);
        assert!(parsed.images.is_empty());
    }

    #[test]
    fn test_image_becomes_placeholder() {
        let dir = TempDir::new().unwrap();
        let path = write_docx(
            &dir,
            "<w:document><w:body>\
             <w:p ><w:r><w:t>before</w:t></w:r></w:p>\
             <w:p ><w:drawing><a:blip r:embed=\"rId7\"/></w:drawing></w:p>\
             <w:p ><w:r><w:t>after</w:t></w:r></w:p>\
             </w:body></w:document>",
            "<Relationships><Relationship Id=\"rId7\" Type=\"image\" Target=\"media/image1.png\"/></Relationships>",
            &[("word/media/image1.png", b"\x89PNG-bytes")],
        );

        let parsed = parse_document(&path).unwrap();
        assert_eq!(
            parsed.blocks,
            vec!["before", "{{IMAGE_PLACEHOLDER_0}}", "after"]
        );
        assert_eq!(parsed.images.len(), 1);
        assert_eq!(parsed.images[0].name, "image1.png");
        assert_eq!(parsed.images[0].mime, "image/png");
        assert_eq!(parsed.images[0].bytes, b"\x89PNG-bytes");
    }

    #[test]
    fn test_entities_unescaped() {
        let dir = TempDir::new().unwrap();
        let path = write_docx(
            &dir,
            "<w:document><w:body><w:p ><w:r><w:t>a &amp; b &lt;c&gt;</w:t></w:r></w:p></w:body></w:document>",
            "",
            &[],
        );
        let parsed = parse_document(&path).unwrap();
        assert_eq!(parsed.blocks, vec!["a & b <c>"]);
    }

    #[test]
    fn test_txt_passes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirement.txt");
        std::fs::write(&path, "开发一个用户注册功能").unwrap();
        let parsed = parse_document(&path).unwrap();
        assert_eq!(parsed.plain_text(), "开发一个用户注册功能");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirement.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let err = parse_document(&path).unwrap_err();
        assert!(matches!(err, CaseError::Document { .. }));
    }

    #[test]
    fn test_placeholder_index() {
        assert_eq!(placeholder_index("{{IMAGE_PLACEHOLDER_3}}"), Some(3));
        assert_eq!(placeholder_index("plain text"), None);
    }
}
