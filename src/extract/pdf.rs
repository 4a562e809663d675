//! PDF text extraction (runs inside the worker only).
use anyhow::{anyhow, Context, Result};
use lopdf::Document;

/// Prefix of the per-page marker line, followed by the 1-based page number.
pub const PAGE_MARKER_PREFIX: &str = "--- Page ";

/// How far into the payload the `%PDF` header may appear.
const HEADER_SEARCH_BYTES: usize = 1024;

/// Join page texts with stable `--- Page N ---` markers.
pub fn paginate<S: AsRef<str>>(pages: &[S]) -> String {
    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        out.push_str(&format!(
            "{PAGE_MARKER_PREFIX}{} ---\n{}\n\n",
            idx + 1,
            page.as_ref().trim()
        ));
    }
    out
}

pub(super) fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(anyhow!("document is empty"));
    }
    let has_header = bytes
        .windows(4)
        .take(HEADER_SEARCH_BYTES)
        .any(|window| window == b"%PDF");
    if !has_header {
        return Err(anyhow!("payload is not a PDF (missing %PDF header)"));
    }

    let document = Document::load_mem(bytes).context("parse PDF structure")?;
    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(anyhow!("PDF has no pages"));
    }

    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = document
            .extract_text(&[*page_number])
            .with_context(|| format!("extract text from page {page_number}"))?;
        texts.push(text);
    }
    if texts.iter().all(|text| text.trim().is_empty()) {
        return Err(anyhow!(
            "no extractable text in {} page(s); the PDF may be scanned images",
            texts.len()
        ));
    }
    Ok(paginate(&texts))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build an in-memory PDF with one text line per page.
    pub(crate) fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let stream = Stream::new(dictionary! {}, content.encode().expect("encode content"));
            let content_id = doc.add_object(stream);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }
}
