use futures::future::BoxFuture;
use lopdf::{Document, Object, ObjectId, Stream};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::Tool;
use syllabot_core::types::{ToolContext, ToolResult};

use crate::http;

/// Extract the text of every page in page order.
///
/// Any page that cannot be decoded fails the whole document with
/// [`SyllabotError::Parse`]; there is no partial result.
pub fn page_texts(bytes: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(bytes).map_err(|e| SyllabotError::Parse(e.to_string()))?;

    doc.get_pages()
        .into_iter()
        .map(|(number, page_id)| page_text(&doc, number, page_id))
        .collect()
}

fn page_text(doc: &Document, number: u32, page_id: ObjectId) -> Result<String> {
    for content_id in doc.get_page_contents(page_id) {
        let stream = doc
            .get_object(content_id)
            .and_then(Object::as_stream)
            .map_err(|e| page_error(number, e))?;
        if !stream_decodes(stream) {
            debug!(page = number, object = ?content_id, "Undecodable content stream");
            return Err(page_error(number, "content stream could not be decoded"));
        }
    }
    doc.extract_text(&[number]).map_err(|e| page_error(number, e))
}

fn page_error(number: u32, reason: impl std::fmt::Display) -> SyllabotError {
    SyllabotError::Parse(format!("page {}: {}", number, reason))
}

/// lopdf logs and swallows zlib failures, so a corrupt stream would otherwise
/// read as an empty page.
fn stream_decodes(stream: &Stream) -> bool {
    let filters = match stream.filters() {
        Ok(filters) if !filters.is_empty() => filters,
        _ => return true,
    };
    if stream.content.is_empty() {
        return true;
    }
    match stream.decompressed_content() {
        Ok(decoded) if !decoded.is_empty() => true,
        // An empty page compressed with zlib still carries a valid header
        Ok(_) => filters.first().map(String::as_str) == Some("FlateDecode") && has_zlib_header(&stream.content),
        Err(_) => false,
    }
}

fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

/// Concatenate page texts, each non-empty page followed by exactly one `\n`.
///
/// Line breaks the PDF library leaves at the end of a page are trimmed first,
/// so an empty page contributes nothing at all.
pub fn join_page_texts<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref().trim_end_matches(['\n', '\r']);
        if !page.is_empty() {
            text.push_str(page);
            text.push('\n');
        }
    }
    text
}

/// Downloads a PDF into memory and extracts its text.
pub struct DocumentExtractor {
    http: Client,
}

impl DocumentExtractor {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub async fn extract(&self, pdf_url: &str) -> Result<String> {
        if pdf_url.trim().is_empty() {
            return Err(SyllabotError::ToolValidation("'pdf_url' must not be empty".into()));
        }

        let bytes = http::get_bytes(&self.http, pdf_url).await?;
        let pages = page_texts(&bytes)?;
        let text = join_page_texts(&pages);
        info!(pdf_url, pages = pages.len(), chars = text.chars().count(), "Extracted PDF text");
        Ok(text)
    }
}

pub struct ReadPdfTool {
    extractor: DocumentExtractor,
}

impl ReadPdfTool {
    pub fn new(extractor: DocumentExtractor) -> Self {
        Self { extractor }
    }
}

#[derive(Deserialize)]
struct ReadPdfInput {
    pdf_url: String,
}

impl Tool for ReadPdfTool {
    fn name(&self) -> &str {
        "read_pdf"
    }

    fn description(&self) -> &str {
        "Download a PDF by URL and return the text of all its pages, one page after another."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pdf_url": {
                    "type": "string",
                    "description": "Absolute URL of the PDF to read"
                }
            },
            "required": ["pdf_url"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        120
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: ReadPdfInput = serde_json::from_value(input)
                .map_err(|e| SyllabotError::ToolValidation(e.to_string()))?;
            let text = self.extractor.extract(&params.pdf_url).await?;
            Ok(ToolResult::success(text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use syllabot_core::config::HttpConfig;
    use syllabot_test_utils::{pdf_with_pages, test_tool_context};

    fn extractor() -> DocumentExtractor {
        DocumentExtractor::new(crate::http::build_client(&HttpConfig::default()).unwrap())
    }

    #[test]
    fn test_join_skips_empty_pages() {
        assert_eq!(join_page_texts(["A", "", "B"]), "A\nB\n");
        assert_eq!(join_page_texts(["A\n", "\n", "B\r\n"]), "A\nB\n");
        assert_eq!(join_page_texts(Vec::<String>::new()), "");
    }

    #[test]
    fn test_join_keeps_inner_line_breaks() {
        assert_eq!(join_page_texts(["line 1\nline 2\n"]), "line 1\nline 2\n");
    }

    #[test]
    fn test_page_texts_in_page_order() {
        let pdf = pdf_with_pages(&["First", "Second"]);
        let pages = page_texts(&pdf).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("First"));
        assert!(pages[1].contains("Second"));
    }

    #[test]
    fn test_unparseable_bytes() {
        let err = page_texts(b"definitely not a pdf").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    /// Replace the content stream of one page with `stream`.
    fn with_page_stream(pdf: &[u8], page: u32, stream: lopdf::Stream) -> Vec<u8> {
        let mut doc = Document::load_mem(pdf).unwrap();
        let page_id = doc.get_pages()[&page];
        let content_id = doc.get_page_contents(page_id)[0];
        doc.objects.insert(content_id, Object::Stream(stream));
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_corrupt_page_stream_fails_whole_document() {
        let pdf = with_page_stream(
            &pdf_with_pages(&["A", "B", "C"]),
            2,
            Stream::new(
                lopdf::dictionary! { "Filter" => "FlateDecode" },
                b"not zlib at all".to_vec(),
            ),
        );

        let err = page_texts(&pdf).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("page 2"));
    }

    #[test]
    fn test_compressed_blank_page_is_empty() {
        // zlib encoding of zero bytes
        let empty_zlib = vec![0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
        let pdf = with_page_stream(
            &pdf_with_pages(&["A", "B", "C"]),
            2,
            Stream::new(lopdf::dictionary! { "Filter" => "FlateDecode" }, empty_zlib),
        );

        let pages = page_texts(&pdf).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(join_page_texts(&pages).lines().count(), 2);
    }

    #[tokio::test]
    async fn test_extract_three_pages_with_blank_middle() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/files/x.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(pdf_with_pages(&["A", "", "B"]))
            .create_async()
            .await;

        let text = extractor()
            .extract(&format!("{}/files/x.pdf", server.url()))
            .await
            .unwrap();
        assert_eq!(text, "A\nB\n");
    }

    #[tokio::test]
    async fn test_extract_zero_pages() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/empty.pdf")
            .with_status(200)
            .with_body(pdf_with_pages(&[]))
            .create_async()
            .await;

        let text = extractor()
            .extract(&format!("{}/empty.pdf", server.url()))
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_http_error_stops_before_parse() {
        let mut server = Server::new_async().await;
        // Body is a valid PDF; a 404 must still fail as a fetch error
        let _m = server
            .mock("GET", "/gone.pdf")
            .with_status(404)
            .with_body(pdf_with_pages(&["A"]))
            .create_async()
            .await;

        let err = extractor()
            .extract(&format!("{}/gone.pdf", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "fetch");
    }

    #[tokio::test]
    async fn test_garbage_body_is_parse_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/bad.pdf")
            .with_status(200)
            .with_body("<html>not a pdf</html>")
            .create_async()
            .await;

        let err = extractor()
            .extract(&format!("{}/bad.pdf", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_tool_rejects_missing_and_empty_url() {
        let tool = ReadPdfTool::new(extractor());
        let err = tool
            .execute(serde_json::json!({}), test_tool_context())
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolValidation(_)));

        let err = tool
            .execute(serde_json::json!({"pdf_url": "  "}), test_tool_context())
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabotError::ToolValidation(_)));
    }
}
