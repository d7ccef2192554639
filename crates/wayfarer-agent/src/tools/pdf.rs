//! PDF export tool.
//!
//! Writes a titled plain-text document to a PDF in the configured output
//! directory and answers with the [`ArtifactMarker`] announcement, which
//! lets a blocking run hand the file path straight back to its caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::{Value, json};
use tracing::info;

use crate::agent::ArtifactMarker;
use crate::error::{AgentError, Result};
use crate::llm::types::ToolDefinition;
use crate::tools::Tool;

/// Name advertised to the model.
pub const PDF_TOOL_NAME: &str = "generate_pdf";

/// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;

const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const LINE_HEIGHT: i64 = 13;

/// Lines that fit between the top and bottom margins.
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize;

/// Courier is monospaced, so a fixed column count fills the text width.
const COLUMNS: usize = 90;

/// Renders plans to PDF files.
#[derive(Debug, Clone)]
pub struct PdfTool {
    output_dir: PathBuf,
    marker: ArtifactMarker,
}

impl PdfTool {
    /// Create a tool writing into `output_dir` and announcing files with
    /// `marker`.
    pub fn new(output_dir: impl Into<PathBuf>, marker: ArtifactMarker) -> Self {
        Self {
            output_dir: output_dir.into(),
            marker,
        }
    }

    /// Directory the files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Tool for PdfTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: PDF_TOOL_NAME.into(),
            description: "Export the finished travel plan as a PDF document. Call this \
                          once the plan is complete; the file path is returned to the user."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["title", "content"],
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Document title, e.g. Three days in Kyoto"
                    },
                    "content": {
                        "type": "string",
                        "description": "Plain-text body of the plan"
                    },
                    "file_name": {
                        "type": "string",
                        "description": "Optional file name; derived from the title when omitted"
                    }
                }
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let title = required_str(&arguments, "title")?;
        let content = required_str(&arguments, "content")?;
        let file_name = match arguments.get("file_name").and_then(Value::as_str) {
            Some(name) => sanitize_file_name(name),
            None => sanitize_file_name(&title),
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| failure(format!("cannot create {}: {e}", self.output_dir.display())))?;
        let path = self.output_dir.join(file_name);

        let target = path.clone();
        let pages = tokio::task::spawn_blocking(move || write_pdf(&target, &title, &content))
            .await
            .map_err(|e| failure(format!("PDF writer task failed: {e}")))??;

        info!(path = %path.display(), pages, "PDF written");
        Ok(self.marker.announce(&path.display().to_string()))
    }
}

fn required_str(arguments: &Value, field: &str) -> Result<String> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| failure(format!("missing required string field `{field}`")))
}

fn failure(reason: String) -> AgentError {
    AgentError::ToolExecutionFailed {
        tool_name: PDF_TOOL_NAME.into(),
        reason,
    }
}

/// Reduce a name to a single safe path component ending in `.pdf`.
fn sanitize_file_name(name: &str) -> String {
    let stem = name.trim().trim_end_matches(".pdf");
    let mut slug: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "plan.pdf".into()
    } else {
        format!("{slug}.pdf")
    }
}

/// Break text into printable lines of at most [`COLUMNS`] characters.
///
/// The built-in Courier font only covers ASCII; anything else becomes `?`.
fn layout_lines(title: &str, content: &str) -> Vec<String> {
    let mut lines = vec![ascii(title), String::new()];
    for raw in content.lines() {
        let line = ascii(raw.trim_end());
        if line.is_empty() {
            lines.push(line);
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        lines.extend(chars.chunks(COLUMNS).map(|c| c.iter().collect()));
    }
    lines
}

fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Write the document and return its page count.
fn write_pdf(path: &Path, title: &str, content: &str) -> Result<usize> {
    let lines = layout_lines(title, content);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for chunk in lines.chunks(LINES_PER_PAGE) {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LINE_HEIGHT.into()]),
            Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
        ];
        for line in chunk {
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let encoded = Content { operations }
            .encode()
            .map_err(|e| failure(format!("failed to encode page: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)
        .map_err(|e| failure(format!("failed to write {}: {e}", path.display())))?;
    Ok(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(dir: &Path) -> PdfTool {
        PdfTool::new(dir.join("out"), ArtifactMarker::default())
    }

    #[test]
    fn file_names_are_single_safe_components() {
        assert_eq!(sanitize_file_name("Three days in Kyoto"), "three-days-in-kyoto.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etc-passwd.pdf");
        assert_eq!(sanitize_file_name("plan.pdf"), "plan.pdf");
        assert_eq!(sanitize_file_name("???"), "plan.pdf");
    }

    #[test]
    fn long_and_non_ascii_lines_are_made_printable() {
        let content = format!("{}\nCafé", "x".repeat(COLUMNS + 5));
        let lines = layout_lines("Trip", &content);
        assert_eq!(lines[0], "Trip");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2].len(), COLUMNS);
        assert_eq!(lines[3], "xxxxx");
        assert_eq!(lines[4], "Caf?");
    }

    #[tokio::test]
    async fn call_writes_pdf_and_announces_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());

        let text = tool
            .call(json!({
                "title": "Kyoto day trip",
                "content": "09:00 Fushimi Inari\n13:00 Nishiki Market\n16:00 Gion"
            }))
            .await
            .unwrap();

        let expected = dir.path().join("out").join("kyoto-day-trip.pdf");
        let marker = ArtifactMarker::default();
        assert_eq!(marker.extract(&text), Some(expected.display().to_string()));

        let bytes = std::fs::read(&expected).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load(&expected).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn long_content_spans_several_pages() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        let content = (1..=LINES_PER_PAGE + 10)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");

        tool.call(json!({ "title": "Long", "content": content, "file_name": "long" }))
            .await
            .unwrap();

        let doc = Document::load(dir.path().join("out").join("long.pdf")).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .call(json!({ "title": "Empty" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::ToolExecutionFailed { ref tool_name, .. } if tool_name == PDF_TOOL_NAME
        ));
    }
}
