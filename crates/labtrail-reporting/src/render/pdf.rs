//! Self-contained PDF 1.4 writer for certified reports.
//!
//! Output uses the two standard Type 1 fonts (Helvetica and Helvetica-Bold,
//! WinAnsiEncoding) on US Letter pages, so no font data is embedded. Content
//! flows top to bottom and breaks onto a new page when the bottom margin is
//! reached. Every page carries a "Page n of N" footer.
//!
//! Object layout:
//!
//! ```text
//!   1  Catalog
//!   2  Pages
//!   3  Font F1 (Helvetica)
//!   4  Font F2 (Helvetica-Bold)
//!   5  Info
//!   6+ Page, Contents pairs
//! ```

use labtrail_contracts::{
    error::LabtrailResult,
    report::{DocumentFormat, ReportDocument},
};
use labtrail_core::traits::DocumentRenderer;

use super::{truncate, wrap};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
const FOOTER_Y: f32 = 30.0;

/// Characters of step notes shown in the step table.
pub const NOTES_COLUMN_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

/// Flows text onto pages, collecting each page's content stream.
struct Layout {
    pages: Vec<String>,
    current: String,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.pages.push(std::mem::take(&mut self.current));
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    /// Place `text` at `x` on the current baseline without advancing.
    fn put(&mut self, font: Font, size: f32, x: f32, text: &str) {
        self.current.push_str(&text_op(font, size, x, self.y, text));
    }

    /// One line of text at the left margin.
    fn line(&mut self, font: Font, size: f32, text: &str) {
        let height = size * 1.4;
        self.ensure_space(height);
        self.y -= size;
        self.put(font, size, MARGIN, text);
        self.y -= height - size;
    }

    /// A label/value row.
    fn row(&mut self, size: f32, label: &str, value: &str, value_x: f32) {
        let height = size * 1.6;
        self.ensure_space(height);
        self.y -= size;
        self.put(Font::Bold, size, MARGIN, label);
        self.put(Font::Regular, size, value_x, value);
        self.y -= height - size;
    }

    /// One table row of cells at fixed column offsets.
    fn cells(&mut self, font: Font, size: f32, columns: &[(f32, &str)]) {
        let height = size * 1.6;
        self.ensure_space(height);
        self.y -= size;
        for (x, text) in columns {
            self.put(font, size, MARGIN + x, text);
        }
        self.y -= height - size;
    }

    fn rule(&mut self) {
        self.ensure_space(6.0);
        self.y -= 3.0;
        self.current.push_str(&format!(
            "0.5 w {:.2} {:.2} m {:.2} {:.2} l S\n",
            MARGIN,
            self.y,
            PAGE_WIDTH - MARGIN,
            self.y
        ));
        self.y -= 3.0;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        let total = self.pages.len();
        self.pages
            .into_iter()
            .enumerate()
            .map(|(i, mut content)| {
                let footer = format!("Page {} of {}", i + 1, total);
                content.push_str(&text_op(Font::Regular, 8.0, PAGE_WIDTH - MARGIN - 60.0, FOOTER_Y, &footer));
                content
            })
            .collect()
    }
}

fn text_op(font: Font, size: f32, x: f32, y: f32, text: &str) -> String {
    format!(
        "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET\n",
        font.resource(),
        size,
        x,
        y,
        escape(text)
    )
}

/// Escape `text` as the body of a PDF literal string in WinAnsiEncoding.
///
/// Latin-1 characters are written as octal escapes; anything WinAnsi cannot
/// show becomes `?`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(ch),
            '\u{a0}'..='\u{ff}' => out.push_str(&format!("\\{:03o}", ch as u32)),
            _ => out.push('?'),
        }
    }
    out
}

// ── Renderer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    _private: (),
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn layout(&self, doc: &ReportDocument) -> Vec<String> {
        let exec = &doc.data.execution;
        let stamp = |t: chrono::DateTime<chrono::Utc>| t.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let mut page = Layout::new();

        page.line(Font::Bold, 18.0, "CERTIFIED EXECUTION REPORT");
        page.gap(8.0);

        let label_x = MARGIN + 144.0;
        page.row(10.0, "Report ID:", &doc.report_id.to_string(), label_x);
        page.row(10.0, "Execution ID:", &exec.id.to_string(), label_x);
        page.row(10.0, "Generated:", &stamp(doc.generated_at), label_x);
        page.row(10.0, "Certified By:", &doc.certified_by, label_x);
        page.row(10.0, "Protocol:", &exec.protocol, label_x);
        page.row(10.0, "Status:", &exec.status.to_uppercase(), label_x);
        page.row(
            10.0,
            "Chain Integrity:",
            if doc.integrity.is_valid { "VERIFIED" } else { "CORRUPTED" },
            label_x,
        );
        page.gap(14.0);

        page.line(Font::Bold, 12.0, "EXECUTION SUMMARY");
        page.rule();
        page.row(9.0, "Protocol", &exec.protocol, label_x);
        page.row(9.0, "Equipment", &exec.equipment, label_x);
        page.row(9.0, "Started", &stamp(exec.started_at), label_x);
        page.row(
            9.0,
            "Completed",
            &exec.completed_at.map_or_else(|| "In Progress".to_string(), stamp),
            label_x,
        );
        page.gap(14.0);

        page.line(Font::Bold, 12.0, "EXECUTION STEPS");
        page.rule();
        let columns = [0.0, 60.0, 230.0, 290.0];
        page.cells(
            Font::Bold,
            8.0,
            &[(columns[0], "Step"), (columns[1], "Sample"), (columns[2], "Valid"), (columns[3], "Notes")],
        );
        for step in &doc.data.steps {
            let number = step.step_number.to_string();
            let sample = truncate(&step.sample, 32);
            let notes = truncate(&step.notes, NOTES_COLUMN_CHARS);
            page.cells(
                Font::Regular,
                8.0,
                &[
                    (columns[0], number.as_str()),
                    (columns[1], sample.as_str()),
                    (columns[2], if step.is_valid { "Yes" } else { "No" }),
                    (columns[3], notes.as_str()),
                ],
            );
        }
        page.gap(14.0);

        page.line(Font::Bold, 12.0, "AUDIT TRAIL SUMMARY");
        page.rule();
        let audit_x = MARGIN + 180.0;
        page.row(10.0, "Total Audit Records", &doc.data.audit_records_count.to_string(), audit_x);
        page.row(10.0, "Verified Records", &doc.integrity.verified_records.to_string(), audit_x);
        page.row(10.0, "Corrupted Records", &doc.integrity.corrupted_count().to_string(), audit_x);
        page.row(
            10.0,
            "Chain Integrity",
            if doc.integrity.chain_integrity_ok { "VALID" } else { "BROKEN" },
            audit_x,
        );
        page.gap(14.0);

        if !doc.notes.trim().is_empty() {
            page.line(Font::Bold, 12.0, "CERTIFICATION NOTES");
            page.rule();
            for line in wrap(&doc.notes, 95) {
                page.line(Font::Regular, 10.0, &line);
            }
            page.gap(10.0);
        }

        for line in wrap(&doc.compliance_statement(), 120) {
            page.line(Font::Regular, 8.0, &line);
        }

        page.finish()
    }
}

impl DocumentRenderer for PdfRenderer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn render(&self, document: &ReportDocument) -> LabtrailResult<Vec<u8>> {
        let pages = self.layout(document);
        let title = format!("Certified Execution Report {}", document.report_id);
        let created = document.generated_at.format("D:%Y%m%d%H%M%SZ").to_string();
        Ok(assemble(&pages, &title, &created))
    }
}

// ── File assembly ─────────────────────────────────────────────────────────────

fn assemble(pages: &[String], title: &str, created: &str) -> Vec<u8> {
    let first_page_obj = 6;
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", first_page_obj + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Title ({}) /Producer (labtrail) /CreationDate ({}) >>",
            escape(title),
            created
        ),
    ];
    for (i, content) in pages.iter().enumerate() {
        let contents_obj = first_page_obj + 2 * i + 1;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT, contents_obj
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}
