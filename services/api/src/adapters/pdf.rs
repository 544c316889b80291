//! services/api/src/adapters/pdf.rs
//!
//! This module contains the adapter that draws the standardized lesson-plan PDF.
//! It implements the `PdfRenderingService` port from the `core` crate.
//!
//! Layout happens in top-down page coordinates and is converted to PDF user
//! space only when an operation is emitted. Text uses the standard Helvetica
//! faces with WinAnsi encoding, so no font files are embedded.

use crate::adapters::storage::FileStorage;
use async_trait::async_trait;
use lesson_plan_core::{
    domain::LessonPlan,
    ports::{PdfRenderingService, PortError, PortResult},
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::info;

// A4 in points.
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;

const HEADER_FIRST_PAGE_HEIGHT: f32 = 120.0;
const HEADER_SUBSEQUENT_HEIGHT: f32 = 100.0;
const CONTENT_GAP_BELOW_HEADER: f32 = 30.0;
const PAGE_MARGIN_X: f32 = 50.0;
const PAGE_MARGIN_BOTTOM: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * PAGE_MARGIN_X;

const LINE_HEIGHT_FACTOR: f32 = 1.2;
const ASCENT_FACTOR: f32 = 0.75;

const HEADING_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;
const HEADING_GAP: f32 = 5.0;
const PARAGRAPH_GAP: f32 = 10.0;

// #005A9C, #4A90E2, #333333 and white.
const BRAND_COLOR: Rgb = Rgb(0.0, 0.353, 0.612);
const ACCENT_COLOR: Rgb = Rgb(0.290, 0.565, 0.886);
const TEXT_COLOR: Rgb = Rgb(0.2, 0.2, 0.2);
const HEADER_TEXT_COLOR: Rgb = Rgb(1.0, 1.0, 1.0);

const MISSING_VALUE: &str = "N/A";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PdfRenderingService` by writing PDFs with `lopdf`.
#[derive(Clone)]
pub struct LopdfRenderer {
    storage: FileStorage,
}

impl LopdfRenderer {
    /// Creates a new `LopdfRenderer` writing into the storage's generated directory.
    pub fn new(storage: FileStorage) -> Self {
        Self { storage }
    }
}

//=========================================================================================
// `PdfRenderingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PdfRenderingService for LopdfRenderer {
    async fn render(&self, plan: &LessonPlan) -> PortResult<PathBuf> {
        let id = plan.id;
        let path = self.storage.generated_pdf_path(id);
        let target = path.clone();
        let plan = plan.clone();

        tokio::task::spawn_blocking(move || write_pdf(&plan, &target))
            .await
            .map_err(|e| PortError::Unexpected(format!("PDF rendering task failed: {}", e)))??;

        info!("Rendered lesson plan {} to {}", id, path.display());
        Ok(path)
    }
}

fn write_pdf(plan: &LessonPlan, target: &Path) -> PortResult<()> {
    let bytes = render_document(plan)?;
    std::fs::write(target, bytes).map_err(|e| {
        PortError::Unexpected(format!("Failed to write PDF to {}: {}", target.display(), e))
    })
}

/// Lays out `plan` and serializes the result as PDF bytes.
pub fn render_document(plan: &LessonPlan) -> PortResult<Vec<u8>> {
    let pages = layout_pages(plan);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource_name() => regular_id,
            Font::Bold.resource_name() => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page.operations,
        };
        let encoded = content
            .encode()
            .map_err(|e| PortError::Unexpected(format!("Failed to encode page content: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PortError::Unexpected(format!("Failed to serialize PDF: {}", e)))?;
    Ok(bytes)
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

//=========================================================================================
// Layout
//=========================================================================================

/// The body sections in print order. Empty fields are skipped.
fn sections(plan: &LessonPlan) -> [(&'static str, &str); 5] {
    let content = &plan.content;
    [
        ("Resumo da Atividade", content.summary.as_str()),
        ("Objetivos", content.objectives.as_str()),
        ("Habilidades Trabalhadas", content.skills.as_str()),
        ("Recursos Necessários", content.resources.as_str()),
        ("Passo a Passo da Atividade", content.step_by_step.as_str()),
    ]
}

/// Flows the whole plan onto as many pages as it needs.
pub(crate) fn layout_pages(plan: &LessonPlan) -> Vec<PageCanvas> {
    let mut layout = Layout::new(plan);
    layout.y += 2.0 * line_height(BODY_SIZE);
    for (heading, body) in sections(plan) {
        layout.section(heading, body);
    }
    layout.pages
}

struct Layout<'a> {
    plan: &'a LessonPlan,
    pages: Vec<PageCanvas>,
    /// Distance of the cursor from the top edge of the current page.
    y: f32,
}

impl<'a> Layout<'a> {
    fn new(plan: &'a LessonPlan) -> Self {
        let mut first = PageCanvas::default();
        draw_first_page_header(&mut first, plan);
        draw_footer(&mut first);
        Self {
            plan,
            pages: vec![first],
            y: HEADER_FIRST_PAGE_HEIGHT + CONTENT_GAP_BELOW_HEADER,
        }
    }

    fn new_page(&mut self) {
        let mut page = PageCanvas::default();
        draw_subsequent_header(&mut page, self.plan);
        draw_footer(&mut page);
        self.pages.push(page);
        self.y = HEADER_SUBSEQUENT_HEIGHT + CONTENT_GAP_BELOW_HEADER;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_HEIGHT - PAGE_MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn page(&mut self) -> &mut PageCanvas {
        // Layout::new always pushes the first page.
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn section(&mut self, heading: &str, body: &str) {
        if body.trim().is_empty() {
            return;
        }
        let heading_line = line_height(HEADING_SIZE);
        let body_line = line_height(BODY_SIZE);

        // Keep the heading, its divider and the first body line together.
        self.ensure_space(heading_line + HEADING_GAP + heading_line + body_line);

        for line in wrap_text(heading, Font::Bold, HEADING_SIZE, CONTENT_WIDTH) {
            let baseline = self.y + ascent(HEADING_SIZE);
            self.page().text(
                PAGE_MARGIN_X,
                baseline,
                Font::Bold,
                HEADING_SIZE,
                BRAND_COLOR,
                &line,
                0.0,
            );
            self.y += heading_line;
        }
        self.y += HEADING_GAP;

        let divider_y = self.y;
        self.page().line(
            PAGE_MARGIN_X,
            PAGE_WIDTH - PAGE_MARGIN_X,
            divider_y,
            1.0,
            ACCENT_COLOR,
        );
        self.y += heading_line;

        for paragraph in body.lines() {
            let lines = wrap_text(paragraph, Font::Regular, BODY_SIZE, CONTENT_WIDTH);
            if lines.is_empty() {
                self.ensure_space(body_line);
                self.y += body_line;
                continue;
            }
            let last_index = lines.len() - 1;
            for (i, line) in lines.iter().enumerate() {
                self.ensure_space(body_line);
                let spacing = if i < last_index {
                    justify_spacing(line, Font::Regular, BODY_SIZE, CONTENT_WIDTH)
                } else {
                    0.0
                };
                let baseline = self.y + ascent(BODY_SIZE);
                self.page().text(
                    PAGE_MARGIN_X,
                    baseline,
                    Font::Regular,
                    BODY_SIZE,
                    TEXT_COLOR,
                    line,
                    spacing,
                );
                self.y += body_line;
            }
            self.y += PARAGRAPH_GAP;
        }
        self.y += 2.0 * body_line;
    }
}

fn header_value(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        MISSING_VALUE
    } else {
        trimmed
    }
}

fn draw_first_page_header(page: &mut PageCanvas, plan: &LessonPlan) {
    let content = &plan.content;
    page.fill_rect(0.0, 0.0, PAGE_WIDTH, HEADER_FIRST_PAGE_HEIGHT, BRAND_COLOR);

    let area = fit_to_width(header_value(&content.knowledge_area), Font::Bold, 11.0, CONTENT_WIDTH);
    page.centered_text(15.0 + ascent(11.0), Font::Bold, 11.0, HEADER_TEXT_COLOR, &area);

    let mut title_lines = wrap_text(header_value(&content.title), Font::Bold, 22.0, CONTENT_WIDTH);
    if title_lines.len() > 2 {
        title_lines.truncate(2);
        title_lines[1] = fit_to_width(&format!("{}...", title_lines[1]), Font::Bold, 22.0, CONTENT_WIDTH);
    }
    let mut top = 38.0;
    for line in &title_lines {
        page.centered_text(top + ascent(22.0), Font::Bold, 22.0, HEADER_TEXT_COLOR, line);
        top += line_height(22.0);
    }

    let half = CONTENT_WIDTH / 2.0;
    let baseline = 100.0 + ascent(11.0);
    let grade = fit_to_width(header_value(&content.year_grade), Font::Bold, 11.0, half);
    page.text(PAGE_MARGIN_X, baseline, Font::Bold, 11.0, HEADER_TEXT_COLOR, &grade, 0.0);
    let teacher = fit_to_width(
        &format!("Professor(a) {}", header_value(&content.teacher_name)),
        Font::Bold,
        11.0,
        half,
    );
    page.right_aligned_text(baseline, Font::Bold, 11.0, HEADER_TEXT_COLOR, &teacher);
}

fn draw_subsequent_header(page: &mut PageCanvas, plan: &LessonPlan) {
    let content = &plan.content;
    page.fill_rect(0.0, 0.0, PAGE_WIDTH, HEADER_SUBSEQUENT_HEIGHT, BRAND_COLOR);

    let half = CONTENT_WIDTH / 2.0;
    let baseline = 50.0 + ascent(15.0);
    let teacher = fit_to_width(
        &format!("Professor(a): {}", header_value(&content.teacher_name)),
        Font::Bold,
        15.0,
        half,
    );
    page.text(PAGE_MARGIN_X, baseline, Font::Bold, 15.0, HEADER_TEXT_COLOR, &teacher, 0.0);
    let grade = fit_to_width(header_value(&content.year_grade), Font::Bold, 15.0, half);
    page.right_aligned_text(baseline, Font::Bold, 15.0, HEADER_TEXT_COLOR, &grade);
}

fn draw_footer(page: &mut PageCanvas) {
    let y = PAGE_HEIGHT - PAGE_MARGIN_BOTTOM + 20.0;
    page.line(PAGE_MARGIN_X, PAGE_WIDTH - PAGE_MARGIN_X, y, 0.5, ACCENT_COLOR);
}

fn line_height(size: f32) -> f32 {
    size * LINE_HEIGHT_FACTOR
}

fn ascent(size: f32) -> f32 {
    size * ASCENT_FACTOR
}

//=========================================================================================
// Drawing Primitives
//=========================================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
struct Rgb(f32, f32, f32);

impl Rgb {
    fn operands(self) -> Vec<Object> {
        vec![real(self.0), real(self.1), real(self.2)]
    }
}

/// The drawing operations of one page.
#[derive(Default)]
pub(crate) struct PageCanvas {
    pub(crate) operations: Vec<Operation>,
}

impl PageCanvas {
    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Rgb) {
        self.push("q", vec![]);
        self.push("rg", color.operands());
        self.push(
            "re",
            vec![real(x), real(PAGE_HEIGHT - top - height), real(width), real(height)],
        );
        self.push("f", vec![]);
        self.push("Q", vec![]);
    }

    fn line(&mut self, x1: f32, x2: f32, top: f32, width: f32, color: Rgb) {
        let y = PAGE_HEIGHT - top;
        self.push("q", vec![]);
        self.push("RG", color.operands());
        self.push("w", vec![real(width)]);
        self.push("m", vec![real(x1), real(y)]);
        self.push("l", vec![real(x2), real(y)]);
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        x: f32,
        baseline: f32,
        font: Font,
        size: f32,
        color: Rgb,
        text: &str,
        word_spacing: f32,
    ) {
        self.push("BT", vec![]);
        self.push(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), real(size)],
        );
        self.push("rg", color.operands());
        self.push("Tw", vec![real(word_spacing)]);
        self.push("Td", vec![real(x), real(PAGE_HEIGHT - baseline)]);
        self.push("Tj", vec![Object::string_literal(encode_win_ansi(text))]);
        self.push("ET", vec![]);
    }

    fn centered_text(&mut self, baseline: f32, font: Font, size: f32, color: Rgb, text: &str) {
        let width = text_width(text, font, size);
        let x = PAGE_MARGIN_X + (CONTENT_WIDTH - width).max(0.0) / 2.0;
        self.text(x, baseline, font, size, color, text, 0.0);
    }

    fn right_aligned_text(&mut self, baseline: f32, font: Font, size: f32, color: Rgb, text: &str) {
        let width = text_width(text, font, size);
        let x = PAGE_WIDTH - PAGE_MARGIN_X - width;
        self.text(x, baseline, font, size, color, text, 0.0);
    }
}

//=========================================================================================
// Fonts, Metrics and Encoding
//=========================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Advance widths (1/1000 em) for the printable ASCII range 0x20..=0x7E.
    fn ascii_widths(self) -> &'static [u16; 95] {
        match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        }
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Maps a character onto its WinAnsiEncoding byte, if it has one.
fn win_ansi_byte(c: char) -> Option<u8> {
    match c {
        '\t' => Some(b' '),
        ' '..='~' => Some(c as u8),
        '\u{A0}'..='\u{FF}' => Some(c as u32 as u8),
        '€' => Some(0x80),
        '‚' => Some(0x82),
        'ƒ' => Some(0x83),
        '„' => Some(0x84),
        '…' => Some(0x85),
        '†' => Some(0x86),
        '‡' => Some(0x87),
        'ˆ' => Some(0x88),
        '‰' => Some(0x89),
        'Š' => Some(0x8A),
        '‹' => Some(0x8B),
        'Œ' => Some(0x8C),
        'Ž' => Some(0x8E),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        '˜' => Some(0x98),
        '™' => Some(0x99),
        'š' => Some(0x9A),
        '›' => Some(0x9B),
        'œ' => Some(0x9C),
        'ž' => Some(0x9E),
        'Ÿ' => Some(0x9F),
        _ => None,
    }
}

fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

/// An ASCII character of similar width, used to measure non-ASCII glyphs.
fn width_proxy(c: char) -> char {
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        '‘' | '’' | '‚' => '\'',
        '“' | '”' | '„' => '"',
        '—' | '…' | 'Œ' | 'œ' | '™' => 'M',
        _ => 'n',
    }
}

fn glyph_width(c: char, font: Font) -> f32 {
    let measured = match win_ansi_byte(c) {
        None => '?',
        Some(byte) if byte.is_ascii() => byte as char,
        Some(_) => width_proxy(c),
    };
    let index = (measured as usize).saturating_sub(0x20).min(94);
    font.ascii_widths()[index] as f32
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| glyph_width(c, font)).sum::<f32>() * size / 1000.0
}

/// Greedy word wrap. Words wider than the line are split by characters.
fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font, size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width(word, font, size) <= max_width {
            current = word.to_string();
        } else {
            for c in word.chars() {
                current.push(c);
                if text_width(&current, font, size) > max_width {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// The `Tw` word spacing that stretches `line` to `max_width`.
fn justify_spacing(line: &str, font: Font, size: f32, max_width: f32) -> f32 {
    let spaces = line.chars().filter(|&c| c == ' ').count();
    if spaces == 0 {
        return 0.0;
    }
    ((max_width - text_width(line, font, size)) / spaces as f32).max(0.0)
}

/// Shortens `text` with a trailing "..." until it fits on one line.
fn fit_to_width(text: &str, font: Font, size: f32, max_width: f32) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text_width(&single_line, font, size) <= max_width {
        return single_line;
    }
    let mut shortened: String = single_line;
    while !shortened.is_empty() {
        shortened.pop();
        let candidate = format!("{}...", shortened.trim_end());
        if text_width(&candidate, font, size) <= max_width {
            return candidate;
        }
    }
    "...".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lesson_plan_core::domain::{LessonPlanContent, PDF_MIME_TYPE};
    use uuid::Uuid;

    fn plan_with(content: LessonPlanContent) -> LessonPlan {
        LessonPlan {
            id: Uuid::new_v4(),
            content,
            original_file_path: "uploads/originals/x-plano.pdf".to_string(),
            original_file_mime_type: PDF_MIME_TYPE.to_string(),
            generated_pdf_path: None,
            created_at: Utc::now(),
        }
    }

    fn sample_content() -> LessonPlanContent {
        LessonPlanContent {
            title: "Frações na Cozinha".to_string(),
            year_grade: "5º ano".to_string(),
            teacher_name: "Ana Souza".to_string(),
            knowledge_area: "Matemática".to_string(),
            summary: "Os alunos usam receitas para explorar frações.".to_string(),
            objectives: "Somar frações\nComparar frações".to_string(),
            skills: String::new(),
            estimated_time: "2 aulas".to_string(),
            resources: "   ".to_string(),
            step_by_step: "1. Ler a receita\n2. Dividir ingredientes".to_string(),
        }
    }

    /// Concatenates every string shown with `Tj` on a page.
    fn page_text(page: &PageCanvas) -> String {
        page.operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => {
                    Some(bytes.iter().map(|&b| b as char).collect::<String>())
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn empty_sections_are_skipped() {
        let pages = layout_pages(&plan_with(sample_content()));
        assert_eq!(pages.len(), 1);

        let text = page_text(&pages[0]);
        assert!(text.contains("Resumo da Atividade"));
        assert!(text.contains("Objetivos"));
        assert!(text.contains("Passo a Passo da Atividade"));
        assert!(!text.contains("Habilidades Trabalhadas"));
        assert!(!text.contains("Recursos Necess"));
    }

    #[test]
    fn first_page_header_carries_title_and_people() {
        let pages = layout_pages(&plan_with(sample_content()));
        let text = page_text(&pages[0]);
        // Latin-1 bytes decode back to the same characters.
        assert!(text.contains("Frações na Cozinha"));
        assert!(text.contains("Professor(a) Ana Souza"));
        assert!(text.contains("Matem"));
    }

    #[test]
    fn long_content_flows_onto_more_pages_with_headers() {
        let mut content = sample_content();
        content.step_by_step = (1..=120)
            .map(|i| format!("{}. Etapa com instruções detalhadas para a turma trabalhar em grupos.", i))
            .collect::<Vec<_>>()
            .join("\n");
        content.teacher_name = String::new();

        let pages = layout_pages(&plan_with(content));
        assert!(pages.len() > 1, "expected pagination, got {} page(s)", pages.len());

        for page in &pages[1..] {
            let text = page_text(page);
            assert!(text.contains("Professor(a): N/A"));
            assert!(text.contains("5"));
        }
        // Every page has its header band and footer rule.
        for page in &pages {
            assert_eq!(page.operations.iter().filter(|op| op.operator == "f").count(), 1);
            assert!(page.operations.iter().any(|op| op.operator == "S"));
        }
    }

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap_text("a b c dddddddddddddddddddd", Font::Regular, 12.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, 12.0) <= 60.0, "{line:?} too wide");
        }
        assert_eq!(lines.concat().replace(' ', ""), "abcdddddddddddddddddddd");
        assert!(wrap_text("   ", Font::Regular, 12.0, 60.0).is_empty());
    }

    #[test]
    fn justification_fills_the_line() {
        let line = "uma linha curta";
        let spacing = justify_spacing(line, Font::Regular, 12.0, 200.0);
        let natural = text_width(line, Font::Regular, 12.0);
        assert!((natural + 2.0 * spacing - 200.0).abs() < 0.01);
        assert_eq!(justify_spacing("palavra", Font::Regular, 12.0, 200.0), 0.0);
    }

    #[test]
    fn encoding_maps_latin_and_typographic_characters() {
        assert_eq!(encode_win_ansi("ção"), vec![0xE7, 0xE3, b'o']);
        assert_eq!(encode_win_ansi("“ok”–"), vec![0x93, b'o', b'k', 0x94, 0x96]);
        assert_eq!(encode_win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn fit_to_width_truncates_with_ellipsis() {
        let long = "Ciências da Natureza e suas Tecnologias ".repeat(10);
        let fitted = fit_to_width(&long, Font::Bold, 11.0, 100.0);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, Font::Bold, 11.0) <= 100.0);
        assert_eq!(fit_to_width("curto", Font::Bold, 11.0, 100.0), "curto");
    }

    #[tokio::test]
    async fn render_writes_a_loadable_pdf_named_after_the_id() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();
        let renderer = LopdfRenderer::new(storage.clone());
        let plan = plan_with(sample_content());

        let path = renderer.render(&plan).await.unwrap();
        assert_eq!(path, storage.generated_pdf_path(plan.id));

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        // Rendering again overwrites the same file.
        let again = renderer.render(&plan).await.unwrap();
        assert_eq!(again, path);
    }

    #[tokio::test]
    async fn rendered_text_can_be_extracted_again() {
        use crate::adapters::extractor::DocumentTextExtractor;
        use lesson_plan_core::ports::TextExtractionService;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();
        let path = LopdfRenderer::new(storage)
            .render(&plan_with(sample_content()))
            .await
            .unwrap();

        let text = DocumentTextExtractor::new()
            .extract_text(&path, PDF_MIME_TYPE)
            .await
            .unwrap();
        assert!(text.contains("Objetivos"), "extracted: {text}");
    }
}
