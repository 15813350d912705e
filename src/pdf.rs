//! A4 rendering of a [`ProformaDocument`] with printpdf's builtin Helvetica.
//!
//! Builtin fonts carry no metrics here, so widths are estimated from an
//! average glyph width. Good enough for wrapping and right-aligning figures.

use printpdf::image_crate::{self, DynamicImage, GenericImageView, ImageBuffer};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};
use std::io::BufWriter;
use tracing::{debug, warn};

use crate::document::ProformaDocument;
use crate::error::{InvoiceError, Result};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const RIGHT: f32 = PAGE_W - MARGIN;
const BOTTOM: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;
const AVG_GLYPH_EM: f32 = 0.52;

const LOGO_MAX_W: f32 = 45.0;
const LOGO_MAX_H: f32 = 22.0;

// Line-item table columns: (left edge, width).
const COLUMNS: [(f32, f32); 4] = [(MARGIN, 95.0), (110.0, 20.0), (130.0, 35.0), (165.0, 30.0)];
const CELL_PAD: f32 = 1.5;
const LINE_H: f32 = 4.6;

// Totals block columns.
const TOTALS_LABEL: (f32, f32) = (110.0, 55.0);
const TOTALS_VALUE: (f32, f32) = (165.0, 30.0);

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / (size * AVG_GLYPH_EM * PT_TO_MM)) as usize).max(8)
}

/// Greedy word wrap; words longer than a line are cut.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            lines.push(head);
        }
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    page_no: usize,
}

impl<'a> PageWriter<'a> {
    fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn text_right(&self, text: &str, size: f32, right: f32, y: f32, bold: bool) {
        let x = (right - text_width(text, size)).max(MARGIN);
        self.text(text, size, x, y, bold);
    }

    fn hline(&self, y: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(y)), false),
                (Point::new(Mm(RIGHT), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    /// Stroked rectangle; `top` is the upper edge.
    fn cell_border(&self, left: f32, top: f32, width: f32, height: f32) {
        let bottom = top - height;
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(left), Mm(top)), false),
                (Point::new(Mm(left + width), Mm(top)), false),
                (Point::new(Mm(left + width), Mm(bottom)), false),
                (Point::new(Mm(left), Mm(bottom)), false),
            ],
            is_closed: true,
        });
    }

    fn footer(&self) {
        self.text(&format!("Page {}", self.page_no), 8.0, RIGHT - 12.0, 10.0, false);
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.layer.set_outline_thickness(0.4);
        self.page_no += 1;
        self.y = PAGE_H - MARGIN;
        self.footer();
        debug!(page = self.page_no, "started new page");
    }

    /// Starts a new page when fewer than `height` mm remain. Returns true if
    /// it did.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn table_header(&mut self, header: &[String; 4]) {
        let height = LINE_H + 2.0 * CELL_PAD;
        let top = self.y;
        for ((left, width), label) in COLUMNS.iter().zip(header) {
            self.cell_border(*left, top, *width, height);
            self.text(label, 9.0, left + CELL_PAD, top - CELL_PAD - 3.4, true);
        }
        self.y -= height;
    }

    fn table_row(&mut self, header: &[String; 4], row: &[String; 4]) {
        let size = 9.5;
        let name_lines = wrap(&row[0], chars_per_line(COLUMNS[0].1 - 2.0 * CELL_PAD, size));
        let height = name_lines.len() as f32 * LINE_H + 2.0 * CELL_PAD;

        if self.ensure_space(height) {
            self.table_header(header);
        }

        let top = self.y;
        for (left, width) in COLUMNS {
            self.cell_border(left, top, width, height);
        }

        let first_baseline = top - CELL_PAD - 3.4;
        for (i, line) in name_lines.iter().enumerate() {
            self.text(line, size, COLUMNS[0].0 + CELL_PAD, first_baseline - i as f32 * LINE_H, false);
        }
        for (col, value) in row.iter().enumerate().skip(1) {
            let (left, width) = COLUMNS[col];
            self.text_right(value, size, left + width - CELL_PAD, first_baseline, false);
        }
        self.y -= height;
    }

    fn totals_row(&mut self, label: &str, value: &str, emphasize: bool) {
        let height = LINE_H + 2.0 * CELL_PAD;
        self.ensure_space(height);
        let top = self.y;
        let baseline = top - CELL_PAD - 3.4;
        let size = if emphasize { 10.5 } else { 9.5 };

        self.cell_border(TOTALS_LABEL.0, top, TOTALS_LABEL.1, height);
        self.cell_border(TOTALS_VALUE.0, top, TOTALS_VALUE.1, height);
        self.text(label, size, TOTALS_LABEL.0 + CELL_PAD, baseline, emphasize);
        self.text_right(value, size, TOTALS_VALUE.0 + TOTALS_VALUE.1 - CELL_PAD, baseline, emphasize);
        self.y -= height;
    }

    fn paragraph(&mut self, text: &str, size: f32, bold: bool) {
        let step = size * PT_TO_MM * 1.45;
        for line in wrap(text, chars_per_line(RIGHT - MARGIN, size)) {
            self.ensure_space(step);
            self.y -= step;
            self.text(&line, size, MARGIN, self.y, bold);
        }
    }
}

/// Decodes the configured logo, or draws a plain banner when there is none
/// or it cannot be read.
fn logo_image(logo: Option<&[u8]>) -> DynamicImage {
    if let Some(bytes) = logo {
        match image_crate::load_from_memory(bytes) {
            Ok(img) => return DynamicImage::ImageRgb8(img.to_rgb8()),
            Err(e) => warn!(error = %e, "logo could not be decoded, using banner"),
        }
    }
    let banner = ImageBuffer::from_fn(360, 160, |_, y| {
        if y >= 140 {
            image_crate::Rgb([212u8, 160, 23])
        } else {
            image_crate::Rgb([30u8, 58, 95])
        }
    });
    DynamicImage::ImageRgb8(banner)
}

pub fn render_pdf(document: &ProformaDocument, logo: Option<&[u8]>) -> Result<Vec<u8>> {
    let (doc, page1, layer1) = PdfDocument::new(&document.title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| InvoiceError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| InvoiceError::Pdf(e.to_string()))?;

    {
        let mut page = PageWriter {
            doc: &doc,
            layer: doc.get_page(page1).get_layer(layer1),
            regular,
            bold,
            y: PAGE_H - MARGIN,
            page_no: 1,
        };
        page.layer.set_outline_thickness(0.4);
        page.footer();

        // Logo, scaled to fit its box.
        let logo = logo_image(logo);
        let (px_w, px_h) = (logo.width() as f32, logo.height() as f32);
        let dpi = (px_w * 25.4 / LOGO_MAX_W).max(px_h * 25.4 / LOGO_MAX_H);
        let logo_h = px_h * 25.4 / dpi;
        Image::from_dynamic_image(&logo).add_to_layer(
            page.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(page.y - logo_h)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );

        page.text_right(&document.title, 18.0, RIGHT, page.y - 9.0, true);
        page.y -= LOGO_MAX_H + 6.0;

        // Issuer
        for (i, line) in document.issuer_lines.iter().enumerate() {
            let size = if i == 0 { 11.0 } else { 9.0 };
            page.text(line, size, MARGIN, page.y, i == 0);
            page.y -= if i == 0 { 5.0 } else { 4.2 };
        }

        page.y -= 2.0;
        page.hline(page.y);
        page.y -= 7.0;

        // Client on the left, transaction on the right.
        let rows = document.client_lines.len().max(document.transaction_lines.len());
        for i in 0..rows {
            if let Some(line) = document.client_lines.get(i) {
                page.text(line, 10.0, MARGIN, page.y, i == 0);
            }
            if let Some(line) = document.transaction_lines.get(i) {
                page.text(line, 10.0, 120.0, page.y, i == 0);
            }
            page.y -= 5.2;
        }
        page.y -= 5.0;

        page.table_header(&document.table_header);
        for row in &document.rows {
            page.table_row(&document.table_header, row);
        }

        page.y -= 6.0;
        let last = document.totals.len().saturating_sub(1);
        for (i, (label, value)) in document.totals.iter().enumerate() {
            page.totals_row(label, value, i == last);
        }

        page.y -= 6.0;
        for (i, paragraph) in document.terms.iter().enumerate() {
            if i == 0 {
                page.paragraph(paragraph, 10.0, true);
            } else {
                page.paragraph(paragraph, 8.5, false);
            }
        }

        page.y -= 4.0;
        page.paragraph(&document.closing, 10.0, true);

        debug!(pages = page.page_no, rows = document.rows.len(), "document laid out");
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(|e| InvoiceError::Pdf(e.to_string()))?;
    writer.into_inner().map_err(|e| InvoiceError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(rows: usize) -> ProformaDocument {
        ProformaDocument {
            title: "FACTURE PROFORMA".into(),
            issuer_lines: vec!["Ameublement El Bahia".into(), "Oran".into()],
            client_lines: vec!["Client : Karim".into(), "Société : L'Atelier".into()],
            transaction_lines: vec!["N° transaction : 1000".into(), "Date : 17/10/2026".into()],
            table_header: [
                "Désignation".into(),
                "Qté".into(),
                "Prix unitaire (DA)".into(),
                "Montant (DA)".into(),
            ],
            rows: (0..rows)
                .map(|i| {
                    [
                        format!("Chaise modèle {} avec un nom suffisamment long pour passer à la ligne", i),
                        "2".into(),
                        "1 250.00".into(),
                        "2 500.00".into(),
                    ]
                })
                .collect(),
            totals: vec![
                ("Sous-total".into(), "2 500.00 DA".into()),
                ("Total après remise".into(), "2 500.00 DA".into()),
            ],
            terms: vec!["Conditions générales de vente".into(), "Paiement à la livraison.".into()],
            closing: "Arrêter la présente facture proforma à la somme de: deux mille cinq cents dinars."
                .into(),
        }
    }

    #[test]
    fn renders_a_pdf() {
        let bytes = render_pdf(&document(3), None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_carts_spill_onto_more_pages() {
        let short = render_pdf(&document(1), None).unwrap();
        let long = render_pdf(&document(80), None).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(long.len() > short.len());
    }

    #[test]
    fn undecodable_logo_falls_back_to_banner() {
        let bytes = render_pdf(&document(1), Some(&b"not an image"[..])).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("un deux trois quatre cinq six", 10);
        assert_eq!(lines, vec!["un deux", "trois", "quatre", "cinq six"]);
        assert!(wrap("abcdefghijklmnop", 8).iter().all(|l| l.chars().count() <= 8));
        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}
