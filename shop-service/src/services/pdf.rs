//! Invoice PDF rendering.
//!
//! Layout is computed first as positioned text runs and rules in PostScript
//! points on a US-letter page, then drawn with printpdf's built-in Helvetica.
//! Item rows that do not fit continue on additional pages.

use std::io::BufWriter;

use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Pt};
use rust_decimal::Decimal;

use crate::config::ShopProfile;
use crate::error::{ShopError, ShopResult};
use crate::models::Invoice;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const LEFT: f32 = 50.0;
const RIGHT: f32 = 550.0;
const ROW_HEIGHT: f32 = 20.0;
/// Rows stop here; below is kept for the next page's continuation.
const ROWS_BOTTOM: f32 = 90.0;
/// Vertical space the totals block needs below the last row.
const SUMMARY_HEIGHT: f32 = 170.0;
const FOOTER_Y: f32 = 50.0;

const COL_ITEM: f32 = LEFT;
const COL_QTY: f32 = 260.0;
const COL_PRICE: f32 = 330.0;
const COL_TOTAL: f32 = 440.0;
const SUMMARY_X: f32 = 330.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub x1: f32,
    pub x2: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub texts: Vec<TextRun>,
    pub rules: Vec<Rule>,
}

impl PageLayout {
    fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, bold: bool) {
        self.texts.push(TextRun {
            text: text.into(),
            x,
            y,
            size,
            bold,
        });
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        self.rules.push(Rule { x1, x2, y });
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.texts.iter().any(|t| t.text.contains(needle))
    }
}

fn money(currency: &str, amount: Decimal) -> String {
    format!("{} {:.2}", currency, amount.round_dp(2))
}

fn percent(rate: Decimal) -> String {
    format!("{:.2}%", rate.round_dp(2))
}

fn table_header(page: &mut PageLayout, currency: &str, y: f32) {
    page.text("Item", COL_ITEM, y, 12.0, true);
    page.text("Quantity", COL_QTY, y, 12.0, true);
    page.text(format!("Price ({})", currency), COL_PRICE, y, 12.0, true);
    page.text(format!("Total ({})", currency), COL_TOTAL, y, 12.0, true);
    page.rule(LEFT, RIGHT, y - 5.0);
}

/// Header of a follow-on page. Returns the page and the y below its header.
fn continuation_page(invoice: &Invoice, currency: &str, with_table: bool) -> (PageLayout, f32) {
    let mut page = PageLayout::default();
    page.text(
        format!("Invoice ID: {} (continued)", invoice.invoice_id),
        LEFT,
        750.0,
        12.0,
        true,
    );
    page.rule(LEFT, RIGHT, 740.0);
    if with_table {
        table_header(&mut page, currency, 715.0);
        (page, 690.0)
    } else {
        (page, 720.0)
    }
}

/// Positioned content of every page of the invoice.
pub fn layout_invoice(invoice: &Invoice, shop: &ShopProfile) -> Vec<PageLayout> {
    let currency = shop.currency.as_str();
    let mut pages = Vec::new();
    let mut page = PageLayout::default();

    page.text(&shop.name, LEFT, 750.0, 16.0, true);
    page.text(
        invoice.order_date.format("%d/%m/%Y").to_string(),
        470.0,
        750.0,
        12.0,
        false,
    );
    page.rule(LEFT, RIGHT, 740.0);

    page.text(format!("From: {}", shop.owner), LEFT, 725.0, 11.0, false);
    page.text(format!("Shop Address: {}", shop.address), LEFT, 710.0, 11.0, false);
    page.text(format!("Contact Number: {}", shop.contact), LEFT, 695.0, 11.0, false);
    page.text(format!("Shop Email: {}", shop.email), LEFT, 680.0, 11.0, false);

    page.text(
        format!("Invoice ID: {}", invoice.invoice_id),
        400.0,
        665.0,
        12.0,
        true,
    );

    page.text(format!("To: {}", invoice.customer_name), LEFT, 650.0, 11.0, false);
    page.text(format!("Address: {}", invoice.customer_address), LEFT, 635.0, 11.0, false);
    page.text(format!("Contact: {}", invoice.customer_number), LEFT, 620.0, 11.0, false);
    let mut y = 600.0;
    if let Some(email) = &invoice.customer_email {
        page.text(format!("Email: {}", email), LEFT, 605.0, 11.0, false);
        y = 585.0;
    }

    table_header(&mut page, currency, y);
    y -= 25.0;

    for line in &invoice.items {
        if y < ROWS_BOTTOM {
            pages.push(page);
            (page, y) = continuation_page(invoice, currency, true);
        }
        page.text(&line.name, COL_ITEM, y, 11.0, false);
        page.text(line.quantity.to_string(), COL_QTY, y, 11.0, false);
        page.text(money(currency, line.price), COL_PRICE, y, 11.0, false);
        page.text(money(currency, line.line_total()), COL_TOTAL, y, 11.0, false);
        y -= ROW_HEIGHT;
    }

    if y - SUMMARY_HEIGHT < FOOTER_Y {
        pages.push(page);
        (page, y) = continuation_page(invoice, currency, false);
    }

    let half_rate = invoice.tax_rate / Decimal::TWO;
    let half_tax = invoice.tax / Decimal::TWO;

    page.rule(LEFT, RIGHT, y + 10.0);
    y -= 10.0;
    page.text(
        format!("Subtotal: {}", money(currency, invoice.subtotal)),
        SUMMARY_X,
        y,
        11.0,
        false,
    );
    y -= ROW_HEIGHT;
    page.text(
        format!("CGST ({}): {}", percent(half_rate), money(currency, half_tax)),
        SUMMARY_X,
        y,
        11.0,
        false,
    );
    y -= ROW_HEIGHT;
    page.text(
        format!("SGST ({}): {}", percent(half_rate), money(currency, half_tax)),
        SUMMARY_X,
        y,
        11.0,
        false,
    );
    y -= ROW_HEIGHT;
    page.text(
        format!(
            "Discount ({}): -{}",
            percent(invoice.discount_rate),
            money(currency, invoice.discount)
        ),
        SUMMARY_X,
        y,
        11.0,
        false,
    );
    y -= 10.0;
    page.rule(SUMMARY_X, RIGHT, y);
    y -= 20.0;
    page.text(
        format!("Total Amount: {}", money(currency, invoice.total)),
        SUMMARY_X,
        y,
        13.0,
        true,
    );
    y -= 30.0;
    page.text(format!("GST Number: {}", shop.gst_number), LEFT, y, 10.0, false);

    page.text("Thank you for your business!", LEFT, FOOTER_Y, 12.0, true);
    pages.push(page);

    pages
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

fn draw(layer: &PdfLayerReference, page: &PageLayout, regular: &IndirectFontRef, bold: &IndirectFontRef) {
    for run in &page.texts {
        let font = if run.bold { bold } else { regular };
        layer.use_text(run.text.as_str(), run.size, pt(run.x), pt(run.y), font);
    }
    for rule in &page.rules {
        layer.add_line(Line {
            points: vec![
                (Point::new(pt(rule.x1), pt(rule.y)), false),
                (Point::new(pt(rule.x2), pt(rule.y)), false),
            ],
            is_closed: false,
        });
    }
}

/// Render the invoice to PDF bytes.
pub fn render_invoice_pdf(invoice: &Invoice, shop: &ShopProfile) -> ShopResult<Vec<u8>> {
    let pages = layout_invoice(invoice, shop);

    let (doc, first_page, first_layer) = PdfDocument::new(
        format!("Invoice {}", invoice.invoice_id),
        pt(PAGE_WIDTH),
        pt(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ShopError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ShopError::Pdf(e.to_string()))?;

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page_index).get_layer(layer_index)
        };
        draw(&layer, page, &regular, &bold);
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| ShopError::Pdf(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| ShopError::Pdf(e.to_string()))
}

/// Download name used by the web API.
pub fn invoice_filename(invoice_id: i64) -> String {
    format!("invoice_{}.pdf", invoice_id)
}

/// File name the console writes: `<id>_invoice_<customer>.pdf`, with the
/// customer name reduced to a safe lowercase slug.
pub fn console_filename(invoice: &Invoice) -> String {
    let slug: String = invoice
        .customer_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = if slug.is_empty() { "customer".to_string() } else { slug };
    format!("{}_invoice_{}.pdf", invoice.invoice_id, slug)
}
