//! PDF rendering for daily reports.
//!
//! Layout mirrors the review sheet used on site: a header page with the
//! report details and summary, then one page per activity with its
//! measurements, discounts, totals, notes and photo.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};
use tracing::warn;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;

/// Everything needed to render one report, assembled by the handler so the
/// renderer stays free of database access.
#[derive(Debug)]
pub struct ReportPdf {
    pub date: NaiveDate,
    pub status: String,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub summary: String,
    pub activities: Vec<ActivityPage>,
}

#[derive(Debug)]
pub struct ActivityPage {
    pub civ_number: Option<String>,
    pub description: String,
    pub location_start: String,
    pub location_end: String,
    pub item: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub gross_volume: f64,
    pub discount_length: f64,
    pub discount_width: f64,
    pub discount_height: f64,
    pub discount_volume: f64,
    pub net_volume: f64,
    pub notes: Option<String>,
    /// Absolute path of the stored photo, if any.
    pub photo_path: Option<PathBuf>,
}

pub fn render(report: &ReportPdf) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, page, layer) = PdfDocument::new(
        "Daily Report",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let font_bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    // Header page.
    let current = doc.get_page(page).get_layer(layer);
    current.use_text("Daily Report", 25.0, Mm(70.0), Mm(PAGE_HEIGHT - 30.0), &font_bold);

    let mut y = PAGE_HEIGHT - 50.0;
    current.use_text(
        format!("Date: {}", report.date.format("%Y-%m-%d")),
        12.0,
        Mm(MARGIN),
        Mm(y),
        &font,
    );
    y -= LINE_HEIGHT;
    current.use_text(
        format!("Created by: {}", report.created_by),
        12.0,
        Mm(MARGIN),
        Mm(y),
        &font,
    );
    y -= LINE_HEIGHT;
    current.use_text(
        format!("Status: {}", report.status),
        12.0,
        Mm(MARGIN),
        Mm(y),
        &font,
    );

    if let Some(approver) = &report.approved_by {
        y -= LINE_HEIGHT;
        current.use_text(
            format!("Reviewed by: {}", approver),
            12.0,
            Mm(MARGIN),
            Mm(y),
            &font,
        );
        if let Some(at) = report.approved_at {
            y -= LINE_HEIGHT;
            current.use_text(
                format!("Reviewed at: {}", at.format("%Y-%m-%d %H:%M")),
                12.0,
                Mm(MARGIN),
                Mm(y),
                &font,
            );
        }
    }

    y -= 2.0 * LINE_HEIGHT;
    current.use_text("Summary:", 14.0, Mm(MARGIN), Mm(y), &font_bold);
    y -= LINE_HEIGHT;
    let summary = if report.summary.is_empty() {
        "No summary"
    } else {
        report.summary.as_str()
    };
    for line in wrap_text(summary, 90) {
        current.use_text(line, 12.0, Mm(MARGIN), Mm(y), &font);
        y -= LINE_HEIGHT;
    }

    // One page per activity.
    if report.activities.is_empty() {
        y -= LINE_HEIGHT;
        current.use_text("No recorded activities", 12.0, Mm(MARGIN), Mm(y), &font);
    }

    for (index, activity) in report.activities.iter().enumerate() {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let current = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT - 25.0;
        current.use_text(
            format!("Activity {}", index + 1),
            14.0,
            Mm(MARGIN),
            Mm(y),
            &font_bold,
        );
        y -= 2.0 * LINE_HEIGHT;

        let civ = activity.civ_number.as_deref().unwrap_or("N/A");
        let details = [
            format!("CIV: {}", civ),
            format!("Description: {}", activity.description),
            format!("Start location: {}", activity.location_start),
            format!("End location: {}", activity.location_end),
            format!("Item: {}", activity.item),
        ];
        for detail in details {
            current.use_text(detail, 12.0, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }

        y -= LINE_HEIGHT;
        current.use_text("Measurements:", 12.0, Mm(MARGIN), Mm(y), &font_bold);
        y -= LINE_HEIGHT;
        let measurements = [
            format!("  Length: {} m", activity.length),
            format!("  Width: {} m", activity.width),
            format!("  Height: {} m", activity.height),
            format!("Gross volume: {} m3", activity.gross_volume),
        ];
        for line in measurements {
            current.use_text(line, 12.0, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }

        y -= LINE_HEIGHT;
        current.use_text("Discounts:", 12.0, Mm(MARGIN), Mm(y), &font_bold);
        y -= LINE_HEIGHT;
        let discounts = [
            format!("  Length: {} m", activity.discount_length),
            format!("  Width: {} m", activity.discount_width),
            format!("  Height: {} m", activity.discount_height),
            format!("Discount volume: {} m3", activity.discount_volume),
            format!("Net volume: {} m3", activity.net_volume),
        ];
        for line in discounts {
            current.use_text(line, 12.0, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }

        if let Some(notes) = &activity.notes {
            if !notes.is_empty() {
                y -= LINE_HEIGHT;
                current.use_text("Notes:", 12.0, Mm(MARGIN), Mm(y), &font_bold);
                y -= LINE_HEIGHT;
                for line in wrap_text(notes, 90) {
                    current.use_text(line, 12.0, Mm(MARGIN), Mm(y), &font);
                    y -= LINE_HEIGHT;
                }
            }
        }

        // Photo embedding is best-effort: a broken file loses the image,
        // not the document.
        if let Some(path) = &activity.photo_path {
            match printpdf::image_crate::open(path) {
                Ok(decoded) => {
                    let image = Image::from_dynamic_image(&decoded);
                    image.add_to_layer(
                        current.clone(),
                        ImageTransform {
                            translate_x: Some(Mm(MARGIN)),
                            translate_y: Some(Mm(30.0)),
                            ..Default::default()
                        },
                    );
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to embed activity photo");
                    y -= LINE_HEIGHT;
                    current.use_text("Image could not be loaded", 12.0, Mm(MARGIN), Mm(y), &font);
                }
            }
        }
    }

    doc.save_to_bytes()
}

/// Greedy word wrap; built-in PDF fonts have no layout engine behind them.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_splits_on_width() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn test_wrap_text_empty() {
        assert_eq!(wrap_text("", 80), vec![String::new()]);
    }

    #[test]
    fn test_wrap_text_long_word_keeps_own_line() {
        let lines = wrap_text("a verylongunbreakableword b", 10);
        assert_eq!(lines, vec!["a", "verylongunbreakableword", "b"]);
    }

    #[test]
    fn test_render_report_without_activities() {
        let report = ReportPdf {
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            status: "pending".to_string(),
            created_by: "Ana".to_string(),
            approved_by: None,
            approved_at: None,
            summary: "Excavation at the north access".to_string(),
            activities: vec![],
        };

        let bytes = render(&report).expect("Rendering should succeed");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_report_with_activity_pages() {
        let activity = ActivityPage {
            civ_number: Some("1024".to_string()),
            description: "Trench excavation".to_string(),
            location_start: "K0+100".to_string(),
            location_end: "K0+180".to_string(),
            item: "2.1".to_string(),
            length: 10.0,
            width: 2.0,
            height: 1.5,
            gross_volume: 30.0,
            discount_length: 1.0,
            discount_width: 1.0,
            discount_height: 1.0,
            discount_volume: 1.0,
            net_volume: 29.0,
            notes: Some("Water table reached at 1.2 m".to_string()),
            photo_path: None,
        };

        let report = ReportPdf {
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            status: "approved".to_string(),
            created_by: "Ana".to_string(),
            approved_by: Some("Luis".to_string()),
            approved_at: NaiveDate::from_ymd_opt(2024, 1, 4)
                .unwrap()
                .and_hms_opt(9, 30, 0),
            summary: "Excavation at the north access".to_string(),
            activities: vec![activity],
        };

        let bytes = render(&report).expect("Rendering should succeed");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
