//! Page composition. Everything is positioned in millimetres with the origin
//! at the bottom-left corner of the page, matching PDF user space.

use std::sync::Arc;

use chrono::NaiveDate;
use image::DynamicImage;

use super::metrics::{self, Font, PT_TO_MM};

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;

const HEADER_TOP: f32 = 287.0;
const HEADER_BOTTOM: f32 = 252.0;
const FOOTER_TOP: f32 = 32.0;
const FOOTER_BOTTOM: f32 = 10.0;

const CONTAINER_LEFT: f32 = 15.0;
const CONTAINER_RIGHT: f32 = 195.0;
const CONTAINER_TOP: f32 = 248.0;
const CONTAINER_BOTTOM: f32 = 36.0;
const TOP_BAND_HEIGHT: f32 = 46.0;
const BOTTOM_BAND_HEIGHT: f32 = 54.0;
const INNER_PADDING: f32 = 8.0;

const PHOTO_WIDTH: f32 = 30.0;
const PHOTO_HEIGHT: f32 = 36.0;
const SIGNATURE_SIDE: f32 = 44.0;
const TABLE_LABEL_WIDTH: f32 = 45.0;
const CELL_PADDING: f32 = 1.6;

const TITLE: &str = "CERTIFICATE OF COMPLETION";
const TITLE_SIZE: f32 = 20.0;
const BODY_SIZE_MAX: f32 = 11.0;
const BODY_SIZE_MIN: f32 = 7.0;
const BODY_SIZE_STEP: f32 = 0.5;
const LEADING: f32 = 1.35;

pub const NOT_AVAILABLE: &str = "N/A";
pub const PHOTO_PLACEHOLDER: &str = "PHOTO";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
pub const NAVY: Color = Color::rgb(0.0, 0.0, 0.545);
pub const GOLD: Color = Color::rgb(0.831, 0.686, 0.216);
pub const GREY: Color = Color::rgb(0.45, 0.45, 0.45);
pub const LIGHT_GREY: Color = Color::rgb(0.92, 0.92, 0.92);

#[derive(Debug, Clone)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        color: Color,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        stroke: Option<(Color, f32)>,
        fill: Option<Color>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        thickness: f32,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: Arc<DynamicImage>,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub elements: Vec<Element>,
}

impl Page {
    /// All text runs in drawing order, space separated.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn image_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Image { .. }))
            .count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("content does not fit the {0} band at the minimum body size")]
    Overflow(&'static str),

    #[error("image {0} has no pixels")]
    EmptyImage(&'static str),
}

/// Everything the main container prints, already resolved to display strings.
#[derive(Debug, Clone)]
pub struct CertificateContent {
    pub student_name: String,
    pub fathers_name: String,
    pub address: String,
    pub enrolled_date: NaiveDate,
    pub issued_date: NaiveDate,
    pub certificate_number: String,
    pub course_rows: Vec<(&'static str, String)>,
    pub signature_lines: [String; 3],
    pub institute_name: String,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

pub fn header(image: Option<Arc<DynamicImage>>) -> Result<Vec<Element>, LayoutError> {
    banner(image, HEADER_BOTTOM, HEADER_TOP, "header")
}

pub fn footer(image: Option<Arc<DynamicImage>>) -> Result<Vec<Element>, LayoutError> {
    banner(image, FOOTER_BOTTOM, FOOTER_TOP, "footer")
}

fn banner(
    image: Option<Arc<DynamicImage>>,
    bottom: f32,
    top: f32,
    label: &'static str,
) -> Result<Vec<Element>, LayoutError> {
    let Some(image) = image else {
        return Ok(Vec::new());
    };
    let left = CONTAINER_LEFT - 5.0;
    let right = CONTAINER_RIGHT + 5.0;
    Ok(vec![fit_image(image, left, bottom, right - left, top - bottom, label)?])
}

/// Scales `image` to fit the box while keeping its aspect ratio, centred.
fn fit_image(
    image: Arc<DynamicImage>,
    x: f32,
    y: f32,
    max_width: f32,
    max_height: f32,
    label: &'static str,
) -> Result<Element, LayoutError> {
    let (px_w, px_h) = (image.width(), image.height());
    if px_w == 0 || px_h == 0 {
        return Err(LayoutError::EmptyImage(label));
    }
    let aspect = px_w as f32 / px_h as f32;
    let (width, height) = if max_width / max_height > aspect {
        (max_height * aspect, max_height)
    } else {
        (max_width, max_width / aspect)
    };
    Ok(Element::Image {
        x: x + (max_width - width) / 2.0,
        y: y + (max_height - height) / 2.0,
        width,
        height,
        image,
    })
}

/// The bordered container with its top, middle and bottom bands.
pub fn main_container(
    content: &CertificateContent,
    photo: Option<Arc<DynamicImage>>,
) -> Result<Vec<Element>, LayoutError> {
    let mut out = Vec::new();

    out.push(Element::Rect {
        x: CONTAINER_LEFT,
        y: CONTAINER_BOTTOM,
        width: CONTAINER_RIGHT - CONTAINER_LEFT,
        height: CONTAINER_TOP - CONTAINER_BOTTOM,
        stroke: Some((GOLD, 2.5)),
        fill: None,
    });
    out.push(Element::Rect {
        x: CONTAINER_LEFT + 2.0,
        y: CONTAINER_BOTTOM + 2.0,
        width: CONTAINER_RIGHT - CONTAINER_LEFT - 4.0,
        height: CONTAINER_TOP - CONTAINER_BOTTOM - 4.0,
        stroke: Some((NAVY, 0.6)),
        fill: None,
    });

    let top_band_bottom = CONTAINER_TOP - TOP_BAND_HEIGHT;
    let bottom_band_top = CONTAINER_BOTTOM + BOTTOM_BAND_HEIGHT;

    out.extend(top_band(content, photo, top_band_bottom));
    out.extend(middle_band(content, top_band_bottom, bottom_band_top)?);
    out.extend(bottom_band(content, bottom_band_top));
    Ok(out)
}

fn top_band(
    content: &CertificateContent,
    photo: Option<Arc<DynamicImage>>,
    band_bottom: f32,
) -> Vec<Element> {
    let left = CONTAINER_LEFT + INNER_PADDING;
    let mut out = vec![
        Element::Text {
            x: left,
            y: CONTAINER_TOP - 14.0,
            size: 11.0,
            font: Font::Bold,
            color: BLACK,
            text: format!("Date of Issue: {}", format_date(content.issued_date)),
        },
        Element::Text {
            x: left,
            y: CONTAINER_TOP - 20.0,
            size: 9.0,
            font: Font::Regular,
            color: GREY,
            text: format!("Certificate No: {}", content.certificate_number),
        },
        Element::Text {
            x: left,
            y: CONTAINER_TOP - 30.0,
            size: 13.0,
            font: Font::Bold,
            color: NAVY,
            text: content.institute_name.clone(),
        },
    ];

    let photo_x = CONTAINER_RIGHT - INNER_PADDING - PHOTO_WIDTH;
    let photo_y = band_bottom + (TOP_BAND_HEIGHT - PHOTO_HEIGHT) / 2.0;
    match photo.map(|img| fit_image(img, photo_x, photo_y, PHOTO_WIDTH, PHOTO_HEIGHT, "photo")) {
        Some(Ok(image)) => out.push(image),
        Some(Err(_)) | None => {
            out.push(Element::Rect {
                x: photo_x,
                y: photo_y,
                width: PHOTO_WIDTH,
                height: PHOTO_HEIGHT,
                stroke: None,
                fill: Some(LIGHT_GREY),
            });
            out.push(centered(
                PHOTO_PLACEHOLDER,
                photo_x + PHOTO_WIDTH / 2.0,
                photo_y + PHOTO_HEIGHT / 2.0 - 1.5,
                9.0,
                Font::Bold,
                GREY,
            ));
        }
    }
    out.push(Element::Rect {
        x: photo_x,
        y: photo_y,
        width: PHOTO_WIDTH,
        height: PHOTO_HEIGHT,
        stroke: Some((BLACK, 0.5)),
        fill: None,
    });

    out.push(separator(band_bottom));
    out
}

fn middle_band(
    content: &CertificateContent,
    top: f32,
    bottom: f32,
) -> Result<Vec<Element>, LayoutError> {
    let mut size = BODY_SIZE_MAX;
    while size >= BODY_SIZE_MIN {
        let (elements, cursor) = middle_band_at(content, top, size);
        if cursor >= bottom {
            return Ok(elements);
        }
        size -= BODY_SIZE_STEP;
    }
    Err(LayoutError::Overflow("middle"))
}

/// Lays out the middle band at one body size and returns the final cursor.
fn middle_band_at(content: &CertificateContent, top: f32, size: f32) -> (Vec<Element>, f32) {
    let left = CONTAINER_LEFT + INNER_PADDING;
    let width = CONTAINER_RIGHT - CONTAINER_LEFT - 2.0 * INNER_PADDING;
    let center = (CONTAINER_LEFT + CONTAINER_RIGHT) / 2.0;
    let mut out = Vec::new();

    let mut cursor = top - 4.0 - TITLE_SIZE * PT_TO_MM;
    out.push(centered(TITLE, center, cursor, TITLE_SIZE, Font::Bold, NAVY));
    cursor -= 6.0;

    let intro = format!(
        "This is to certify that {}, whose father's name is {}, residing at {}, \
         was enrolled with us on {} and has successfully completed the course \
         detailed below.",
        content.student_name,
        content.fathers_name,
        content.address,
        format_date(content.enrolled_date),
    );
    cursor = paragraph(&mut out, &intro, left, cursor, width, size);
    cursor -= 3.0;

    cursor = course_table(&mut out, &content.course_rows, left, cursor, width, size - 1.0);
    cursor -= 3.0;

    let closing = format!(
        "During the course {} showed dedication and met every requirement set by \
         the institute. We wish {} every success in future endeavours.",
        content.student_name, content.student_name,
    );
    cursor = paragraph(&mut out, &closing, left, cursor, width, size);

    (out, cursor)
}

fn line_height(size: f32) -> f32 {
    size * LEADING * PT_TO_MM
}

/// Justified paragraph; the last line is left aligned. Returns the new cursor.
fn paragraph(
    out: &mut Vec<Element>,
    text: &str,
    left: f32,
    top: f32,
    width: f32,
    size: f32,
) -> f32 {
    let lines = metrics::wrap(text, Font::Regular, size, width);
    let lh = line_height(size);
    let space = metrics::text_width(" ", Font::Regular, size);
    let mut cursor = top;

    for (i, words) in lines.iter().enumerate() {
        cursor -= lh;
        let baseline = cursor + lh * 0.25;
        let is_last = i + 1 == lines.len();
        let widths: Vec<f32> = words
            .iter()
            .map(|w| metrics::text_width(w, Font::Regular, size))
            .collect();
        let gap = if is_last || words.len() < 2 {
            space
        } else {
            (width - widths.iter().sum::<f32>()) / (words.len() - 1) as f32
        };

        let mut x = left;
        for (word, w) in words.iter().zip(&widths) {
            out.push(Element::Text {
                x,
                y: baseline,
                size,
                font: Font::Regular,
                color: BLACK,
                text: word.clone(),
            });
            x += w + gap;
        }
    }
    cursor
}

fn course_table(
    out: &mut Vec<Element>,
    rows: &[(&'static str, String)],
    left: f32,
    top: f32,
    width: f32,
    size: f32,
) -> f32 {
    let lh = line_height(size);
    let value_left = left + TABLE_LABEL_WIDTH;
    let value_width = width - TABLE_LABEL_WIDTH;
    let mut cursor = top;

    for (label, value) in rows {
        let lines = metrics::wrap(value, Font::Regular, size, value_width - 2.0 * CELL_PADDING);
        let line_count = lines.len().max(1);
        let row_height = line_count as f32 * lh + 2.0 * CELL_PADDING;
        let row_bottom = cursor - row_height;

        out.push(Element::Rect {
            x: left,
            y: row_bottom,
            width: TABLE_LABEL_WIDTH,
            height: row_height,
            stroke: Some((GREY, 0.4)),
            fill: Some(LIGHT_GREY),
        });
        out.push(Element::Rect {
            x: value_left,
            y: row_bottom,
            width: value_width,
            height: row_height,
            stroke: Some((GREY, 0.4)),
            fill: None,
        });

        let first_baseline = cursor - CELL_PADDING - lh + lh * 0.25;
        out.push(Element::Text {
            x: left + CELL_PADDING,
            y: first_baseline,
            size,
            font: Font::Bold,
            color: BLACK,
            text: (*label).to_string(),
        });
        for (i, words) in lines.iter().enumerate() {
            out.push(Element::Text {
                x: value_left + CELL_PADDING,
                y: first_baseline - i as f32 * lh,
                size,
                font: Font::Regular,
                color: BLACK,
                text: words.join(" "),
            });
        }
        cursor = row_bottom;
    }
    cursor
}

fn bottom_band(content: &CertificateContent, band_top: f32) -> Vec<Element> {
    let side = SIGNATURE_SIDE;
    let x = CONTAINER_RIGHT - INNER_PADDING - side;
    let y = CONTAINER_BOTTOM + (BOTTOM_BAND_HEIGHT - side) / 2.0;
    let center = x + side / 2.0;

    let mut out = vec![
        separator(band_top),
        Element::Rect {
            x,
            y,
            width: side,
            height: side,
            stroke: Some((NAVY, 0.6)),
            fill: None,
        },
        Element::Line {
            from: (x + 5.0, y + 24.0),
            to: (x + side - 5.0, y + 24.0),
            color: BLACK,
            thickness: 0.5,
        },
    ];

    let [first, second, third] = &content.signature_lines;
    out.push(centered(first, center, y + 18.0, 9.0, Font::Bold, BLACK));
    out.push(centered(second, center, y + 12.5, 8.5, Font::Regular, BLACK));
    out.push(centered(third, center, y + 7.0, 8.5, Font::Oblique, GREY));
    out
}

fn separator(y: f32) -> Element {
    Element::Line {
        from: (CONTAINER_LEFT + INNER_PADDING, y),
        to: (CONTAINER_RIGHT - INNER_PADDING, y),
        color: GOLD,
        thickness: 0.5,
    }
}

fn centered(text: &str, center: f32, y: f32, size: f32, font: Font, color: Color) -> Element {
    let width = metrics::text_width(text, font, size);
    Element::Text {
        x: center - width / 2.0,
        y,
        size,
        font,
        color,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(address: &str) -> CertificateContent {
        CertificateContent {
            student_name: "Jane Doe".to_string(),
            fathers_name: "John Doe".to_string(),
            address: address.to_string(),
            enrolled_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            issued_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            certificate_number: "CERT-20240402101010-ABC123".to_string(),
            course_rows: vec![
                ("Course", "Web Development".to_string()),
                ("Duration", "3 months".to_string()),
                ("Hours/Day", NOT_AVAILABLE.to_string()),
                ("Mode", "Online".to_string()),
                ("Batch", NOT_AVAILABLE.to_string()),
                ("Instructor", "Ada Lovelace".to_string()),
            ],
            signature_lines: [
                "Authorized Signature".to_string(),
                "Director".to_string(),
                "Learning Institute".to_string(),
            ],
            institute_name: "Learning Institute".to_string(),
        }
    }

    fn page(elements: Vec<Element>) -> Page {
        Page {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            elements,
        }
    }

    #[test]
    fn dates_use_day_month_year() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(format_date(d), "10-01-2024");
    }

    #[test]
    fn main_container_prints_student_and_course_details() {
        let elements = main_container(&content("12 Elm Street, Springfield"), None).unwrap();
        let text = page(elements).text();
        assert!(text.contains("Jane Doe"));
        assert!(text.contains("John Doe"));
        assert!(text.contains("Date of Issue: 02-04-2024"));
        assert!(text.contains("10-01-2024"));
        assert!(text.contains("Web Development"));
        assert!(text.contains("N/A"));
        assert!(text.contains("Authorized Signature"));
        assert!(text.contains(PHOTO_PLACEHOLDER));
    }

    #[test]
    fn photo_replaces_placeholder() {
        let photo = Arc::new(DynamicImage::new_rgb8(60, 80));
        let elements = main_container(&content("x"), Some(photo)).unwrap();
        let page = page(elements);
        assert_eq!(page.image_count(), 1);
        assert!(!page.text().contains(PHOTO_PLACEHOLDER));
    }

    #[test]
    fn justified_lines_reach_the_right_edge() {
        let mut out = Vec::new();
        let text = "lorem ipsum dolor sit amet consectetur ".repeat(8);
        paragraph(&mut out, &text, 20.0, 200.0, 100.0, 11.0);

        let first_baseline = match &out[0] {
            Element::Text { y, .. } => *y,
            _ => unreachable!(),
        };
        let last_on_first_line = out
            .iter()
            .filter_map(|e| match e {
                Element::Text { x, y, text, size, .. } if (*y - first_baseline).abs() < 1e-4 => {
                    Some(x + metrics::text_width(text, Font::Regular, *size))
                }
                _ => None,
            })
            .fold(0.0_f32, f32::max);
        assert!((last_on_first_line - 120.0).abs() < 0.01, "{last_on_first_line}");
    }

    #[test]
    fn long_addresses_shrink_the_body_text() {
        let short = main_container(&content("x"), None).unwrap();
        let long = main_container(&content(&"Apartment 4B, Long Road ".repeat(25)), None).unwrap();
        let body_size = |elements: &[Element]| {
            elements
                .iter()
                .find_map(|e| match e {
                    Element::Text { text, size, .. } if text == "certify" => Some(*size),
                    _ => None,
                })
                .unwrap()
        };
        assert!(body_size(&long) < body_size(&short));
    }

    #[test]
    fn impossible_content_overflows() {
        let err = main_container(&content(&"word ".repeat(3000)), None).unwrap_err();
        assert!(matches!(err, LayoutError::Overflow("middle")));
    }

    #[test]
    fn missing_banner_is_omitted() {
        assert!(header(None).unwrap().is_empty());
        assert!(footer(None).unwrap().is_empty());
    }

    #[test]
    fn wide_banner_keeps_aspect_ratio() {
        let img = Arc::new(DynamicImage::new_rgb8(1000, 100));
        let elements = header(Some(img)).unwrap();
        match &elements[0] {
            Element::Image { width, height, .. } => {
                assert!((width / height - 10.0).abs() < 1e-3);
                assert!(*height <= HEADER_TOP - HEADER_BOTTOM);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = Arc::new(DynamicImage::new_rgb8(0, 0));
        assert!(matches!(header(Some(img)), Err(LayoutError::EmptyImage("header"))));
    }
}
