use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color as PdfColor, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point, Polygon, Rgb,
};

use super::layout::{Color, Element, Page};
use super::metrics::Font;
use super::RenderError;

const IMAGE_DPI: f32 = 300.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn get(&self, font: Font) -> &IndirectFontRef {
        match font {
            Font::Regular => &self.regular,
            Font::Bold => &self.bold,
            Font::Oblique => &self.oblique,
        }
    }
}

/// Draws a composed page into a single-page PDF.
pub fn rasterize(page: &Page, title: &str) -> Result<Vec<u8>, RenderError> {
    let (doc, page_index, layer_index) =
        PdfDocument::new(title, Mm(page.width), Mm(page.height), "Certificate");

    let builtin = |font| {
        doc.add_builtin_font(font)
            .map_err(|e| RenderError::Setup(format!("{e:?}")))
    };
    let fonts = Fonts {
        regular: builtin(BuiltinFont::Helvetica)?,
        bold: builtin(BuiltinFont::HelveticaBold)?,
        oblique: builtin(BuiltinFont::HelveticaOblique)?,
    };

    let layer = doc.get_page(page_index).get_layer(layer_index);
    for element in &page.elements {
        draw(&layer, &fonts, element);
    }

    doc.save_to_bytes()
        .map_err(|e| RenderError::Rasterize(format!("{e:?}")))
}

fn pdf_color(c: Color) -> PdfColor {
    PdfColor::Rgb(Rgb::new(c.r, c.g, c.b, None))
}

fn point(x: f32, y: f32) -> (Point, bool) {
    (Point::new(Mm(x), Mm(y)), false)
}

fn draw(layer: &PdfLayerReference, fonts: &Fonts, element: &Element) {
    match element {
        Element::Text {
            x,
            y,
            size,
            font,
            color,
            text,
        } => {
            layer.set_fill_color(pdf_color(*color));
            layer.use_text(text.as_str(), *size, Mm(*x), Mm(*y), fonts.get(*font));
        }
        Element::Rect {
            x,
            y,
            width,
            height,
            stroke,
            fill,
        } => {
            let corners = vec![
                point(*x, *y),
                point(*x + *width, *y),
                point(*x + *width, *y + *height),
                point(*x, *y + *height),
            ];
            if let Some(fill) = fill {
                layer.set_fill_color(pdf_color(*fill));
                layer.add_polygon(Polygon {
                    rings: vec![corners.clone()],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                });
            }
            if let Some((color, thickness)) = stroke {
                layer.set_outline_color(pdf_color(*color));
                layer.set_outline_thickness(*thickness);
                layer.add_line(Line {
                    points: corners,
                    is_closed: true,
                });
            }
        }
        Element::Line {
            from,
            to,
            color,
            thickness,
        } => {
            layer.set_outline_color(pdf_color(*color));
            layer.set_outline_thickness(*thickness);
            layer.add_line(Line {
                points: vec![point(from.0, from.1), point(to.0, to.1)],
                is_closed: false,
            });
        }
        Element::Image {
            x,
            y,
            width,
            height,
            image,
        } => {
            let natural_width = image.width() as f32 / IMAGE_DPI * 25.4;
            let natural_height = image.height() as f32 / IMAGE_DPI * 25.4;
            Image::from_dynamic_image(image).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(*x)),
                    translate_y: Some(Mm(*y)),
                    scale_x: Some(*width / natural_width),
                    scale_y: Some(*height / natural_height),
                    dpi: Some(IMAGE_DPI),
                    ..Default::default()
                },
            );
        }
    }
}
