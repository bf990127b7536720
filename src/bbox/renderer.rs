/// Burn labelled bounding boxes into a copy of an image.
///
/// Each box gets an outline in its own colour, a filled label plate at its
/// top-left corner and the label in white text with a black outline.
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::bbox::colour::{BoxColour, ColourSource};
use crate::bbox::font::{FileFontProvider, FontProvider, LabelFont};
use crate::bbox::image_prep::encode_png;
use crate::bbox::types::{LabelledBoxes, NormalizedBox, PixelRect};
use crate::errors::BoxLensResult;

#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub font_size: f32,
    /// Stroke of the box outline, drawn inward from the box edges.
    pub outline_width: u32,
    /// Space between the label text and the plate edge.
    pub text_padding: u32,
    /// Offset of the four diagonal copies that form the text outline.
    pub text_outline_offset: i32,
    pub text_colour: BoxColour,
    pub text_outline_colour: BoxColour,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            outline_width: 3,
            text_padding: 5,
            text_outline_offset: 1,
            text_colour: BoxColour::WHITE,
            text_outline_colour: BoxColour::BLACK,
        }
    }
}

/// Where one box and its label end up, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxLayout {
    /// The scaled box as the model described it.
    pub outline: PixelRect,
    /// `outline` grown on the max sides so the label plate fits inside it.
    pub extent: PixelRect,
    pub plate: PixelRect,
    pub text_origin: (f64, f64),
}

/// Compute the layout of `label` for `bbox` on a `width` × `height` image.
pub fn layout_box(
    label: &str,
    bbox: &NormalizedBox,
    width: u32,
    height: u32,
    font: &dyn LabelFont,
    style: &RenderStyle,
) -> BoxLayout {
    let outline = bbox.to_pixels(width, height);
    let (text_w, text_h) = font.text_size(label);
    let pad = style.text_padding as f64;
    let label_w = text_w as f64 + 2.0 * pad;
    let label_h = text_h as f64 + 2.0 * pad;

    let mut extent = outline;
    if extent.width() < label_w {
        extent.xmax = extent.xmin + label_w;
    }
    if extent.height() < label_h {
        extent.ymax = extent.ymin + label_h;
    }

    BoxLayout {
        outline,
        extent,
        plate: PixelRect {
            xmin: extent.xmin,
            ymin: extent.ymin,
            xmax: extent.xmin + label_w,
            ymax: extent.ymin + label_h,
        },
        text_origin: (extent.xmin + pad, extent.ymin + pad),
    }
}

#[derive(Debug, Clone)]
pub struct RenderedBox {
    pub label: String,
    pub colour: BoxColour,
    pub layout: BoxLayout,
}

/// A fresh image with the boxes drawn in, plus what was drawn where.
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pub image: RgbaImage,
    pub boxes: Vec<RenderedBox>,
}

impl AnnotatedImage {
    pub fn to_png(&self) -> BoxLensResult<Vec<u8>> {
        encode_png(&DynamicImage::ImageRgba8(self.image.clone()))
    }
}

pub struct BoxRenderer<P: FontProvider = FileFontProvider> {
    fonts: P,
    style: RenderStyle,
}

impl<P: FontProvider> BoxRenderer<P> {
    pub fn new(fonts: P) -> Self {
        Self {
            fonts,
            style: RenderStyle::default(),
        }
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Draw `boxes` onto a copy of `image`, in mapping order, taking one
    /// colour per box from `colours`. The input image is left untouched.
    pub fn render(
        &self,
        image: &DynamicImage,
        boxes: &LabelledBoxes,
        colours: &mut dyn ColourSource,
    ) -> AnnotatedImage {
        let mut canvas = image.to_rgba8();
        if boxes.is_empty() {
            return AnnotatedImage { image: canvas, boxes: Vec::new() };
        }

        let (w, h) = canvas.dimensions();
        let font = self.fonts.load(self.style.font_size);
        let mut rendered = Vec::with_capacity(boxes.len());

        for (label, bbox) in boxes.iter() {
            let colour = colours.next_colour();
            let layout = layout_box(label, bbox, w, h, font.as_ref(), &self.style);
            self.draw_box(&mut canvas, label, &layout, colour.to_rgba(), font.as_ref());
            tracing::trace!(label, colour = %colour, ?layout, "box drawn");
            rendered.push(RenderedBox {
                label: label.to_string(),
                colour,
                layout,
            });
        }

        tracing::debug!(count = rendered.len(), width = w, height = h, "boxes rendered");
        AnnotatedImage { image: canvas, boxes: rendered }
    }

    fn draw_box(
        &self,
        canvas: &mut RgbaImage,
        label: &str,
        layout: &BoxLayout,
        col: Rgba<u8>,
        font: &dyn LabelFont,
    ) {
        let (w, h) = canvas.dimensions();
        let stroke = self.style.outline_width as i32;

        let o = &layout.outline;
        draw_outline(
            canvas,
            to_canvas(o.xmin, w, stroke),
            to_canvas(o.ymin, h, stroke),
            to_canvas(o.xmax, w, stroke),
            to_canvas(o.ymax, h, stroke),
            col,
            stroke,
        );

        let p = &layout.plate;
        let plate_w = (p.xmax - p.xmin).round().max(0.0) as i32;
        let plate_h = (p.ymax - p.ymin).round().max(0.0) as i32;
        let px = to_canvas(p.xmin, w, plate_w);
        let py = to_canvas(p.ymin, h, plate_h);
        draw_filled_rect_mut(
            canvas,
            Rect::at(px, py).of_size(plate_w as u32 + 1, plate_h as u32 + 1),
            col,
        );

        let pad = self.style.text_padding as i32;
        let (tx, ty) = (px + pad, py + pad);
        let off = self.style.text_outline_offset;
        let ink = self.style.text_outline_colour.to_rgba();
        for (dx, dy) in [(-off, -off), (off, -off), (-off, off), (off, off)] {
            font.draw_text(canvas, ink, tx + dx, ty + dy, label);
        }
        font.draw_text(canvas, self.style.text_colour.to_rgba(), tx, ty, label);
    }
}

/// Round a pixel coordinate and pull it in to just outside the canvas when it
/// lies far beyond it. Anything `margin` or more pixels outside stays invisible.
fn to_canvas(v: f64, dim: u32, margin: i32) -> i32 {
    let lo = -(margin as f64) - 1.0;
    let hi = dim as f64 + margin as f64 + 1.0;
    if v.is_nan() {
        return lo as i32;
    }
    v.round().clamp(lo, hi) as i32
}

/// Hollow rectangle spanning both corners with a `thickness` px inward stroke.
fn draw_outline(
    canvas: &mut RgbaImage,
    x1: i32, y1: i32, x2: i32, y2: i32,
    col: Rgba<u8>,
    thickness: i32,
) {
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    for t in 0..thickness.max(1) {
        let (l, r, tp, b) = (left + t, right - t, top + t, bottom - t);
        if l > r || tp > b {
            break;
        }
        let rect = Rect::at(l, tp).of_size((r - l + 1) as u32, (b - tp + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, col);
    }
}
