use crate::error::{PipelineError, Result};
use crate::figure::{ChoroplethFigure, COLORBAR_MARGIN, TITLE_HEIGHT};
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;
use std::io::Cursor;
use tracing::debug;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);
const COLORBAR_WIDTH: u32 = 20;

pub fn render_png(figure: &ChoroplethFigure) -> RgbaImage {
    let (width, height) = (figure.width, figure.height);
    debug!("Rendering {} regions at {}x{}", figure.regions.len(), width, height);

    let colors: Vec<Rgba<u8>> = figure
        .regions
        .iter()
        .map(|r| {
            let [red, green, blue] = figure.color_of(r);
            Rgba([red, green, blue, 255])
        })
        .collect();

    // Fill: each pixel center takes the color of the region under it.
    let rows: Vec<Vec<Rgba<u8>>> = (0..height)
        .into_par_iter()
        .map(|y| {
            (0..width)
                .map(|x| {
                    figure
                        .region_at(x as f64 + 0.5, y as f64 + 0.5)
                        .map(|region| colors[region.location])
                        .unwrap_or(BACKGROUND)
                })
                .collect()
        })
        .collect();

    let mut img: RgbaImage = ImageBuffer::new(width, height);
    for (y, row) in rows.into_iter().enumerate() {
        for (x, pixel) in row.into_iter().enumerate() {
            img.put_pixel(x as u32, y as u32, pixel);
        }
    }

    for shape in &figure.shapes {
        for polygon in shape {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                for line in ring.lines() {
                    draw_line(&mut img, line.start.x, line.start.y, line.end.x, line.end.y, OUTLINE);
                }
            }
        }
    }

    draw_colorbar(&mut img, figure);
    img
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| PipelineError::Render(e.to_string()))?;
    Ok(bytes.into_inner())
}

/// Vertical gradient in the right margin, zmax at the top.
fn draw_colorbar(img: &mut RgbaImage, figure: &ChoroplethFigure) {
    let (width, height) = img.dimensions();
    if width < COLORBAR_MARGIN || height <= TITLE_HEIGHT * 2 {
        return;
    }
    let left = width - COLORBAR_MARGIN + (COLORBAR_MARGIN - COLORBAR_WIDTH) / 2;
    let top = TITLE_HEIGHT;
    let bottom = height - TITLE_HEIGHT;
    let scale = figure.scale();

    for y in top..bottom {
        let t = (bottom - 1 - y) as f64 / (bottom - 1 - top).max(1) as f64;
        let z = figure.zmin + t * (figure.zmax - figure.zmin);
        let [r, g, b] = scale.color_at(z, figure.zmin, figure.zmax);
        for x in left..left + COLORBAR_WIDTH {
            img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }

    let (l, r, t, b) = (left as f64, (left + COLORBAR_WIDTH - 1) as f64, top as f64, (bottom - 1) as f64);
    draw_line(img, l, t, r, t, OUTLINE);
    draw_line(img, l, b, r, b, OUTLINE);
    draw_line(img, l, t, l, b, OUTLINE);
    draw_line(img, r, t, r, b, OUTLINE);
}

// Bresenham; pixels off the canvas are skipped.
fn draw_line(img: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
    let (mut x, mut y) = (x0.floor() as i64, y0.floor() as i64);
    let (x1, y1) = (x1.floor() as i64, y1.floor() as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (width, height) = (img.width() as i64, img.height() as i64);

    loop {
        if x >= 0 && y >= 0 && x < width && y < height {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FigureConfig;
    use crate::figure::build_figure;
    use crate::processing::hover_text;
    use crate::types::{BoundaryRecord, JoinedRegion};
    use geo::{polygon, BoundingRect, MultiPolygon};

    fn square(name: &str, lon: f64, lat: f64) -> BoundaryRecord {
        BoundaryRecord {
            id: name.to_string(),
            raw_name: name.to_string(),
            name: name.to_string(),
            join_key: name.to_lowercase(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: lon, y: lat),
                (x: lon + 1.0, y: lat),
                (x: lon + 1.0, y: lat + 1.0),
                (x: lon, y: lat + 1.0),
                (x: lon, y: lat),
            ]]),
        }
    }

    fn small_config() -> FigureConfig {
        FigureConfig { width: 240, height: 160, ..FigureConfig::default() }
    }

    #[test]
    fn regions_fill_with_their_scale_color() {
        let boundaries = vec![square("Shelby", -90.0, 35.0), square("Unicoi", -83.0, 36.0)];
        let joined: Vec<JoinedRegion> = boundaries
            .iter()
            .zip([Some(100.0), None])
            .map(|(b, v)| JoinedRegion { boundary: b, value: v, hover_text: hover_text(&b.name, v) })
            .collect();
        let figure = build_figure(&joined, 2021, &small_config(), None);
        let img = render_png(&figure);
        assert_eq!(img.dimensions(), (240, 160));

        let pixel_at_center = |i: usize| {
            let c = figure.shapes[i].bounding_rect().unwrap().center();
            *img.get_pixel(c.x as u32, c.y as u32)
        };
        // saturated high end vs. the zero fill of an unmatched region
        assert_eq!(pixel_at_center(0), Rgba([0x00, 0x44, 0x1b, 255]));
        assert_eq!(pixel_at_center(1), Rgba([0xf7, 0xfc, 0xf5, 255]));
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn png_encoding_produces_a_png_header() {
        let figure = build_figure(&[], 2020, &small_config(), None);
        let bytes = encode_png(&render_png(&figure)).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn lines_clip_to_the_canvas() {
        let mut img: RgbaImage = ImageBuffer::from_pixel(10, 10, BACKGROUND);
        draw_line(&mut img, -5.0, 5.0, 20.0, 5.0, OUTLINE);
        assert!((0..10).all(|x| *img.get_pixel(x, 5) == OUTLINE));
        assert_eq!(*img.get_pixel(5, 4), BACKGROUND);
    }
}
