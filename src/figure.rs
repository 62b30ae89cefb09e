//! Choropleth figure construction.
//!
//! A [`ChoroplethFigure`] is everything a rendering surface needs: per-region
//! values, color inputs and hover labels, the fixed color scale and domain,
//! and the region shapes already projected and fitted to the canvas.

use crate::config::FigureConfig;
use crate::projection::{AlbersConic, Viewport};
use crate::types::JoinedRegion;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{coord, MapCoords, MultiPolygon, Point, Rect};
use geojson::{Feature, FeatureCollection, JsonObject};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use serde_json::json;

pub const TITLE_HEIGHT: u32 = 40;
pub const COLORBAR_MARGIN: u32 = 90;

/// A sequential gradient with evenly spaced stops, low to high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub name: &'static str,
    stops: &'static [&'static str],
}

const SCALES: &[ColorScale] = &[
    ColorScale {
        name: "Greens",
        stops: &["#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45", "#006d2c", "#00441b"],
    },
    ColorScale {
        name: "Blues",
        stops: &["#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c", "#08306b"],
    },
    ColorScale {
        name: "Reds",
        stops: &["#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d", "#a50f15", "#67000d"],
    },
    ColorScale {
        name: "Purples",
        stops: &["#fcfbfd", "#efedf5", "#dadaeb", "#bcbddc", "#9e9ac8", "#807dba", "#6a51a3", "#54278f", "#3f007d"],
    },
    ColorScale {
        name: "Greys",
        stops: &["#ffffff", "#f0f0f0", "#d9d9d9", "#bdbdbd", "#969696", "#737373", "#525252", "#252525", "#000000"],
    },
];

impl ColorScale {
    pub fn named(name: &str) -> Option<Self> {
        SCALES.iter().copied().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Color for `z` on the `[zmin, zmax]` domain; values outside saturate.
    pub fn color_at(&self, z: f64, zmin: f64, zmax: f64) -> [u8; 3] {
        let t = if z.is_nan() { 0.0 } else { ((z - zmin) / (zmax - zmin)).clamp(0.0, 1.0) };
        let pos = t * (self.stops.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.stops.len() - 1);
        let frac = pos - lo as f64;

        let (a, b) = (hex_to_rgb(self.stops[lo]), hex_to_rgb(self.stops[hi]));
        let mix = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * frac).round() as u8;
        [mix(0), mix(1), mix(2)]
    }
}

fn hex_to_rgb(hex: &str) -> [u8; 3] {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    [r, g, b]
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FigureRegion {
    pub location: usize,
    pub id: String,
    pub name: String,
    pub value: Option<f64>,
    pub z: f64,
    pub hover_text: String,
}

// Wrapper for RTree indexing
#[derive(Debug)]
struct RegionEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

#[derive(Debug, Serialize)]
pub struct ChoroplethFigure {
    pub title: String,
    pub year: i32,
    pub colorscale: &'static str,
    pub zmin: f64,
    pub zmax: f64,
    pub colorbar_title: String,
    pub width: u32,
    pub height: u32,
    pub notice: Option<String>,
    pub regions: Vec<FigureRegion>,
    pub geojson: FeatureCollection,
    /// Region shapes in pixel coordinates, parallel to `regions`.
    #[serde(skip)]
    pub shapes: Vec<MultiPolygon<f64>>,
    #[serde(skip)]
    index: RTree<RegionEnvelope>,
}

impl ChoroplethFigure {
    pub fn scale(&self) -> ColorScale {
        ColorScale::named(self.colorscale).unwrap_or(SCALES[0])
    }

    pub fn color_of(&self, region: &FigureRegion) -> [u8; 3] {
        self.scale().color_at(region.z, self.zmin, self.zmax)
    }

    /// The region drawn under pixel position `(x, y)`, if any.
    pub fn region_at(&self, x: f64, y: f64) -> Option<&FigureRegion> {
        let point = Point::new(x, y);
        self.index
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .filter(|candidate| self.shapes[candidate.index].contains(&point))
            .map(|candidate| candidate.index)
            .min()
            .map(|index| &self.regions[index])
    }
}

/// Builds the figure for one year's joined regions. Missing values color as zero.
pub fn build_figure(
    joined: &[JoinedRegion<'_>],
    year: i32,
    config: &FigureConfig,
    notice: Option<String>,
) -> ChoroplethFigure {
    let scale = ColorScale::named(&config.colorscale).unwrap_or(SCALES[0]);
    let albers = AlbersConic::usa();

    let projected: Vec<MultiPolygon<f64>> = joined
        .iter()
        .map(|r| r.boundary.geometry.map_coords(|c| albers.project(c)))
        .collect();

    let bounds = projected
        .iter()
        .filter_map(|mp| mp.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        });

    let plot_area = Rect::new(
        coord! { x: 0.0, y: TITLE_HEIGHT as f64 },
        coord! {
            x: config.width.saturating_sub(COLORBAR_MARGIN).max(1) as f64,
            y: config.height.max(TITLE_HEIGHT + 1) as f64,
        },
    );
    let shapes: Vec<MultiPolygon<f64>> = match bounds {
        Some(bounds) => {
            let viewport = Viewport::fit(bounds, plot_area);
            projected.iter().map(|mp| mp.map_coords(|c| viewport.apply(c))).collect()
        }
        None => Vec::new(),
    };

    let regions: Vec<FigureRegion> = joined
        .iter()
        .enumerate()
        .map(|(location, r)| FigureRegion {
            location,
            id: r.boundary.id.clone(),
            name: r.boundary.name.clone(),
            value: r.value,
            z: r.value.unwrap_or(0.0),
            hover_text: r.hover_text.clone(),
        })
        .collect();

    let features = joined
        .iter()
        .zip(&regions)
        .map(|(r, region)| {
            let mut properties = JsonObject::new();
            properties.insert("location".to_string(), json!(region.location));
            properties.insert("id".to_string(), json!(region.id));
            properties.insert("name".to_string(), json!(region.name));
            properties.insert("value".to_string(), json!(region.value));
            properties.insert("z".to_string(), json!(region.z));
            properties.insert("hover_text".to_string(), json!(region.hover_text));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&r.boundary.geometry))),
                id: Some(geojson::feature::Id::Number(region.location.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let index = RTree::bulk_load(
        shapes
            .iter()
            .enumerate()
            .filter_map(|(index, shape)| {
                let rect = shape.bounding_rect()?;
                Some(RegionEnvelope {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect(),
    );

    ChoroplethFigure {
        title: format!("{} - {}", config.title_prefix, year),
        year,
        colorscale: scale.name,
        zmin: config.zmin,
        zmax: config.zmax,
        colorbar_title: config.colorbar_title.clone(),
        width: config.width,
        height: config.height,
        notice,
        regions,
        geojson: FeatureCollection { bbox: None, features, foreign_members: None },
        shapes,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::hover_text;
    use crate::types::BoundaryRecord;
    use geo::polygon;

    fn square(name: &str, lon: f64, lat: f64) -> BoundaryRecord {
        BoundaryRecord {
            id: name.to_string(),
            raw_name: name.to_string(),
            name: name.to_string(),
            join_key: name.to_lowercase(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: lon, y: lat),
                (x: lon + 0.5, y: lat),
                (x: lon + 0.5, y: lat + 0.5),
                (x: lon, y: lat + 0.5),
                (x: lon, y: lat),
            ]]),
        }
    }

    fn joined<'a>(boundaries: &'a [BoundaryRecord], values: &[Option<f64>]) -> Vec<JoinedRegion<'a>> {
        boundaries
            .iter()
            .zip(values)
            .map(|(b, v)| JoinedRegion { boundary: b, value: *v, hover_text: hover_text(&b.name, *v) })
            .collect()
    }

    #[test]
    fn color_scale_saturates_outside_domain() {
        let greens = ColorScale::named("greens").unwrap();
        assert_eq!(greens.color_at(80.0, 80.0, 100.0), [0xf7, 0xfc, 0xf5]);
        assert_eq!(greens.color_at(0.0, 80.0, 100.0), [0xf7, 0xfc, 0xf5]);
        assert_eq!(greens.color_at(100.0, 80.0, 100.0), [0x00, 0x44, 0x1b]);
        assert_eq!(greens.color_at(140.0, 80.0, 100.0), [0x00, 0x44, 0x1b]);
        assert_eq!(greens.color_at(90.0, 80.0, 100.0), [0x74, 0xc4, 0x76]);
        assert!(ColorScale::named("Jet").is_none());
    }

    #[test]
    fn missing_values_color_as_zero_but_hover_says_na() {
        let boundaries = vec![square("Davidson", -87.0, 36.0), square("Unicoi", -82.5, 36.1)];
        let joined = joined(&boundaries, &[Some(95.2), None]);
        let figure = build_figure(&joined, 2021, &FigureConfig::default(), None);

        assert_eq!(figure.title, "Female (%) by County - 2021");
        assert_eq!(figure.colorscale, "Greens");
        assert_eq!(figure.regions.len(), 2);
        assert_eq!(figure.regions[0].z, 95.2);
        assert_eq!(figure.regions[1].z, 0.0);
        assert_eq!(figure.regions[1].value, None);
        assert!(figure.regions[1].hover_text.ends_with("N/A%"));
        assert_eq!(figure.geojson.features.len(), 2);
    }

    #[test]
    fn shapes_fit_inside_the_plot_area() {
        let boundaries = vec![square("Shelby", -90.0, 35.0), square("Johnson", -82.0, 36.3)];
        let joined = joined(&boundaries, &[Some(93.8), Some(88.0)]);
        let config = FigureConfig::default();
        let figure = build_figure(&joined, 2022, &config, None);

        let rect = figure
            .shapes
            .iter()
            .filter_map(|s| s.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
            .unwrap();
        let eps = 1e-6;
        assert!(rect.min().x >= -eps && rect.min().y >= TITLE_HEIGHT as f64 - eps);
        assert!(rect.max().x <= (config.width - COLORBAR_MARGIN) as f64 + eps);
        assert!(rect.max().y <= config.height as f64 + eps);
        // west county is drawn left of the east one
        assert!(figure.shapes[0].bounding_rect().unwrap().max().x < figure.shapes[1].bounding_rect().unwrap().min().x);
    }

    #[test]
    fn region_at_resolves_pixels_to_regions() {
        let boundaries = vec![square("Shelby", -90.0, 35.0), square("Johnson", -82.0, 36.3)];
        let joined = joined(&boundaries, &[Some(93.8), None]);
        let figure = build_figure(&joined, 2022, &FigureConfig::default(), None);

        let center = figure.shapes[1].bounding_rect().unwrap().center();
        let hit = figure.region_at(center.x, center.y).unwrap();
        assert_eq!(hit.name, "Johnson");
        assert!(figure.region_at(1.0, 1.0).is_none());
    }

    #[test]
    fn no_regions_builds_an_empty_figure() {
        let figure = build_figure(&[], 2020, &FigureConfig::default(), Some("nothing".into()));
        assert!(figure.regions.is_empty());
        assert!(figure.shapes.is_empty());
        assert_eq!(figure.notice.as_deref(), Some("nothing"));
    }
}
