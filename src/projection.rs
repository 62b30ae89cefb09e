use geo::{Coord, Rect};

/// Albers equal-area conic on the unit sphere.
#[derive(Debug, Clone, Copy)]
pub struct AlbersConic {
    n: f64,
    c: f64,
    rho0: f64,
    lon0: f64,
}

impl AlbersConic {
    pub fn new(parallel1: f64, parallel2: f64, lat0: f64, lon0: f64) -> Self {
        let (phi1, phi2, phi0) = (parallel1.to_radians(), parallel2.to_radians(), lat0.to_radians());
        let n = (phi1.sin() + phi2.sin()) / 2.0;
        let c = phi1.cos().powi(2) + 2.0 * n * phi1.sin();
        let rho0 = (c - 2.0 * n * phi0.sin()).sqrt() / n;
        Self { n, c, rho0, lon0: lon0.to_radians() }
    }

    /// Conterminous-US parameters: parallels 29.5°N and 45.5°N, origin 37.5°N 96°W.
    pub fn usa() -> Self {
        Self::new(29.5, 45.5, 37.5, -96.0)
    }

    /// Lon/lat degrees in, projected units out (y grows northward).
    pub fn project(&self, lonlat: Coord<f64>) -> Coord<f64> {
        let phi = lonlat.y.to_radians();
        let mut dlon = lonlat.x.to_radians() - self.lon0;
        if dlon > std::f64::consts::PI {
            dlon -= 2.0 * std::f64::consts::PI;
        } else if dlon < -std::f64::consts::PI {
            dlon += 2.0 * std::f64::consts::PI;
        }
        let rho = (self.c - 2.0 * self.n * phi.sin()).max(0.0).sqrt() / self.n;
        let theta = self.n * dlon;
        Coord {
            x: rho * theta.sin(),
            y: self.rho0 - rho * theta.cos(),
        }
    }
}

/// Maps projected coordinates onto a pixel box, preserving aspect ratio
/// and flipping y so that north is up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f64,
    min_x: f64,
    max_y: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(bounds: Rect<f64>, target: Rect<f64>) -> Self {
        let sx = target.width() / bounds.width().max(f64::EPSILON);
        let sy = target.height() / bounds.height().max(f64::EPSILON);
        let scale = sx.min(sy);
        Self {
            scale,
            min_x: bounds.min().x,
            max_y: bounds.max().y,
            offset_x: target.min().x + (target.width() - bounds.width() * scale) / 2.0,
            offset_y: target.min().y + (target.height() - bounds.height() * scale) / 2.0,
        }
    }

    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.min_x) * self.scale + self.offset_x,
            y: (self.max_y - c.y) * self.scale + self.offset_y,
        }
    }
}
