use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::figure::{build_figure, ChoroplethFigure};
use crate::processing::{aggregate, join};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Idle,
    Recomputing,
}

/// What the surface currently shows. An error replaces the previous figure.
#[derive(Debug)]
pub enum Display {
    Figure(ChoroplethFigure),
    Error(PipelineError),
}

/// One viewer's year selection over the shared dataset.
pub struct ControlSurface<'a> {
    dataset: &'a Dataset,
    selection: i32,
    state: SurfaceState,
    display: Display,
}

impl<'a> ControlSurface<'a> {
    /// Starts on the first configured year.
    pub fn new(dataset: &'a Dataset) -> Self {
        let first = dataset.config.measurements.years.first().copied().unwrap_or_default();
        Self::with_selection(dataset, first)
    }

    /// Starts on `year`, running the pipeline once.
    pub fn with_selection(dataset: &'a Dataset, year: i32) -> Self {
        let display = present(run_pipeline(dataset, year));
        Self { dataset, selection: year, state: SurfaceState::Idle, display }
    }

    pub fn years(&self) -> &[i32] {
        &self.dataset.config.measurements.years
    }

    pub fn selection(&self) -> i32 {
        self.selection
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn into_display(self) -> Display {
        self.display
    }

    pub fn select(&mut self, year: i32) -> &Display {
        self.state = SurfaceState::Recomputing;
        self.selection = year;
        self.display = present(run_pipeline(self.dataset, year));
        self.state = SurfaceState::Idle;
        &self.display
    }
}

fn present(result: Result<ChoroplethFigure>) -> Display {
    match result {
        Ok(figure) => Display::Figure(figure),
        Err(e) => {
            warn!("Pipeline failed: {}", e);
            Display::Error(e)
        }
    }
}

/// Filter, aggregate, join and build the figure for `year`.
pub fn run_pipeline(dataset: &Dataset, year: i32) -> Result<ChoroplethFigure> {
    if !dataset.config.supports_year(year) {
        return Err(PipelineError::UnsupportedYear(year));
    }

    let (aggregated, notice) = match aggregate(&dataset.measurements, year) {
        Ok(aggregated) => (aggregated, None),
        Err(PipelineError::EmptySelection(year)) => {
            warn!("No measurements for {}, rendering without values", year);
            (Vec::new(), Some(format!("No data for {}", year)))
        }
        Err(e) => return Err(e),
    };

    let joined = join(&dataset.boundaries, &aggregated);
    let matched = joined.iter().filter(|r| r.value.is_some()).count();
    info!("{}: {} of {} regions have values", year, matched, joined.len());

    Ok(build_figure(&joined, year, &dataset.config.figure, notice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::tennessee_dataset;

    fn figure(display: &Display) -> &ChoroplethFigure {
        match display {
            Display::Figure(f) => f,
            Display::Error(e) => panic!("expected a figure, got {}", e),
        }
    }

    fn value_of(figure: &ChoroplethFigure, name: &str) -> Option<f64> {
        figure.regions.iter().find(|r| r.name == name).unwrap().value
    }

    #[test]
    fn starts_idle_on_the_first_year() {
        let dataset = tennessee_dataset();
        let surface = ControlSurface::new(&dataset);
        assert_eq!(surface.state(), SurfaceState::Idle);
        assert_eq!(surface.selection(), 2020);
        assert_eq!(surface.years(), &[2020, 2021, 2022, 2023]);
        assert_eq!(figure(surface.display()).year, 2020);
    }

    #[test]
    fn selecting_a_year_rebuilds_the_figure() {
        let dataset = tennessee_dataset();
        let mut surface = ControlSurface::new(&dataset);

        let f = figure(surface.select(2021));
        assert_eq!(f.title, "Female (%) by County - 2021");
        assert_eq!(f.regions.len(), dataset.boundaries.len());
        assert_eq!(value_of(f, "Davidson"), Some(95.2));
        assert_eq!(value_of(f, "Shelby"), Some(93.8));
        assert_eq!(surface.state(), SurfaceState::Idle);

        let f = figure(surface.select(2022));
        assert_eq!(value_of(f, "Knox"), Some(92.0));
    }

    #[test]
    fn empty_year_renders_all_regions_as_missing() {
        let dataset = tennessee_dataset();
        let mut surface = ControlSurface::new(&dataset);
        let f = figure(surface.select(2023));

        assert!(f.notice.is_some());
        assert_eq!(f.regions.len(), dataset.boundaries.len());
        assert!(f.regions.iter().all(|r| r.value.is_none() && r.z == 0.0));
        assert!(f.regions.iter().all(|r| r.hover_text.ends_with("N/A%")));
    }

    #[test]
    fn unicoi_is_missing_every_year() {
        let dataset = tennessee_dataset();
        let mut surface = ControlSurface::new(&dataset);
        for year in [2020, 2021, 2022, 2023] {
            assert_eq!(value_of(figure(surface.select(year)), "Unicoi"), None);
        }
    }

    #[test]
    fn with_selection_starts_on_the_requested_year() {
        let dataset = tennessee_dataset();
        let surface = ControlSurface::with_selection(&dataset, 2022);
        assert_eq!(surface.selection(), 2022);
        assert_eq!(surface.state(), SurfaceState::Idle);
        assert_eq!(value_of(figure(surface.display()), "Knox"), Some(92.0));

        let surface = ControlSurface::with_selection(&dataset, 1999);
        assert!(matches!(surface.display(), Display::Error(PipelineError::UnsupportedYear(1999))));
    }

    #[test]
    fn unsupported_year_replaces_the_figure_with_an_error() {
        let dataset = tennessee_dataset();
        let mut surface = ControlSurface::new(&dataset);
        surface.select(2021);

        assert!(matches!(surface.select(1999), Display::Error(PipelineError::UnsupportedYear(1999))));
        assert_eq!(surface.selection(), 1999);
        assert_eq!(surface.state(), SurfaceState::Idle);
    }
}
