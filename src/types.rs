use geo::MultiPolygon;

/// One county polygon from the geometry source, already filtered to the target state.
#[derive(Debug, Clone)]
pub struct BoundaryRecord {
    pub id: String,
    pub raw_name: String,
    pub name: String,     // trimmed, title-cased
    pub join_key: String, // trimmed, lowercased
    pub geometry: MultiPolygon<f64>,
}

/// One spreadsheet row, tagged with the sheet year it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub entity: String,
    pub value: Option<f64>,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMeasurement {
    pub entity: String,
    pub key: String,
    pub value: Option<f64>,
}

/// A boundary region with the measurement it matched, if any.
#[derive(Debug, Clone)]
pub struct JoinedRegion<'a> {
    pub boundary: &'a BoundaryRecord,
    pub value: Option<f64>,
    pub hover_text: String,
}

/// A single spreadsheet cell, independent of the backing format.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }

    /// Numeric reading of a percentage cell; "95.2", "95.2%" and 95.2 all parse.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Cell::Empty => return None,
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

/// Header row plus data rows of one year-labelled sheet.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}
