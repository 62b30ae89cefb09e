use crate::error::{PipelineError, Result};
use crate::types::{AggregatedMeasurement, BoundaryRecord, JoinedRegion, MeasurementRecord};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Uppercases a letter that follows a non-letter and lowercases the rest,
/// so "mcminn" and "McMinn" both display as "Mcminn".
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_is_letter = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// Case-folded match key. Trailing "county" words are dropped so that
/// "Davidson County" and "Davidson" meet on the same key.
fn fold_name(name: &str) -> String {
    let mut folded = name.trim().to_lowercase();
    // repeated suffixes ("Knox County County") all go, so folding is idempotent
    while let Some(stem) = folded.strip_suffix(" county") {
        if stem.trim().is_empty() {
            break;
        }
        folded = stem.trim_end().to_string();
    }
    folded
}

pub fn boundary_join_key(name: &str) -> String {
    fold_name(name)
}

/// "Davidson County, TN" -> "Davidson County"
pub fn entity_display_name(entity: &str) -> &str {
    entity.split(',').next().unwrap_or(entity).trim()
}

pub fn normalize_entity_name(entity: &str) -> String {
    fold_name(entity_display_name(entity))
}

/// One row per normalized entity for `year`, valued at the mean of its valid rows.
pub fn aggregate(all: &[MeasurementRecord], year: i32) -> Result<Vec<AggregatedMeasurement>> {
    struct Group {
        entity: String,
        key: String,
        sum: f64,
        count: usize,
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut matched = 0usize;

    for record in all.iter().filter(|r| r.year == year) {
        matched += 1;
        let key = normalize_entity_name(&record.entity);
        let idx = *by_key.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                entity: entity_display_name(&record.entity).to_string(),
                key,
                sum: 0.0,
                count: 0,
            });
            groups.len() - 1
        });

        if let Some(value) = record.value {
            groups[idx].sum += value;
            groups[idx].count += 1;
        }
    }

    if matched == 0 {
        return Err(PipelineError::EmptySelection(year));
    }
    debug!("Aggregated {} rows into {} entities for {}", matched, groups.len(), year);

    Ok(groups
        .into_iter()
        .map(|g| AggregatedMeasurement {
            entity: g.entity,
            key: g.key,
            value: (g.count > 0).then(|| g.sum / g.count as f64),
        })
        .collect())
}

/// Left join: every boundary appears once, in input order, matched or not.
pub fn join<'a>(
    boundaries: &'a [BoundaryRecord],
    aggregated: &[AggregatedMeasurement],
) -> Vec<JoinedRegion<'a>> {
    let mut by_key: HashMap<&str, &AggregatedMeasurement> = HashMap::with_capacity(aggregated.len());
    for measurement in aggregated {
        if by_key.contains_key(measurement.key.as_str()) {
            // first match wins
            warn!("Duplicate measurement key '{}', keeping the first row", measurement.key);
            continue;
        }
        by_key.insert(measurement.key.as_str(), measurement);
    }

    boundaries
        .iter()
        .map(|boundary| {
            let value = by_key.get(boundary.join_key.as_str()).and_then(|m| m.value);
            JoinedRegion {
                boundary,
                value,
                hover_text: hover_text(&boundary.name, value),
            }
        })
        .collect()
}

pub fn hover_text(name: &str, value: Option<f64>) -> String {
    let value = match value {
        Some(v) => format!("{:.1}", v),
        None => "N/A".to_string(),
    };
    format!("County: {}<br>Female(%): {}%", name, value)
}
