use crate::control::{ControlSurface, Display};
use crate::data::Dataset;
use crate::error::PipelineError;
use crate::figure::ChoroplethFigure;
use crate::render::{encode_png, render_png};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub type AppState = Arc<Dataset>;

#[derive(Deserialize, Default)]
pub struct YearParams {
    year: Option<i32>,
}

#[derive(Deserialize)]
pub struct QueryParams {
    year: Option<i32>,
    x: f64,
    y: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct QueryResponse {
    id: String,
    name: String,
    value: Option<f64>,
    hover_text: String,
}

pub struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::UnsupportedYear(_) => StatusCode::BAD_REQUEST,
            PipelineError::EmptySelection(_) => StatusCode::NOT_FOUND,
            PipelineError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

pub fn router(dataset: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/map.png", get(map_handler))
        .route("/api/figure", get(figure_handler))
        .route("/api/query", get(query_handler))
        .route("/api/years", get(years_handler))
        .layer(CorsLayer::permissive())
        .with_state(dataset)
}

pub async fn start_server(dataset: Dataset) -> Result<()> {
    let port = dataset.config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = router(Arc::new(dataset));

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs one selection in a fresh session; sessions never share a selection.
fn select(dataset: &Dataset, year: Option<i32>) -> (i32, Display) {
    let surface = match year {
        Some(year) => ControlSurface::with_selection(dataset, year),
        None => ControlSurface::new(dataset),
    };
    (surface.selection(), surface.into_display())
}

fn figure_for(dataset: &Dataset, year: Option<i32>) -> Result<ChoroplethFigure, ApiError> {
    match select(dataset, year).1 {
        Display::Figure(figure) => Ok(figure),
        Display::Error(e) => Err(e.into()),
    }
}

async fn map_handler(
    State(dataset): State<AppState>,
    Query(params): Query<YearParams>,
) -> Result<Response, ApiError> {
    let figure = figure_for(&dataset, params.year)?;
    let png = encode_png(&render_png(&figure))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn figure_handler(
    State(dataset): State<AppState>,
    Query(params): Query<YearParams>,
) -> Result<Json<ChoroplethFigure>, ApiError> {
    Ok(Json(figure_for(&dataset, params.year)?))
}

async fn query_handler(
    State(dataset): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Option<QueryResponse>>, ApiError> {
    let figure = figure_for(&dataset, params.year)?;
    Ok(Json(figure.region_at(params.x, params.y).map(|region| QueryResponse {
        id: region.id.clone(),
        name: region.name.clone(),
        value: region.value,
        hover_text: region.hover_text.clone(),
    })))
}

async fn years_handler(State(dataset): State<AppState>) -> Json<Vec<i32>> {
    Json(dataset.config.measurements.years.clone())
}

async fn index_handler(State(dataset): State<AppState>, Query(params): Query<YearParams>) -> Html<String> {
    let (year, display) = select(&dataset, params.year);
    let config = &dataset.config.figure;

    let options: String = dataset
        .config
        .measurements
        .years
        .iter()
        .map(|y| {
            let selected = if *y == year { " selected" } else { "" };
            format!("<option value=\"{y}\"{selected}>{y}</option>")
        })
        .collect();

    let body = match &display {
        Display::Figure(figure) => {
            let notice = figure
                .notice
                .as_deref()
                .map(|n| format!("<p class=\"notice\">{}</p>", escape(n)))
                .unwrap_or_default();
            format!(
                r#"<h2>{title}</h2>{notice}
<div id="map"><img id="map-img" src="/map.png?year={year}" width="{w}" height="{h}" alt="{title}"><div id="tip"></div></div>
<p class="legend">{bar}: {zmin} to {zmax} ({scale})</p>"#,
                title = escape(&figure.title),
                w = figure.width,
                h = figure.height,
                bar = escape(&figure.colorbar_title),
                zmin = figure.zmin,
                zmax = figure.zmax,
                scale = figure.colorscale,
            )
        }
        Display::Error(e) => format!("<p class=\"error\">{}</p>", escape(&e.to_string())),
    };

    Html(format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{page}</title>
<style>
body {{ font-family: sans-serif; margin: 0 1rem; }}
#map {{ position: relative; width: 100%; }}
#map img {{ max-width: 100%; height: auto; }}
#tip {{ position: absolute; display: none; background: #fff; border: 1px solid #333; padding: 4px; pointer-events: none; }}
.error {{ color: #a00; }}
.notice {{ color: #555; }}
</style>
</head>
<body>
<h1>{page}</h1>
<form method="get" action="/">
<label>Select Year <select name="year" onchange="this.form.submit()">{options}</select></label>
</form>
{body}
<script>
const img = document.getElementById("map-img");
const tip = document.getElementById("tip");
if (img) {{
  img.addEventListener("mousemove", async (e) => {{
    const sx = img.naturalWidth / img.clientWidth, sy = img.naturalHeight / img.clientHeight;
    const res = await fetch(`/api/query?year={year}&x=${{e.offsetX * sx}}&y=${{e.offsetY * sy}}`);
    const hit = res.ok ? await res.json() : null;
    if (!hit) {{ tip.style.display = "none"; return; }}
    // hover text carries names from the geometry file; only <br> becomes markup
    const lines = hit.hover_text.split("<br>");
    tip.replaceChildren(...lines.flatMap((line, i) => i ? [document.createElement("br"), line] : [line]));
    tip.style.left = (e.offsetX + 12) + "px";
    tip.style.top = (e.offsetY + 12) + "px";
    tip.style.display = "block";
  }});
  img.addEventListener("mouseleave", () => {{ tip.style.display = "none"; }});
}}
</script>
</body>
</html>"#,
        page = escape(&config.page_title),
    ))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}
