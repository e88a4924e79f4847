use crate::config::AppConfig;
use crate::dashboard::{self, Dashboard};
use crate::data::Dataset;
use crate::filter::{FilterSelection, StateSelector};
use crate::geocode::PostalCodeTable;
use crate::render;
use crate::spatial::MarkerIndex;
use crate::types::AggregatedCityRow;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Loaded once, read by every request.
pub struct AppState {
    pub dataset: Dataset,
    pub postal_codes: PostalCodeTable,
    pub config: AppConfig,
}

/// Sidebar state as query parameters. Each selected value is its own
/// repeated key (`categories=A&categories=B`), so names may contain commas.
/// An absent key means "everything"; a key given only as empty
/// (`categories=`) means "nothing".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SelectionParams {
    categories: Option<Vec<String>>,
    regions: Option<Vec<String>>,
    states: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct PointParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    dashboard: Dashboard,
    figures: serde_json::Value,
    all_states_label: String,
}

#[derive(Serialize)]
pub struct NearestResponse {
    row: AggregatedCityRow,
    distance_km: f64,
}

impl SelectionParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let values = |key: &str| -> Option<Vec<String>> {
            let mut present = false;
            let mut values = Vec::new();
            for (k, v) in pairs {
                if k == key {
                    present = true;
                    let v = v.trim();
                    if !v.is_empty() {
                        values.push(v.to_string());
                    }
                }
            }
            present.then_some(values)
        };
        Self {
            categories: values("categories"),
            regions: values("regions"),
            states: values("states"),
        }
    }

    pub fn to_selection(&self, dataset: &Dataset, all_label: &str) -> FilterSelection {
        let categories = match &self.categories {
            Some(values) => values.clone(),
            None => dataset.categories(),
        };
        let regions = match &self.regions {
            Some(values) => values.clone(),
            None => dataset.regions(),
        };
        let states: Vec<StateSelector> = match &self.states {
            Some(values) => values.iter().map(|s| StateSelector::parse(s, all_label)).collect(),
            None => vec![StateSelector::All],
        };
        FilterSelection::new(categories, regions, states)
    }
}

fn recompute(state: &AppState, params: &SelectionParams) -> Dashboard {
    let selection = params.to_selection(&state.dataset, &state.config.filter.all_states_label);
    dashboard::render(
        &state.dataset,
        &selection,
        &state.postal_codes,
        state.config.filter.empty_states,
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.server.static_dir);
    Router::new()
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/map.geojson", get(geojson_handler))
        .route("/api/map/nearest", get(nearest_handler))
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: Dataset, postal_codes: PostalCodeTable) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState { dataset, postal_codes, config });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<DashboardResponse> {
    let dashboard = recompute(&state, &SelectionParams::from_pairs(&pairs));
    let figures = render::figures(&dashboard, &state.config.presentation);
    Json(DashboardResponse {
        dashboard,
        figures,
        all_states_label: state.config.filter.all_states_label.clone(),
    })
}

async fn geojson_handler(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<geojson::FeatureCollection> {
    let dashboard = recompute(&state, &SelectionParams::from_pairs(&pairs));
    Json(render::map_geojson(&dashboard.map))
}

async fn nearest_handler(
    State(state): State<Arc<AppState>>,
    Query(point): Query<PointParams>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<Option<NearestResponse>> {
    let dashboard = recompute(&state, &SelectionParams::from_pairs(&pairs));
    let index = MarkerIndex::build(&dashboard.map);
    let nearest = index.nearest(point.lat, point.lon).map(|hit| NearestResponse {
        row: hit.row.clone(),
        distance_km: hit.distance_km,
    });
    Json(nearest)
}
