use crate::config::{AppConfig, PresentationConfig};
use crate::correlation::CorrelationMatrix;
use crate::dashboard::Dashboard;
use crate::types::{AggregatedCityRow, SalesRecord, StateTotal};
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Plotly figures for the four dashboard charts.
pub fn figures(dashboard: &Dashboard, style: &PresentationConfig) -> JsonValue {
    json!({
        "map": map_figure(&dashboard.map, style),
        "state_bar": state_bar_figure(&dashboard.state_totals, style),
        "scatter": scatter_figure(&dashboard.scatter, style),
        "heatmap": heatmap_figure(&dashboard.correlation),
    })
}

fn title(text: &str) -> JsonValue {
    json!({ "text": text, "font": { "size": 28, "family": "Arial", "color": "black" } })
}

pub fn map_figure(rows: &[AggregatedCityRow], style: &PresentationConfig) -> JsonValue {
    let located: Vec<&AggregatedCityRow> = rows.iter().filter(|r| r.location.is_some()).collect();
    let lat: Vec<f64> = located.iter().filter_map(|r| r.location.map(|p| p.latitude)).collect();
    let lon: Vec<f64> = located.iter().filter_map(|r| r.location.map(|p| p.longitude)).collect();
    let sales: Vec<f64> = located.iter().map(|r| r.sales).collect();
    let city: Vec<&str> = located.iter().map(|r| r.city.as_str()).collect();
    let state: Vec<&str> = located.iter().map(|r| r.state.as_str()).collect();

    // plotly.express sizeref convention for size_max
    let max_sales = sales.iter().copied().fold(0.0_f64, f64::max);
    let size_max = f64::from(style.map_size_max);
    let sizeref = if max_sales > 0.0 { 2.0 * max_sales / (size_max * size_max) } else { 1.0 };

    let colorscale: Vec<JsonValue> = style
        .map_color_scale
        .iter()
        .map(|(stop, hex)| json!([stop, hex_to_rgb(hex)]))
        .collect();

    json!({
        "data": [{
            "type": "scattergeo",
            "lat": lat,
            "lon": lon,
            "text": city,
            "customdata": state,
            "hovertemplate": "<b>%{text}</b><br>State=%{customdata}<br>Sales=%{marker.color}<extra></extra>",
            "marker": {
                "color": sales,
                "size": sales,
                "sizemode": "area",
                "sizeref": sizeref,
                "colorscale": colorscale,
                "colorbar": { "title": "Sales" },
            },
        }],
        "layout": {
            "title": title("Total sales by city"),
            "width": 1200,
            "height": 800,
            "geo": {
                "scope": "usa",
                "projection": { "type": "albers usa" },
                "showland": true,
                "landcolor": "lightgray",
                "showocean": true,
                "oceancolor": "#F5F7FA",
                "showlakes": true,
                "lakecolor": "lightblue",
            },
            "margin": { "l": 0, "r": 0, "t": 50, "b": 0 },
        },
    })
}

pub fn state_bar_figure(totals: &[StateTotal], style: &PresentationConfig) -> JsonValue {
    let states: Vec<&str> = totals.iter().map(|t| t.state.as_str()).collect();
    let sales: Vec<f64> = totals.iter().map(|t| t.sales).collect();
    json!({
        "data": [{
            "type": "bar",
            "orientation": "h",
            "x": sales,
            "y": states,
            "marker": { "color": hex_to_rgb(&style.bar_color) },
        }],
        "layout": {
            "title": title("Total sales by state"),
            "width": 1400,
            "height": 800,
            "xaxis": { "title": "Sales", "tickformat": ".2s" },
            "yaxis": { "title": "State" },
            "bargap": 0.2,
        },
    })
}

pub fn scatter_figure(records: &[SalesRecord], style: &PresentationConfig) -> JsonValue {
    // one trace per category, in first-appearance order
    let mut order: Vec<&str> = Vec::new();
    let mut by_category: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in records {
        let entry = by_category.entry(r.category.as_str()).or_insert_with(|| {
            order.push(r.category.as_str());
            (Vec::new(), Vec::new())
        });
        entry.0.push(r.sales);
        entry.1.push(r.profit);
    }

    let traces: Vec<JsonValue> = order
        .iter()
        .filter_map(|category| by_category.get(category).map(|points| (category, points)))
        .map(|(category, (sales, profit))| {
            let mut trace = json!({
                "type": "scatter",
                "mode": "markers",
                "name": category,
                "x": sales,
                "y": profit,
            });
            if let Some(hex) = style.category_colors.get(*category) {
                trace["marker"] = json!({ "color": hex_to_rgb(hex) });
            }
            trace
        })
        .collect();

    json!({
        "data": traces,
        "layout": {
            "title": title("Correlation between sales and profit"),
            "xaxis": { "title": "Sales" },
            "yaxis": { "title": "Profit" },
        },
    })
}

pub fn heatmap_figure(matrix: &CorrelationMatrix) -> JsonValue {
    let labels: Vec<&str> = matrix.labels.iter().map(|m| m.label()).collect();
    // NaN becomes null
    let z = serde_json::to_value(matrix.values).unwrap_or(JsonValue::Null);
    json!({
        "data": [{
            "type": "heatmap",
            "z": z,
            "x": labels,
            "y": labels,
            "text": z,
            "texttemplate": "%{text:.2f}",
            "textfont": { "size": 14 },
            "colorscale": "Reds",
            "colorbar": { "title": "Correlation" },
        }],
        "layout": {
            "title": title("Correlation between sales, profit and discount"),
            "width": 600,
            "height": 600,
        },
    })
}

/// Map layer as GeoJSON points.
pub fn map_geojson(rows: &[AggregatedCityRow]) -> FeatureCollection {
    let features = rows
        .iter()
        .filter_map(|row| {
            let location = row.location?;
            let mut properties = JsonObject::new();
            properties.insert("state".to_string(), json!(row.state));
            properties.insert("city".to_string(), json!(row.city));
            properties.insert("postal_code".to_string(), json!(row.postal_code));
            properties.insert("category".to_string(), json!(row.category));
            properties.insert("sales".to_string(), json!(row.sales));
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&location.to_point()))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

/// Writes dashboard.json, figures.json and map.geojson.
pub fn write_snapshot(config: &AppConfig, dashboard: &Dashboard) -> Result<()> {
    let dir = &config.output.dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    write_json(&dir.join("dashboard.json"), &serde_json::to_value(dashboard)?)?;
    write_json(&dir.join("figures.json"), &figures(dashboard, &config.presentation))?;

    let geojson = geojson::GeoJson::from(map_geojson(&dashboard.map)).to_string();
    let path = dir.join("map.geojson");
    fs::write(&path, geojson).with_context(|| format!("Failed to write {:?}", path))?;

    info!("Wrote snapshot to {:?}", dir);
    Ok(())
}

fn write_json(path: &Path, value: &JsonValue) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

fn hex_to_rgb(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    format!("rgb({},{},{})", channel(0..2), channel(2..4), channel(4..6))
}
