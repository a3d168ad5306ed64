//! One-shot retrieval of point features from an open-data endpoint.
//!
//! The flow is a single request with two possible outcomes:
//!
//! ```text
//! Pending ──► Succeeded(markers)
//!        └──► Failed(message)
//! ```
//!
//! There is no retry and no cancellation; once resolved the state is final.

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// GET request against a Socrata-style endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub endpoint: String,
    /// Value of the `$where` parameter
    pub filter: Option<String>,
    /// Value of the `$limit` parameter
    pub limit: usize,
}

impl FeatureQuery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), filter: None, limit: 1000 }
    }

    pub fn url(&self) -> Result<Url, FetchError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = &self.filter {
            params.push(("$where", filter.clone()));
        }
        params.push(("$limit", self.limit.to_string()));

        Url::parse_with_params(&self.endpoint, &params).map_err(|e| FetchError::Url(e.to_string()))
    }
}

/// A feature reduced to what the map needs
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub lon: f64,
    pub lat: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Pending,
    Succeeded(Vec<Marker>),
    Failed(String),
}

impl FetchState {
    /// Leave `Pending` with the request outcome. A resolved state ignores further outcomes.
    pub fn resolve(self, outcome: Result<Vec<Marker>, FetchError>) -> FetchState {
        match self {
            FetchState::Pending => match outcome {
                Ok(markers) => FetchState::Succeeded(markers),
                Err(e) => FetchState::Failed(e.to_string()),
            },
            resolved => {
                warn!("fetch already resolved; ignoring late outcome");
                resolved
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }

    pub fn markers(&self) -> &[Marker] {
        match self {
            FetchState::Succeeded(markers) => markers,
            _ => &[],
        }
    }

    /// The indicator shown next to the map
    pub fn status_line(&self) -> String {
        match self {
            FetchState::Pending => "Loading…".to_string(),
            FetchState::Succeeded(markers) if markers.len() == 1 => "1 result".to_string(),
            FetchState::Succeeded(markers) => format!("{} results", markers.len()),
            FetchState::Failed(message) => format!("Error: {}", message),
        }
    }
}

/// Perform the single request and resolve the flow
pub fn run_fetch(client: &Client, query: &FeatureQuery, label_field: Option<&str>) -> FetchState {
    let state = FetchState::Pending;
    let outcome = fetch_markers(client, query, label_field);
    let state = state.resolve(outcome);
    info!(status = %state.status_line(), "fetch finished");
    state
}

pub fn fetch_markers(client: &Client, query: &FeatureQuery, label_field: Option<&str>) -> Result<Vec<Marker>, FetchError> {
    let url = query.url()?;
    debug!(%url, "requesting features");

    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body: Json = response.json()?;
    parse_markers(&body, label_field)
}

/// Extract markers from a FeatureCollection or an array of row objects.
/// Rows without usable coordinates are dropped.
pub fn parse_markers(body: &Json, label_field: Option<&str>) -> Result<Vec<Marker>, FetchError> {
    let rows: Vec<(Option<&Json>, Option<&Map<String, Json>>)> =
        if let Some(features) = body.get("features").and_then(|f| f.as_array()) {
            features
                .iter()
                .map(|f| (f.get("geometry"), f.get("properties").and_then(|p| p.as_object())))
                .collect()
        } else if let Some(array) = body.as_array() {
            array.iter().map(|row| (None, row.as_object())).collect()
        } else {
            return Err(FetchError::Decode(
                "expected a FeatureCollection or an array of rows".to_string(),
            ));
        };

    let total = rows.len();
    let markers: Vec<Marker> = rows
        .into_iter()
        .filter_map(|(geometry, props)| {
            let (lon, lat) = geometry
                .and_then(point_coordinates)
                .or_else(|| props.and_then(attribute_coordinates))?;
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                return None;
            }
            let label = label_field
                .and_then(|field| props.and_then(|p| p.get(field)))
                .and_then(json_label);
            Some(Marker { lon, lat, label })
        })
        .collect();

    if markers.len() < total {
        warn!(dropped = total - markers.len(), "features without usable coordinates dropped");
    }
    Ok(markers)
}

fn point_coordinates(geometry: &Json) -> Option<(f64, f64)> {
    if geometry.get("type").and_then(|t| t.as_str()) != Some("Point") {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    Some((coords.first()?.as_f64()?, coords.get(1)?.as_f64()?))
}

/// Synthesize a point from latitude/longitude attributes
fn attribute_coordinates(props: &Map<String, Json>) -> Option<(f64, f64)> {
    let find = |names: &[&str]| {
        props
            .iter()
            .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))
            .and_then(|(_, v)| json_number(v))
    };
    let lat = find(&["latitude", "lat"])?;
    let lon = find(&["longitude", "lon", "lng"])?;
    Some((lon, lat))
}

fn json_number(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn json_label(value: &Json) -> Option<String> {
    match value {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_url() {
        let mut query = FeatureQuery::new("https://data.example.org/resource/abcd.json");
        query.filter = Some("permit_type = 'NEW'".to_string());
        query.limit = 50;
        let url = query.url().unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(
            pairs,
            vec![
                ("$where".to_string(), "permit_type = 'NEW'".to_string()),
                ("$limit".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_url_invalid() {
        assert!(matches!(FeatureQuery::new("not a url").url(), Err(FetchError::Url(_))));
    }

    #[test]
    fn test_parse_geometry_and_attribute_points() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"geometry": {"type": "Point", "coordinates": [-122.3, 47.6]}, "properties": {"name": "a"}},
                {"geometry": null, "properties": {"Latitude": "47.5", "Longitude": "-122.4", "name": "b"}},
                {"geometry": null, "properties": {"name": "no coords"}},
                {"geometry": null, "properties": {"latitude": 95.0, "longitude": 0.0}}
            ]
        });
        let markers = parse_markers(&body, Some("name")).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0], Marker { lon: -122.3, lat: 47.6, label: Some("a".to_string()) });
        assert_eq!(markers[1].lon, -122.4);
        assert_eq!(markers[1].lat, 47.5);
    }

    #[test]
    fn test_parse_row_array() {
        let body = json!([
            {"lat": 1.0, "lng": 2.0, "id": 7},
            {"lat": "x", "lng": 2.0}
        ]);
        let markers = parse_markers(&body, Some("id")).unwrap();
        assert_eq!(markers, vec![Marker { lon: 2.0, lat: 1.0, label: Some("7".to_string()) }]);
    }

    #[test]
    fn test_parse_empty_collection() {
        let body = json!({"type": "FeatureCollection", "features": []});
        let markers = parse_markers(&body, None).unwrap();
        assert!(markers.is_empty());
        let state = FetchState::Pending.resolve(Ok(markers));
        assert_eq!(state.status_line(), "0 results");
        assert!(state.markers().is_empty());
    }

    #[test]
    fn test_parse_rejects_scalar_body() {
        assert!(matches!(parse_markers(&json!("nope"), None), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_single_transition() {
        let state = FetchState::Pending;
        assert!(state.is_pending());
        assert_eq!(state.status_line(), "Loading…");

        let state = state.resolve(Err(FetchError::Status(503)));
        assert_eq!(state, FetchState::Failed("Server responded with status 503".to_string()));
        assert_eq!(state.status_line(), "Error: Server responded with status 503");

        // Already resolved: a later success does not overwrite the failure
        let state = state.resolve(Ok(vec![Marker { lon: 0.0, lat: 0.0, label: None }]));
        assert!(matches!(state, FetchState::Failed(_)));
        assert!(state.markers().is_empty());
    }

    #[test]
    fn test_status_counts() {
        let one = FetchState::Succeeded(vec![Marker { lon: 0.0, lat: 0.0, label: None }]);
        assert_eq!(one.status_line(), "1 result");
    }
}
