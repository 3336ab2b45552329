//! Boundary-geometry (GeoJSON) reader.
//!
//! The document is handed through to the rendering collaborator untouched,
//! except that county features get an `id` built from their state and county
//! codes so they can be joined on the 5-character county code. Only the
//! list of feature names is used by the pipeline itself.

use serde_json::Value;
use tracing::{debug, warn};

use tracker_core::{Result, Scope, TrackerError};

/// A parsed boundary-geometry document for one scope.
#[derive(Debug, Clone)]
pub struct BoundaryGeometry {
    scope: Scope,
    document: Value,
    locations: Vec<String>,
}

impl BoundaryGeometry {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The GeoJSON document for the renderer.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Feature location names, in document order.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Property path the renderer joins locations on.
    pub fn feature_id_key(&self) -> &'static str {
        match self.scope {
            Scope::World => "properties.name",
            Scope::Usa => "properties.NAME",
            Scope::UsCounties => "id",
        }
    }
}

/// Parse a GeoJSON feature collection for `scope`.
pub fn read_boundary_geometry(scope: Scope, source_name: &str, data: &[u8]) -> Result<BoundaryGeometry> {
    let mut document: Value = serde_json::from_slice(data)?;
    let features = document
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| TrackerError::missing_column(source_name, "features"))?;

    let mut locations = Vec::with_capacity(features.len());
    for (i, feature) in features.iter_mut().enumerate() {
        match feature_location(scope, feature) {
            Some(name) => {
                if scope == Scope::UsCounties {
                    if let Some(obj) = feature.as_object_mut() {
                        obj.insert("id".to_string(), Value::String(name.clone()));
                    }
                }
                locations.push(name);
            }
            None => warn!("{}: feature {} has no usable name, skipped", source_name, i),
        }
    }

    debug!("{}: {} features", source_name, locations.len());
    Ok(BoundaryGeometry {
        scope,
        document,
        locations,
    })
}

fn feature_location(scope: Scope, feature: &Value) -> Option<String> {
    let props = feature.get("properties")?;
    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    match scope {
        Scope::World => text("name"),
        Scope::Usa => text("NAME"),
        Scope::UsCounties => {
            let state = text("STATE")?;
            let county = text("COUNTY")?;
            Some(format!("{}{}", state, county))
        }
    }
}
