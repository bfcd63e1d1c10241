//! Floor-plan document model.
//!
//! Field names follow the plan editor's wire format (camelCase where the
//! editor uses it). Unknown element fields are preserved in
//! [`PlanElement::extra`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AdvisorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanScale {
    pub px_per_meter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanBackground {
    pub file_id: String,
    pub opacity: f64,
}

fn default_unit() -> String {
    "px".to_string()
}

/// Plan canvas metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMeta {
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub scale: Option<PlanScale>,
    #[serde(default)]
    pub background: Option<PlanBackground>,
    #[serde(default)]
    pub ceiling_height_m: Option<f64>,
}

impl PlanMeta {
    /// Pixels per meter, when a usable scale is set.
    pub fn px_per_meter(&self) -> Option<f64> {
        self.scale.as_ref().map(|s| s.px_per_meter).filter(|v| *v > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpeningType {
    Door,
    Window,
    Arch,
    Custom,
}

impl OpeningType {
    /// Russian name used in prompt text.
    pub fn label(&self) -> &'static str {
        match self {
            OpeningType::Door => "дверь",
            OpeningType::Window => "окно",
            OpeningType::Arch => "arch",
            OpeningType::Custom => "custom",
        }
    }
}

/// A door or window cut into a wall, measured along the wall in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    pub id: String,
    #[serde(rename = "type")]
    pub opening_type: OpeningType,
    pub from_m: f64,
    pub to_m: f64,
    pub bottom_m: f64,
    pub top_m: f64,
}

/// Element geometry, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Geometry {
    /// `[x1, y1, x2, y2]` plus optional openings.
    Segment {
        points: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        openings: Option<Vec<Opening>>,
    },
    /// Flat `[x1, y1, ..., xn, yn]` vertex list.
    Polygon { points: Vec<f64> },
    Point { x: f64, y: f64 },
}

impl Geometry {
    /// Openings of a segment geometry; empty for other kinds.
    pub fn openings(&self) -> &[Opening] {
        match self {
            Geometry::Segment { openings: Some(openings), .. } => openings,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementRole {
    Existing,
    ToDelete,
    New,
    Modified,
}

impl fmt::Display for ElementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementRole::Existing => "EXISTING",
            ElementRole::ToDelete => "TO_DELETE",
            ElementRole::New => "NEW",
            ElementRole::Modified => "MODIFIED",
        })
    }
}

/// Broad classification of [`PlanElement::element_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Wall,
    Zone,
    Label,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanElement {
    pub id: String,
    /// `wall`, `zone`, `label` or an editor-specific type.
    #[serde(rename = "type")]
    pub element_type: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub role: Option<ElementRole>,
    #[serde(default)]
    pub load_bearing: Option<bool>,
    /// Wall thickness in meters.
    #[serde(default)]
    pub thickness: Option<f64>,
    #[serde(default)]
    pub zone_type: Option<String>,
    #[serde(default)]
    pub related_to: Option<Vec<String>>,
    #[serde(default)]
    pub selected: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanElement {
    pub fn kind(&self) -> ElementKind {
        match self.element_type.as_str() {
            "wall" => ElementKind::Wall,
            "zone" => ElementKind::Zone,
            "label" => ElementKind::Label,
            _ => ElementKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Chair,
    Table,
    Bed,
    Window,
    Door,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Chair => "chair",
            ObjectType::Table => "table",
            ObjectType::Bed => "bed",
            ObjectType::Window => "window",
            ObjectType::Door => "door",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of furniture or a fixture placed in 3D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object3D {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub position: Vec3,
    #[serde(default)]
    pub size: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Vec3>,
    #[serde(default)]
    pub wall_id: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}

/// A floor plan: canvas metadata, 2D elements and optional 3D objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub meta: PlanMeta,
    #[serde(default)]
    pub elements: Vec<PlanElement>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects3d: Vec<Object3D>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Object3D>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Object3D>>::deserialize(deserializer)?.unwrap_or_default())
}

fn invalid(message: String) -> AdvisorError {
    AdvisorError::InvalidPlan(message)
}

impl PlanDocument {
    /// Elements of one kind, in document order.
    pub fn elements_of(&self, kind: ElementKind) -> impl Iterator<Item = &PlanElement> {
        self.elements.iter().filter(move |e| e.kind() == kind)
    }

    /// Ids of selected elements followed by ids of selected 3D objects.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.id.as_str())
            .chain(self.objects3d.iter().filter(|o| o.selected).map(|o| o.id.as_str()))
            .collect()
    }

    /// Check geometry and range invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::InvalidPlan`] naming the first offending item.
    pub fn validate(&self) -> Result<()> {
        let meta = &self.meta;
        if !(meta.width >= 0.0 && meta.height >= 0.0) {
            return Err(invalid(format!("negative plan size {}x{}", meta.width, meta.height)));
        }
        if let Some(scale) = &meta.scale {
            if !(scale.px_per_meter > 0.0) {
                return Err(invalid(format!("px_per_meter must be positive, got {}", scale.px_per_meter)));
            }
        }
        if let Some(background) = &meta.background {
            if !(0.0..=1.0).contains(&background.opacity) {
                return Err(invalid(format!("background opacity {} outside 0..=1", background.opacity)));
            }
        }
        if let Some(h) = meta.ceiling_height_m {
            if !(1.8..=5.0).contains(&h) {
                return Err(invalid(format!("ceiling height {h} m outside 1.8..=5")));
            }
        }

        for element in &self.elements {
            match &element.geometry {
                Geometry::Segment { points, openings } => {
                    if points.len() != 4 {
                        return Err(invalid(format!(
                            "segment geometry of {} needs 4 coordinates, got {}",
                            element.id,
                            points.len()
                        )));
                    }
                    for opening in openings.iter().flatten() {
                        let values = [opening.from_m, opening.to_m, opening.bottom_m, opening.top_m];
                        if values.iter().any(|v| !(*v >= 0.0)) {
                            return Err(invalid(format!(
                                "opening {} in {} has a negative offset",
                                opening.id, element.id
                            )));
                        }
                    }
                }
                Geometry::Polygon { points } => {
                    if points.len() < 6 || points.len() % 2 != 0 {
                        return Err(invalid(format!(
                            "polygon geometry of {} needs an even count of at least 6 coordinates, got {}",
                            element.id,
                            points.len()
                        )));
                    }
                }
                Geometry::Point { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionType {
    Original,
    Modified,
}

/// A stored plan revision of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanVersion {
    pub id: String,
    pub order_id: String,
    pub version_type: VersionType,
    pub plan: PlanDocument,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn plan(elements: Value) -> PlanDocument {
        serde_json::from_value(json!({
            "meta": {"width": 800, "height": 600, "scale": {"px_per_meter": 100}},
            "elements": elements,
        }))
        .unwrap()
    }

    #[test]
    fn wire_format_round_trips_editor_fields() {
        let doc = plan(json!([{
            "id": "w1",
            "type": "wall",
            "geometry": {"kind": "segment", "points": [0, 0, 100, 0],
                         "openings": [{"id": "d1", "type": "door", "from_m": 0.5, "to_m": 1.4,
                                       "bottom_m": 0, "top_m": 2.1}]},
            "loadBearing": true,
            "role": "TO_DELETE",
            "layer": "structure"
        }]));
        let wall = &doc.elements[0];
        assert_eq!(wall.kind(), ElementKind::Wall);
        assert_eq!(wall.load_bearing, Some(true));
        assert_eq!(wall.role, Some(ElementRole::ToDelete));
        assert_eq!(wall.geometry.openings().len(), 1);
        assert_eq!(wall.extra["layer"], "structure");
        assert!(doc.objects3d.is_empty());
        assert!(doc.validate().is_ok());

        let value = serde_json::to_value(wall).unwrap();
        assert_eq!(value["loadBearing"], true);
        assert_eq!(value["layer"], "structure");
    }

    #[test]
    fn wall_segment_needs_two_endpoints() {
        let doc = plan(json!([{
            "id": "w1", "type": "wall", "geometry": {"kind": "segment", "points": [0, 0, 100]}
        }]));
        assert!(matches!(doc.validate(), Err(AdvisorError::InvalidPlan(_))));
    }

    #[test]
    fn polygon_needs_three_vertices_and_even_count() {
        let short = plan(json!([{
            "id": "z1", "type": "zone", "geometry": {"kind": "polygon", "points": [0, 0, 1, 1]}
        }]));
        assert!(short.validate().is_err());
        let odd = plan(json!([{
            "id": "z1", "type": "zone", "geometry": {"kind": "polygon", "points": [0, 0, 1, 1, 2, 2, 3]}
        }]));
        assert!(odd.validate().is_err());
    }

    #[test]
    fn selected_ids_list_elements_then_objects() {
        let doc: PlanDocument = serde_json::from_value(json!({
            "meta": {"width": 10, "height": 10},
            "elements": [
                {"id": "z1", "type": "zone", "selected": true,
                 "geometry": {"kind": "polygon", "points": [0, 0, 1, 0, 1, 1]}},
                {"id": "l1", "type": "label", "geometry": {"kind": "point", "x": 1, "y": 2}}
            ],
            "objects3d": [
                {"id": "bed1", "type": "bed", "position": {"x": 0, "y": 0, "z": 0}, "selected": true}
            ]
        }))
        .unwrap();
        assert_eq!(doc.selected_ids(), vec!["z1", "bed1"]);
        assert_eq!(doc.meta.unit, "px");
    }

    #[test]
    fn null_objects_are_empty() {
        let doc: PlanDocument =
            serde_json::from_value(json!({"meta": {"width": 1, "height": 1}, "objects3d": null})).unwrap();
        assert!(doc.objects3d.is_empty());
    }
}
