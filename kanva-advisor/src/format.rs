//! Textual views of a [`PlanDocument`].
//!
//! [`format_for_embedding`] is a compact, counts-oriented summary used as the
//! retrieval query for plan analysis. [`format_for_analysis`] is the verbose
//! breakdown placed into generation prompts. The two views differ, so the
//! chunks retrieved for a plan are chosen by a text the model never sees.

use std::collections::HashMap;

use crate::plan::{ElementKind, Geometry, ObjectType, PlanDocument};

/// Maximum walls, zones, openings and 3D objects listed in the analysis view.
const MAX_LISTED: usize = 10;

/// Area of a polygon given as a flat `[x0, y0, x1, y1, ...]` list (shoelace formula).
///
/// Returns `None` for fewer than three vertices or an odd coordinate count.
///
/// ```rust
/// use kanva_advisor::format::polygon_area;
///
/// assert_eq!(polygon_area(&[0.0, 0.0, 300.0, 0.0, 300.0, 300.0, 0.0, 300.0]), Some(90000.0));
/// assert_eq!(polygon_area(&[0.0, 0.0, 1.0, 1.0]), None);
/// ```
pub fn polygon_area(points: &[f64]) -> Option<f64> {
    if points.len() < 6 || points.len() % 2 != 0 {
        return None;
    }
    let n = points.len() / 2;
    let twice_area: f64 = (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            points[2 * i] * points[2 * j + 1] - points[2 * j] * points[2 * i + 1]
        })
        .sum();
    let area = twice_area.abs() / 2.0;
    area.is_finite().then_some(area)
}

/// Zone area in square meters, if the geometry and scale allow it.
fn zone_area_m2(geometry: &Geometry, px_per_meter: Option<f64>) -> Option<f64> {
    let Geometry::Polygon { points } = geometry else {
        return None;
    };
    let scale = px_per_meter?;
    polygon_area(points).map(|px| px / (scale * scale))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Compact summary: scale, size, element counts, zone list and a 3D object
/// histogram.
pub fn format_for_embedding(plan: &PlanDocument) -> String {
    let meta = &plan.meta;
    let mut parts = Vec::new();

    if let Some(scale) = &meta.scale {
        parts.push(format!("Масштаб плана: {} px/м", scale.px_per_meter));
    }
    parts.push(format!("Размеры: {}×{} {}", meta.width, meta.height, meta.unit));
    if let Some(h) = meta.ceiling_height_m {
        parts.push(format!("Высота потолка: {h} м"));
    }

    let walls = plan.elements_of(ElementKind::Wall).count();
    let zones: Vec<_> = plan.elements_of(ElementKind::Zone).collect();
    let labels = plan.elements_of(ElementKind::Label).count();
    let openings: usize =
        plan.elements_of(ElementKind::Wall).map(|w| w.geometry.openings().len()).sum();
    parts.push(format!(
        "Элементы: {walls} стен, {} зон, {labels} меток, {openings} проёмов",
        zones.len()
    ));

    if !zones.is_empty() {
        parts.push("Зоны:".to_string());
        for zone in zones {
            let mut details = Vec::new();
            if let Some(zone_type) = non_empty(&zone.zone_type) {
                details.push(format!("тип: {zone_type}"));
            }
            if let Some(role) = zone.role {
                details.push(format!("роль: {role}"));
            }
            if details.is_empty() {
                parts.push(format!("  - Зона {}", zone.id));
            } else {
                parts.push(format!("  - Зона {} ({})", zone.id, details.join(", ")));
            }
        }
    }

    if !plan.objects3d.is_empty() {
        parts.push(format!("3D объекты: {}", plan.objects3d.len()));
        // Histogram in first-seen order.
        let mut order: Vec<ObjectType> = Vec::new();
        let mut counts: HashMap<ObjectType, usize> = HashMap::new();
        for object in &plan.objects3d {
            let count = counts.entry(object.object_type).or_insert(0);
            if *count == 0 {
                order.push(object.object_type);
            }
            *count += 1;
        }
        for object_type in order {
            parts.push(format!("  - {object_type}: {}", counts[&object_type]));
        }
    }

    parts.join("\n")
}

/// Verbose breakdown for generation prompts.
///
/// Lists up to ten walls, zones (with area in m² when the plan has a scale),
/// openings and 3D objects.
pub fn format_for_analysis(plan: &PlanDocument) -> String {
    let meta = &plan.meta;
    let px_per_meter = meta.px_per_meter();
    let mut parts = vec![
        "Метаданные плана:".to_string(),
        format!("- Размеры: {}×{} {}", meta.width, meta.height, meta.unit),
    ];
    if let Some(scale) = px_per_meter {
        parts.push(format!("- Масштаб: {scale} px/м"));
    }
    if let Some(h) = meta.ceiling_height_m {
        parts.push(format!("- Высота потолка: {h} м"));
    }
    parts.push(String::new());

    let walls: Vec<_> = plan.elements_of(ElementKind::Wall).collect();
    let zones: Vec<_> = plan.elements_of(ElementKind::Zone).collect();
    let labels = plan.elements_of(ElementKind::Label).count();

    parts.push("Элементы плана:".to_string());
    parts.push(format!("- Стен: {}", walls.len()));
    parts.push(format!("- Зон: {}", zones.len()));
    parts.push(format!("- Меток: {labels}"));

    if !walls.is_empty() {
        parts.push(String::new());
        parts.push("Детали стен:".to_string());
        for wall in walls.iter().take(MAX_LISTED) {
            let mut line = format!("  - Стена {}", wall.id);
            if let Some(thickness) = wall.thickness.filter(|t| *t != 0.0) {
                line.push_str(&format!(", толщина: {thickness} м"));
            }
            if let Some(load_bearing) = wall.load_bearing {
                line.push_str(&format!(", несущая: {}", if load_bearing { "да" } else { "нет" }));
            }
            if let Some(role) = wall.role {
                line.push_str(&format!(", роль: {role}"));
            }
            let openings = wall.geometry.openings();
            if !openings.is_empty() {
                line.push_str(&format!(", проёмов: {}", openings.len()));
            }
            parts.push(line);
        }
    }

    if !zones.is_empty() {
        parts.push(String::new());
        parts.push("Детали зон:".to_string());
        for zone in zones.iter().take(MAX_LISTED) {
            let mut line = format!("  - Зона {}", zone.id);
            if let Some(zone_type) = non_empty(&zone.zone_type) {
                line.push_str(&format!(", тип: {zone_type}"));
            }
            if let Some(role) = zone.role {
                line.push_str(&format!(", роль: {role}"));
            }
            if let Some(area) = zone_area_m2(&zone.geometry, px_per_meter) {
                line.push_str(&format!(", площадь: {area:.1} м²"));
            }
            parts.push(line);
        }
    }

    let openings: Vec<String> = walls
        .iter()
        .flat_map(|wall| {
            wall.geometry.openings().iter().map(move |o| {
                format!(
                    "  - {} {} в стене {} (от {} до {} м, высота {}-{} м)",
                    o.opening_type.label(),
                    o.id,
                    wall.id,
                    o.from_m,
                    o.to_m,
                    o.bottom_m,
                    o.top_m
                )
            })
        })
        .take(MAX_LISTED)
        .collect();
    if !openings.is_empty() {
        parts.push(String::new());
        parts.push("Проёмы (двери/окна):".to_string());
        parts.extend(openings);
    }

    if !plan.objects3d.is_empty() {
        parts.push(String::new());
        parts.push(format!("3D объекты: {}", plan.objects3d.len()));
        for object in plan.objects3d.iter().take(MAX_LISTED) {
            let mut line = format!("  - {} {}", object.object_type, object.id);
            if let Some(zone_id) = non_empty(&object.zone_id) {
                line.push_str(&format!(", зона: {zone_id}"));
            }
            if let Some(wall_id) = non_empty(&object.wall_id) {
                line.push_str(&format!(", стена: {wall_id}"));
            }
            if let Some(size) = &object.size {
                line.push_str(&format!(", размер: {}×{}×{} м", size.x, size.y, size.z));
            }
            parts.push(line);
        }
    }

    parts.join("\n")
}

/// Emphasis block listing the elements and 3D objects the user selected.
///
/// Empty when nothing is selected.
pub fn format_selected_elements(plan: &PlanDocument) -> String {
    if plan.selected_ids().is_empty() {
        return String::new();
    }

    let mut parts = vec![
        String::new(),
        "ВАЖНО: Пользователь выделил следующие элементы на плане (работайте с ними в приоритете):"
            .to_string(),
    ];

    for element in plan.elements.iter().filter(|e| e.selected) {
        let mut line = format!("  - {}: {}", element.element_type.to_uppercase(), element.id);
        if let Some(zone_type) = non_empty(&element.zone_type) {
            line.push_str(&format!(" (тип зоны: {zone_type})"));
        }
        if let Some(role) = element.role {
            line.push_str(&format!(" (роль: {role})"));
        }
        parts.push(line);
    }
    for object in plan.objects3d.iter().filter(|o| o.selected) {
        let mut line = format!("  - 3D {}: {}", object.object_type.as_str().to_uppercase(), object.id);
        if let Some(zone_id) = non_empty(&object.zone_id) {
            line.push_str(&format!(" (зона: {zone_id})"));
        }
        if let Some(wall_id) = non_empty(&object.wall_id) {
            line.push_str(&format!(" (стена: {wall_id})"));
        }
        parts.push(line);
    }

    parts.push(String::new());
    parts.push(
        "При ответе на вопросы пользователя обязательно учитывайте эти выделенные элементы и \
         работайте с ними в первую очередь."
            .to_string(),
    );
    parts.join("\n")
}
