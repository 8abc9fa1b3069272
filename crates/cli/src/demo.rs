//! The demo diagram: database tables joined by relationship lines.

use canvas::{CanvasConfig, CanvasView};
use canvas_core::Color;
use glam::Vec2;
use scene_graph::{
    Connector, ItemId, LineEnd, MagnetRef, OrthogonalLayouter, Orientation, RectFigure, TextFigure,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the `diagram` binary reads from its JSON input
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramFile {
    pub canvas: CanvasConfig,
    pub tables: Vec<TableSpec>,
    pub relations: Vec<RelationSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub position: Vec2,
    pub columns: Vec<String>,
    #[serde(default = "default_header_color")]
    pub color: Color,
}

fn default_header_color() -> Color {
    Color::from_rgba8(0x9d, 0xc3, 0xe6, 0xff)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationSpec {
    pub from: String,
    pub to: String,
    /// One-to-many unless set
    #[serde(default)]
    pub one_to_one: bool,
}

impl DiagramFile {
    /// A small rental-store schema
    pub fn sample() -> Self {
        let table = |name: &str, x: f32, y: f32, columns: &[&str]| TableSpec {
            name: name.to_string(),
            position: Vec2::new(x, y),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            color: default_header_color(),
        };
        let relation = |from: &str, to: &str| RelationSpec {
            from: from.to_string(),
            to: to.to_string(),
            one_to_one: false,
        };
        Self {
            canvas: CanvasConfig {
                page_size: Vec2::new(1000.0, 700.0),
                ..CanvasConfig::default()
            },
            tables: vec![
                table("customer", 40.0, 40.0, &["customer_id", "store_id", "first_name", "last_name", "email"]),
                table("rental", 360.0, 60.0, &["rental_id", "rental_date", "inventory_id", "customer_id", "staff_id"]),
                table("inventory", 700.0, 40.0, &["inventory_id", "film_id", "store_id"]),
                table("film", 700.0, 320.0, &["film_id", "title", "release_year", "language_id"]),
                table("staff", 360.0, 380.0, &["staff_id", "first_name", "store_id"]),
                table("store", 40.0, 380.0, &["store_id", "manager_staff_id", "address_id"]),
            ],
            relations: vec![
                relation("customer", "rental"),
                relation("inventory", "rental"),
                relation("film", "inventory"),
                relation("staff", "rental"),
                relation("store", "staff"),
                relation("store", "customer"),
            ],
        }
    }

    /// Builds the diagram on a fresh canvas
    pub fn build(&self) -> anyhow::Result<CanvasView> {
        self.canvas.validate()?;
        let mut view = CanvasView::with_config(&self.canvas);
        let mut tables = HashMap::new();
        for spec in &self.tables {
            let table = add_table(&mut view, spec);
            tables.insert(spec.name.as_str(), table);
        }
        for relation in &self.relations {
            let (Some(&from), Some(&to)) = (
                tables.get(relation.from.as_str()),
                tables.get(relation.to.as_str()),
            ) else {
                anyhow::bail!(
                    "relation {} -> {} names an unknown table",
                    relation.from,
                    relation.to
                );
            };
            add_relation(&mut view, from, to, relation.one_to_one);
        }
        log::info!(
            "built diagram with {} tables and {} relations",
            self.tables.len(),
            self.relations.len()
        );
        Ok(view)
    }
}

fn add_table(view: &mut CanvasView, spec: &TableSpec) -> ItemId {
    let layer = view.current_layer();
    let scene = view.scene_mut();
    let table = scene.create_stack(layer, Orientation::Vertical);
    scene.set_padding(table, Vec2::splat(1.0));
    scene.set_tag(table, spec.name.clone());
    scene.update_flags(table, |flags| {
        flags.accepts_selection = true;
        flags.draggable = true;
        flags.has_shadow = true;
    });

    let title = scene.create_figure(layer, RectFigure::new(spec.color).with_title(spec.name.clone()));
    scene.stack_add(table, title);
    for column in &spec.columns {
        let label = scene.create_figure(layer, TextFigure::new(column.clone()));
        scene.set_padding(label, Vec2::new(6.0, 1.0));
        scene.stack_add(table, label);
    }

    view.add_item(table);
    let scene = view.scene_mut();
    scene.set_position(table, spec.position);
    scene.relayout(table);
    view.sync();
    table
}

fn add_relation(view: &mut CanvasView, from: ItemId, to: ItemId, one_to_one: bool) -> ItemId {
    let layer = view.current_layer();
    let scene = view.scene_mut();
    let line = scene.create_line(layer);
    let start = if one_to_one { LineEnd::Cross1 } else { LineEnd::ChickenFoot };
    scene.set_line_ends(line, start, LineEnd::Cross1);
    view.add_item(line);
    view.scene_mut().set_line_layouter(
        line,
        OrthogonalLayouter::new(
            Connector::attached(to, MagnetRef::Bounds),
            Connector::attached(from, MagnetRef::Bounds),
        ),
    );
    view.sync();
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builds_every_table() {
        let sample = DiagramFile::sample();
        let view = sample.build().unwrap();
        for table in &sample.tables {
            assert!(view.find_item_with_tag(&table.name).is_some(), "{}", table.name);
        }
        let root = view.layer(view.current_layer()).unwrap().root();
        assert_eq!(
            view.scene().children(root).len(),
            sample.tables.len() + sample.relations.len()
        );
    }

    #[test]
    fn test_unknown_tables_are_reported() {
        let mut file = DiagramFile::sample();
        file.relations.push(RelationSpec {
            from: "payment".into(),
            to: "rental".into(),
            one_to_one: false,
        });
        let err = file.build().err().unwrap();
        assert!(err.to_string().contains("payment"));
    }

    #[test]
    fn test_json_fills_in_defaults() {
        let file: DiagramFile = serde_json::from_str(
            r#"{"tables": [{"name": "film", "position": [10, 20], "columns": ["film_id"]}]}"#,
        )
        .unwrap();
        assert_eq!(file.tables[0].color, default_header_color());
        assert_eq!(file.canvas, CanvasConfig::default());
    }
}
