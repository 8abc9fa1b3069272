//! Line layouters: strategies that turn a line's two connectors into a route.
//!
//! A layouter only computes vertices in root coordinates; the scene converts
//! them into the line's parent space and takes care of bounds, segments and
//! crossings.

use crate::handle::{HandleSpec, HandleTag};
use crate::item::{Item, ItemId, MagnetRef};
use crate::Scene;
use canvas_core::Bounds;
use glam::Vec2;

/// What a connector end is tied to
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConnectorTarget {
    /// A loose end at a point in root coordinates
    Free(Vec2),
    Attached { item: ItemId, magnet: MagnetRef },
}

/// One end of a line
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Connector {
    pub target: ConnectorTarget,
    pub draggable: bool,
}

impl Connector {
    pub fn free(point: Vec2) -> Self {
        Self {
            target: ConnectorTarget::Free(point),
            draggable: true,
        }
    }

    pub fn attached(item: ItemId, magnet: MagnetRef) -> Self {
        Self {
            target: ConnectorTarget::Attached { item, magnet },
            draggable: true,
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        match self.target {
            ConnectorTarget::Attached { item, .. } => Some(item),
            ConnectorTarget::Free(_) => None,
        }
    }

    /// Stable point the other end of the line aims at
    pub fn reference(&self, scene: &Scene) -> Vec2 {
        match self.target {
            ConnectorTarget::Free(point) => point,
            ConnectorTarget::Attached { item, magnet } => {
                scene.magnet_reference(item, magnet).unwrap_or_default()
            }
        }
    }

    /// Where this end sits when the line heads toward `toward`
    pub fn position(&self, scene: &Scene, toward: Vec2) -> Vec2 {
        match self.target {
            ConnectorTarget::Free(point) => point,
            ConnectorTarget::Attached { item, magnet } => scene
                .magnet_position(item, magnet, toward)
                .unwrap_or(toward),
        }
    }

    /// Box the end is attached to; a point box for free ends
    pub fn bounds(&self, scene: &Scene) -> Bounds {
        match self.target {
            ConnectorTarget::Attached { item, .. } if scene.contains(item) => scene.root_bounds(item),
            _ => {
                let point = self.reference(scene);
                Bounds::new(point, point)
            }
        }
    }

    fn fixed_magnet(&self) -> bool {
        matches!(
            self.target,
            ConnectorTarget::Attached {
                magnet: MagnetRef::Fixed(_),
                ..
            }
        )
    }

    /// Follows the pointer while dragging; on release, attaches to `target`
    /// if there is one under the pointer
    pub fn drag(&mut self, scene: &Scene, position: Vec2, target: Option<ItemId>, dragging: bool) -> bool {
        if !self.draggable {
            return false;
        }
        let attach = target
            .filter(|_| !dragging)
            .and_then(|item| scene.closest_magnet(item, position).map(|magnet| (item, magnet)));
        self.target = match attach {
            Some((item, magnet)) => ConnectorTarget::Attached { item, magnet },
            None => ConnectorTarget::Free(position),
        };
        true
    }
}

pub trait LineLayouter: Send {
    fn start(&self) -> &Connector;
    fn end(&self) -> &Connector;
    fn start_mut(&mut self) -> &mut Connector;
    fn end_mut(&mut self) -> &mut Connector;

    /// The route in root coordinates
    fn vertices(&self, scene: &Scene) -> Vec<Vec2>;

    /// Handles for a route previously returned by [`LineLayouter::vertices`]
    fn handles(&self, vertices: &[Vec2]) -> Vec<HandleSpec> {
        self.end_handles(vertices)
    }

    /// Returns `true` if the route changed
    fn drag_handle(
        &mut self,
        scene: &Scene,
        tag: HandleTag,
        position: Vec2,
        target: Option<ItemId>,
        dragging: bool,
    ) -> bool {
        self.drag_end(scene, tag, position, target, dragging)
    }

    fn name(&self) -> &str;

    fn is_connected_to(&self, item: ItemId) -> bool {
        self.start().item() == Some(item) || self.end().item() == Some(item)
    }

    fn end_handles(&self, vertices: &[Vec2]) -> Vec<HandleSpec> {
        let (Some(&first), Some(&last)) = (vertices.first(), vertices.last()) else {
            return Vec::new();
        };
        vec![
            HandleSpec {
                tag: HandleTag::LineStart,
                position: first,
                draggable: self.start().draggable,
            },
            HandleSpec {
                tag: HandleTag::LineEnd,
                position: last,
                draggable: self.end().draggable,
            },
        ]
    }

    fn drag_end(
        &mut self,
        scene: &Scene,
        tag: HandleTag,
        position: Vec2,
        target: Option<ItemId>,
        dragging: bool,
    ) -> bool {
        match tag {
            HandleTag::LineStart => self.start_mut().drag(scene, position, target, dragging),
            HandleTag::LineEnd => self.end_mut().drag(scene, position, target, dragging),
            _ => false,
        }
    }
}

/// A single segment between the two ends, clipped to the attached items
#[derive(Clone, Debug)]
pub struct StraightLayouter {
    start: Connector,
    end: Connector,
}

impl StraightLayouter {
    pub fn new(start: Connector, end: Connector) -> Self {
        Self { start, end }
    }
}

impl LineLayouter for StraightLayouter {
    fn start(&self) -> &Connector {
        &self.start
    }

    fn end(&self) -> &Connector {
        &self.end
    }

    fn start_mut(&mut self) -> &mut Connector {
        &mut self.start
    }

    fn end_mut(&mut self) -> &mut Connector {
        &mut self.end
    }

    fn vertices(&self, scene: &Scene) -> Vec<Vec2> {
        let start_ref = self.start.reference(scene);
        let end_ref = self.end.reference(scene);
        vec![
            self.start.position(scene, end_ref),
            self.end.position(scene, start_ref),
        ]
    }

    fn name(&self) -> &str {
        "straight"
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Routing {
    /// Leaves sideways, the middle segment is vertical
    Horizontal,
    /// Leaves through top or bottom, the middle segment is horizontal
    Vertical,
    /// The boxes overlap: center to center
    Direct,
}

/// Elbow routes between two boxes with a draggable middle segment
#[derive(Clone, Debug)]
pub struct OrthogonalLayouter {
    start: Connector,
    end: Connector,
    /// User shift of the middle segment from halfway
    offset: f32,
}

impl OrthogonalLayouter {
    pub fn new(start: Connector, end: Connector) -> Self {
        Self {
            start,
            end,
            offset: 0.0,
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    fn route(&self, scene: &Scene) -> (Routing, Vec<Vec2>) {
        let a = self.start.bounds(scene);
        let b = self.end.bounds(scene);

        let routing = if a.max.x < b.min.x || b.max.x < a.min.x {
            Routing::Horizontal
        } else if a.max.y < b.min.y || b.max.y < a.min.y {
            Routing::Vertical
        } else {
            return (Routing::Direct, vec![a.center(), b.center()]);
        };
        // main axis runs from one box to the other, the cross axis along the middle segment
        let (main, cross) = match routing {
            Routing::Horizontal => (0, 1),
            _ => (1, 0),
        };

        let forward = a.max[main] < b.min[main];
        let mut start = a.center();
        let mut end = b.center();
        start[main] = if forward { a.max[main] } else { a.min[main] };
        end[main] = if forward { b.min[main] } else { b.max[main] };
        if self.start.fixed_magnet() {
            start = self.start.reference(scene);
        }
        if self.end.fixed_magnet() {
            end = self.end.reference(scene);
        }
        start = start.round();
        end = end.round();

        if start[cross] == end[cross] {
            return (routing, vec![start, end]);
        }
        let (low, high) = (start[main].min(end[main]), start[main].max(end[main]));
        let middle = ((start[main] + end[main]) / 2.0 + self.offset)
            .clamp(low, high)
            .round();

        let mut elbow1 = start;
        elbow1[main] = middle;
        let mut elbow2 = end;
        elbow2[main] = middle;
        (routing, vec![start, elbow1, elbow2, end])
    }
}

impl LineLayouter for OrthogonalLayouter {
    fn start(&self) -> &Connector {
        &self.start
    }

    fn end(&self) -> &Connector {
        &self.end
    }

    fn start_mut(&mut self) -> &mut Connector {
        &mut self.start
    }

    fn end_mut(&mut self) -> &mut Connector {
        &mut self.end
    }

    fn vertices(&self, scene: &Scene) -> Vec<Vec2> {
        self.route(scene).1
    }

    fn handles(&self, vertices: &[Vec2]) -> Vec<HandleSpec> {
        let mut handles = self.end_handles(vertices);
        if let [_, elbow1, elbow2, _] = vertices {
            handles.push(HandleSpec {
                tag: HandleTag::LineSegment(1),
                position: (*elbow1 + *elbow2) / 2.0,
                draggable: true,
            });
        }
        handles
    }

    fn drag_handle(
        &mut self,
        scene: &Scene,
        tag: HandleTag,
        position: Vec2,
        target: Option<ItemId>,
        dragging: bool,
    ) -> bool {
        let HandleTag::LineSegment(1) = tag else {
            return self.drag_end(scene, tag, position, target, dragging);
        };
        let (routing, vertices) = self.route(scene);
        let (Some(&first), Some(&last)) = (vertices.first(), vertices.last()) else {
            return false;
        };
        let halfway = (first + last) / 2.0;
        self.offset = match routing {
            Routing::Horizontal => position.x - halfway.x,
            Routing::Vertical => position.y - halfway.y,
            Routing::Direct => return false,
        };
        true
    }

    fn name(&self) -> &str {
        "orthogonal"
    }
}

impl Scene {
    fn take_layouter(&mut self, line: ItemId) -> Option<Box<dyn LineLayouter>> {
        self.get_mut(line)?.as_line_mut()?.layouter.take()
    }

    fn restore_layouter(&mut self, line: ItemId, layouter: Box<dyn LineLayouter>) {
        if let Some(data) = self.get_mut(line).and_then(Item::as_line_mut) {
            data.layouter = Some(layouter);
        }
    }

    /// Parent origin of a line in root coordinates
    fn line_origin(&self, line: ItemId) -> Vec2 {
        self.parent(line)
            .map(|parent| self.root_position(parent))
            .unwrap_or_default()
    }

    /// Makes `layouter` produce the route of `line` and lays it out
    pub fn set_line_layouter(&mut self, line: ItemId, layouter: impl LineLayouter + 'static) {
        let Some(data) = self.get_mut(line).and_then(Item::as_line_mut) else {
            return;
        };
        data.layouter = Some(Box::new(layouter));
        self.update_line_layout(line);
    }

    /// Re-runs the layouter of `line`
    pub fn update_line_layout(&mut self, line: ItemId) {
        if self.routing.contains(&line) {
            return;
        }
        let Some(layouter) = self.take_layouter(line) else {
            return;
        };
        let vertices = layouter.vertices(self);
        self.restore_layouter(line, layouter);

        let origin = self.line_origin(line);
        self.routing.push(line);
        self.set_line_vertices(line, vertices.into_iter().map(|v| v - origin).collect());
        self.routing.retain(|&id| id != line);
    }

    /// Relayouts every line attached to `id` or to an item below it
    pub(crate) fn relayout_connected_lines(&mut self, id: ItemId) {
        let lines: Vec<ItemId> = self
            .iter()
            .filter(|&(line, _)| line != id)
            .filter_map(|(line, item)| {
                let layouter = item.as_line()?.layouter()?;
                let attached = [layouter.start(), layouter.end()]
                    .into_iter()
                    .filter_map(Connector::item)
                    .any(|target| self.is_ancestor_or_self(id, target));
                attached.then_some(line)
            })
            .collect();
        for line in lines {
            self.update_line_layout(line);
        }
    }

    /// Turns connectors attached to `id` into free ends where they are now
    pub(crate) fn detach_connectors_from(&mut self, id: ItemId) {
        let lines: Vec<ItemId> = self
            .iter()
            .filter(|(_, item)| {
                item.as_line()
                    .and_then(|line| line.layouter())
                    .is_some_and(|layouter| layouter.is_connected_to(id))
            })
            .map(|(line, _)| line)
            .collect();

        for line in lines {
            let Some(mut layouter) = self.take_layouter(line) else {
                continue;
            };
            let start_ref = layouter.start().reference(self);
            let end_ref = layouter.end().reference(self);
            if layouter.start().item() == Some(id) {
                let point = layouter.start().position(self, end_ref);
                layouter.start_mut().target = ConnectorTarget::Free(point);
            }
            if layouter.end().item() == Some(id) {
                let point = layouter.end().position(self, start_ref);
                layouter.end_mut().target = ConnectorTarget::Free(point);
            }
            log::debug!("line {line} detached from destroyed item {id}");
            self.restore_layouter(line, layouter);
        }
    }

    pub(crate) fn line_handle_specs(&self, line: ItemId) -> Vec<HandleSpec> {
        let Some(data) = self.get(line).and_then(Item::as_line) else {
            return Vec::new();
        };
        let Some(layouter) = data.layouter() else {
            return Vec::new();
        };
        let origin = self.line_origin(line);
        let vertices: Vec<Vec2> = data.vertices.iter().map(|&v| v + origin).collect();
        layouter.handles(&vertices)
    }

    pub(crate) fn drag_line_handle(
        &mut self,
        line: ItemId,
        tag: HandleTag,
        position: Vec2,
        target: Option<ItemId>,
        dragging: bool,
    ) -> bool {
        let target = target.filter(|&item| item != line);
        let Some(mut layouter) = self.take_layouter(line) else {
            return false;
        };
        let changed = layouter.drag_handle(self, tag, position, target, dragging);
        self.restore_layouter(line, layouter);
        if changed {
            self.update_line_layout(line);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{add_box, layer, scene_with_area};
    use crate::*;
    use glam::Vec2;

    fn root_vertices(scene: &Scene, line: ItemId) -> Vec<Vec2> {
        let origin = scene.parent(line).map(|p| scene.root_position(p)).unwrap_or_default();
        scene.get(line).unwrap().as_line().unwrap().vertices().iter().map(|&v| v + origin).collect()
    }

    fn connect(scene: &mut Scene, parent: ItemId, layouter: impl LineLayouter + 'static) -> ItemId {
        let line = scene.create_line(layer());
        scene.add(parent, line);
        scene.set_line_layouter(line, layouter);
        line
    }

    #[test]
    fn test_straight_line_is_clipped_to_both_boxes() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);
        let b = add_box(&mut scene, area, 300.0, 100.0, 40.0, 20.0);
        let line = connect(
            &mut scene,
            area,
            StraightLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::attached(b, MagnetRef::Bounds)),
        );

        assert_eq!(root_vertices(&scene, line), vec![Vec2::new(140.0, 110.0), Vec2::new(300.0, 110.0)]);

        scene.set_position(b, Vec2::new(300.0, 300.0));
        assert_eq!(root_vertices(&scene, line), vec![Vec2::new(130.0, 120.0), Vec2::new(310.0, 300.0)]);
    }

    #[test]
    fn test_moving_a_group_relayouts_lines_inside_it() {
        let (mut scene, area) = scene_with_area();
        let group = scene.create_group(layer());
        scene.add(area, group);
        let a = add_box(&mut scene, group, 100.0, 100.0, 40.0, 20.0);
        let line = connect(
            &mut scene,
            area,
            StraightLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::free(Vec2::new(400.0, 110.0))),
        );
        assert_eq!(root_vertices(&scene, line)[0], Vec2::new(140.0, 110.0));

        let position = scene.get(group).unwrap().position();
        scene.set_position(group, position + Vec2::new(50.0, 0.0));
        assert_eq!(root_vertices(&scene, line)[0], Vec2::new(190.0, 110.0));
    }

    #[test]
    fn test_orthogonal_routes() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);
        let beside = add_box(&mut scene, area, 300.0, 200.0, 40.0, 20.0);
        let below = add_box(&mut scene, area, 110.0, 300.0, 40.0, 20.0);
        let overlapping = add_box(&mut scene, area, 120.0, 105.0, 40.0, 20.0);
        let route = |scene: &mut Scene, to: ItemId| {
            let line = connect(
                scene,
                area,
                OrthogonalLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::attached(to, MagnetRef::Bounds)),
            );
            root_vertices(scene, line)
        };

        let points = |list: &[(f32, f32)]| list.iter().map(|&(x, y)| Vec2::new(x, y)).collect::<Vec<_>>();
        assert_eq!(route(&mut scene, beside), points(&[(140.0, 110.0), (220.0, 110.0), (220.0, 210.0), (300.0, 210.0)]));
        assert_eq!(route(&mut scene, below), points(&[(120.0, 120.0), (120.0, 210.0), (130.0, 210.0), (130.0, 300.0)]));
        assert_eq!(route(&mut scene, overlapping), points(&[(120.0, 110.0), (140.0, 115.0)]));
    }

    #[test]
    fn test_dragging_the_middle_segment() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);
        let b = add_box(&mut scene, area, 300.0, 200.0, 40.0, 20.0);
        let line = connect(
            &mut scene,
            area,
            OrthogonalLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::attached(b, MagnetRef::Bounds)),
        );

        let specs = scene.handle_specs(line);
        let middle = specs.iter().find(|spec| spec.tag == HandleTag::LineSegment(1)).unwrap();
        assert_eq!(middle.position, Vec2::new(220.0, 160.0));

        assert!(scene.drag_handle(line, HandleTag::LineSegment(1), Vec2::new(250.0, 0.0), None, true, None));
        assert_eq!(root_vertices(&scene, line)[1], Vec2::new(250.0, 110.0));

        // the middle segment stays between the boxes
        scene.drag_handle(line, HandleTag::LineSegment(1), Vec2::new(1000.0, 0.0), None, false, None);
        assert_eq!(root_vertices(&scene, line)[2], Vec2::new(300.0, 210.0));
    }

    #[test]
    fn test_end_handle_drag_reattaches() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);
        let b = add_box(&mut scene, area, 300.0, 100.0, 40.0, 20.0);
        let line = connect(
            &mut scene,
            area,
            StraightLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::free(Vec2::new(400.0, 400.0))),
        );

        scene.drag_handle(line, HandleTag::LineEnd, Vec2::new(320.0, 110.0), Some(b), true, None);
        assert_eq!(root_vertices(&scene, line)[1], Vec2::new(320.0, 110.0));

        scene.drag_handle(line, HandleTag::LineEnd, Vec2::new(320.0, 110.0), Some(b), false, None);
        assert_eq!(root_vertices(&scene, line)[1], Vec2::new(300.0, 110.0));
        let layouter = scene.get(line).unwrap().as_line().unwrap().layouter().unwrap();
        assert!(layouter.is_connected_to(b));
    }

    #[test]
    fn test_destroying_a_target_leaves_a_free_end() {
        let (mut scene, area) = scene_with_area();
        let a = add_box(&mut scene, area, 100.0, 100.0, 40.0, 20.0);
        let b = add_box(&mut scene, area, 300.0, 100.0, 40.0, 20.0);
        let line = connect(
            &mut scene,
            area,
            StraightLayouter::new(Connector::attached(a, MagnetRef::Bounds), Connector::attached(b, MagnetRef::Bounds)),
        );

        scene.destroy(b);

        let layouter = scene.get(line).unwrap().as_line().unwrap().layouter().unwrap();
        assert_eq!(layouter.end().target, ConnectorTarget::Free(Vec2::new(300.0, 110.0)));
        scene.update_line_layout(line);
        assert_eq!(root_vertices(&scene, line), vec![Vec2::new(140.0, 110.0), Vec2::new(300.0, 110.0)]);
    }
}
