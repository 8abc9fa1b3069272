//! Connector lines.
//!
//! A line keeps two point lists: `vertices`, the route in its parent's
//! coordinates as produced by its layouter, and `segments`, the same route
//! relative to the line's own origin with hop markers spliced in wherever
//! another line crosses underneath.

use crate::item::{Item, ItemId, ItemKind, LayerId};
use crate::layouter::LineLayouter;
use crate::Scene;
use crate::SceneEvent;
use canvas_core::algorithms::{angle_of_line, intersect_hv_lines, intersect_lines, point_line_distance};
use canvas_core::{Bounds, Color, Surface};
use glam::Vec2;
use std::f32::consts::{PI, TAU};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

/// Radius of the arc drawn where a line hops over another
pub const HOP_RADIUS: f32 = 5.0;

/// How far from a segment a point still hits the line
pub const LINE_HIT_THRESHOLD: f32 = 5.0;

/// A point of a line's rendered path, relative to the line's origin
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentPoint {
    pub pos: Vec2,
    /// The line crossed at this point, if this is a hop marker
    pub hop: Option<ItemId>,
}

impl SegmentPoint {
    fn vertex(pos: Vec2) -> Self {
        Self { pos, hop: None }
    }
}

/// Decoration drawn at either end of a line
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum LineEnd {
    #[default]
    Normal,
    FilledTriangle,
    HollowTriangle,
    ChickenFoot,
    /// Crow's foot with a zero circle
    ChickenFoot0,
    /// Crow's foot with a one bar
    ChickenFoot1,
    Cross0,
    Cross1,
    HollowDiamond,
    FilledDiamond,
    HollowCircle,
    FilledCircle,
    BoldStick,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum LinePattern {
    #[default]
    Solid,
    Dotted1,
    Dotted2,
    Dashed1,
    Dashed2,
    Dashed3,
    Dashed4,
    DashDot1,
    DashDot2,
}

impl LinePattern {
    /// Alternating paint and skip lengths; empty for solid lines
    pub fn dashes(self) -> &'static [f32] {
        match self {
            LinePattern::Solid => &[],
            LinePattern::Dotted1 => &[2.0, 2.0],
            LinePattern::Dotted2 => &[2.0, 4.0],
            LinePattern::Dashed1 => &[5.0, 4.0],
            LinePattern::Dashed2 => &[10.0, 4.0],
            LinePattern::Dashed3 => &[4.0, 5.0],
            LinePattern::Dashed4 => &[4.0, 10.0],
            LinePattern::DashDot1 => &[10.0, 2.0, 2.0, 2.0],
            LinePattern::DashDot2 => &[10.0, 2.0, 4.0, 2.0],
        }
    }
}

pub struct LineData {
    pub(crate) vertices: Vec<Vec2>,
    pub(crate) segments: Vec<SegmentPoint>,
    pub(crate) start_end: LineEnd,
    pub(crate) end_end: LineEnd,
    pub(crate) pattern: LinePattern,
    pub(crate) line_width: f32,
    pub(crate) pen_color: Color,
    /// Fill of hollow end decorations
    pub(crate) fill_color: Color,
    pub(crate) hop_crossings: bool,
    /// Taken out while it runs, so it can read the scene
    pub(crate) layouter: Option<Box<dyn LineLayouter>>,
}

impl Default for LineData {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            segments: Vec::new(),
            start_end: LineEnd::Normal,
            end_end: LineEnd::Normal,
            pattern: LinePattern::Solid,
            line_width: 1.0,
            pen_color: Color::BLACK,
            fill_color: Color::WHITE,
            hop_crossings: true,
            layouter: None,
        }
    }
}

impl fmt::Debug for LineData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineData")
            .field("vertices", &self.vertices)
            .field("segments", &self.segments)
            .field("pattern", &self.pattern)
            .field("layouter", &self.layouter.as_ref().map(|l| l.name()))
            .finish()
    }
}

impl LineData {
    /// The route in the parent's coordinates
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn segments(&self) -> &[SegmentPoint] {
        &self.segments
    }

    pub fn hops(&self) -> impl Iterator<Item = &SegmentPoint> {
        self.segments.iter().filter(|segment| segment.hop.is_some())
    }

    pub fn ends(&self) -> (LineEnd, LineEnd) {
        (self.start_end, self.end_end)
    }

    pub fn pattern(&self) -> LinePattern {
        self.pattern
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn pen_color(&self) -> Color {
        self.pen_color
    }

    pub fn hop_crossings(&self) -> bool {
        self.hop_crossings
    }

    pub fn layouter(&self) -> Option<&dyn LineLayouter> {
        self.layouter.as_deref()
    }

    /// Direction at the start, pointing into the line
    fn start_angle(&self) -> f32 {
        match self.vertices.as_slice() {
            [first, second, ..] => angle_of_line(*first, *second),
            _ => 0.0,
        }
    }

    /// Direction at the end, pointing back into the line
    fn end_angle(&self) -> f32 {
        match self.vertices.as_slice() {
            [.., before, last] => angle_of_line(*last, *before),
            _ => 0.0,
        }
    }

    /// Adds the path of the line, hops included, in the line's coordinates
    pub fn stroke_outline(&self, surface: &mut dyn Surface) {
        let Some(first) = self.segments.first() else {
            return;
        };
        surface.move_to(first.pos + 0.5);
        let mut previous = first.pos;
        for segment in &self.segments[1..] {
            let pos = segment.pos.round();
            if segment.hop.is_some() {
                let angle = (-angle_of_line(previous, segment.pos)).to_radians();
                let delta = Vec2::new(angle.cos(), angle.sin()) * HOP_RADIUS;
                surface.line_to(pos - delta.round() + 0.5);
                surface.arc(pos, HOP_RADIUS, angle + PI, angle);
            } else {
                surface.line_to(pos + 0.5);
            }
            previous = segment.pos;
        }
    }

    /// Strokes the line and its end decorations with the line's own style
    pub fn render(&self, surface: &mut dyn Surface) {
        if self.segments.len() < 2 {
            return;
        }
        surface.save();
        surface.new_path();
        self.stroke_outline(surface);
        surface.set_line_width(self.line_width);
        surface.set_color(self.pen_color);
        surface.set_dash(self.pattern.dashes(), 0.0);
        surface.stroke();
        surface.set_dash(&[], 0.0);

        if let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) {
            let (start, end) = (first.pos, last.pos);
            draw_line_end(surface, self.start_end, start, self.start_angle(), self.pen_color, self.fill_color);
            draw_line_end(surface, self.end_end, end, self.end_angle(), self.pen_color, self.fill_color);
        }
        surface.restore();
    }

    /// Hit test against the segments; `point` is in the line's coordinates
    fn segments_contain_point(&self, point: Vec2) -> bool {
        self.segments.windows(2).any(|pair| {
            let (prev, cur) = (pair[0].pos, pair[1].pos);
            if prev.x == cur.x || prev.y == cur.y {
                Bounds::from_corners(prev, cur)
                    .expand(LINE_HIT_THRESHOLD)
                    .contains_point(point)
            } else {
                point_line_distance(prev, cur, point) <= LINE_HIT_THRESHOLD
            }
        })
    }
}

/// Maps decoration coordinates, whose +y axis runs into the line, onto the line
struct EndPlacement {
    origin: Vec2,
    sin: f32,
    cos: f32,
}

impl EndPlacement {
    fn new(origin: Vec2, angle: f32) -> Self {
        let (sin, cos) = (270.0 - angle).to_radians().sin_cos();
        Self { origin, sin, cos }
    }

    fn at(&self, x: f32, y: f32) -> Vec2 {
        self.origin + Vec2::new(x * self.cos - y * self.sin, x * self.sin + y * self.cos)
    }

    fn polyline(&self, surface: &mut dyn Surface, points: &[(f32, f32)]) {
        for (index, &(x, y)) in points.iter().enumerate() {
            if index == 0 {
                surface.move_to(self.at(x, y));
            } else {
                surface.line_to(self.at(x, y));
            }
        }
    }

    fn circle(&self, surface: &mut dyn Surface, y: f32) {
        surface.new_path();
        surface.arc(self.at(0.0, y), 4.0, 0.0, TAU);
        surface.close_path();
    }
}

fn draw_line_end(surface: &mut dyn Surface, end: LineEnd, origin: Vec2, angle: f32, pen: Color, fill: Color) {
    let place = EndPlacement::new(origin, angle);

    surface.save();
    surface.new_path();
    match end {
        LineEnd::Normal => {}
        LineEnd::FilledTriangle => {
            place.polyline(surface, &[(0.5, 0.5), (-3.5, 7.5), (3.5, 7.5), (0.5, 0.5)]);
            surface.close_path();
            surface.set_color(pen);
            surface.stroke_preserve();
            surface.fill();
        }
        LineEnd::HollowTriangle => {
            place.polyline(surface, &[(0.0, 0.0), (-4.0, 8.0), (4.0, 8.0)]);
            surface.close_path();
            surface.set_color(fill);
            surface.fill_preserve();
            surface.set_color(pen);
            surface.stroke();
        }
        LineEnd::ChickenFoot | LineEnd::ChickenFoot0 | LineEnd::ChickenFoot1 => {
            surface.set_color(pen);
            place.polyline(surface, &[(-5.0, 0.0), (0.0, 10.0), (5.0, 0.0)]);
            surface.stroke();
            if end == LineEnd::ChickenFoot0 {
                place.circle(surface, 12.0);
                surface.set_color(fill);
                surface.fill_preserve();
                surface.set_color(pen);
                surface.stroke();
            } else if end == LineEnd::ChickenFoot1 {
                place.polyline(surface, &[(-5.0, 12.0), (5.0, 12.0)]);
                surface.stroke();
            }
        }
        LineEnd::Cross0 => {
            surface.set_color(pen);
            place.polyline(surface, &[(-4.0, 6.0), (4.0, 6.0)]);
            surface.stroke();
            place.circle(surface, 12.0);
            surface.set_color(fill);
            surface.fill_preserve();
            surface.set_color(pen);
            surface.stroke();
        }
        LineEnd::Cross1 => {
            surface.set_color(pen);
            place.polyline(surface, &[(-4.0, 6.0), (4.0, 6.0)]);
            surface.stroke();
            place.polyline(surface, &[(-4.0, 10.0), (4.0, 10.0)]);
            surface.stroke();
        }
        LineEnd::HollowDiamond | LineEnd::FilledDiamond => {
            place.polyline(surface, &[(0.5, 0.5), (-3.5, 6.5), (0.5, 13.0), (4.5, 6.5)]);
            surface.close_path();
            surface.set_color(if end == LineEnd::HollowDiamond { fill } else { pen });
            surface.fill_preserve();
            surface.set_color(pen);
            surface.stroke();
        }
        LineEnd::HollowCircle => {
            place.circle(surface, 4.0);
            surface.set_color(pen);
            surface.stroke();
        }
        LineEnd::FilledCircle => {
            place.circle(surface, 4.0);
            surface.set_color(pen);
            surface.fill_preserve();
            surface.stroke();
        }
        LineEnd::BoldStick => {
            place.polyline(surface, &[(0.5, 0.5), (0.5, 15.5)]);
            surface.set_color(pen);
            surface.set_line_width(3.0);
            surface.stroke();
        }
    }
    surface.restore();
}

/// Crossing point of two segments: the axis-aligned test for orthogonal
/// routes, the general one otherwise
fn segment_crossing(s1: Vec2, e1: Vec2, s2: Vec2, e2: Vec2) -> Option<Vec2> {
    let orthogonal = |s: Vec2, e: Vec2| s.x == e.x || s.y == e.y;
    if orthogonal(s1, e1) && orthogonal(s2, e2) {
        intersect_hv_lines(s1, e1, s2, e2)
    } else {
        intersect_lines(s1, e1, s2, e2)
    }
}

impl Scene {
    /// Creates an unparented line with no route
    pub fn create_line(&mut self, layer: LayerId) -> ItemId {
        self.insert(layer, ItemKind::Line(LineData::default()))
    }

    fn line_mut(&mut self, id: ItemId) -> Option<&mut LineData> {
        self.get_mut(id).and_then(Item::as_line_mut)
    }

    /// Replaces the route; `vertices` are in the parent's coordinates
    pub fn set_line_vertices(&mut self, id: ItemId, vertices: Vec<Vec2>) {
        let Some(line) = self.line_mut(id) else {
            return;
        };
        line.vertices = vertices;
        self.update_line_bounds(id);
        self.set_needs_render(id);
    }

    /// Fits the line's bounds to its vertices and rebuilds the segments.
    /// Hops are dropped; they come back when crossings are marked again.
    fn update_line_bounds(&mut self, id: ItemId) {
        let Some(line) = self.line_mut(id) else {
            return;
        };
        let collapsed = line.vertices.len() < 2;
        let (position, size) = match Bounds::from_points(line.vertices.iter().copied()) {
            Some(bounds) if !collapsed => {
                line.segments = line
                    .vertices
                    .iter()
                    .map(|&vertex| SegmentPoint::vertex(vertex - bounds.min))
                    .collect();
                (bounds.min, bounds.size())
            }
            _ => {
                line.segments.clear();
                (Vec2::ZERO, Vec2::ZERO)
            }
        };

        self.apply_bounds(id, position, size);
        if collapsed {
            self.strip_hops_of(id);
        }
        self.emit(SceneEvent::LineLayoutChanged { line: id });
    }

    pub fn set_line_ends(&mut self, id: ItemId, start: LineEnd, end: LineEnd) {
        if let Some(line) = self.line_mut(id) {
            line.start_end = start;
            line.end_end = end;
            self.set_needs_render(id);
        }
    }

    pub fn set_line_pattern(&mut self, id: ItemId, pattern: LinePattern) {
        if let Some(line) = self.line_mut(id) {
            line.pattern = pattern;
            self.set_needs_render(id);
        }
    }

    pub fn set_line_width(&mut self, id: ItemId, width: f32) {
        if let Some(line) = self.line_mut(id) {
            line.line_width = width;
            self.set_needs_render(id);
        }
    }

    pub fn set_line_colors(&mut self, id: ItemId, pen: Color, fill: Color) {
        if let Some(line) = self.line_mut(id) {
            line.pen_color = pen;
            line.fill_color = fill;
            self.set_needs_render(id);
        }
    }

    /// Whether other lines crossing under this one make it hop
    pub fn set_hop_crossings(&mut self, id: ItemId, hop_crossings: bool) {
        if let Some(line) = self.line_mut(id) {
            line.hop_crossings = hop_crossings;
            self.emit(SceneEvent::LineLayoutChanged { line: id });
        }
    }

    /// Hit test for a line; `point` is in the parent's coordinates.
    ///
    /// Horizontal and vertical lines have a box with no area, so thin boxes
    /// are widened before the bounds check gives up.
    pub fn line_contains_point(&self, id: ItemId, point: Vec2) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        let Some(line) = item.as_line() else {
            return false;
        };
        let bounds = item.bounds();
        if !bounds.contains_point(point) {
            let (mut min, mut max) = (bounds.min, bounds.max);
            let mut widened = false;
            for axis in 0..2 {
                let extent = max[axis] - min[axis];
                if extent <= 2.0 {
                    min[axis] -= (3.0 - extent) / 2.0;
                    max[axis] = min[axis] + 4.0;
                    widened = true;
                }
            }
            return widened && Bounds::new(min, max).contains_point(point);
        }
        line.segments_contain_point(point - item.position)
    }

    /// Re-marks the hops of `line` against the hop-enabled lines under its
    /// own outermost ancestor
    pub fn update_line_crossings(&mut self, line: ItemId) {
        let Some(&root) = self.ancestors(line).last() else {
            return;
        };
        self.update_line_crossings_in(line, &[root]);
    }

    /// Re-marks the hops of `line` against every hop-enabled line under
    /// `roots` whose bounds touch it. `roots` are given front to back and
    /// nested groups are searched as well. The lower line of each crossing
    /// pair gets the hop.
    pub fn update_line_crossings_in(&mut self, line: ItemId, roots: &[ItemId]) {
        let Some(data) = self.get(line).and_then(Item::as_line) else {
            return;
        };
        if !data.hop_crossings {
            return;
        }
        let rect = self.root_bounds(line);
        let mut candidates = Vec::new();
        for &root in roots {
            self.collect_hop_lines(root, &rect, &mut candidates);
        }

        // lines that no longer overlap cannot keep hops over this one
        let stale: Vec<ItemId> = self
            .line_ids()
            .into_iter()
            .filter(|id| !candidates.contains(id))
            .collect();
        for other in stale {
            self.remove_hops(other, line);
        }

        let Some(index) = candidates.iter().position(|&id| id == line) else {
            log::trace!("line {line} is hidden or outside the searched roots");
            return;
        };
        log::debug!("updating crossings of line {line} against {} lines", candidates.len() - 1);

        let (front, back) = (&candidates[..index], &candidates[index + 1..]);
        for &other in front {
            self.mark_crossings(line, other);
        }
        for &other in back {
            self.mark_crossings(other, line);
        }
    }

    /// Visible hop-enabled lines below `group`, front to back, whose root
    /// bounds touch `rect`
    fn collect_hop_lines(&self, group: ItemId, rect: &Bounds, found: &mut Vec<ItemId>) {
        for &child in self.children(group) {
            let Some(item) = self.get(child) else {
                continue;
            };
            if !item.flags.visible {
                continue;
            }
            match &item.kind {
                ItemKind::Group(_) => self.collect_hop_lines(child, rect, found),
                ItemKind::Line(line)
                    if line.hop_crossings && rect.intersects_inclusive(&self.root_bounds(child)) =>
                {
                    found.push(child)
                }
                _ => {}
            }
        }
    }

    /// Every line in the scene, in arena order
    pub fn line_ids(&self) -> Vec<ItemId> {
        self.iter()
            .filter(|(_, item)| item.is_line())
            .map(|(id, _)| id)
            .collect()
    }

    /// Inserts a hop into `line` wherever `other` crosses it, replacing the
    /// hops previously recorded for `other`. Returns `true` if anything changed.
    pub fn mark_crossings(&mut self, line: ItemId, other: ItemId) -> bool {
        if line == other {
            return false;
        }
        let offset = self.root_position(other) - self.root_position(line);
        let (Some(this), Some(that)) = (
            self.get(line).and_then(Item::as_line),
            self.get(other).and_then(Item::as_line),
        ) else {
            return false;
        };
        if this.segments.len() < 2 {
            return false;
        }
        if that.segments.len() < 2 {
            return self.remove_hops(line, other);
        }

        let crossing: Vec<Vec2> = that
            .segments
            .iter()
            .filter(|segment| segment.hop.is_none())
            .map(|segment| segment.pos + offset)
            .collect();

        let mut marked = Vec::with_capacity(this.segments.len());
        marked.push(this.segments[0]);
        let mut p1 = this.segments[0].pos;
        // index in `marked` just after the last real vertex
        let mut run_start = 1;

        for segment in &this.segments[1..] {
            if let Some(hop) = segment.hop {
                if hop != other {
                    marked.push(*segment);
                }
                continue;
            }
            let p2 = segment.pos;
            for pair in crossing.windows(2) {
                let Some(hit) = segment_crossing(p1, p2, pair[0], pair[1]) else {
                    continue;
                };
                // keep the hops of this segment ordered along the line
                let distance = p1.distance_squared(hit);
                let mut index = run_start;
                while index < marked.len() && p1.distance_squared(marked[index].pos) <= distance {
                    index += 1;
                }
                marked.insert(
                    index,
                    SegmentPoint {
                        pos: hit,
                        hop: Some(other),
                    },
                );
            }
            marked.push(*segment);
            run_start = marked.len();
            p1 = p2;
        }

        if marked == this.segments {
            return false;
        }
        if let Some(data) = self.line_mut(line) {
            data.segments = marked;
        }
        self.set_needs_render(line);
        true
    }

    /// Drops the hops `line` has over `other`
    fn remove_hops(&mut self, line: ItemId, other: ItemId) -> bool {
        let Some(data) = self.line_mut(line) else {
            return false;
        };
        let before = data.segments.len();
        data.segments.retain(|segment| segment.hop != Some(other));
        if data.segments.len() == before {
            return false;
        }
        self.set_needs_render(line);
        true
    }

    /// Drops every hop marker in the scene
    pub fn clear_all_hops(&mut self) {
        for line in self.line_ids() {
            let Some(data) = self.line_mut(line) else {
                continue;
            };
            let before = data.segments.len();
            data.segments.retain(|segment| segment.hop.is_none());
            if data.segments.len() != before {
                self.set_needs_render(line);
            }
        }
    }

    /// Removes every hop marker that refers to `id`
    pub(crate) fn strip_hops_of(&mut self, id: ItemId) {
        for line in self.line_ids() {
            if line != id {
                self.remove_hops(line, id);
            }
        }
    }
}
