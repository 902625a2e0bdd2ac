//! Derivation of display state and the formatted iteration log.
//!
//! Members below the visibility tolerance stay in the graph data model but
//! never appear in geometric output; hosts render exactly what these
//! functions return.

use std::f64::consts::PI;
use std::fmt::Write;

use petgraph::stable_graph::{EdgeIndex, NodeIndex};

use crate::geometry::{Displacement, Point};
use crate::graph::{MemberColor, TrussGraph};
use crate::session::IterationRecord;

/// Members with a radius at or below this are visually and structurally
/// inert.
pub const RADIUS_TOLERANCE: f64 = 1e-6;

/// Display radius for a solved cross-sectional area: the radius of the
/// circle with that area, so radius grows monotonically with area.
#[must_use]
pub fn member_radius(area: f64) -> f64 {
    (area.max(0.0) / PI).sqrt()
}

/// Display color for a solved member force.
///
/// Tension renders red and compression blue; `utilization` in `[0, 1]`
/// drives the channel intensity.
#[must_use]
pub fn member_color(axial_force: f64, utilization: f64) -> MemberColor {
    let intensity = utilization.clamp(0.0, 1.0) as f32;
    if axial_force >= 0.0 {
        MemberColor::new(0.2 + 0.8 * intensity, 0.1, 0.1)
    } else {
        MemberColor::new(0.1, 0.1, 0.2 + 0.8 * intensity)
    }
}

/// One renderable member: a line segment with radius and color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveMember {
    /// Member identity in the session graph.
    pub member: EdgeIndex,
    /// Start endpoint position.
    pub start: Point,
    /// End endpoint position.
    pub end: Point,
    /// Display radius derived from the solved area.
    pub radius: f64,
    /// Display color derived from the solved force.
    pub color: MemberColor,
}

/// The renderable members of a structure, in member insertion order.
///
/// Inert members (radius at or below [`RADIUS_TOLERANCE`]) are excluded.
#[must_use]
pub fn active_members(graph: &TrussGraph) -> Vec<ActiveMember> {
    graph
        .member_indices()
        .filter_map(|member| {
            let radius = member_radius(graph.member_area(member).expect("member exists"));
            if radius <= RADIUS_TOLERANCE {
                return None;
            }
            let (start, end) = graph.member_endpoints(member).expect("member exists");
            Some(ActiveMember {
                member,
                start: graph.joint_position(start).expect("joint exists"),
                end: graph.joint_position(end).expect("joint exists"),
                radius,
                color: graph.member_color(member).expect("member exists"),
            })
        })
        .collect()
}

/// Per-joint displacement vectors, in joint insertion order.
#[must_use]
pub fn displacements(graph: &TrussGraph) -> Vec<(NodeIndex, Displacement)> {
    graph
        .joint_indices()
        .map(|joint| {
            (
                joint,
                graph.joint_displacement(joint).expect("joint exists"),
            )
        })
        .collect()
}

/// One formatted log line for an iteration.
#[must_use]
pub fn format_iteration(record: &IterationRecord) -> String {
    format!(
        "iteration {}: volume {:.6}, members added {}, solve time {:.3} s",
        record.index,
        record.volume,
        record.members_added,
        record.runtime.as_secs_f64()
    )
}

/// The full session history, one line per iteration in solve order.
#[must_use]
pub fn render_log(log: &[IterationRecord]) -> String {
    let mut output = String::new();
    for record in log {
        writeln!(&mut output, "{}", format_iteration(record))
            .expect("writing to string cannot fail");
    }
    output
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::point;

    #[test]
    fn radius_is_monotonic_in_area() {
        assert_eq!(member_radius(0.0), 0.0);
        let small = member_radius(1.0e-4);
        let large = member_radius(4.0e-4);
        assert_relative_eq!(large, 2.0 * small);
    }

    #[test]
    fn color_distinguishes_tension_from_compression() {
        let tension = member_color(500.0, 1.0);
        let compression = member_color(-500.0, 1.0);
        assert!(tension.r > tension.b);
        assert!(compression.b > compression.r);
        // Higher utilization renders brighter.
        assert!(member_color(500.0, 1.0).r > member_color(500.0, 0.2).r);
    }

    #[test]
    fn inert_members_are_excluded_from_geometry() {
        let mut graph = TrussGraph::new();
        let a = graph.add_joint(point(0.0, 0.0, 0.0));
        let b = graph.add_joint(point(1.0, 0.0, 0.0));
        let c = graph.add_joint(point(0.0, 1.0, 0.0));
        let carrying = graph.add_member(a, b).expect("member");
        let inert = graph.add_member(b, c).expect("member");
        graph.set_member_result(carrying, 500.0, 5.0e-4, MemberColor::default());
        graph.set_member_result(inert, 1e-9, 1e-12, MemberColor::default());

        let visible = active_members(&graph);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].member, carrying);
        assert!(visible.iter().all(|member| member.radius > RADIUS_TOLERANCE));
    }

    #[test]
    fn log_lines_carry_fixed_precision() {
        let record = IterationRecord {
            index: 3,
            volume: 1.25,
            members_added: 2,
            runtime: Duration::from_millis(42),
        };
        assert_eq!(
            format_iteration(&record),
            "iteration 3: volume 1.250000, members added 2, solve time 0.042 s"
        );
    }

    #[test]
    fn rendered_log_has_one_line_per_iteration() {
        let log = vec![
            IterationRecord {
                index: 0,
                volume: 2.0,
                members_added: 1,
                runtime: Duration::from_millis(10),
            },
            IterationRecord {
                index: 1,
                volume: 1.5,
                members_added: 0,
                runtime: Duration::from_millis(12),
            },
        ];
        let rendered = render_log(&log);
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.starts_with("iteration 0"));
    }
}
