//! Node/member container for the active structure and its invariants.
//!
//! The graph is the single owner of all joints; members reference their two
//! endpoints through stable petgraph indices. Stability matters here: the
//! member-adding loop appends members across many solves and must be able to
//! track which candidates are already active, so indices are never reused
//! within a session.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use serde::{Deserialize, Serialize};

use crate::errors::TopologyError;
use crate::geometry::{distance, Displacement, Force, Point};

/// RGB color derived from a member's solved force, for display hosts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberColor {
    /// Red channel in `[0, 1]`.
    pub r: f32,
    /// Green channel in `[0, 1]`.
    pub g: f32,
    /// Blue channel in `[0, 1]`.
    pub b: f32,
}

impl MemberColor {
    /// Create a color with explicit channels.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Internal representation of a structural joint.
#[derive(Clone, Debug)]
struct Joint {
    /// Position of the joint in metres.
    position: Point,
    /// Indicator for each translational degree of freedom that is fixed.
    support: [bool; 3],
    /// External load applied to the joint in newtons.
    load: Force,
    /// Virtual displacement for the joint, populated after a solve.
    displacement: Displacement,
}

impl Joint {
    fn new(position: Point) -> Self {
        Self {
            position,
            support: [false, false, false],
            load: Force::default(),
            displacement: Displacement::default(),
        }
    }
}

/// Internal representation of a candidate or active member.
#[derive(Clone, Debug)]
struct Member {
    /// Axial force after a solve, in newtons. Positive means tension.
    axial_force: f64,
    /// Cross-sectional area after a solve, in square metres.
    area: f64,
    /// Cached distance between the endpoints in metres.
    length: f64,
    /// Display color derived from the solved force.
    color: MemberColor,
}

impl Member {
    fn new(length: f64) -> Self {
        Self {
            axial_force: 0.0,
            area: 0.0,
            length,
            color: MemberColor::default(),
        }
    }
}

/// Container for the active ground structure.
///
/// Duplicate members between the same pair of joints are legal; they simply
/// compete independently in the equilibrium LP. Self-loops are rejected at
/// construction, and deleting a joint cascades to every incident member.
#[derive(Clone, Debug, Default)]
pub struct TrussGraph {
    graph: StableUnGraph<Joint, Member>,
}

impl TrussGraph {
    /// Create an empty structure.
    ///
    /// # Examples
    /// ```
    /// use trussopt::TrussGraph;
    ///
    /// let structure = TrussGraph::new();
    /// assert_eq!(structure.joint_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of joints in the structure.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of members in the structure, active or not.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add a new joint at the given position.
    pub fn add_joint(&mut self, position: Point) -> NodeIndex {
        self.clear_results();
        self.graph.add_node(Joint::new(position))
    }

    /// Connect two existing joints with a new member.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownJoint`] when either endpoint is not in
    /// this structure and [`TopologyError::SelfLoop`] when both endpoints are
    /// the same joint.
    pub fn add_member(
        &mut self,
        start: NodeIndex,
        end: NodeIndex,
    ) -> Result<EdgeIndex, TopologyError> {
        if !self.graph.contains_node(start) {
            return Err(TopologyError::UnknownJoint(start));
        }
        if !self.graph.contains_node(end) {
            return Err(TopologyError::UnknownJoint(end));
        }
        if start == end {
            return Err(TopologyError::SelfLoop(start));
        }
        self.clear_results();
        let length = distance(self.graph[start].position, self.graph[end].position);
        Ok(self.graph.add_edge(start, end, Member::new(length)))
    }

    /// Remove a set of members from the structure.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownMember`] for the first member that is
    /// not part of this structure; members before it are removed.
    pub fn remove_members(&mut self, members: &[EdgeIndex]) -> Result<(), TopologyError> {
        self.clear_results();
        for &member in members {
            if self.graph.remove_edge(member).is_none() {
                return Err(TopologyError::UnknownMember(member));
            }
        }
        Ok(())
    }

    /// Remove a set of joints, cascading to every incident member.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownJoint`] for the first joint that is
    /// not part of this structure; joints before it are removed.
    pub fn remove_joints(&mut self, joints: &[NodeIndex]) -> Result<(), TopologyError> {
        self.clear_results();
        for &joint in joints {
            if self.graph.remove_node(joint).is_none() {
                return Err(TopologyError::UnknownJoint(joint));
            }
        }
        Ok(())
    }

    /// Set the per-axis fixity for a joint.
    ///
    /// Each entry corresponds to the X, Y and Z directions; `true` fixes the
    /// degree of freedom so the equilibrium constraint for that axis is
    /// absorbed by a support reaction.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownJoint`] when `joint` is not part of
    /// this structure.
    pub fn set_support(
        &mut self,
        joint: NodeIndex,
        support: [bool; 3],
    ) -> Result<(), TopologyError> {
        self.clear_results();
        match self.graph.node_weight_mut(joint) {
            Some(node) => {
                node.support = support;
                Ok(())
            }
            None => Err(TopologyError::UnknownJoint(joint)),
        }
    }

    /// Apply a point load to a joint.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownJoint`] when `joint` is not part of
    /// this structure.
    pub fn set_load(&mut self, joint: NodeIndex, load: Force) -> Result<(), TopologyError> {
        self.clear_results();
        match self.graph.node_weight_mut(joint) {
            Some(node) => {
                node.load = load;
                Ok(())
            }
            None => Err(TopologyError::UnknownJoint(joint)),
        }
    }

    /// Joint indices in insertion order.
    pub fn joint_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Member indices in insertion order.
    pub fn member_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Retrieve the position of a joint.
    #[must_use]
    pub fn joint_position(&self, joint: NodeIndex) -> Option<Point> {
        self.graph.node_weight(joint).map(|joint| joint.position)
    }

    /// Retrieve the fixity flags for a joint.
    #[must_use]
    pub fn joint_support(&self, joint: NodeIndex) -> Option<[bool; 3]> {
        self.graph.node_weight(joint).map(|joint| joint.support)
    }

    /// Retrieve the applied load for a joint.
    #[must_use]
    pub fn joint_load(&self, joint: NodeIndex) -> Option<Force> {
        self.graph.node_weight(joint).map(|joint| joint.load)
    }

    /// Retrieve the displacement of a joint after a solve.
    #[must_use]
    pub fn joint_displacement(&self, joint: NodeIndex) -> Option<Displacement> {
        self.graph
            .node_weight(joint)
            .map(|joint| joint.displacement)
    }

    /// Retrieve the endpoints of a member as `(start, end)`.
    #[must_use]
    pub fn member_endpoints(&self, member: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(member)
    }

    /// Retrieve the axial force in a member after a solve.
    #[must_use]
    pub fn member_axial_force(&self, member: EdgeIndex) -> Option<f64> {
        self.graph
            .edge_weight(member)
            .map(|member| member.axial_force)
    }

    /// Retrieve the cross-sectional area of a member after a solve.
    #[must_use]
    pub fn member_area(&self, member: EdgeIndex) -> Option<f64> {
        self.graph.edge_weight(member).map(|member| member.area)
    }

    /// Retrieve the cached length of a member.
    #[must_use]
    pub fn member_length(&self, member: EdgeIndex) -> Option<f64> {
        self.graph.edge_weight(member).map(|member| member.length)
    }

    /// Retrieve the display color of a member after a solve.
    #[must_use]
    pub fn member_color(&self, member: EdgeIndex) -> Option<MemberColor> {
        self.graph.edge_weight(member).map(|member| member.color)
    }

    /// Store a solved force, area and color on a member.
    pub(crate) fn set_member_result(
        &mut self,
        member: EdgeIndex,
        axial_force: f64,
        area: f64,
        color: MemberColor,
    ) {
        if let Some(member) = self.graph.edge_weight_mut(member) {
            member.axial_force = axial_force;
            member.area = area;
            member.color = color;
        }
    }

    /// Store a solved displacement on a joint.
    pub(crate) fn set_joint_displacement(&mut self, joint: NodeIndex, displacement: Displacement) {
        if let Some(joint) = self.graph.node_weight_mut(joint) {
            joint.displacement = displacement;
        }
    }

    /// Reset solved quantities when the topology or conditions change.
    fn clear_results(&mut self) {
        let joints: Vec<_> = self.graph.node_indices().collect();
        for joint in joints {
            if let Some(joint) = self.graph.node_weight_mut(joint) {
                joint.displacement = Displacement::default();
            }
        }
        let members: Vec<_> = self.graph.edge_indices().collect();
        for member in members {
            if let Some(member) = self.graph.edge_weight_mut(member) {
                member.axial_force = 0.0;
                member.area = 0.0;
                member.color = MemberColor::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point;

    #[test]
    fn members_require_existing_distinct_joints() {
        let mut structure = TrussGraph::new();
        let a = structure.add_joint(point(0.0, 0.0, 0.0));
        let b = structure.add_joint(point(1.0, 0.0, 0.0));

        structure.add_member(a, b).expect("valid member accepted");

        let self_loop = structure
            .add_member(a, a)
            .expect_err("self loop rejected");
        assert_eq!(self_loop, TopologyError::SelfLoop(a));

        structure.remove_joints(&[b]).expect("joint removed");
        let unknown = structure
            .add_member(a, b)
            .expect_err("removed joint rejected");
        assert_eq!(unknown, TopologyError::UnknownJoint(b));
    }

    #[test]
    fn duplicate_members_are_legal() {
        let mut structure = TrussGraph::new();
        let a = structure.add_joint(point(0.0, 0.0, 0.0));
        let b = structure.add_joint(point(1.0, 0.0, 0.0));
        let first = structure.add_member(a, b).expect("member accepted");
        let second = structure.add_member(a, b).expect("duplicate accepted");
        assert_ne!(first, second);
        assert_eq!(structure.member_count(), 2);
    }

    #[test]
    fn removing_a_joint_cascades_to_incident_members() {
        let mut structure = TrussGraph::new();
        let a = structure.add_joint(point(0.0, 0.0, 0.0));
        let b = structure.add_joint(point(1.0, 0.0, 0.0));
        let c = structure.add_joint(point(0.0, 1.0, 0.0));
        structure.add_member(a, b).expect("member accepted");
        structure.add_member(b, c).expect("member accepted");
        let survivor = structure.add_member(a, c).expect("member accepted");

        structure.remove_joints(&[b]).expect("joint removed");

        assert_eq!(structure.joint_count(), 2);
        assert_eq!(structure.member_count(), 1);
        assert!(structure.member_length(survivor).is_some());
    }

    #[test]
    fn member_indices_survive_unrelated_removals() {
        let mut structure = TrussGraph::new();
        let a = structure.add_joint(point(0.0, 0.0, 0.0));
        let b = structure.add_joint(point(1.0, 0.0, 0.0));
        let c = structure.add_joint(point(0.0, 1.0, 0.0));
        let doomed = structure.add_member(a, b).expect("member accepted");
        let kept = structure.add_member(b, c).expect("member accepted");

        structure.remove_members(&[doomed]).expect("member removed");

        let (start, end) = structure.member_endpoints(kept).expect("member intact");
        assert_eq!((start, end), (b, c));
    }

    #[test]
    fn member_length_is_cached_at_insertion() {
        let mut structure = TrussGraph::new();
        let a = structure.add_joint(point(0.0, 0.0, 0.0));
        let b = structure.add_joint(point(3.0, 4.0, 0.0));
        let member = structure.add_member(a, b).expect("member accepted");
        assert!((structure.member_length(member).expect("length cached") - 5.0).abs() < 1e-12);
    }
}
