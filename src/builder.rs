//! Construction of the initial candidate graph from raw host input.
//!
//! The host geometry collaborator supplies plain index-based lists; this
//! module validates them, applies boundary conditions node-by-node in input
//! order, and produces the starting [`TrussGraph`] plus, in member-adding
//! mode, the potential-connection pool the optimization loop draws from.

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::errors::{BoundaryKind, BuildError, DimensionMismatch, TopologyError};
use crate::geometry::{Force, Point};
use crate::graph::TrussGraph;

/// How the initial candidate member set is constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundStructurePolicy {
    /// Copy the supplied members one-to-one. The default.
    #[default]
    FromExistingTopology,
    /// Discard the supplied members and connect every unordered pair of
    /// joints, yielding exactly N·(N−1)/2 members.
    FullyConnected,
    /// Copy the supplied members and retain the candidate list as a
    /// potential-connection pool for the member-adding loop.
    MemberAdding,
}

/// Raw structure description from the host.
///
/// `supports` and `loads` are ordered and length-matched to `positions`;
/// `members` and `candidates` reference positions by index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StructureInput {
    /// Joint positions.
    pub positions: Vec<Point>,
    /// Member endpoint pairs, as indices into `positions`.
    pub members: Vec<(usize, usize)>,
    /// Per-joint fixity flags, one entry per position.
    pub supports: Vec<[bool; 3]>,
    /// Per-joint applied loads, one entry per position.
    pub loads: Vec<Force>,
    /// Potential-connection endpoint pairs, used by
    /// [`GroundStructurePolicy::MemberAdding`] and ignored otherwise.
    pub candidates: Vec<(usize, usize)>,
}

/// A not-yet-active member in the potential-connection pool.
#[derive(Clone, Copy, Debug)]
pub struct CandidateMember {
    /// Start joint in the active graph.
    pub start: NodeIndex,
    /// End joint in the active graph.
    pub end: NodeIndex,
}

/// A built ground structure: the active graph, the candidate pool, and the
/// joint indices in input order.
#[derive(Clone, Debug)]
pub struct GroundStructure {
    /// The active structure.
    pub graph: TrussGraph,
    /// Candidates awaiting promotion; empty outside member-adding mode.
    pub pool: Vec<CandidateMember>,
    /// Graph index of each input position, in input order.
    pub joints: Vec<NodeIndex>,
}

/// Build a ground structure from raw input under the given policy.
///
/// # Errors
///
/// Returns [`BuildError::DimensionMismatch`] when either boundary-condition
/// list does not match the node count, and [`BuildError::InvalidTopology`]
/// when a member or candidate pair references an out-of-range or duplicate
/// index. Nothing is built when validation fails.
pub fn build(
    input: &StructureInput,
    policy: GroundStructurePolicy,
) -> Result<GroundStructure, BuildError> {
    let joint_count = input.positions.len();
    if input.supports.len() != joint_count {
        return Err(DimensionMismatch {
            kind: BoundaryKind::Supports,
            expected: joint_count,
            found: input.supports.len(),
        }
        .into());
    }
    if input.loads.len() != joint_count {
        return Err(DimensionMismatch {
            kind: BoundaryKind::Loads,
            expected: joint_count,
            found: input.loads.len(),
        }
        .into());
    }
    validate_pairs(&input.members, joint_count)?;
    if policy == GroundStructurePolicy::MemberAdding {
        validate_pairs(&input.candidates, joint_count)?;
    }

    let mut graph = TrussGraph::new();
    let mut joints = Vec::with_capacity(joint_count);
    for (index, &position) in input.positions.iter().enumerate() {
        let joint = graph.add_joint(position);
        graph.set_support(joint, input.supports[index])?;
        graph.set_load(joint, input.loads[index])?;
        joints.push(joint);
    }

    match policy {
        GroundStructurePolicy::FromExistingTopology | GroundStructurePolicy::MemberAdding => {
            for &(start, end) in &input.members {
                graph.add_member(joints[start], joints[end])?;
            }
        }
        GroundStructurePolicy::FullyConnected => {
            for start in 0..joint_count {
                for end in start + 1..joint_count {
                    graph.add_member(joints[start], joints[end])?;
                }
            }
        }
    }

    let pool = if policy == GroundStructurePolicy::MemberAdding {
        input
            .candidates
            .iter()
            .map(|&(start, end)| CandidateMember {
                start: joints[start],
                end: joints[end],
            })
            .collect()
    } else {
        Vec::new()
    };

    log::info!(
        "built ground structure: {} joints, {} members, {} pooled candidates ({policy:?})",
        graph.joint_count(),
        graph.member_count(),
        pool.len()
    );
    Ok(GroundStructure { graph, pool, joints })
}

/// Reject endpoint pairs that reference unknown or duplicate joints.
fn validate_pairs(pairs: &[(usize, usize)], joint_count: usize) -> Result<(), TopologyError> {
    for &(start, end) in pairs {
        for index in [start, end] {
            if index >= joint_count {
                return Err(TopologyError::IndexOutOfRange { index, joint_count });
            }
        }
        if start == end {
            return Err(TopologyError::SelfLoop(NodeIndex::new(start)));
        }
    }
    Ok(())
}
