//! Error types produced while building structures or running optimizations.

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use thiserror::Error;

/// Error returned when a member cannot be added to a graph.
///
/// Member construction is validated eagerly so that every member stored in a
/// [`TrussGraph`](crate::TrussGraph) references two distinct joints that
/// exist in the same graph instance.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Returned when a joint cannot be found in the graph.
    #[error("joint {0:?} does not exist in this structure")]
    UnknownJoint(NodeIndex),
    /// Returned when a member endpoint index exceeds the supplied node list.
    #[error("node index {index} is out of range for {joint_count} joints")]
    IndexOutOfRange {
        /// Offending endpoint index from the input member list.
        index: usize,
        /// Number of joints available in the structure.
        joint_count: usize,
    },
    /// Returned when both endpoints of a member are the same joint.
    #[error("member endpoints must be distinct (both were {0:?})")]
    SelfLoop(NodeIndex),
    /// Returned when a member cannot be found in the graph.
    #[error("member {0:?} does not exist in this structure")]
    UnknownMember(EdgeIndex),
}

/// Identifies which boundary-condition list failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryKind {
    /// The per-joint support (fixity) list.
    Supports,
    /// The per-joint load list.
    Loads,
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supports => write!(f, "supports"),
            Self::Loads => write!(f, "loads"),
        }
    }
}

/// Error returned when boundary-condition lists do not match the node list.
///
/// Raised before any graph is built or any solve is attempted, so no session
/// state is mutated.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{kind} list has {found} entries but the structure has {expected} joints")]
pub struct DimensionMismatch {
    /// Which boundary-condition list was the wrong length.
    pub kind: BoundaryKind,
    /// Number of joints in the structure.
    pub expected: usize,
    /// Number of entries actually supplied.
    pub found: usize,
}

/// Error returned when problem parameters are not physically meaningful.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ParameterError {
    /// Returned when the tensile capacity is zero or negative.
    #[error("tensile capacity must be positive (received {0})")]
    NonPositiveTensileCapacity(f64),
    /// Returned when the compressive capacity is zero or negative.
    #[error("compressive capacity must be positive (received {0})")]
    NonPositiveCompressiveCapacity(f64),
    /// Returned when the joint cost is negative.
    #[error("joint cost must not be negative (received {0})")]
    NegativeJointCost(f64),
}

/// Error returned when a ground structure cannot be built from raw input.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum BuildError {
    /// A boundary-condition list did not match the node list.
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
    /// A member referenced an unknown or duplicate joint.
    #[error(transparent)]
    InvalidTopology(#[from] TopologyError),
    /// The problem parameters were rejected.
    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),
}

/// Error returned when the LP solve fails.
///
/// A solver failure is an expected outcome for hard numerical problems; the
/// session graph and iteration log are left untouched when one occurs. The
/// backend's own diagnostic message is preserved verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    /// The structure has no members to carry load.
    #[error("the structure has no members; nothing to optimize")]
    EmptyStructure,
    /// A member spans zero distance and has no defined direction.
    #[error("member {0:?} has zero length")]
    ZeroLengthMember(EdgeIndex),
    /// The LP has no equilibrium solution under the given loads.
    #[error("equilibrium is infeasible: {message}")]
    Infeasible {
        /// Diagnostic message from the backend, verbatim.
        message: String,
    },
    /// The backend failed for a reason other than infeasibility.
    #[error("solver backend '{backend}' failed: {message}")]
    Backend {
        /// Name of the backend that produced the failure.
        backend: &'static str,
        /// Diagnostic message from the backend, verbatim.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message_names_the_list() {
        let error = DimensionMismatch {
            kind: BoundaryKind::Supports,
            expected: 5,
            found: 4,
        };
        assert_eq!(
            error.to_string(),
            "supports list has 4 entries but the structure has 5 joints"
        );
    }

    #[test]
    fn backend_message_is_preserved_verbatim() {
        let error = SolveError::Backend {
            backend: "clarabel",
            message: "max iterations reached".to_string(),
        };
        assert!(error.to_string().ends_with("max iterations reached"));
    }
}
