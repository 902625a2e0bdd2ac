//! Formulation of static equilibrium as a linear program.
//!
//! Every member contributes a tension/compression pair of non-negative
//! decision variables, so the signed axial force `t - c` stays linear in the
//! objective. Every free (joint, axis) pair contributes one equality row:
//! the sum of axial force components from incident members balances the
//! applied load. Fixed axes emit no row; a support reaction absorbs the
//! imbalance there and the corresponding displacement is pinned at zero.

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::errors::{ParameterError, SolveError};
use crate::geometry::{direction_cosines, Displacement};
use crate::graph::TrussGraph;

/// Forces with magnitude below this are treated as absent members.
///
/// The tolerance is load-bearing: it keeps near-zero members out of the
/// joint-cost term and out of the geometric output.
pub const FORCE_TOLERANCE: f64 = 1e-6;

/// Material capacity limits and joint-cost coefficient for one session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemParameters {
    /// Allowable tensile stress in pascals.
    pub tensile_capacity: f64,
    /// Allowable compressive stress in pascals.
    pub compressive_capacity: f64,
    /// Volume penalty per structurally active member.
    pub joint_cost: f64,
}

impl ProblemParameters {
    /// Validate and construct a parameter set.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] when either capacity is not strictly
    /// positive or the joint cost is negative.
    pub fn new(
        tensile_capacity: f64,
        compressive_capacity: f64,
        joint_cost: f64,
    ) -> Result<Self, ParameterError> {
        if tensile_capacity <= 0.0 {
            return Err(ParameterError::NonPositiveTensileCapacity(tensile_capacity));
        }
        if compressive_capacity <= 0.0 {
            return Err(ParameterError::NonPositiveCompressiveCapacity(
                compressive_capacity,
            ));
        }
        if joint_cost < 0.0 {
            return Err(ParameterError::NegativeJointCost(joint_cost));
        }
        Ok(Self {
            tensile_capacity,
            compressive_capacity,
            joint_cost,
        })
    }

    /// Capacity governing a solved force: tensile for tension, compressive
    /// for compression.
    #[must_use]
    pub fn capacity_for(&self, axial_force: f64) -> f64 {
        if axial_force >= 0.0 {
            self.tensile_capacity
        } else {
            self.compressive_capacity
        }
    }
}

/// Decision-variable bookkeeping for one member.
#[derive(Clone, Copy, Debug)]
pub struct MemberVariables {
    /// Member this tension/compression pair belongs to.
    pub member: EdgeIndex,
    /// Member length in metres.
    pub length: f64,
    /// Objective coefficient of the tension variable (`length / tensile`).
    pub tension_cost: f64,
    /// Objective coefficient of the compression variable.
    pub compression_cost: f64,
    /// Upper bound of the tension variable (`tensile × length`).
    pub tension_bound: f64,
    /// Upper bound of the compression variable.
    pub compression_bound: f64,
}

/// One coefficient of an equilibrium row.
///
/// The coefficient multiplies the signed axial force `t - c` of the member at
/// slot `var`, so a backend expands it to `+coeff` on the tension variable and
/// `-coeff` on the compression variable.
#[derive(Clone, Copy, Debug)]
pub struct RowTerm {
    /// Index into [`LpProblem::members`].
    pub var: usize,
    /// Direction cosine of the member along this row's axis, signed by which
    /// endpoint the row belongs to.
    pub coeff: f64,
}

/// Equilibrium constraint for one free (joint, axis) pair.
#[derive(Clone, Debug)]
pub struct EquilibriumRow {
    /// Joint this row balances.
    pub joint: NodeIndex,
    /// Global axis (0 = X, 1 = Y, 2 = Z).
    pub axis: usize,
    /// Right-hand side: the negated applied load component.
    pub rhs: f64,
    /// Non-zero coefficients of this row.
    pub terms: Vec<RowTerm>,
}

/// Solver-neutral LP instance produced from a graph and its parameters.
#[derive(Clone, Debug)]
pub struct LpProblem {
    members: Vec<MemberVariables>,
    rows: Vec<EquilibriumRow>,
}

impl LpProblem {
    /// Formulate the equilibrium LP for the current structure.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::EmptyStructure`] when the graph has no members
    /// and [`SolveError::ZeroLengthMember`] when a member has coincident
    /// endpoints.
    pub fn from_graph(
        graph: &TrussGraph,
        params: &ProblemParameters,
    ) -> Result<Self, SolveError> {
        if graph.member_count() == 0 {
            return Err(SolveError::EmptyStructure);
        }

        let mut rows = Vec::new();
        let mut row_lookup: HashMap<(NodeIndex, usize), usize> = HashMap::new();
        for joint in graph.joint_indices() {
            let support = graph.joint_support(joint).expect("joint exists");
            let load = graph.joint_load(joint).expect("joint exists");
            for axis in 0..3 {
                if support[axis] {
                    continue;
                }
                row_lookup.insert((joint, axis), rows.len());
                rows.push(EquilibriumRow {
                    joint,
                    axis,
                    rhs: -load.axis(axis),
                    terms: Vec::new(),
                });
            }
        }

        let mut members = Vec::with_capacity(graph.member_count());
        for member in graph.member_indices() {
            let (start, end) = graph.member_endpoints(member).expect("member exists");
            let start_position = graph.joint_position(start).expect("joint exists");
            let end_position = graph.joint_position(end).expect("joint exists");
            let direction = direction_cosines(start_position, end_position)
                .ok_or(SolveError::ZeroLengthMember(member))?;
            let length = graph.member_length(member).expect("member exists");
            let slot = members.len();
            members.push(MemberVariables {
                member,
                length,
                tension_cost: length / params.tensile_capacity,
                compression_cost: length / params.compressive_capacity,
                tension_bound: params.tensile_capacity * length,
                compression_bound: params.compressive_capacity * length,
            });

            // Tension pulls the start joint toward the end joint and the end
            // joint back toward the start. Exactly perpendicular members
            // contribute nothing along an axis and are left out of its row.
            for axis in 0..3 {
                if direction[axis] == 0.0 {
                    continue;
                }
                if let Some(&row) = row_lookup.get(&(start, axis)) {
                    rows[row].terms.push(RowTerm {
                        var: slot,
                        coeff: direction[axis],
                    });
                }
                if let Some(&row) = row_lookup.get(&(end, axis)) {
                    rows[row].terms.push(RowTerm {
                        var: slot,
                        coeff: -direction[axis],
                    });
                }
            }
        }

        // A loaded axis with no member able to act along it can never reach
        // equilibrium; report that before handing the backend a degenerate
        // row. Unloaded empty rows are trivially satisfied and dropped.
        for row in &rows {
            if row.terms.is_empty() && row.rhs != 0.0 {
                return Err(SolveError::Infeasible {
                    message: format!(
                        "joint {:?} carries a load along axis {} but no member can act along it",
                        row.joint, row.axis
                    ),
                });
            }
        }
        rows.retain(|row| !row.terms.is_empty());

        Ok(Self { members, rows })
    }

    /// Per-member variable bookkeeping, in member insertion order.
    #[must_use]
    pub fn members(&self) -> &[MemberVariables] {
        &self.members
    }

    /// Equilibrium rows, one per free (joint, axis), in joint order.
    #[must_use]
    pub fn rows(&self) -> &[EquilibriumRow] {
        &self.rows
    }

    /// Structural volume of a force distribution: Σ length × |force| / capacity.
    #[must_use]
    pub fn volume(&self, member_forces: &[f64]) -> f64 {
        self.members
            .iter()
            .zip(member_forces)
            .map(|(member, &force)| {
                if force >= 0.0 {
                    member.tension_cost * force
                } else {
                    member.compression_cost * -force
                }
            })
            .sum()
    }

    /// Map equality-row duals back to per-joint virtual displacements.
    ///
    /// Axes without a row (fixed axes) are absent from the result and read as
    /// zero. Returns an empty map when the backend supplied no duals.
    #[must_use]
    pub fn nodal_displacements(&self, row_duals: &[f64]) -> HashMap<NodeIndex, Displacement> {
        let mut displacements: HashMap<NodeIndex, Displacement> = HashMap::new();
        for (row, &dual) in self.rows.iter().zip(row_duals) {
            // With rows written as Σ ±cosine·(t - c) = -load, the stationarity
            // condition q + Aᵀz = 0 makes the equality dual itself the virtual
            // displacement: an active tension member sees a positive virtual
            // elongation of length/tensile_capacity.
            displacements
                .entry(row.joint)
                .or_default()
                .set_axis(row.axis, dual);
        }
        displacements
    }
}
