#![warn(clippy::all)]
#![warn(missing_docs)]

//! Ground-structure topology optimization for truss structures.
//!
//! Starting from a candidate set of members (the *ground structure*), the
//! optimizer finds the minimum-volume subset that holds the applied loads in
//! static equilibrium, sizing each member by the force it carries. In
//! member-adding mode the candidate set starts sparse and grows adaptively:
//! after each solve the potential-connection pool is scored against the LP
//! duals and only justified members are promoted, so the fully-connected
//! problem never has to be solved outright.
//!
//! # Examples
//!
//! Optimize a two-bar frame carrying a point load at its apex:
//!
//! ```
//! use trussopt::{
//!     force, point, GroundStructurePolicy, ProblemParameters, Session, SolverChoice,
//!     StructureInput,
//! };
//!
//! let input = StructureInput {
//!     positions: vec![
//!         point(0.0, 0.0, 0.0),
//!         point(2.0, 0.0, 0.0),
//!         point(1.0, 1.0, 0.0),
//!     ],
//!     members: vec![(0, 2), (2, 1)],
//!     supports: vec![
//!         [true, true, true],
//!         [true, true, true],
//!         [false, false, true],
//!     ],
//!     loads: vec![
//!         force(0.0, 0.0, 0.0),
//!         force(0.0, 0.0, 0.0),
//!         force(0.0, -1000.0, 0.0),
//!     ],
//!     candidates: vec![],
//! };
//!
//! let params = ProblemParameters::new(1000.0, 1000.0, 0.0)?;
//! let mut session = Session::new(
//!     &input,
//!     params,
//!     GroundStructurePolicy::FromExistingTopology,
//!     SolverChoice::Microlp,
//! )?;
//! session.run_to_convergence(10)?;
//! let volume = session.volume().expect("a solve has run");
//! assert!((volume - 2.0).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod errors;
mod geometry;
mod graph;
mod lp;
mod report;
mod session;
mod solver;

pub use builder::{
    build, CandidateMember, GroundStructure, GroundStructurePolicy, StructureInput,
};
pub use errors::{
    BoundaryKind, BuildError, DimensionMismatch, ParameterError, SolveError, TopologyError,
};
pub use geometry::{
    direction_cosines, distance, force, point, Displacement, Force, Point,
};
pub use graph::{MemberColor, TrussGraph};
pub use lp::{
    EquilibriumRow, LpProblem, MemberVariables, ProblemParameters, RowTerm, FORCE_TOLERANCE,
};
pub use report::{
    active_members, displacements, format_iteration, member_color, member_radius, render_log,
    ActiveMember, RADIUS_TOLERANCE,
};
pub use session::{IterationRecord, Session, SessionState, VIOLATION_THRESHOLD};
pub use solver::{
    ClarabelBackend, LpSolution, MicrolpBackend, SolverBackend, SolverChoice,
};
