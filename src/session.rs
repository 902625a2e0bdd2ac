//! The iterative member-adding optimization session.
//!
//! A session owns one graph, one parameter set and one backend, and runs the
//! solve → evaluate → grow cycle until no candidate in the potential
//! connection pool is worth promoting. Sessions are single-threaded and
//! strictly sequential; the iteration log is append-only in solve order, so
//! replaying it reconstructs the session history exactly.

use std::collections::HashMap;
use std::time::Duration;

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::builder::{build, GroundStructurePolicy, StructureInput};
use crate::errors::{BuildError, SolveError};
use crate::geometry::{direction_cosines, distance, Displacement};
use crate::graph::TrussGraph;
use crate::lp::{LpProblem, ProblemParameters, FORCE_TOLERANCE};
use crate::report;
use crate::solver::{LpSolution, SolverBackend, SolverChoice};

/// Dual-violation level above which a pooled candidate is promoted.
///
/// Measured in normalized force units: 0 means the candidate is exactly
/// dual-feasible, as every already-active member is. The value is a tunable
/// heuristic constant.
pub const VIOLATION_THRESHOLD: f64 = 0.1;

/// Where the session is in its solve/evaluate/grow cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No solve has run since the last reset.
    Idle,
    /// A backend solve is in flight.
    Solving,
    /// Pool candidates are being scored against the current duals.
    Evaluating,
    /// Candidates were promoted; another solve is required.
    Growing,
    /// A pass promoted zero candidates; the structure is final.
    Converged,
    /// The backend failed. The graph and log kept their pre-failure values;
    /// the session will keep failing until it is reset.
    Failed,
}

/// One line of the append-only iteration log.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub index: usize,
    /// Total volume including the joint-cost penalty for active members.
    pub volume: f64,
    /// Candidates promoted out of the pool during this iteration.
    pub members_added: usize,
    /// Wall-clock time of the backend solve.
    pub runtime: Duration,
}

/// Pool entry with promotion bookkeeping.
#[derive(Clone, Copy, Debug)]
struct PooledCandidate {
    start: NodeIndex,
    end: NodeIndex,
    promoted: bool,
}

/// An owned, resettable optimization session.
///
/// Implements [`std::fmt::Debug`] by hand because the boxed backend is an
/// opaque trait object; only its name is reported.
pub struct Session {
    graph: TrussGraph,
    joints: Vec<NodeIndex>,
    pool: Vec<PooledCandidate>,
    params: ProblemParameters,
    policy: GroundStructurePolicy,
    backend: Box<dyn SolverBackend>,
    state: SessionState,
    log: Vec<IterationRecord>,
    stop_requested: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("joints", &self.graph.joint_count())
            .field("members", &self.graph.member_count())
            .field("pending_candidates", &self.pending_candidates())
            .field("iterations", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a fresh session from raw input with a configured backend.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the input fails validation; no session
    /// state exists in that case.
    pub fn new(
        input: &StructureInput,
        params: ProblemParameters,
        policy: GroundStructurePolicy,
        choice: SolverChoice,
    ) -> Result<Self, BuildError> {
        Self::with_backend(input, params, policy, choice.backend())
    }

    /// Build a fresh session around an explicit backend instance.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the input fails validation.
    pub fn with_backend(
        input: &StructureInput,
        params: ProblemParameters,
        policy: GroundStructurePolicy,
        backend: Box<dyn SolverBackend>,
    ) -> Result<Self, BuildError> {
        let ground = build(input, policy)?;
        Ok(Self {
            graph: ground.graph,
            joints: ground.joints,
            pool: ground
                .pool
                .iter()
                .map(|candidate| PooledCandidate {
                    start: candidate.start,
                    end: candidate.end,
                    promoted: false,
                })
                .collect(),
            params,
            policy,
            backend,
            state: SessionState::Idle,
            log: Vec::new(),
            stop_requested: false,
        })
    }

    /// Discard all session state and rebuild from new input.
    ///
    /// The backend is kept; graph, pool, log and state machine start over.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the input fails validation, in which
    /// case the existing session state is left untouched.
    pub fn reset(
        &mut self,
        input: &StructureInput,
        params: ProblemParameters,
        policy: GroundStructurePolicy,
    ) -> Result<(), BuildError> {
        let ground = build(input, policy)?;
        self.graph = ground.graph;
        self.joints = ground.joints;
        self.pool = ground
            .pool
            .iter()
            .map(|candidate| PooledCandidate {
                start: candidate.start,
                end: candidate.end,
                promoted: false,
            })
            .collect();
        self.params = params;
        self.policy = policy;
        self.state = SessionState::Idle;
        self.log.clear();
        self.stop_requested = false;
        Ok(())
    }

    /// Run one full solve → evaluate → grow iteration.
    ///
    /// On success the graph carries fresh forces, areas, colors and
    /// displacements, and one record is appended to the log. On failure the
    /// session transitions to [`SessionState::Failed`] and nothing is
    /// mutated.
    ///
    /// # Errors
    ///
    /// Returns the [`SolveError`] produced by formulation or by the backend.
    pub fn step(&mut self) -> Result<SessionState, SolveError> {
        self.state = SessionState::Solving;
        let lp = LpProblem::from_graph(&self.graph, &self.params).map_err(|error| {
            self.state = SessionState::Failed;
            log::warn!("formulation failed: {error}");
            error
        })?;
        let solution = self.backend.solve(&lp).map_err(|error| {
            self.state = SessionState::Failed;
            log::warn!("{} solve failed: {error}", self.backend.name());
            error
        })?;

        self.state = SessionState::Evaluating;
        let members_added = if self.policy == GroundStructurePolicy::MemberAdding {
            self.promote_violating_candidates(&lp, &solution)
        } else {
            0
        };

        self.apply_solution(&lp, &solution);

        let active_members = solution
            .member_forces
            .iter()
            .filter(|force| force.abs() > FORCE_TOLERANCE)
            .count();
        let record = IterationRecord {
            index: self.log.len(),
            volume: solution.volume + self.params.joint_cost * active_members as f64,
            members_added,
            runtime: solution.runtime,
        };
        log::info!("{}", report::format_iteration(&record));
        self.log.push(record);

        self.state = if members_added == 0 {
            SessionState::Converged
        } else {
            SessionState::Growing
        };
        Ok(self.state)
    }

    /// Step repeatedly until convergence, failure, the iteration cap, or an
    /// external [`stop`](Self::stop) request.
    ///
    /// The cap and the stop flag are the only cancellation points; a solve in
    /// flight always runs to completion.
    ///
    /// # Errors
    ///
    /// Returns the first [`SolveError`] encountered.
    pub fn run_to_convergence(&mut self, max_iterations: usize) -> Result<SessionState, SolveError> {
        for _ in 0..max_iterations {
            if self.stop_requested {
                log::info!("stop requested; halting before the next solve");
                break;
            }
            if self.step()? == SessionState::Converged {
                break;
            }
        }
        Ok(self.state)
    }

    /// Request cancellation before the next iteration begins.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Current state of the solve/evaluate/grow cycle.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The active structure.
    #[must_use]
    pub fn graph(&self) -> &TrussGraph {
        &self.graph
    }

    /// Graph index of each input position, in input order.
    #[must_use]
    pub fn joints(&self) -> &[NodeIndex] {
        &self.joints
    }

    /// Parameters held for the life of this session.
    #[must_use]
    pub fn params(&self) -> &ProblemParameters {
        &self.params
    }

    /// The append-only iteration log, oldest first.
    #[must_use]
    pub fn iteration_log(&self) -> &[IterationRecord] {
        &self.log
    }

    /// The most recent iteration record. A pure re-query: repeated calls on
    /// an untouched session return the same record.
    #[must_use]
    pub fn last_entry(&self) -> Option<&IterationRecord> {
        self.log.last()
    }

    /// Total volume after the most recent solve.
    #[must_use]
    pub fn volume(&self) -> Option<f64> {
        self.last_entry().map(|record| record.volume)
    }

    /// Pool candidates not yet promoted into the structure.
    #[must_use]
    pub fn pending_candidates(&self) -> usize {
        self.pool.iter().filter(|entry| !entry.promoted).count()
    }

    /// Write solved forces, areas, colors and displacements onto the graph.
    fn apply_solution(&mut self, lp: &LpProblem, solution: &LpSolution) {
        let areas: Vec<f64> = solution
            .member_forces
            .iter()
            .map(|&force| force.abs() / self.params.capacity_for(force))
            .collect();
        let max_area = areas.iter().copied().fold(0.0, f64::max);

        for ((vars, &force), &area) in lp
            .members()
            .iter()
            .zip(&solution.member_forces)
            .zip(&areas)
        {
            let utilization = if max_area > 0.0 { area / max_area } else { 0.0 };
            let color = report::member_color(force, utilization);
            self.graph.set_member_result(vars.member, force, area, color);
        }

        let solved = lp.nodal_displacements(&solution.row_duals);
        let joints: Vec<_> = self.graph.joint_indices().collect();
        for joint in joints {
            let displacement = solved.get(&joint).copied().unwrap_or_default();
            self.graph.set_joint_displacement(joint, displacement);
        }
    }

    /// Score every unpromoted candidate against the current duals and insert
    /// the violators. Returns the number of members added.
    fn promote_violating_candidates(&mut self, lp: &LpProblem, solution: &LpSolution) -> usize {
        if solution.row_duals.is_empty() {
            log::debug!(
                "{} exposes no duals; candidate evaluation skipped",
                self.backend.name()
            );
            return 0;
        }
        let displacements = lp.nodal_displacements(&solution.row_duals);

        let mut added = 0;
        for index in 0..self.pool.len() {
            let entry = self.pool[index];
            if entry.promoted {
                continue;
            }
            let violation = candidate_violation(
                &self.graph,
                &self.params,
                entry.start,
                entry.end,
                &displacements,
            );
            if violation > VIOLATION_THRESHOLD {
                log::debug!(
                    "promoting candidate {:?}→{:?} (violation {violation:.3})",
                    entry.start,
                    entry.end
                );
                self.graph
                    .add_member(entry.start, entry.end)
                    .expect("pool endpoints exist in the session graph");
                self.pool[index].promoted = true;
                added += 1;
            }
        }
        added
    }
}

/// Dual-feasibility violation of a candidate member, in normalized force
/// units.
///
/// The virtual strain along the candidate is scaled by whichever capacity it
/// would exploit; active members score exactly zero, useless candidates score
/// negative. Candidates with coincident endpoints never violate.
pub(crate) fn candidate_violation(
    graph: &TrussGraph,
    params: &ProblemParameters,
    start: NodeIndex,
    end: NodeIndex,
    displacements: &HashMap<NodeIndex, Displacement>,
) -> f64 {
    let (Some(start_position), Some(end_position)) =
        (graph.joint_position(start), graph.joint_position(end))
    else {
        return f64::NEG_INFINITY;
    };
    let Some(direction) = direction_cosines(start_position, end_position) else {
        return f64::NEG_INFINITY;
    };
    let length = distance(start_position, end_position);
    let start_displacement = displacements.get(&start).copied().unwrap_or_default();
    let end_displacement = displacements.get(&end).copied().unwrap_or_default();
    let strain = direction.dot(&(end_displacement.to_vector() - start_displacement.to_vector()))
        / length;
    f64::max(
        strain * params.tensile_capacity,
        -strain * params.compressive_capacity,
    ) - 1.0
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::{force, point};

    /// Backend that replays prepared solutions, so controller behavior can be
    /// tested without a numerical solve.
    struct ScriptedBackend {
        script: RefCell<VecDeque<Result<LpSolution, SolveError>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<LpSolution, SolveError>>) -> Box<Self> {
            Box::new(Self {
                script: RefCell::new(script.into()),
            })
        }
    }

    impl SolverBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn solve(&self, _lp: &LpProblem) -> Result<LpSolution, SolveError> {
            self.script
                .borrow_mut()
                .pop_front()
                .expect("script long enough")
        }
    }

    fn solution(member_forces: Vec<f64>, volume: f64, row_duals: Vec<f64>) -> LpSolution {
        LpSolution {
            member_forces,
            volume,
            row_duals,
            runtime: Duration::from_millis(5),
        }
    }

    /// Two bars up to a loaded apex plus an unloaded free joint above it;
    /// the pool offers a tie from the apex to that joint.
    fn member_adding_input() -> StructureInput {
        StructureInput {
            positions: vec![
                point(0.0, 0.0, 0.0),
                point(2.0, 0.0, 0.0),
                point(1.0, 1.0, 0.0),
                point(1.0, 2.0, 0.0),
            ],
            members: vec![(0, 2), (2, 1)],
            supports: vec![
                [true, true, true],
                [true, true, true],
                [false, false, true],
                [false, false, true],
            ],
            loads: vec![
                force(0.0, 0.0, 0.0),
                force(0.0, 0.0, 0.0),
                force(0.0, -1000.0, 0.0),
                force(0.0, 0.0, 0.0),
            ],
            candidates: vec![(2, 3)],
        }
    }

    fn params() -> ProblemParameters {
        ProblemParameters::new(1000.0, 1000.0, 0.0).expect("valid parameters")
    }

    #[test]
    fn violating_candidates_are_promoted_then_convergence_is_reached() {
        // The apex joint owns the only two equality rows (the free joint
        // above it has no incident members yet). A scripted vertical dual of
        // -0.002 at the apex puts a virtual strain of 0.002 on the pooled
        // vertical candidate: violation 1.0, well past the threshold.
        let script = vec![
            Ok(solution(vec![-707.0, -707.0], 2.0, vec![0.0, -0.002])),
            Ok(solution(vec![-707.0, -707.0, 0.0], 2.0, vec![0.0, -0.002])),
        ];
        let mut session = Session::with_backend(
            &member_adding_input(),
            params(),
            GroundStructurePolicy::MemberAdding,
            ScriptedBackend::new(script),
        )
        .expect("valid input");

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.pending_candidates(), 1);

        let state = session.step().expect("first iteration succeeds");
        assert_eq!(state, SessionState::Growing);
        assert_eq!(session.graph().member_count(), 3);
        assert_eq!(session.pending_candidates(), 0);
        assert_eq!(session.last_entry().expect("logged").members_added, 1);

        // Second pass: pool exhausted, zero promotions, converged. The same
        // duals must not re-promote the already-active candidate.
        let state = session.step().expect("second iteration succeeds");
        assert_eq!(state, SessionState::Converged);
        assert_eq!(session.graph().member_count(), 3);
        assert_eq!(session.iteration_log().len(), 2);
        assert_eq!(session.last_entry().expect("logged").members_added, 0);
    }

    #[test]
    fn non_adaptive_sessions_skip_evaluation() {
        let script = vec![Ok(solution(vec![-707.0, -707.0], 2.0, vec![0.0, -0.002]))];
        let mut session = Session::with_backend(
            &member_adding_input(),
            params(),
            GroundStructurePolicy::FromExistingTopology,
            ScriptedBackend::new(script),
        )
        .expect("valid input");

        let state = session.step().expect("iteration succeeds");
        assert_eq!(state, SessionState::Converged);
        assert_eq!(session.graph().member_count(), 2);
        assert_eq!(session.last_entry().expect("logged").members_added, 0);
    }

    #[test]
    fn solver_failure_is_terminal_and_preserves_state() {
        let script = vec![
            Ok(solution(vec![-707.0, -707.0], 2.0, Vec::new())),
            Err(SolveError::Infeasible {
                message: "no equilibrium".to_string(),
            }),
        ];
        let mut session = Session::with_backend(
            &member_adding_input(),
            params(),
            GroundStructurePolicy::MemberAdding,
            ScriptedBackend::new(script),
        )
        .expect("valid input");

        session.step().expect("first iteration succeeds");
        let volume_before = session.volume().expect("volume recorded");
        let forces_before: Vec<_> = session
            .graph()
            .member_indices()
            .map(|member| session.graph().member_axial_force(member))
            .collect();

        let error = session.step().expect_err("scripted failure surfaces");
        assert_eq!(
            error,
            SolveError::Infeasible {
                message: "no equilibrium".to_string(),
            }
        );
        assert_eq!(session.state(), SessionState::Failed);
        // Log and graph keep their pre-failure values.
        assert_eq!(session.iteration_log().len(), 1);
        assert_relative_eq!(session.volume().expect("volume kept"), volume_before);
        let forces_after: Vec<_> = session
            .graph()
            .member_indices()
            .map(|member| session.graph().member_axial_force(member))
            .collect();
        assert_eq!(forces_before, forces_after);
    }

    #[test]
    fn joint_cost_counts_only_non_negligible_members() {
        // Second member's force sits below the tolerance, so only one joint
        // cost is charged on top of the LP volume.
        let cheap = ProblemParameters::new(1000.0, 1000.0, 0.25).expect("valid parameters");
        let script = vec![Ok(solution(vec![-500.0, 1e-9], 1.5, Vec::new()))];
        let mut session = Session::with_backend(
            &member_adding_input(),
            cheap,
            GroundStructurePolicy::FromExistingTopology,
            ScriptedBackend::new(script),
        )
        .expect("valid input");

        session.step().expect("iteration succeeds");
        assert_relative_eq!(session.volume().expect("volume recorded"), 1.75);
    }

    #[test]
    fn candidate_strain_scales_with_the_governing_capacity() {
        let mut graph = TrussGraph::new();
        let anchor = graph.add_joint(point(0.0, 0.0, 0.0));
        let tip = graph.add_joint(point(1.0, 0.0, 0.0));
        let asymmetric = ProblemParameters::new(2000.0, 1000.0, 0.0).expect("valid parameters");

        // Virtual elongation of 0.001 along the member favors tension.
        let mut displacements = HashMap::new();
        displacements.insert(tip, Displacement::new(0.001, 0.0, 0.0));
        let stretched = candidate_violation(&graph, &asymmetric, anchor, tip, &displacements);
        assert_relative_eq!(stretched, 1.0, epsilon = 1e-12);

        // The same magnitude in compression only reaches the smaller
        // compressive capacity: exactly dual-feasible, not a violation.
        displacements.insert(tip, Displacement::new(-0.001, 0.0, 0.0));
        let squashed = candidate_violation(&graph, &asymmetric, anchor, tip, &displacements);
        assert_relative_eq!(squashed, 0.0, epsilon = 1e-12);
        assert!(squashed <= VIOLATION_THRESHOLD);
    }

    #[test]
    fn sessions_format_for_diagnostics() {
        // `Result<Session, _>::expect_err` needs this to render; the backend
        // is opaque, so only its name appears.
        let session = Session::with_backend(
            &member_adding_input(),
            params(),
            GroundStructurePolicy::MemberAdding,
            ScriptedBackend::new(Vec::new()),
        )
        .expect("valid input");
        let rendered = format!("{session:?}");
        assert!(rendered.contains("scripted"));
        assert!(rendered.contains("MemberAdding"));
        assert!(rendered.contains("Idle"));
    }

    #[test]
    fn reset_clears_the_log_and_pool() {
        let script = vec![
            Ok(solution(vec![-707.0, -707.0], 2.0, vec![0.0, -0.002])),
            Ok(solution(vec![-707.0, -707.0, 0.0], 2.0, Vec::new())),
        ];
        let mut session = Session::with_backend(
            &member_adding_input(),
            params(),
            GroundStructurePolicy::MemberAdding,
            ScriptedBackend::new(script),
        )
        .expect("valid input");
        session.step().expect("iteration succeeds");
        assert_eq!(session.graph().member_count(), 3);

        session
            .reset(
                &member_adding_input(),
                params(),
                GroundStructurePolicy::MemberAdding,
            )
            .expect("valid input");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.iteration_log().is_empty());
        assert_eq!(session.graph().member_count(), 2);
        assert_eq!(session.pending_candidates(), 1);
    }
}
