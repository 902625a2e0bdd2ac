use std::error::Error;

use trussopt::{
    active_members, displacements, force, point, render_log, GroundStructurePolicy,
    ProblemParameters, Session, SolverChoice, StructureInput,
};

/// Optimize a short cantilever: two wall joints, three free joints, a tip
/// load, and a pool of candidate braces for the member-adding loop to draw
/// from.
fn cantilever_input() -> StructureInput {
    StructureInput {
        positions: vec![
            point(0.0, 0.0, 0.0),
            point(0.0, 1.0, 0.0),
            point(1.0, 0.0, 0.0),
            point(1.0, 1.0, 0.0),
            point(2.0, 0.0, 0.0),
        ],
        // Seed with the two direct ties to the loaded tip.
        members: vec![(0, 4), (1, 4)],
        supports: vec![
            [true, true, true],
            [true, true, true],
            [false, false, true],
            [false, false, true],
            [false, false, true],
        ],
        loads: vec![
            force(0.0, 0.0, 0.0),
            force(0.0, 0.0, 0.0),
            force(0.0, 0.0, 0.0),
            force(0.0, 0.0, 0.0),
            force(0.0, -100.0, 0.0),
        ],
        candidates: vec![
            (0, 2),
            (0, 3),
            (1, 2),
            (1, 3),
            (2, 3),
            (2, 4),
            (3, 4),
        ],
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Mild steel capacities in pascals; loads above are in newtons.
    let params = ProblemParameters::new(250.0e6, 150.0e6, 0.0)?;
    let mut session = Session::new(
        &cantilever_input(),
        params,
        GroundStructurePolicy::MemberAdding,
        SolverChoice::default(),
    )?;

    session.run_to_convergence(25)?;

    print!("{}", render_log(session.iteration_log()));
    if let Some(volume) = session.volume() {
        println!("final volume: {volume:.6} m^3");
    }

    println!("active members:");
    for member in active_members(session.graph()) {
        println!(
            "  ({:.2}, {:.2}) -> ({:.2}, {:.2})  radius {:.3e} m",
            member.start.x, member.start.y, member.end.x, member.end.y, member.radius
        );
    }

    println!("joint displacements:");
    for (joint, displacement) in displacements(session.graph()) {
        println!(
            "  {:?}: ({:+.3e}, {:+.3e}, {:+.3e})",
            joint, displacement.x, displacement.y, displacement.z
        );
    }

    Ok(())
}
