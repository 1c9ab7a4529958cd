/*
    scvx, successive convexification trajectory optimization
    Copyright (C) 2026 The scvx developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Runs the powered descent demo: a 3-DoF variable-mass landing solved by
//! successive convexification. An optional first argument names a YAML
//! configuration file.

use std::env;
use std::error::Error;

use scvx::dynamics::PointMassLander;
use scvx::solvers::ClarabelSolver;
use scvx::{ScvxConfig, ScvxController};

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => ScvxConfig::from_yaml(path)?,
        None => ScvxConfig::default(),
    };

    let model = PointMassLander::default();
    let controller = ScvxController::new(&model, config);
    let solution = controller.run(&ClarabelSolver::default())?;

    let iterate = &solution.iterate;
    println!("termination: {:?}", solution.termination);
    println!("flight time: {:.4}", iterate.sigma);
    println!(
        "final mass: {:.4} (wet {:.4})",
        iterate.states[(0, iterate.states.ncols() - 1)],
        model.m_wet
    );
    for summary in &solution.history {
        println!("{summary}");
    }

    Ok(())
}
