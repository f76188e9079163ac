//! Thin CLI driver (§6): read a connectivity file, build a forest at a
//! uniform level, optionally balance it, and write a VTK snapshot.
//!
//! Grounded on the teacher's `src/main.rs` shape (parameters as plain local
//! variables, MPI setup at the top, one straight-line driver function); no
//! argument-parsing crate is introduced since the teacher's own drivers hand
//! roll `std::env::args()` rather than pulling in one.

use std::path::PathBuf;
use std::process::ExitCode;

use qforest::balance::BalanceMode;
use qforest::connectivity::Connectivity;
use qforest::forest::Forest;
use qforest::transport::SingleProcessTransport;
use qforest::vtk;

struct RunOptions {
    connectivity_path: PathBuf,
    output_path: PathBuf,
    level: u8,
    balance_mode: Option<BalanceMode>,
}

impl RunOptions {
    fn from_args(mut args: impl Iterator<Item = String>) -> Result<RunOptions, String> {
        let _program = args.next();
        let mut connectivity_path = None;
        let mut output_path = PathBuf::from("forest.vtk");
        let mut level = 0u8;
        let mut balance_mode = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--connectivity" => {
                    connectivity_path =
                        Some(PathBuf::from(args.next().ok_or("--connectivity needs a path")?));
                }
                "--output" => {
                    output_path = PathBuf::from(args.next().ok_or("--output needs a path")?);
                }
                "--level" => {
                    let raw = args.next().ok_or("--level needs a number")?;
                    level = raw.parse().map_err(|_| format!("invalid --level '{raw}'"))?;
                }
                "--balance" => {
                    let raw = args.next().ok_or("--balance needs face|face-corner")?;
                    balance_mode = Some(match raw.as_str() {
                        "face" => BalanceMode::Face,
                        "face-corner" => BalanceMode::FaceCorner,
                        other => return Err(format!("unknown --balance mode '{other}'")),
                    });
                }
                other => return Err(format!("unrecognized argument '{other}'")),
            }
        }

        Ok(RunOptions {
            connectivity_path: connectivity_path.ok_or("--connectivity is required")?,
            output_path,
            level,
            balance_mode,
        })
    }
}

fn run(options: RunOptions) -> Result<(), String> {
    let text = std::fs::read_to_string(&options.connectivity_path)
        .map_err(|e| format!("reading {}: {e}", options.connectivity_path.display()))?;
    let connectivity =
        Connectivity::from_reader(std::io::Cursor::new(text)).map_err(|e| e.to_string())?;

    let transport = SingleProcessTransport;
    let mut forest = Forest::new_forest(connectivity, &transport, 0, options.level);
    log::info!(
        "built forest: {} trees, {} local leaves",
        forest.connectivity.num_trees,
        forest.local_num_quadrants()
    );

    if let Some(mode) = options.balance_mode {
        let stats = forest.balance_forest(mode);
        log::info!(
            "balanced: {} leaves, {} outside-root rejections, {} outside-tree rejections",
            forest.local_num_quadrants(),
            stats.outside_root_rejections,
            stats.outside_tree_rejections
        );
    }

    vtk::write_legacy_unstructured_grid(&forest, &options.output_path, 1.0)
        .map_err(|e| e.to_string())?;
    log::info!("wrote {}", options.output_path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    qforest::error::install_abort_hook();

    let options = match RunOptions::from_args(std::env::args()) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("qforest: {message}");
            eprintln!(
                "usage: qforest --connectivity <path> [--output <path>] [--level <n>] [--balance face|face-corner]"
            );
            return ExitCode::FAILURE;
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            ExitCode::FAILURE
        }
    }
}
