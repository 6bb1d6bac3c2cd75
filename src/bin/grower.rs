//! Growth stage: grow the river network inland from the seeded mouths.
//!
//! Reads the store, runs parallel growth, and replaces the river-node
//! table with the result. Emits one `0x2e` byte to stdout per expanded
//! candidate and a final `0x21`; diagnostics go to stderr.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use alluvium::growth::{grow, GrowthConfig, GrowthParams};
use alluvium::store::{StoreDoc, StoreError};
use alluvium::util::Stage;

#[derive(Parser, Debug)]
#[command(name = "grower", version, about)]
struct Cli {
    /// Store document (.json, or .json.gz for gzip)
    db_path: PathBuf,
    /// Weight of the two-child expansion mode
    pa: f32,
    /// Weight of the single-continuation mode
    pc: f32,
    /// Shore clearance, in edge lengths
    sigma: f32,
    /// Node/edge clearance, in edge lengths
    eta: f32,
    /// Elevation bias threshold for candidate selection
    zeta: f32,
    /// Elevation gain per meter per unit of raster slope
    slope_rate: f32,
    /// Placement attempts per proposed child
    max_tries: u32,
    /// Heading perturbation standard deviation, radians
    river_angle_dev: f32,
    /// Random seed; random when omitted (logged for reproducibility)
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads; defaults to available parallelism
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("grower: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StoreError> {
    let mut doc = StoreDoc::load(&cli.db_path)?;
    let params = GrowthParams::from_store(
        &doc,
        GrowthConfig {
            pa: cli.pa,
            pc: cli.pc,
            sigma: cli.sigma,
            eta: cli.eta,
            zeta: cli.zeta,
            slope_rate: cli.slope_rate,
            max_tries: cli.max_tries,
            river_angle_dev: cli.river_angle_dev,
        },
    )?;

    let seed = cli.seed.unwrap_or_else(rand::random);
    let threads = cli
        .threads
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));

    {
        let _t = Stage::new("growth");
        grow(&params, seed, threads, || progress(0x2e));
    }

    params.write_nodes(&mut doc);
    doc.save(&cli.db_path)?;
    progress(0x21);
    Ok(())
}

fn progress(byte: u8) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(&[byte]);
    let _ = out.flush();
}
