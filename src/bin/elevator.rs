//! Elevation stage: elevate every terrain sample from the finished
//! river network and honeycomb.
//!
//! Reads the store, computes elevations in parallel, and updates the
//! terrain table by id. Emits one `0x2e` byte to stdout per sample and a
//! final `0x21`; diagnostics go to stderr.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use alluvium::store::{StoreDoc, StoreError};
use alluvium::terrain::ElevationStage;
use alluvium::util::Stage;

#[derive(Parser, Debug)]
#[command(name = "elevator", version, about)]
struct Cli {
    /// Store document (.json, or .json.gz for gzip)
    db_path: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("elevator: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StoreError> {
    let mut doc = StoreDoc::load(&cli.db_path)?;
    let mut stage = ElevationStage::from_store(&doc)?;

    {
        let _t = Stage::new("elevation");
        stage.run(|| progress(0x2e));
    }

    stage.write_back(&mut doc);
    doc.save(&cli.db_path)?;
    progress(0x21);
    Ok(())
}

fn progress(byte: u8) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(&[byte]);
    let _ = out.flush();
}
