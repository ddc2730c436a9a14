mod assembler;
mod bookkeeping;
mod datatypes;
mod element_matrices;
mod error;
mod explicit;
mod harmonic;
mod input;
mod mesher;
mod report;
mod solver;
mod spectral;
mod wave_speed;

use clap::Parser;

use error::GroundwaveError;
use report::Report;

/// Axisymmetric finite element simulation of ground vibration transfer
#[derive(Parser)]
#[command(name = "groundwave")]
struct Args {
    /// JSON file describing the soil profile and run parameters
    #[arg(short = 'i', long = "input")]
    input: String,
    /// JSON file to write the surface transfer compliance to
    #[arg(short = 'o', long = "output")]
    output: String,
    /// Text file to write the run report to
    #[arg(short = 'r', long = "report")]
    report: String,
}

fn main() {
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        std::process::exit(err.exit_code());
    }
}

fn run(args: &Args) -> Result<(), GroundwaveError> {
    let report = Report::new(&args.report);

    let config = match input::read_config(&args.input) {
        Ok(config) => config,
        Err(err) => {
            // the validation catalog also goes into the report so the
            // full list of offending values survives the exit code
            if let GroundwaveError::Validation(message) = &err {
                report.validation_errors(message)?;
            }
            return Err(err);
        }
    };
    report.input_read(&args.input)?;

    let mesh = mesher::run(&config)?;
    let map = bookkeeping::mapping(&mesh, config.bounds);
    let system = assembler::assemble(&mesh, &map, &config)?;

    let result = solver::run(&mesh, &map, &system, &config, &report)?;

    report::write_output(&args.output, &result)?;
    println!("info: wrote results to {}", args.output);

    Ok(())
}
