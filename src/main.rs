use clap::Parser;
use env_logger::Env;
use log::{info, LevelFilter};

use snafu::ErrorCompat;

mod args;
mod pipeline;

fn main() {
    let args = args::Args::parse();

    // RUST_LOG wins over the info default. --verbose wins over both.
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    info!("args: {:?}", args);

    match pipeline::run_daily(&args) {
        Ok(report) => {
            println!(
                "{}: tracked candidate wins {:.2}% of the simulations, interval [{:.2}%, {:.2}%], projected winner: {} ({} tracking rows)",
                report.date,
                100.0 * report.win_fraction,
                100.0 * report.lower,
                100.0 * report.upper,
                report.projected_winner,
                report.tracking_rows
            );
        }
        Err(e) => {
            eprintln!("An error occured: {}", e);
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(1);
        }
    }
}
