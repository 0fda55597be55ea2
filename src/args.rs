use clap::Parser;

/// This is a daily election forecasting program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the run: candidates, input and output files, model settings.
    /// Relative paths in this file are resolved from the directory of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The CSV poll feed. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub polls: Option<String>,

    /// (file path) The prior table written by the previous run. It is read at the start of the run and
    /// overwritten at the end.
    #[clap(long, value_parser)]
    pub priors: Option<String>,

    /// (file path) The result of the previous election per state, used for the states without polls.
    #[clap(short, long, value_parser)]
    pub baseline: Option<String>,

    /// (file path, optional) A table of electors per state. The 2024 apportionment is used if not provided.
    #[clap(short, long, value_parser)]
    pub electoral: Option<String>,

    /// (directory) Where the output tables are written.
    #[clap(short, long, value_parser)]
    pub out_dir: Option<String>,

    /// (YYYY-MM-DD, default today) The date of the run in the tracking table.
    #[clap(long, value_parser)]
    pub date: Option<String>,

    /// (beta or gaussian, default beta) The likelihood of the poll shares.
    #[clap(long, value_parser)]
    pub family: Option<String>,

    /// (integer) Seed of the random number generators. A seed is drawn and logged if not provided.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// If passed as an argument, the fit starts from the default priors instead of the stored prior table.
    #[clap(long, takes_value = false)]
    pub reset_priors: bool,

    /// If passed as an argument, the tracking table is started again from this run.
    #[clap(long, takes_value = false)]
    pub reset_tracker: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
