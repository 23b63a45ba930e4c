use clap::Parser;

/// This is a program to extract booth-level results from Form 20 election documents.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The run configuration in JSON format. It lists the schema, the documents
    /// and the official results to use. See the manual of booth_tally for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (identifier or name) Processes only this constituency. The name can be a canonical
    /// identifier such as TS-085 or any name that resolves to it.
    #[clap(long, value_parser)]
    pub ac: Option<String>,

    /// Processes every configured constituency that needs it: absent from the output, or
    /// tagged EMPTY, NEEDS_REVIEW or POOR.
    #[clap(long, takes_value = false)]
    pub batch: bool,

    /// With --batch, processes every configured constituency.
    #[clap(long, takes_value = false)]
    pub force: bool,

    /// (directory) If specified, overrides the output directory of the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference output for one state and year. If provided, form20 checks
    /// that the output it produced for that state and year is identical.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (default: number of cores) The number of constituencies processed in parallel.
    #[clap(long, value_parser)]
    pub workers: Option<usize>,

    /// (file path) Runs the alias discovery pass, writes the new schema to this file and exits.
    #[clap(long, value_parser)]
    pub discover_aliases: Option<String>,

    /// Deletes the output records of constituencies that do not exist in the schema for
    /// their year, and exits.
    #[clap(long, takes_value = false)]
    pub remove_invalid: bool,

    /// (default 0) The number of NEEDS_REVIEW constituencies tolerated before the exit code
    /// reports them. Overrides the configuration.
    #[clap(long, value_parser)]
    pub max_needs_review: Option<usize>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
