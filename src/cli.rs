use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gnuplot-kernel",
    about = "Run gnuplot with notebook-style inline plotting",
    version
)]
pub struct Cli {
    /// Gnuplot script executed as a single submission.
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Statement to execute; may be repeated, all statements run as
    /// one submission.
    #[arg(short = 'e', long = "expr", action = clap::ArgAction::Append)]
    pub expr: Vec<String>,

    /// Plotting backend: `inline` or a direct gnuplot device such as `qt`.
    #[arg(long)]
    pub backend: Option<String>,

    /// Terminal specification, e.g. "pngcairo size 560,420".
    #[arg(long = "term")]
    pub termspec: Option<String>,

    /// Inline image format (png, svg, jpg).
    #[arg(long)]
    pub format: Option<String>,

    /// Print results as one JSON object per submission instead of text.
    #[arg(long)]
    pub json: bool,

    /// Command used to start the gnuplot process.
    #[arg(long)]
    pub command: Option<String>,

    /// Prompt timeout in seconds for long-running statements.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
