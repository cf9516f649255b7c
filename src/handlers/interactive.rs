//! Interactive handler: a line-oriented loop where each line is one
//! submission. Failures are reported and the session stays usable.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::config::{Config, PlotSettings};
use crate::execution::GnuplotSession;
use crate::printer::{self, Printer};

pub async fn run(cfg: &Config, settings: PlotSettings, printer: &Printer) -> Result<()> {
    let mut session = GnuplotSession::start(cfg, settings).await?;
    let stdin = io::stdin();

    loop {
        print!("gnuplot-kernel> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let code = line.trim();
        if code.is_empty() {
            continue;
        }
        if code == "exit" || code == "quit" {
            break;
        }
        match session.execute(code).await {
            Ok(result) => printer.print(&result),
            Err(err) => printer::print_error(&err),
        }
    }

    session.shutdown().await;
    Ok(())
}
