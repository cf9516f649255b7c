//! One-shot handler: run a single submission and print the result.

use anyhow::Result;

use crate::config::{Config, PlotSettings};
use crate::execution::GnuplotSession;
use crate::printer::Printer;

pub async fn run(code: &str, cfg: &Config, settings: PlotSettings, printer: &Printer) -> Result<()> {
    let mut session = GnuplotSession::start(cfg, settings).await?;
    let outcome = session.execute(code).await;
    session.shutdown().await;
    let result = outcome?;
    printer.print(&result);
    Ok(())
}
