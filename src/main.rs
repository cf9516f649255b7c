use std::io::{self, Read};

use anyhow::{bail, Result};
use gnuplot_kernel::cli::Cli;
use gnuplot_kernel::config::{Config, PlotSettings};
use gnuplot_kernel::handlers;
use gnuplot_kernel::printer::Printer;
use is_terminal::IsTerminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Cli::parse();

    let mut cfg = Config::load();
    if let Some(cmd) = args.command.as_deref() {
        cfg.set("GNUPLOT_KERNEL_COMMAND", cmd);
    }
    if let Some(secs) = args.timeout {
        cfg.set("GNUPLOT_KERNEL_TIMEOUT", &secs.to_string());
    }
    let settings = PlotSettings::resolve(
        &cfg,
        args.backend.as_deref(),
        args.termspec.as_deref(),
        args.format.as_deref(),
    )?;
    let printer = Printer::new(args.json);

    // Resolve the submission: script file, -e statements, or stdin.
    if let Some(path) = &args.script {
        let code = std::fs::read_to_string(path)?;
        return handlers::exec::run(&code, &cfg, settings, &printer).await;
    }
    if !args.expr.is_empty() {
        let code = args.expr.join("\n");
        return handlers::exec::run(&code, &cfg, settings, &printer).await;
    }

    if io::stdin().is_terminal() {
        handlers::interactive::run(&cfg, settings, &printer).await
    } else {
        let mut code = String::new();
        io::stdin().read_to_string(&mut code)?;
        if code.trim().is_empty() {
            bail!("no statements to execute");
        }
        handlers::exec::run(&code, &cfg, settings, &printer).await
    }
}
