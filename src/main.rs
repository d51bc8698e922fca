use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-catalogue-translator",
    version,
    about = "Layout-preserving in-place translation of PDF catalogues"
)]
struct Cli {
    /// PDF file to translate (reads stdin when omitted)
    #[arg(short = 'd', long = "data")]
    data: Option<PathBuf>,

    /// Output path (default: <input>.translated.pdf, or stdout for stdin input)
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Run the HTTP server instead of a one-shot conversion
    #[arg(long = "serve")]
    serve: bool,

    /// Server bind address (overrides settings)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_catalogue_translator::logging::init(cli.verbose)?;

    if cli.serve {
        let settings = pdf_catalogue_translator::settings::load_settings(
            cli.read_settings.as_deref().map(Path::new),
        )?;
        let addr = cli.addr.unwrap_or_else(|| settings.server_addr.clone());
        return pdf_catalogue_translator::server::run_server(settings, addr).await;
    }

    let input = match &cli.data {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!("no input: pass --data <file> or pipe a PDF to stdin"));
            }
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };
    if input.is_empty() {
        return Err(anyhow!("input is empty"));
    }

    let output = pdf_catalogue_translator::run(
        pdf_catalogue_translator::Config {
            settings_path: cli.read_settings.clone(),
        },
        &input,
    )
    .await?;

    match output_path(&cli) {
        Some(path) => {
            std::fs::write(&path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("written: {}", path.display());
        }
        None => io::stdout().write_all(&output)?,
    }
    Ok(())
}

fn output_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(out) = &cli.out {
        return Some(out.clone());
    }
    cli.data
        .as_ref()
        .map(|input| input.with_extension("translated.pdf"))
}
