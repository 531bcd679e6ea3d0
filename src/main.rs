//! cordicgen CLI: generate CORDIC and sine table Verilog cores.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cordicgen::{Artifacts, GenerationRequest, Generator, Mode, ResetPolicy};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "cordicgen")]
#[command(version)]
#[command(about = "CORDIC and sine table Verilog core generator")]
struct Cli {
    /// Core type: p2r, sp2r, r2p, sr2p, tbl, qtr or qtbl
    #[arg(short = 't', long = "type", default_value = "p2r")]
    mode: Mode,

    /// Input width in bits (the phase width for the sine tables)
    #[arg(short = 'i', long)]
    input_width: Option<u32>,

    /// Output width in bits
    #[arg(short = 'o', long)]
    output_width: Option<u32>,

    /// Extra guard bits carried internally
    #[arg(short = 'x', long = "extra", default_value_t = cordicgen::DEFAULT_EXTRA_BITS)]
    extra_bits: u32,

    /// Phase width in bits
    #[arg(short = 'p', long)]
    phase_bits: Option<u32>,

    /// Number of CORDIC stages
    #[arg(short = 'n', long)]
    stages: Option<u32>,

    /// Reset style: none, sync or async
    #[arg(long, default_value = "sync")]
    reset: ResetPolicy,

    /// Carry an aux bit through the core
    #[arg(short = 'a', long)]
    aux: bool,

    /// Write a C header describing the core
    #[arg(short = 'c', long = "header")]
    header: bool,

    /// Write the metadata as JSON
    #[arg(long)]
    json: bool,

    /// Linear interpolation only (qtbl)
    #[arg(long)]
    linear: bool,

    /// Output Verilog file, `-` for stdout
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_stdout(&self) -> bool {
        self.file.as_deref() == Some("-")
    }

    fn request(&self) -> GenerationRequest {
        let mut req = GenerationRequest::new(self.mode)
            .extra_bits(self.extra_bits)
            .reset(self.reset)
            .aux(self.aux)
            .linear(self.linear);
        if let Some(w) = self.input_width {
            req = req.input_width(w);
        }
        if let Some(w) = self.output_width {
            req = req.output_width(w);
        }
        if let Some(p) = self.phase_bits {
            req = req.phase_bits(p);
        }
        if let Some(n) = self.stages {
            req = req.stages(n);
        }
        match &self.file {
            Some(f) if !self.to_stdout() => req.file_name(f),
            _ => req,
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// Sibling of the module file with another extension
fn sibling(module: &str, name: &str, ext: &str) -> PathBuf {
    Path::new(module)
        .with_file_name(name)
        .with_extension(ext)
}

fn write_outputs(cli: &Cli, out: &Artifacts) -> Result<()> {
    let module = &out.module;
    if cli.to_stdout() {
        io::stdout()
            .write_all(module.text.as_bytes())
            .context("Failed to write the module to stdout")?;
    } else {
        fs::write(&module.file_name, &module.text)
            .with_context(|| format!("Failed to write {}", module.file_name))?;
        info!("Wrote {}", module.file_name);
    }

    for table in &out.tables {
        fs::write(table.path(), table.to_string())
            .with_context(|| format!("Failed to write {}", table.path()))?;
        info!("Wrote {}", table.path());
    }

    let Some(meta) = &out.metadata else {
        if cli.header || cli.json {
            warn!("No metadata for {} cores", cli.mode.as_ref());
        }
        return Ok(());
    };
    if cli.verbose {
        info!("\n{meta}");
    }
    let base = &module.name;
    if cli.header {
        let path = sibling(&module.file_name, base, "h");
        let written = meta
            .header()
            .context("Failed to render the header")
            .and_then(|h| fs::write(&path, h).with_context(|| format!("{}", path.display())));
        match written {
            Ok(()) => info!("Wrote {}", path.display()),
            Err(e) => warn!("Skipping the C header: {e:#}"),
        }
    }
    if cli.json {
        let path = sibling(&module.file_name, base, "json");
        let written = meta
            .to_json()
            .context("Failed to serialize the metadata")
            .and_then(|j| fs::write(&path, j).with_context(|| format!("{}", path.display())));
        match written {
            Ok(()) => info!("Wrote {}", path.display()),
            Err(e) => warn!("Skipping the JSON metadata: {e:#}"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let req = cli.request();
    let out = Generator::generate(&req).context("Core generation failed")?;
    write_outputs(&cli, &out)
}
