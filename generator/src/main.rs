// Licensed under the Apache-2.0 license

//! Generates a RISC-V linker script from a hardware description.
//!
//! ```bash
//! ldscript-gen --description board.toml --linker metal.default.lds
//! ldscript-gen -d board.toml --ramrodata --parameters params.json > metal.ramrodata.lds
//! ```

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use clap_num::maybe_hex;
use ldscript_builder::{resolve_layout, DeviceDescription};
use ldscript_config::{LayoutConfig, LayoutPolicy, DEFAULT_HEAP_SIZE, DEFAULT_STACK_SIZE};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("layout").args(["scratchpad", "ramrodata", "freertos"])))]
struct Args {
    /// Hardware description (TOML)
    #[arg(short, long)]
    description: PathBuf,

    /// Output linker script; written to stdout when omitted
    #[arg(short, long)]
    linker: Option<PathBuf>,

    /// Load code and data straight into RAM
    #[arg(long, default_value_t = false)]
    scratchpad: bool,

    /// Place read-only data in RAM and .text in a large enough ITIM
    #[arg(long, default_value_t = false)]
    ramrodata: bool,

    /// Default layout plus the FreeRTOS privileged sections
    #[arg(long, default_value_t = false)]
    freertos: bool,

    /// Render with this template instead of the built-in one
    #[arg(long)]
    template: Option<PathBuf>,

    /// Also write the resolved parameter set as JSON
    #[arg(long)]
    parameters: Option<PathBuf>,

    #[arg(long, value_parser = maybe_hex::<u64>, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: u64,

    #[arg(long, value_parser = maybe_hex::<u64>, default_value_t = DEFAULT_HEAP_SIZE)]
    heap_size: u64,

    /// Log debug output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn policy(&self) -> LayoutPolicy {
        if self.scratchpad {
            LayoutPolicy::Scratchpad
        } else if self.ramrodata {
            LayoutPolicy::Ramrodata
        } else if self.freertos {
            LayoutPolicy::Freertos
        } else {
            LayoutPolicy::Default
        }
    }

    fn config(&self) -> LayoutConfig {
        LayoutConfig {
            policy: self.policy(),
            stack_size: self.stack_size,
            heap_size: self.heap_size,
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let hw = DeviceDescription::from_file(&args.description)?;
    let config = args.config();
    let layout = resolve_layout(&hw, &config).with_context(|| {
        format!(
            "failed to resolve the {} layout of {}",
            config.policy,
            args.description.display()
        )
    })?;

    if let Some(path) = &args.parameters {
        let json = layout.parameters.to_json()?;
        std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write parameters to {}", path.display()))?;
        info!("wrote parameters to {}", path.display());
    }

    let script = match &args.template {
        Some(path) => {
            let template = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display()))?;
            layout
                .render_template(&template)
                .with_context(|| format!("failed to render template {}", path.display()))?
        }
        None => layout.render()?,
    };

    match &args.linker {
        Some(path) => {
            std::fs::write(path, &script)
                .with_context(|| format!("failed to write linker script {}", path.display()))?;
            info!("wrote linker script to {}", path.display());
        }
        None => std::io::stdout()
            .lock()
            .write_all(script.as_bytes())
            .context("failed to write linker script to stdout")?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();
    run(&args)
}
