use std::path::PathBuf;
use std::process::ExitCode;

use stencil::{time, Protocol};
use stencil::error::{Report, Result};
use stencil::markdown::Markdown;
use tracing_subscriber::EnvFilter;

use crate::discover::Magpie;

mod config;
mod discover;
mod util;
mod write;

pub const CONTENT_DIR: &str = "content";
pub const TEMPLATE_DIR: &str = "templates";
pub const STATIC_DIR: &str = "static";
pub const OUTPUT_DIR: &str = "public";
pub const CONFIG_FILES: [&str; 2] = ["config.toml", "config.json"];

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Builds an http and gemini site from a project directory.
        cmd magpie {
            /// Project directory. Defaults to the current directory.
            optional -i, --input input: PathBuf
            /// Output directory. Defaults to `public` in the project directory.
            optional -o, --output output: PathBuf
            /// Protocol to build: `http` or `gemini`. Repeatable; all by default.
            repeated -p, --protocol protocol: String
        }
    }
}

pub fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("magpie=info,stencil=info")))
        .init();

    let flags = flags::Magpie::from_env_or_exit();
    match run(flags) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Builds every requested protocol. Returns `false` if any build recorded a
/// failure.
fn run(flags: flags::Magpie) -> Result<bool> {
    let input = flags.input.unwrap_or_else(|| PathBuf::from("."));
    let output = flags.output.unwrap_or_else(|| input.join(OUTPUT_DIR));
    let protocols = match flags.protocol.is_empty() {
        true => Protocol::ALL.to_vec(),
        false => flags.protocol.iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<Protocol>>>()?,
    };

    let setup = Report::new();
    let magpie = time!("discovery", Magpie::new(&input, &output, &setup)?);
    let templates = magpie.templates()?;
    let sources = magpie.sources()?;
    let converter = Markdown::new();

    let mut success = !setup.has_failures();
    for protocol in protocols {
        let model = time!(format!("{protocol} build"), magpie.site(&templates, &converter)
            .build(protocol, &sources));

        time!(format!("{protocol} write"), write::emit(&magpie, &model)?);
        if model.report.has_failures() {
            eprintln!("{protocol}: {}", model.report);
            success = false;
        }
    }

    Ok(success)
}
