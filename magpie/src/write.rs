use std::fs;
use std::path::{Path, PathBuf};

use stencil::error;
use stencil::rayon::prelude::*;
use stencil::SiteModel;
use stencil::error::{Chainable, Result};
use stencil::value::{Sink, Source};

use crate::discover::Magpie;

/// Writes one protocol's build to `{output}/{suffix}`: the directory is
/// emptied, the protocol's static files are copied in, and then every file
/// artifact is written over them.
pub fn emit(magpie: &Magpie, model: &SiteModel) -> Result<PathBuf> {
    let protocol = model.protocol;
    let target = magpie.output.join(protocol.suffix());
    clean(&target)?;

    let statics = magpie.static_files(protocol);
    statics.par_iter()
        .map(|(entry, relative)| {
            let output = target.join(relative);
            (&*entry.path).read_to(&output).chain_with(|| error! {
                "failed to copy static file",
                "source path" => entry.path.display(),
                "destination path" => output.display(),
            })
        })
        .collect::<Result<()>>()?;

    model.files.par_iter()
        .map(|file| target.join(&file.path).write(file.bytes()))
        .collect::<Result<()>>()?;

    tracing::info!(%protocol, target = %target.display(), files = model.files.len(),
        statics = statics.len(), "wrote site");

    Ok(target)
}

/// Removes everything in `target` and recreates it empty.
pub fn clean(target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target).chain_with(|| error! {
            "failed to clean output directory",
            "directory" => target.display(),
        })?;
    }

    fs::create_dir_all(target).chain_with(|| error! {
        "failed to create output directory",
        "directory" => target.display(),
    })
}
