// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use path_slash::PathBufExt;
use serde::Serialize;

use build_bootstrap::BuildEnv;
use build_manifest::resolve;

pub const CONFIG_FILE: &str = "vhdl_ls.toml";

/// `vhdl_ls.toml`, as read by the VHDL language server
#[derive(Debug, Default, Serialize)]
pub struct LsConfig {
    pub libraries: IndexMap<String, Library>,
}

#[derive(Debug, Default, Serialize)]
pub struct Library {
    pub files: Vec<String>,
}

impl LsConfig {
    fn add(&mut self, lib: &str, file: String) {
        let lib = self.libraries.entry(lib.to_string()).or_default();
        if !lib.files.contains(&file) {
            lib.files.push(file);
        }
    }

    /// Adds every source of every block under `dir`, test benches
    /// included.
    pub fn add_project(&mut self, dir: &Path) -> Result<()> {
        for manifest in build_manifest::read_manifests(dir, false)? {
            for list in &manifest.file_lists {
                let lib = list.lib_name(&manifest.name);
                let src = manifest.source_dir(list.kind);
                for file in &list.files {
                    self.add(&lib, slashed(resolve(&src.join(file)))?);
                }
            }
        }
        Ok(())
    }

    /// Adds the VUnit and OSVVM libraries shipped in a VUnit install.
    pub fn add_vunit(&mut self, vunit_dir: &Path) -> Result<()> {
        let root = vunit_dir.join("vhdl");
        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.with_context(|| {
                format!("could not walk {}", root.display())
            })?;
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str())
                    != Some("vhd")
            {
                continue;
            }
            let file = slashed(entry.into_path())?;
            if file.contains("osvvm") {
                self.add("osvvm", file);
            } else {
                self.add("vunit_lib", file);
            }
        }
        Ok(())
    }
}

fn slashed(path: PathBuf) -> Result<String> {
    let display = path.display().to_string();
    path.to_slash()
        .ok_or_else(|| anyhow!("path {display} is not valid UTF-8"))
}

/// Asks the interpreter where VUnit is installed. `None` if it isn't.
fn find_vunit(env: &BuildEnv) -> Option<PathBuf> {
    let mut cmd = env.python();
    cmd.arg("-c")
        .arg("import os, vunit; print(os.path.dirname(vunit.__file__))");
    match cmd.output() {
        Ok(out) if out.status.success() => {
            let dir = String::from_utf8_lossy(&out.stdout).trim().to_string();
            (!dir.is_empty()).then(|| PathBuf::from(dir))
        }
        Ok(_) => {
            debug!("vunit is not importable, skipping its libraries");
            None
        }
        Err(e) => {
            debug!("could not run {cmd:?}: {e}");
            None
        }
    }
}

pub fn run(env: &BuildEnv, dirs: &[PathBuf]) -> Result<PathBuf> {
    let dirs = if dirs.is_empty() {
        vec![env.base_dir.clone()]
    } else {
        dirs.iter().map(|d| resolve(d)).collect()
    };

    let mut config = LsConfig::default();
    for dir in &dirs {
        config.add_project(dir)?;
    }
    if let Some(vunit) = find_vunit(env) {
        info!("adding VUnit libraries from {}", vunit.display());
        config.add_vunit(&vunit)?;
    }

    let Some(first) = dirs.first() else {
        bail!("no project directory given");
    };
    let out = first.join(CONFIG_FILE);
    let text = toml::to_string(&config)
        .context("could not serialize language server config")?;
    std::fs::write(&out, text)
        .with_context(|| format!("could not write {}", out.display()))?;
    info!(
        "wrote {} libraries to {}",
        config.libraries.len(),
        out.display()
    );
    Ok(out)
}
