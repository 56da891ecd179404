// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use build_manifest::{resolve, FileKind, FileList, Manifest, VhdlStandard};
use log::info;
use path_slash::PathBufExt;

use build_bootstrap::BuildEnv;

/// Name of the generated file, read by the Vivado build scripts.
pub const FILELIST: &str = "filelist.tcl";

/// One line of the generated list: a source file, the library it belongs
/// to, and how Vivado should treat it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub library: String,
    pub file_type: String,
}

const NOT_APPLICABLE: &str = "N/A";

/// File type string for a project build.
pub fn build_file_type(path: &Path, list: &FileList) -> String {
    match extension(path) {
        Some("svh") | Some("vh") => "Verilog Header".to_string(),
        Some("v") | Some("sv") => "Verilog".to_string(),
        _ => list.standard.to_string(),
    }
}

/// File type string for the IP packager, which uses IP-XACT names.
pub fn ip_file_type(path: &Path, list: &FileList) -> String {
    match extension(path) {
        Some("svh") | Some("vh") | Some("v") | Some("sv") => {
            "verilogSource".to_string()
        }
        _ => match list.standard {
            VhdlStandard::Vhdl93 => "vhdlSource".to_string(),
            VhdlStandard::Vhdl2008 => "vhdlSource-2008".to_string(),
        },
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn slashed(path: PathBuf) -> Result<String> {
    let display = path.display().to_string();
    path.to_slash()
        .ok_or_else(|| anyhow!("path {display} is not valid UTF-8"))
}

/// Collects entries for every non-testbench source in `manifests`.
///
/// Design file paths are made relative to `relative_to` when given. When
/// `for_ip` is set, file types use IP packager names and constraints and IP
/// are left out, since the packager handles those itself.
pub fn entries(
    manifests: &[Manifest],
    relative_to: Option<&Path>,
    for_ip: bool,
) -> Result<Vec<Entry>> {
    let mut out = vec![];
    for manifest in manifests {
        for list in &manifest.file_lists {
            if list.kind == FileKind::Tb {
                continue;
            }
            let library = list.lib_name(&manifest.name);
            let dir = manifest.source_dir(list.kind);
            for file in &list.files {
                let mut path = resolve(&dir.join(file));
                if let Some(base) = relative_to {
                    path = pathdiff::diff_paths(&path, base).ok_or_else(|| {
                        anyhow!(
                            "cannot express {} relative to {}",
                            path.display(),
                            base.display()
                        )
                    })?;
                }
                let file_type = if for_ip {
                    ip_file_type(&path, list)
                } else {
                    build_file_type(&path, list)
                };
                out.push(Entry {
                    path: slashed(path)?,
                    library: library.clone(),
                    file_type,
                });
            }
        }
        if for_ip {
            continue;
        }
        for constraint in manifest.constraint_files() {
            out.push(Entry {
                path: slashed(resolve(&constraint))?,
                library: NOT_APPLICABLE.to_string(),
                file_type: "xdc".to_string(),
            });
        }
        for ip in manifest.ip_files() {
            out.push(Entry {
                path: slashed(resolve(&ip))?,
                library: NOT_APPLICABLE.to_string(),
                file_type: NOT_APPLICABLE.to_string(),
            });
        }
    }
    Ok(out)
}

/// Renders entries as a Tcl list assigned to `all_sources`.
pub fn render(entries: &[Entry]) -> String {
    let mut s = "set all_sources [list \\\n".to_string();
    for e in entries {
        s.push_str(&format!(
            "\t{{{}}} {{{}}} {{{}}} \\\n",
            e.path, e.library, e.file_type
        ));
    }
    s.push_str("]\n");
    s
}

pub fn run(
    env: &BuildEnv,
    proj_dir: &Path,
    relative_to: Option<&Path>,
    for_ip: bool,
) -> Result<PathBuf> {
    let manifests = build_manifest::read_manifests(&env.base_dir, false)?;
    let relative_to = relative_to.map(resolve);
    let entries = entries(&manifests, relative_to.as_deref(), for_ip)?;

    std::fs::create_dir_all(proj_dir)
        .with_context(|| format!("could not create {}", proj_dir.display()))?;
    let out = resolve(proj_dir).join(FILELIST);
    std::fs::write(&out, render(&entries))
        .with_context(|| format!("could not write {}", out.display()))?;
    info!("wrote {} sources to {}", entries.len(), out.display());
    Ok(out)
}
