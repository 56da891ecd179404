// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block manifests.
//!
//! Each block of HDL lives in a directory with a `manifest.yaml` describing
//! its sources, grouped by kind (design, testbench, ...), along with the
//! blocks it depends on, its constraints and its vendor IP. The project root
//! has a `blocks.yaml` naming the top-level blocks; see [`read_blocks`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod blocks;

pub use blocks::{read_blocks, read_manifests, BlockRef, BLOCKS_FILE};

pub const MANIFEST_FILE: &str = "manifest.yaml";

pub const DEFAULT_MAX_THREADS: usize = 5;

/// A `RawManifest` is `manifest.yaml` as written; [`Manifest`] is what we
/// get after applying defaults and working out per-list standards.
#[derive(Clone, Debug, Deserialize)]
struct RawManifest {
    name: String,
    #[serde(default)]
    folder_structure: Option<FolderStructure>,
    #[serde(default)]
    standard: Option<VhdlStandard>,
    #[serde(default)]
    standards: Option<IndexMap<FileKind, VhdlStandard>>,
    files: IndexMap<FileKind, Option<Vec<PathBuf>>>,
    #[serde(default, deserialize_with = "blocks::deserialize_block_refs")]
    blocks: Vec<BlockRef>,
    #[serde(default)]
    constraints: Option<Vec<PathBuf>>,
    #[serde(default)]
    ips: Option<Vec<String>>,
    #[serde(default)]
    supported_simulators: Option<Vec<Simulator>>,
    #[serde(default)]
    max_threads: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    /// Directory holding the manifest; everything else is relative to it.
    pub root_dir: PathBuf,
    pub name: String,
    pub folder_structure: Option<FolderStructure>,
    pub file_lists: Vec<FileList>,
    pub blocks: Vec<BlockRef>,
    pub constraints: Vec<PathBuf>,
    pub ips: Vec<String>,
    pub supported_simulators: Vec<Simulator>,
    pub max_threads: usize,
}

impl Manifest {
    /// Reads `manifest.yaml` from the block directory `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let file = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("could not read {}", file.display()))?;
        Self::parse(&text, dir)
            .with_context(|| format!("could not parse {}", file.display()))
    }

    pub fn parse(text: &str, root_dir: &Path) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(text)?;

        let default_standard = raw.standard.unwrap_or(VhdlStandard::Vhdl93);
        let standards = raw.standards.unwrap_or_default();
        let file_lists = raw
            .files
            .into_iter()
            .map(|(kind, files)| {
                let standard = match kind {
                    // Testbenches always get 2008
                    FileKind::Tb => VhdlStandard::Vhdl2008,
                    _ => standards
                        .get(&kind)
                        .copied()
                        .unwrap_or(default_standard),
                };
                FileList {
                    kind,
                    files: files.unwrap_or_default(),
                    standard,
                }
            })
            .collect();

        Ok(Manifest {
            root_dir: root_dir.to_path_buf(),
            name: raw.name,
            folder_structure: raw.folder_structure,
            file_lists,
            blocks: raw.blocks,
            constraints: raw.constraints.unwrap_or_default(),
            ips: raw.ips.unwrap_or_default(),
            supported_simulators: raw
                .supported_simulators
                .unwrap_or_else(|| Simulator::DEFAULT.to_vec()),
            max_threads: raw.max_threads.unwrap_or(DEFAULT_MAX_THREADS),
        })
    }

    /// Directory holding files of the given kind.
    pub fn source_dir(&self, kind: FileKind) -> PathBuf {
        match self.folder_structure.and_then(|s| s.subdir(kind)) {
            Some(sub) => self.root_dir.join(sub),
            None => self.root_dir.clone(),
        }
    }

    /// Every listed source file, joined onto its kind's directory.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.file_lists
            .iter()
            .flat_map(|list| {
                let dir = self.source_dir(list.kind);
                list.files.iter().map(move |f| dir.join(f))
            })
            .collect()
    }

    pub fn constraint_files(&self) -> Vec<PathBuf> {
        self.constraints
            .iter()
            .map(|c| self.root_dir.join(c))
            .collect()
    }

    /// Vivado IP descriptors, at `ip/<name>/<name>.xci`.
    pub fn ip_files(&self) -> Vec<PathBuf> {
        self.ips
            .iter()
            .map(|ip| {
                self.root_dir
                    .join("ip")
                    .join(ip)
                    .join(format!("{ip}.xci"))
            })
            .collect()
    }

    pub fn preferred_simulator(&self) -> Option<Simulator> {
        Simulator::PREFERENCE
            .iter()
            .copied()
            .find(|s| self.supported_simulators.contains(s))
    }
}

/// A group of files of one kind, all compiled with the same standard into
/// the same library.
#[derive(Clone, Debug, Serialize)]
pub struct FileList {
    pub kind: FileKind,
    pub files: Vec<PathBuf>,
    pub standard: VhdlStandard,
}

impl FileList {
    /// Name of the library these files go into for block `block`.
    pub fn lib_name(&self, block: &str) -> String {
        format!("{block}{}", self.kind.lib_suffix())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Dsn,
    Tb,
    #[serde(rename = "self")]
    SelfLib,
    #[serde(rename = "none")]
    Plain,
}

impl FileKind {
    pub fn lib_suffix(self) -> &'static str {
        match self {
            FileKind::Dsn => "_dsn",
            FileKind::Tb => "_tb",
            FileKind::SelfLib => "_lib",
            FileKind::Plain => "",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VhdlStandard {
    #[serde(rename = "VHDL")]
    Vhdl93,
    #[serde(rename = "VHDL 2008")]
    Vhdl2008,
}

impl fmt::Display for VhdlStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VhdlStandard::Vhdl93 => write!(f, "VHDL"),
            VhdlStandard::Vhdl2008 => write!(f, "VHDL 2008"),
        }
    }
}

/// Known directory layouts for a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStructure {
    /// `src/dsn` and `src/tb` under the block
    SrcDsn,
    /// The manifest sits in a simulation directory below the design
    HdlSim,
}

impl FolderStructure {
    /// Subdirectory (relative to the block) for `kind`, if this layout
    /// names one.
    pub fn subdir(self, kind: FileKind) -> Option<&'static str> {
        match (self, kind) {
            (FolderStructure::SrcDsn, FileKind::Dsn) => Some("src/dsn"),
            (FolderStructure::SrcDsn, FileKind::Tb) => Some("src/tb"),
            (FolderStructure::HdlSim, FileKind::Dsn) => Some(".."),
            (FolderStructure::HdlSim, FileKind::Tb) => Some("."),
            (_, FileKind::SelfLib) | (_, FileKind::Plain) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Simulator {
    Msim,
    MsimFree,
    Ghdl,
    Qsim,
    Xsim,
}

impl Simulator {
    pub const DEFAULT: [Simulator; 2] = [Simulator::Msim, Simulator::MsimFree];

    pub const PREFERENCE: [Simulator; 5] = [
        Simulator::Ghdl,
        Simulator::Qsim,
        Simulator::Msim,
        Simulator::MsimFree,
        Simulator::Xsim,
    ];
}

/// Makes `path` absolute-looking and free of `.`/`..`, following symlinks
/// when the path exists and falling back to a purely lexical cleanup when
/// it doesn't.
pub fn resolve(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| normalize(path))
}

/// Lexically removes `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => (),
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => (),
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
