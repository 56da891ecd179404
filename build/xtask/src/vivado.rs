// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use log::debug;

use build_bootstrap::PlatformFamily;

/// Environment variable naming the install directory of one Vivado
/// version, e.g. `FPGA_BUILDER_VIVADO_2019_1_INSTALL_DIR`.
pub fn install_dir_var(version: &str) -> String {
    format!(
        "FPGA_BUILDER_VIVADO_{}_INSTALL_DIR",
        version.replace('.', "_")
    )
}

/// Everything the search looks at, gathered up front so it can be run
/// against a made-up machine.
#[derive(Clone, Debug)]
pub struct Lookup {
    pub version: String,
    /// The `PATH` to search for `vivado`
    pub path: Option<OsString>,
    /// Value of [`install_dir_var`] for `version`, if set
    pub install_dir: Option<PathBuf>,
    /// Where Xilinx puts versions by default
    pub default_root: PathBuf,
    /// Decides the launcher's name
    pub family: PlatformFamily,
}

impl Lookup {
    pub fn from_env(version: &str, family: PlatformFamily) -> Self {
        let default_root = match family {
            PlatformFamily::Windows => PathBuf::from("C:/Xilinx/Vivado"),
            PlatformFamily::Posix | PlatformFamily::Unknown => {
                PathBuf::from("/tools/Xilinx/Vivado")
            }
        };
        Self {
            version: version.to_string(),
            path: env::var_os("PATH"),
            install_dir: env::var_os(install_dir_var(version))
                .map(PathBuf::from),
            default_root,
            family,
        }
    }

    fn exe_name(&self) -> &'static str {
        match self.family {
            PlatformFamily::Windows => "vivado.bat",
            PlatformFamily::Posix | PlatformFamily::Unknown => "vivado",
        }
    }

    fn exe_in(&self, install_dir: &Path) -> PathBuf {
        install_dir.join("bin").join(self.exe_name())
    }

    /// Looks for the requested version, trying in turn: `vivado` on `PATH`
    /// (if it lives in a directory named after the version), the install
    /// directory variable, then the default install location.
    pub fn find(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            let on_path = env::split_paths(path)
                .map(|dir| dir.join(self.exe_name()))
                .find(|exe| exe.is_file());
            if let Some(exe) = on_path {
                let version = exe
                    .parent()
                    .and_then(Path::parent)
                    .and_then(Path::file_name)
                    .and_then(|v| v.to_str());
                if version == Some(self.version.as_str()) {
                    return Ok(exe);
                }
                debug!("{} is not version {}", exe.display(), self.version);
            }
        }

        let var = install_dir_var(&self.version);
        if let Some(dir) = &self.install_dir {
            if !dir.exists() {
                bail!(
                    "{var} is set to {}, but that does not exist",
                    dir.display()
                );
            }
            return Ok(self.exe_in(dir));
        }

        let exe = self.exe_in(&self.default_root.join(&self.version));
        if exe.exists() {
            return Ok(exe);
        }

        bail!(
            "Vivado {} not found; put it on PATH or set {var}",
            self.version
        )
    }
}
