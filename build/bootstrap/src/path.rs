// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use log::warn;

use crate::platform::HostPlatform;

/// Finds the absolute directory that contains `invocation`, with symlinks
/// resolved. A relative `invocation` is taken relative to `cwd`, so the answer
/// depends only on where the file really lives.
pub fn resolve_self_dir(invocation: &Path, cwd: &Path) -> Result<PathBuf> {
    let full = cwd.join(invocation);

    // std::fs::canonicalize gives UNC paths on Windows, which most of the
    // tools we launch can't cope with.
    let resolved = dunce::canonicalize(&full)
        .with_context(|| format!("could not resolve {}", full.display()))?;
    let dir = resolved.parent().ok_or_else(|| {
        anyhow!("{} has no parent directory", resolved.display())
    })?;
    Ok(dir.to_path_buf())
}

/// Like [`resolve_self_dir`], but for a path that names the directory itself.
pub fn resolve_dir(dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let full = cwd.join(dir);
    let resolved = dunce::canonicalize(&full)
        .with_context(|| format!("could not resolve {}", full.display()))?;
    if !resolved.is_dir() {
        bail!("{} is not a directory", resolved.display());
    }
    Ok(resolved)
}

/// Converts a POSIX-style path into the native Windows form when running
/// under Cygwin or MinGW. On every other platform the path is returned as-is.
pub fn translate_path(path: &Path, platform: &HostPlatform) -> PathBuf {
    if !platform.is_posix_emulation() {
        return path.to_path_buf();
    }
    // Already native (e.g. `C:\foo`), nothing to do.
    if !path.to_string_lossy().starts_with('/') {
        return path.to_path_buf();
    }
    if let Some(p) = drive_path(path, platform) {
        return p;
    }
    match cygpath(path) {
        Ok(p) => p,
        Err(e) => {
            warn!("keeping {} untranslated: {e:#}", path.display());
            path.to_path_buf()
        }
    }
}

/// Handles the common case of a path under a drive mount point without
/// having to shell out.
fn drive_path(path: &Path, platform: &HostPlatform) -> Option<PathBuf> {
    let s = path.to_str()?;
    let rest = match platform {
        HostPlatform::Cygwin => s.strip_prefix("/cygdrive/")?,
        HostPlatform::MinGw => s.strip_prefix('/')?,
        _ => return None,
    };
    let (drive, tail) = rest.split_once('/').unwrap_or((rest, ""));
    let mut chars = drive.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
        _ => return None,
    };
    let tail = tail.trim_end_matches('/').replace('/', "\\");
    Some(PathBuf::from(format!("{letter}:\\{tail}")))
}

fn cygpath(path: &Path) -> Result<PathBuf> {
    let mut cmd = Command::new("cygpath");
    cmd.arg("-w").arg(path);
    let out = cmd
        .output()
        .with_context(|| format!("failed to run cygpath ({cmd:?})"))?;
    if !out.status.success() {
        bail!("cygpath failed for {}", path.display());
    }
    let native = std::str::from_utf8(&out.stdout)?.trim();
    if native.is_empty() {
        bail!("cygpath returned nothing for {}", path.display());
    }
    Ok(PathBuf::from(native))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolution_ignores_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        let tools = root.join("tools");
        let elsewhere = root.join("a").join("b");
        fs::create_dir_all(&tools).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        fs::write(tools.join("setup"), "").unwrap();

        let absolute = tools.join("setup");
        for cwd in [&root, &tools, &elsewhere] {
            assert_eq!(resolve_self_dir(&absolute, cwd).unwrap(), tools);
        }
        assert_eq!(
            resolve_self_dir(Path::new("tools/setup"), &root).unwrap(),
            tools
        );
        assert_eq!(
            resolve_self_dir(Path::new("../../tools/setup"), &elsewhere)
                .unwrap(),
            tools
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolution_follows_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        let tools = root.join("tools");
        let bin = root.join("bin");
        fs::create_dir_all(&tools).unwrap();
        fs::create_dir_all(&bin).unwrap();
        fs::write(tools.join("setup"), "").unwrap();
        std::os::unix::fs::symlink(tools.join("setup"), bin.join("setup"))
            .unwrap();

        assert_eq!(resolve_self_dir(&bin.join("setup"), &root).unwrap(), tools);
    }

    #[test]
    fn missing_invocation_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(resolve_self_dir(Path::new("nope"), tmp.path()).is_err());
    }

    #[test]
    fn resolve_dir_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f"), "").unwrap();
        assert!(resolve_dir(Path::new("f"), tmp.path()).is_err());
        assert!(resolve_dir(Path::new("."), tmp.path()).is_ok());
    }

    #[test]
    fn translate_drive_paths() {
        assert_eq!(
            translate_path(
                Path::new("/cygdrive/c/work/fpga"),
                &HostPlatform::Cygwin
            ),
            PathBuf::from("C:\\work\\fpga")
        );
        assert_eq!(
            translate_path(Path::new("/d/proj/blk/"), &HostPlatform::MinGw),
            PathBuf::from("D:\\proj\\blk")
        );
        assert_eq!(
            translate_path(Path::new("/e"), &HostPlatform::MinGw),
            PathBuf::from("E:\\")
        );
    }

    #[test]
    fn translate_is_identity_elsewhere() {
        for p in [HostPlatform::Linux, HostPlatform::Mac, HostPlatform::Windows]
        {
            assert_eq!(
                translate_path(Path::new("/c/work"), &p),
                PathBuf::from("/c/work")
            );
        }
        assert_eq!(
            translate_path(Path::new("C:\\work"), &HostPlatform::Cygwin),
            PathBuf::from("C:\\work")
        );
    }
}
