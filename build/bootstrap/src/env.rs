// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::path::{resolve_dir, resolve_self_dir, translate_path};
use crate::platform::HostPlatform;

/// Optional extra configuration handed to the style checker.
pub const ADDITIONAL_CONFIG_VAR: &str = "VSG_ADDITIONAL_CONFIG";

/// The slice of the parent's environment that the bootstrap builds on.
/// Captured once, so everything downstream is a function of explicit inputs.
#[derive(Clone, Debug, Default)]
pub struct InheritedEnv {
    pub path: Option<OsString>,
    pub pythonpath: Option<OsString>,
    pub vsg_additional_config: Option<String>,
}

impl InheritedEnv {
    pub fn from_process() -> Self {
        Self {
            path: env::var_os("PATH"),
            pythonpath: env::var_os("PYTHONPATH"),
            vsg_additional_config: env::var(ADDITIONAL_CONFIG_VAR).ok(),
        }
    }
}

/// `BuildEnv` is the context every tool invocation runs in: where the
/// project lives, what host we're on, and the environment that child
/// processes should see.
///
/// It is built once at start-up and handed to whatever needs to spawn a
/// process. Nothing here touches our own process environment; children get
/// the exported variables through [`BuildEnv::apply`].
#[derive(Clone, Debug)]
pub struct BuildEnv {
    /// Absolute, symlink-free project directory, in native form.
    pub base_dir: PathBuf,

    /// Host platform, detected once.
    pub platform: HostPlatform,

    /// Python interpreter for helper scripts, chosen from `platform`.
    pub interpreter: &'static str,

    /// Value of `VSG_ADDITIONAL_CONFIG`, or empty if it was unset.
    pub vsg_additional_config: String,

    /// `PATH` for children: `<base>/bin`, the inherited `PATH`, then
    /// `<base>/runnable`.
    pub path: OsString,

    /// `PYTHONPATH` for children: `<base>` followed by the inherited value.
    pub pythonpath: OsString,
}

impl BuildEnv {
    /// Builds the context for this process. `base_dir` overrides the usual
    /// answer; see [`default_base_dir`] for that.
    pub fn detect(base_dir: Option<&Path>) -> Result<Self> {
        let cwd =
            env::current_dir().context("could not get current directory")?;
        let base_dir = match base_dir {
            Some(dir) => resolve_dir(dir, &cwd)?,
            None => {
                let exe = env::current_exe()
                    .context("could not locate the running executable")?;
                let manifest_dir =
                    env::var_os(MANIFEST_DIR_VAR).map(PathBuf::from);
                default_base_dir(&exe, &cwd, manifest_dir.as_deref())?
            }
        };
        Ok(Self::new(
            base_dir,
            HostPlatform::detect(),
            &InheritedEnv::from_process(),
        ))
    }

    pub fn new(
        base_dir: PathBuf,
        platform: HostPlatform,
        inherited: &InheritedEnv,
    ) -> Self {
        if let HostPlatform::Unknown(raw) = &platform {
            warn!("unrecognized platform {raw:?}, carrying on as non-Linux");
        }
        let base_dir = translate_path(&base_dir, &platform);
        debug!("base directory is {}", base_dir.display());

        let path = join_search_path(
            Some(&base_dir.join("bin")),
            inherited.path.as_deref(),
            Some(&base_dir.join("runnable")),
        );
        let pythonpath = join_search_path(
            Some(&base_dir),
            inherited.pythonpath.as_deref(),
            None,
        );

        Self {
            interpreter: platform.interpreter(),
            vsg_additional_config: inherited
                .vsg_additional_config
                .clone()
                .unwrap_or_default(),
            base_dir,
            platform,
            path,
            pythonpath,
        }
    }

    /// Variables exported to children, in the order a shell would set them.
    pub fn exports(&self) -> Vec<(&'static str, OsString)> {
        vec![
            ("DIR", self.base_dir.clone().into_os_string()),
            ("BASE_DIR", self.base_dir.clone().into_os_string()),
            ("PYTHONPATH", self.pythonpath.clone()),
            ("PATH", self.path.clone()),
        ]
    }

    pub fn apply(&self, cmd: &mut Command) {
        for (k, v) in self.exports() {
            cmd.env(k, v);
        }
    }

    /// Returns a `Command` for `program` that runs with our exports.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        let mut cmd = Command::new(program);
        self.apply(&mut cmd);
        cmd
    }

    /// Returns a `Command` for the selected Python interpreter.
    pub fn python(&self) -> Command {
        self.command(self.interpreter)
    }
}

/// Set by `cargo run` to the directory of the package being run.
const MANIFEST_DIR_VAR: &str = "CARGO_MANIFEST_DIR";

/// Where the project lives when nobody says otherwise.
///
/// Under `cargo xtask` the executable sits in `target/debug`, so when
/// `manifest_dir` (the package directory, `<root>/build/xtask`) is known the
/// workspace root two levels up wins. Otherwise it's the directory holding
/// `exe`.
pub fn default_base_dir(
    exe: &Path,
    cwd: &Path,
    manifest_dir: Option<&Path>,
) -> Result<PathBuf> {
    let Some(manifest_dir) = manifest_dir else {
        return resolve_self_dir(exe, cwd);
    };
    let mut root = dunce::canonicalize(cwd.join(manifest_dir))
        .with_context(|| {
            format!("could not resolve {}", manifest_dir.display())
        })?;
    root.pop();
    root.pop();
    Ok(root)
}

/// Search path separator, as a shell would write it.
const SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Joins `first`, the inherited value and `last` as text, leaving the
/// inherited value exactly as it was (empty entries included).
fn join_search_path(
    first: Option<&Path>,
    middle: Option<&OsStr>,
    last: Option<&Path>,
) -> OsString {
    let mut out = OsString::new();
    let parts = first
        .map(Path::as_os_str)
        .into_iter()
        .chain(middle)
        .chain(last.map(Path::as_os_str));
    for (i, part) in parts.enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inherited(path: &str) -> InheritedEnv {
        InheritedEnv {
            path: Some(OsString::from(path)),
            pythonpath: None,
            vsg_additional_config: None,
        }
    }

    fn split(s: &OsStr) -> Vec<PathBuf> {
        env::split_paths(s).collect()
    }

    #[cfg(unix)]
    #[test]
    fn path_wraps_inherited_value() {
        let env = BuildEnv::new(
            PathBuf::from("/proj"),
            HostPlatform::Linux,
            &inherited("/usr/bin:/bin"),
        );
        assert_eq!(
            split(&env.path),
            vec![
                PathBuf::from("/proj/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
                PathBuf::from("/proj/runnable"),
            ]
        );
        assert_eq!(env.pythonpath, OsString::from("/proj"));
        assert_eq!(env.interpreter, "python3");
        assert_eq!(env.vsg_additional_config, "");
    }

    #[cfg(unix)]
    #[test]
    fn pythonpath_is_prepended() {
        let mut inh = inherited("/bin");
        inh.pythonpath = Some(OsString::from("/opt/py"));
        let env =
            BuildEnv::new(PathBuf::from("/proj"), HostPlatform::Mac, &inh);
        assert_eq!(env.pythonpath, OsString::from("/proj:/opt/py"));
        assert_eq!(env.interpreter, "python");
    }

    #[cfg(unix)]
    #[test]
    fn rerunning_accumulates_prefixes() {
        let first = BuildEnv::new(
            PathBuf::from("/proj"),
            HostPlatform::Linux,
            &inherited("/bin"),
        );
        let second = BuildEnv::new(
            PathBuf::from("/proj"),
            HostPlatform::Linux,
            &InheritedEnv {
                path: Some(first.path.clone()),
                pythonpath: Some(first.pythonpath.clone()),
                vsg_additional_config: None,
            },
        );
        assert_eq!(first.base_dir, second.base_dir);
        assert_eq!(
            second.path,
            OsString::from(
                "/proj/bin:/proj/bin:/bin:/proj/runnable:/proj/runnable"
            )
        );
        assert_eq!(second.pythonpath, OsString::from("/proj:/proj"));
    }

    #[test]
    fn missing_path_still_has_project_dirs() {
        let env = BuildEnv::new(
            PathBuf::from("proj"),
            HostPlatform::Unknown("Plan9".to_string()),
            &InheritedEnv::default(),
        );
        assert_eq!(
            split(&env.path),
            vec![PathBuf::from("proj/bin"), PathBuf::from("proj/runnable")]
        );
        assert_eq!(env.interpreter, "python");
    }

    #[cfg(unix)]
    #[test]
    fn base_dir_may_contain_separator() {
        let env = BuildEnv::new(
            PathBuf::from("/work/a:b"),
            HostPlatform::Linux,
            &inherited("/bin"),
        );
        assert_eq!(
            env.path,
            OsString::from("/work/a:b/bin:/bin:/work/a:b/runnable")
        );
        assert_eq!(env.pythonpath, OsString::from("/work/a:b"));
    }

    #[cfg(unix)]
    #[test]
    fn inherited_path_is_kept_as_is() {
        let env = BuildEnv::new(
            PathBuf::from("/proj"),
            HostPlatform::Linux,
            &inherited(":/bin::"),
        );
        assert_eq!(
            env.path,
            OsString::from("/proj/bin::/bin:::/proj/runnable")
        );

        let env = BuildEnv::new(
            PathBuf::from("/proj"),
            HostPlatform::Linux,
            &inherited(""),
        );
        assert_eq!(env.path, OsString::from("/proj/bin::/proj/runnable"));
    }

    #[test]
    fn cargo_run_uses_workspace_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        let target = root.join("target").join("debug");
        let package = root.join("build").join("xtask");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::create_dir_all(&package).unwrap();
        let exe = target.join("xtask");
        std::fs::write(&exe, "").unwrap();

        assert_eq!(default_base_dir(&exe, &root, None).unwrap(), target);
        assert_eq!(
            default_base_dir(&exe, &target, Some(&package)).unwrap(),
            root
        );
        assert_eq!(
            default_base_dir(
                Path::new("target/debug/xtask"),
                &root,
                Some(Path::new("build/xtask"))
            )
            .unwrap(),
            root
        );
        assert!(default_base_dir(&exe, &root, Some(&root.join("gone")))
            .is_err());
    }

    #[test]
    fn additional_config_is_kept_verbatim() {
        let mut inh = InheritedEnv::default();
        inh.vsg_additional_config = Some("--strict".to_string());
        let env =
            BuildEnv::new(PathBuf::from("proj"), HostPlatform::Linux, &inh);
        assert_eq!(env.vsg_additional_config, "--strict");
    }

    #[test]
    fn commands_carry_exports() {
        let env = BuildEnv::new(
            PathBuf::from("proj"),
            HostPlatform::Linux,
            &InheritedEnv::default(),
        );
        let cmd = env.python();
        assert_eq!(cmd.get_program(), "python3");
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(
            OsStr::new("BASE_DIR"),
            Some(OsStr::new("proj"))
        )));
        assert!(envs.iter().any(|(k, _)| *k == "PATH"));
    }
}
