// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use build_bootstrap::{style_check, BuildEnv};
use build_manifest::{Manifest, Simulator};

mod filelist;
mod test_csv;
mod vhdl_ls;
mod vivado;
mod vsg;

#[derive(Debug, Parser)]
#[clap(
    max_term_width = 80,
    about = "extra tasks to help you build and check FPGA blocks"
)]
struct Xtask {
    /// Project directory to use instead of the one holding this executable
    #[clap(long, global = true)]
    base_dir: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Prints the environment tools are run with, as shell `export` lines
    Env,

    /// Runs the VHDL style checker through the project's helper script,
    /// forwarding any arguments after `--`
    StyleCheck {
        #[clap(last = true)]
        args: Vec<String>,
    },

    /// Writes the style checker configuration for every local block, and
    /// optionally runs it
    Vsg {
        /// Extra YAML configuration merged over `vsg.yaml`; defaults to
        /// `VSG_ADDITIONAL_CONFIG` when that is set
        additional_config: Option<PathBuf>,

        /// Run `vsg` after writing the configuration
        #[clap(long)]
        run: bool,

        /// Arguments for `vsg`, as a single string split like a shell
        /// would (quotes group words, no expansion)
        #[clap(long, default_value = "", allow_hyphen_values = true)]
        vsg_args: String,
    },

    /// Writes `vhdl_ls.toml` for the VHDL language server
    VhdlLs {
        /// Project directories; the config lands in the first one
        dirs: Vec<PathBuf>,
    },

    /// Writes `filelist.tcl` for a Vivado project
    Filelist {
        /// Project directory to write into
        proj_dir: PathBuf,

        /// Make design file paths relative to this directory
        #[clap(long)]
        relative_to: Option<PathBuf>,

        /// Use IP packager file types, and leave out constraints and IP
        #[clap(long)]
        for_ip: bool,
    },

    /// Prints a block's parsed manifest as JSON
    Manifest {
        /// Block directory (default: the base directory)
        dir: Option<PathBuf>,
    },

    /// Converts the latest VUnit test status into a CSV file
    TestCsv {
        /// Overwrite an existing CSV without asking
        #[clap(short, long)]
        force: bool,
    },

    /// Prints the path of the Vivado executable for a version
    Vivado {
        /// Vivado version, e.g. 2019.1
        version: String,
    },
}

/// What `manifest` prints: the manifest itself plus the simulator we'd
/// pick for it.
#[derive(Serialize)]
struct ManifestReport<'a> {
    #[serde(flatten)]
    manifest: &'a Manifest,
    preferred_simulator: Option<Simulator>,
}

fn manifest_json(dir: &Path) -> Result<String> {
    let manifest = Manifest::from_dir(dir)?;
    let report = ManifestReport {
        manifest: &manifest,
        preferred_simulator: manifest.preferred_simulator(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Single-quotes `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn exit_with(status: ExitStatus) -> ! {
    std::process::exit(status.code().unwrap_or(1))
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let xtask = Xtask::parse();
    let env = BuildEnv::detect(xtask.base_dir.as_deref())?;
    log::debug!("running on {}", env.platform);

    match xtask.cmd {
        Cmd::Env => {
            for (name, value) in env.exports() {
                let value = value.to_string_lossy();
                println!("export {name}={}", shell_quote(&value));
            }
        }
        Cmd::StyleCheck { args } => {
            let status = style_check::run(&env, &args)?;
            if !status.success() {
                exit_with(status);
            }
        }
        Cmd::Vsg {
            additional_config,
            run,
            vsg_args,
        } => {
            let additional = additional_config.or_else(|| {
                (!env.vsg_additional_config.is_empty())
                    .then(|| PathBuf::from(&env.vsg_additional_config))
            });
            let status =
                vsg::run(&env, additional.as_deref(), run, &vsg_args)?;
            if let Some(status) = status.filter(|s| !s.success()) {
                exit_with(status);
            }
        }
        Cmd::VhdlLs { dirs } => {
            let out = vhdl_ls::run(&env, &dirs)?;
            println!("{}", out.display());
        }
        Cmd::Filelist {
            proj_dir,
            relative_to,
            for_ip,
        } => {
            let out = filelist::run(
                &env,
                &proj_dir,
                relative_to.as_deref(),
                for_ip,
            )?;
            println!("{}", out.display());
        }
        Cmd::Manifest { dir } => {
            let dir = dir.unwrap_or_else(|| env.base_dir.clone());
            let json = manifest_json(&dir).with_context(|| {
                format!("could not load manifest in {}", dir.display())
            })?;
            println!("{json}");
        }
        Cmd::TestCsv { force } => {
            if let Some(csv) = test_csv::run(&env.base_dir, force)? {
                println!("{}", csv.display());
            }
        }
        Cmd::Vivado { version } => {
            let lookup =
                vivado::Lookup::from_env(&version, env.platform.family());
            let exe = lookup.find()?;
            println!("{}", exe.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/a b/c"), "'/a b/c'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn cli_parses() {
        let x = Xtask::parse_from([
            "xtask",
            "--base-dir",
            "/proj",
            "style-check",
            "--",
            "--fix",
            "-p",
            "2",
        ]);
        assert_eq!(x.base_dir, Some(PathBuf::from("/proj")));
        match x.cmd {
            Cmd::StyleCheck { args } => assert_eq!(args, ["--fix", "-p", "2"]),
            other => panic!("unexpected {other:?}"),
        }

        let x = Xtask::parse_from([
            "xtask",
            "vsg",
            "extra.yaml",
            "--run",
            "--vsg-args",
            "--fix -of syntastic",
        ]);
        match x.cmd {
            Cmd::Vsg {
                additional_config,
                run,
                vsg_args,
            } => {
                assert_eq!(
                    additional_config,
                    Some(PathBuf::from("extra.yaml"))
                );
                assert!(run);
                assert_eq!(vsg_args, "--fix -of syntastic");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn manifest_report() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("manifest.yaml"),
            indoc! {"
                name: uart
                files:
                  dsn: [uart.vhd]
                supported_simulators: [xsim, ghdl]
            "},
        )
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&manifest_json(tmp.path()).unwrap()).unwrap();
        assert_eq!(json["name"], "uart");
        assert_eq!(json["preferred_simulator"], "ghdl");
        assert_eq!(json["max_threads"], 5);
        assert_eq!(json["file_lists"][0]["standard"], "VHDL");
    }
}
