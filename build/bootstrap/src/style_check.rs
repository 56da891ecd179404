// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use log::info;

use crate::env::BuildEnv;

/// Helper script, relative to the project directory, that sets up and runs
/// the style checker.
pub const HELPER_SCRIPT: &str = "vsg_util.py";

/// Builds the helper invocation:
///
/// ```text
/// <interpreter> <base>/vsg_util.py <extra config> --run --vsg-args "<args>"
/// ```
///
/// The additional configuration is always passed, even when empty, so the
/// helper sees the same number of positional arguments either way.
pub fn command(env: &BuildEnv, args: &[String]) -> Command {
    let mut cmd = env.python();
    cmd.arg(env.base_dir.join(HELPER_SCRIPT))
        .arg(&env.vsg_additional_config)
        .arg("--run")
        .arg("--vsg-args")
        .arg(args.join(" "));
    cmd
}

/// Runs the helper and waits for it. The exit status is handed back
/// untouched; deciding what to do with it is the caller's business.
pub fn run(env: &BuildEnv, args: &[String]) -> Result<ExitStatus> {
    let mut cmd = command(env, args);
    info!("running {cmd:?}");
    cmd.status()
        .with_context(|| format!("failed to run style check ({cmd:?})"))
}
