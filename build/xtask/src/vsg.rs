// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use path_slash::PathBufExt;
use serde_yaml::{Mapping, Value};

use build_bootstrap::BuildEnv;
use build_manifest::{resolve, Manifest};

/// Project-wide style configuration, at the base directory.
pub const CONFIG_FILE: &str = "vsg.yaml";

/// Key under which the generated config lists the files to check.
const FILE_LIST_KEY: &str = "file_list";

const EXCLUDE_KEY: &str = "exclude";

/// Where the generated config goes, relative to the base directory.
pub fn output_path(base_dir: &Path) -> PathBuf {
    base_dir.join("scratch").join("vsg").join("files.yaml")
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("could not parse {}", path.display()))?;
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => bail!("{} is not a YAML mapping", path.display()),
    }
}

/// Folds `extra` into `base`. Lists are extended and mappings updated;
/// keys that `base` lacks are added, and any other value already in `base`
/// wins.
pub fn merge_config(base: &mut Mapping, extra: Mapping) {
    for (k, v) in extra {
        let Some(existing) = base.get_mut(&k) else {
            base.insert(k, v);
            continue;
        };
        match (existing, v) {
            (Value::Sequence(seq), Value::Sequence(more)) => {
                seq.extend(more);
            }
            (Value::Mapping(map), Value::Mapping(more)) => {
                for (k, v) in more {
                    map.insert(k, v);
                }
            }
            _ => (),
        }
    }
}

/// Turns the config's `exclude` entries into patterns that match anywhere
/// below the project.
pub fn exclude_patterns(config: &Mapping) -> Result<Vec<glob::Pattern>> {
    let Some(exclude) = config.get(EXCLUDE_KEY) else {
        return Ok(vec![]);
    };
    let Value::Sequence(items) = exclude else {
        bail!("`{EXCLUDE_KEY}` must be a list of patterns");
    };
    items
        .iter()
        .map(|item| {
            let s = item.as_str().ok_or_else(|| {
                anyhow!("`{EXCLUDE_KEY}` entries must be strings")
            })?;
            glob::Pattern::new(&format!("**/{s}"))
                .with_context(|| format!("bad exclude pattern {s:?}"))
        })
        .collect()
}

fn is_excluded(path: &str, patterns: &[glob::Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

/// Every VHDL source in the local blocks under `base_dir`, minus exclusions,
/// with forward-slash separators.
pub fn collect_files(
    base_dir: &Path,
    patterns: &[glob::Pattern],
) -> Result<Vec<String>> {
    let mut files = vec![];
    for dir in build_manifest::read_blocks(base_dir, true)? {
        let manifest = Manifest::from_dir(&dir)?;
        for file in manifest.all_files() {
            if file.extension().and_then(|e| e.to_str()) != Some("vhd") {
                continue;
            }
            let file = resolve(&file);
            let Some(s) = file.to_slash() else {
                bail!("path {} is not valid UTF-8", file.display());
            };
            if is_excluded(&s, patterns) {
                debug!("excluding {s}");
                continue;
            }
            files.push(s);
        }
    }
    Ok(files)
}

/// Splits the `--vsg-args` string into arguments.
///
/// A string that is one quoted unit (as the style-check helper passes it)
/// loses that layer first. The rest is split like a POSIX shell would:
/// whitespace separates words, single quotes are literal, and double quotes
/// and backslashes escape. Expansions (`$x`, globs) are not performed.
pub fn split_args(args: &str) -> Result<Vec<String>> {
    let trimmed = args.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            let inner = trimmed.strip_prefix(*q)?.strip_suffix(*q)?;
            (!inner.contains(*q)).then_some(inner)
        })
        .unwrap_or(trimmed);
    split_words(unquoted)
}

fn split_words(s: &str) -> Result<Vec<String>> {
    let mut words = vec![];
    let mut word: Option<String> = None;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => words.extend(word.take()),
            '\'' => {
                let w = word.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => w.push(c),
                        None => bail!("unterminated ' in {s:?}"),
                    }
                }
            }
            '"' => {
                let w = word.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => w.push(c),
                            Some(c) => {
                                w.push('\\');
                                w.push(c);
                            }
                            None => bail!("unterminated \" in {s:?}"),
                        },
                        Some(c) => w.push(c),
                        None => bail!("unterminated \" in {s:?}"),
                    }
                }
            }
            '\\' => {
                let w = word.get_or_insert_with(String::new);
                match chars.next() {
                    Some(c) => w.push(c),
                    None => bail!("trailing backslash in {s:?}"),
                }
            }
            c => word.get_or_insert_with(String::new).push(c),
        }
    }
    words.extend(word);
    Ok(words)
}

/// Writes `scratch/vsg/files.yaml` and returns its path.
pub fn prepare(env: &BuildEnv, additional: Option<&Path>) -> Result<PathBuf> {
    let mut config = read_mapping(&env.base_dir.join(CONFIG_FILE))?;
    if let Some(extra) = additional {
        info!("merging style configuration from {}", extra.display());
        merge_config(&mut config, read_mapping(extra)?);
    }

    let patterns = exclude_patterns(&config)?;
    let files = collect_files(&env.base_dir, &patterns)?;
    config.insert(
        Value::from(FILE_LIST_KEY),
        Value::Sequence(files.into_iter().map(Value::from).collect()),
    );

    let out = output_path(&env.base_dir);
    if let Some(dir) = out.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
    }
    let text = serde_yaml::to_string(&config)?;
    std::fs::write(&out, text)
        .with_context(|| format!("could not write {}", out.display()))?;
    Ok(out)
}

pub fn run(
    env: &BuildEnv,
    additional: Option<&Path>,
    execute: bool,
    vsg_args: &str,
) -> Result<Option<ExitStatus>> {
    let config = prepare(env, additional)?;
    info!("wrote {}", config.display());
    if !execute {
        return Ok(None);
    }

    let mut cmd = env.command("vsg");
    cmd.arg("-c").arg(&config).args(split_args(vsg_args)?);
    info!("running {cmd:?}");
    let status = cmd
        .status()
        .with_context(|| format!("failed to run vsg ({cmd:?})"))?;
    Ok(Some(status))
}
