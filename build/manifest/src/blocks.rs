// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{resolve, Manifest};

pub const BLOCKS_FILE: &str = "blocks.yaml";

/// A reference to a block directory, relative to whoever names it.
///
/// External blocks (vendored libraries, submodules) are part of the build
/// but not ours to lint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockRef {
    pub path: PathBuf,
    pub external: bool,
}

#[derive(Deserialize)]
struct BlockList {
    #[serde(default, deserialize_with = "deserialize_block_refs")]
    blocks: Vec<BlockRef>,
}

/// In the common case a block reference is just a path, but external ones
/// need a flag. This lets `blocks.yaml` (and a manifest's `blocks` list)
/// mix both forms:
/// ```yaml
/// blocks:
///   - uart
///   - path: ../vendor/axi
///     external: true
/// ```
pub(crate) fn deserialize_block_refs<'de, D>(
    deserializer: D,
) -> Result<Vec<BlockRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ArrayItem {
        Path(PathBuf),
        Full {
            path: PathBuf,
            #[serde(default)]
            external: bool,
        },
    }
    let items: Option<Vec<ArrayItem>> =
        Deserialize::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(|a| match a {
            ArrayItem::Path(path) => BlockRef {
                path,
                external: false,
            },
            ArrayItem::Full { path, external } => BlockRef { path, external },
        })
        .collect())
}

/// Returns the directory of every block in the project rooted at `root`,
/// dependencies before the blocks that use them, each exactly once.
///
/// With `local_only`, external blocks (and anything reached only through
/// them) are left out.
pub fn read_blocks(root: &Path, local_only: bool) -> Result<Vec<PathBuf>> {
    Ok(read_manifests(root, local_only)?
        .into_iter()
        .map(|m| m.root_dir)
        .collect())
}

/// Same as [`read_blocks`], but hands back the parsed manifests.
pub fn read_manifests(
    root: &Path,
    local_only: bool,
) -> Result<Vec<Manifest>> {
    let file = root.join(BLOCKS_FILE);
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("could not read {}", file.display()))?;
    let list: BlockList = serde_yaml::from_str(&text)
        .with_context(|| format!("could not parse {}", file.display()))?;

    let mut walk = Walk {
        local_only,
        visiting: IndexSet::new(),
        done: IndexMap::new(),
    };
    for block in &list.blocks {
        walk.visit(root, block, false)?;
    }
    Ok(walk.done.into_values().collect())
}

struct Walk {
    local_only: bool,
    /// Blocks on the current path from the root, to spot cycles
    visiting: IndexSet<PathBuf>,
    done: IndexMap<PathBuf, Manifest>,
}

impl Walk {
    fn visit(
        &mut self,
        parent: &Path,
        block: &BlockRef,
        parent_external: bool,
    ) -> Result<()> {
        let external = parent_external || block.external;
        if external && self.local_only {
            return Ok(());
        }

        let dir = resolve(&parent.join(&block.path));
        if self.done.contains_key(&dir) {
            return Ok(());
        }
        if let Some(i) = self.visiting.get_index_of(&dir) {
            let cycle = self
                .visiting
                .iter()
                .skip(i)
                .chain(std::iter::once(&dir))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            bail!("block dependency cycle: {cycle}");
        }

        self.visiting.insert(dir.clone());
        let manifest = Manifest::from_dir(&dir)?;
        for dep in &manifest.blocks {
            self.visit(&dir, dep, external)?;
        }
        self.visiting.pop();

        self.done.insert(dir, manifest);
        Ok(())
    }
}
