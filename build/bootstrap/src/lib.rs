// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Start-up plumbing shared by the project tools.
//!
//! Every tool begins by working out where the project lives and what host it
//! is running on, then launches helpers with a consistent environment. This
//! crate does that once and returns the answer as a [`BuildEnv`], which is
//! passed explicitly to anything that spawns a child process.

pub mod env;
pub mod path;
pub mod platform;
pub mod style_check;

pub use env::{default_base_dir, BuildEnv, InheritedEnv, ADDITIONAL_CONFIG_VAR};
pub use path::{resolve_dir, resolve_self_dir, translate_path};
pub use platform::{HostPlatform, PlatformFamily};
