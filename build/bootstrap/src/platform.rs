// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::process::Command;

use log::debug;

/// Interpreter used on Linux hosts, where `python` may still be Python 2.
pub const LINUX_INTERPRETER: &str = "python3";

/// Interpreter used everywhere else.
pub const DEFAULT_INTERPRETER: &str = "python";

/// The host we are running on, classified from the kernel name that
/// `uname -s` reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Mac,
    Cygwin,
    MinGw,
    /// Native Windows, where there is no `uname` at all.
    Windows,
    /// Anything else; the raw kernel name is kept for diagnostics.
    Unknown(String),
}

/// Coarse grouping of [`HostPlatform`], for callers that only care whether
/// paths and executables follow POSIX or Windows conventions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlatformFamily {
    Posix,
    Windows,
    Unknown,
}

impl HostPlatform {
    pub fn from_kernel_name(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("Linux") {
            HostPlatform::Linux
        } else if name.starts_with("Darwin") {
            HostPlatform::Mac
        } else if name.starts_with("CYGWIN") {
            HostPlatform::Cygwin
        } else if name.starts_with("MINGW") {
            HostPlatform::MinGw
        } else if name == "Windows_NT" {
            HostPlatform::Windows
        } else {
            HostPlatform::Unknown(name.to_string())
        }
    }

    /// Asks the host for its kernel name and classifies it.
    pub fn detect() -> Self {
        let name = kernel_name();
        let platform = Self::from_kernel_name(&name);
        debug!("kernel name {name:?} classified as {platform}");
        platform
    }

    pub fn family(&self) -> PlatformFamily {
        match self {
            HostPlatform::Linux | HostPlatform::Mac => PlatformFamily::Posix,
            HostPlatform::Cygwin
            | HostPlatform::MinGw
            | HostPlatform::Windows => PlatformFamily::Windows,
            HostPlatform::Unknown(_) => PlatformFamily::Unknown,
        }
    }

    /// Returns true for POSIX emulation layers running on top of Windows,
    /// whose paths need translating before native tools can use them.
    pub fn is_posix_emulation(&self) -> bool {
        matches!(self, HostPlatform::Cygwin | HostPlatform::MinGw)
    }

    /// Name of the Python interpreter to launch helper scripts with.
    ///
    /// This is a two-way choice: Linux gets one name and every other
    /// classification gets the other.
    pub fn interpreter(&self) -> &'static str {
        match self {
            HostPlatform::Linux => LINUX_INTERPRETER,
            HostPlatform::Mac
            | HostPlatform::Cygwin
            | HostPlatform::MinGw
            | HostPlatform::Windows
            | HostPlatform::Unknown(_) => DEFAULT_INTERPRETER,
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::Linux => write!(f, "Linux"),
            HostPlatform::Mac => write!(f, "Mac"),
            HostPlatform::Cygwin => write!(f, "Cygwin"),
            HostPlatform::MinGw => write!(f, "MinGw"),
            HostPlatform::Windows => write!(f, "Windows"),
            HostPlatform::Unknown(raw) => write!(f, "UNKNOWN:{raw}"),
        }
    }
}

fn kernel_name() -> String {
    match Command::new("uname").arg("-s").output() {
        Ok(out) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }
        _ => {
            // No usable uname, so fall back to what we were compiled for.
            match std::env::consts::OS {
                "linux" => "Linux".to_string(),
                "macos" => "Darwin".to_string(),
                "windows" => "Windows_NT".to_string(),
                other => other.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classify_kernel_names() {
        assert_eq!(
            HostPlatform::from_kernel_name("Linux"),
            HostPlatform::Linux
        );
        assert_eq!(
            HostPlatform::from_kernel_name("Darwin"),
            HostPlatform::Mac
        );
        assert_eq!(
            HostPlatform::from_kernel_name("CYGWIN_NT-10.0-19045"),
            HostPlatform::Cygwin
        );
        assert_eq!(
            HostPlatform::from_kernel_name("MINGW64_NT-10.0-19045\n"),
            HostPlatform::MinGw
        );
        assert_eq!(
            HostPlatform::from_kernel_name("Windows_NT"),
            HostPlatform::Windows
        );
        assert_eq!(
            HostPlatform::from_kernel_name("FreeBSD"),
            HostPlatform::Unknown("FreeBSD".to_string())
        );
    }

    #[test]
    fn unknown_keeps_raw_name() {
        let p = HostPlatform::from_kernel_name("SunOS");
        assert_eq!(p.to_string(), "UNKNOWN:SunOS");
        assert_eq!(p.family(), PlatformFamily::Unknown);
    }

    #[test]
    fn families() {
        assert_eq!(HostPlatform::Linux.family(), PlatformFamily::Posix);
        assert_eq!(HostPlatform::Mac.family(), PlatformFamily::Posix);
        assert_eq!(HostPlatform::Cygwin.family(), PlatformFamily::Windows);
        assert_eq!(HostPlatform::MinGw.family(), PlatformFamily::Windows);
        assert!(HostPlatform::MinGw.is_posix_emulation());
        assert!(!HostPlatform::Windows.is_posix_emulation());
    }

    proptest! {
        #[test]
        fn interpreter_depends_only_on_linux(name in "\\PC*") {
            let platform = HostPlatform::from_kernel_name(&name);
            let expected = if name.trim().starts_with("Linux") {
                LINUX_INTERPRETER
            } else {
                DEFAULT_INTERPRETER
            };
            prop_assert_eq!(platform.interpreter(), expected);
        }

        #[test]
        fn any_linux_release_gets_python3(suffix in "\\PC*") {
            let platform =
                HostPlatform::from_kernel_name(&format!("Linux{suffix}"));
            prop_assert_eq!(platform.interpreter(), LINUX_INTERPRETER);
        }
    }
}
