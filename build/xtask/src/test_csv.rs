// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use indexmap::{IndexMap, IndexSet};
use log::info;

/// Where VUnit leaves its results, relative to the base directory.
pub fn output_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("scratch").join("vunit_out")
}

/// One line of `test_status.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestResult {
    pub status: String,
    /// Test name with the configuration portion removed
    pub test: String,
    /// Generics of a configured test, in the order they were written
    pub config: IndexMap<String, String>,
    pub full_test: String,
}

/// Splits a VUnit test name on periods, except those followed by a digit
/// (which belong to a generic value such as `rate=0.5`).
pub fn split_test_name(name: &str) -> Vec<&str> {
    let mut portions = vec![];
    let mut start = 0;
    let mut chars = name.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '.' {
            continue;
        }
        match chars.peek() {
            Some((_, next)) if !next.is_ascii_digit() => {
                portions.push(&name[start..i]);
                start = i + 1;
            }
            _ => (),
        }
    }
    portions.push(&name[start..]);
    portions
}

pub fn parse_line(line: &str) -> Result<TestResult> {
    let (status, full_test) = line
        .split_once(':')
        .ok_or_else(|| anyhow!("expected `status : test`, got {line:?}"))?;
    let status = status.trim().to_string();
    let full_test = full_test.trim().to_string();

    let portions = split_test_name(&full_test);
    let mut config = IndexMap::new();
    let test = if portions.len() > 3 {
        let n = portions.len();
        for pair in portions[n - 2].split(',') {
            let (k, v) = pair.split_once('=').ok_or_else(|| {
                anyhow!("bad configuration {pair:?} in {line:?}")
            })?;
            config.insert(k.to_string(), v.to_string());
        }
        format!("{}.{}", portions[..n - 2].join("."), portions[n - 1])
    } else {
        full_test.clone()
    };

    Ok(TestResult {
        status,
        test,
        config,
        full_test,
    })
}

pub fn parse(text: &str) -> Result<Vec<TestResult>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Renders results as CSV. Every configuration key seen in any row gets a
/// column, between `test` and `full_test`.
pub fn render(results: &[TestResult]) -> String {
    let keys: IndexSet<&str> = results
        .iter()
        .flat_map(|r| r.config.keys().map(String::as_str))
        .collect();

    let mut header = vec!["status", "test"];
    header.extend(keys.iter().copied());
    header.push("full_test");

    let mut out = String::new();
    let mut push_row = |fields: Vec<&str>| {
        let row: Vec<_> = fields.into_iter().map(csv_field).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    };
    push_row(header);
    for r in results {
        let mut row = vec![r.status.as_str(), r.test.as_str()];
        row.extend(
            keys.iter()
                .map(|k| r.config.get(*k).map(String::as_str).unwrap_or("")),
        );
        row.push(&r.full_test);
        push_row(row);
    }
    out
}

/// Asks whether to replace `path`. Anything but `y` or `yes` is a no.
pub fn confirm_overwrite(
    path: &Path,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<bool> {
    write!(output, "{} already exists.  Overwrite? (y/n) ", path.display())?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Converts `test_status.txt` into `test_status.csv`. Returns `None` if
/// the user declined to overwrite an existing file.
pub fn run(base_dir: &Path, force: bool) -> Result<Option<PathBuf>> {
    let dir = output_dir(base_dir);
    let txt = dir.join("test_status.txt");
    let csv = dir.join("test_status.csv");

    if csv.exists() && !force {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        if !confirm_overwrite(&csv, &mut stdin.lock(), &mut stdout)? {
            return Ok(None);
        }
    }

    let text = std::fs::read_to_string(&txt)
        .with_context(|| format!("could not read {}", txt.display()))?;
    let results = parse(&text)
        .with_context(|| format!("could not parse {}", txt.display()))?;
    if results.is_empty() {
        bail!("no test results in {}", txt.display());
    }
    info!("read {} tests from {}", results.len(), txt.display());

    std::fs::write(&csv, render(&results))
        .with_context(|| format!("could not write {}", csv.display()))?;
    Ok(Some(csv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn periods_before_digits_stay() {
        assert_eq!(
            split_test_name("lib.tb_fir.rate=0.5,taps=8.passes"),
            ["lib", "tb_fir", "rate=0.5,taps=8", "passes"]
        );
        assert_eq!(split_test_name("lib.tb.v1.2"), ["lib", "tb", "v1.2"]);
        assert_eq!(split_test_name("plain"), ["plain"]);
    }

    #[test]
    fn configured_tests_get_columns() {
        let r = parse_line("passed : lib.tb_fir.rate=0.5,taps=8.passes")
            .unwrap();
        assert_eq!(r.status, "passed");
        assert_eq!(r.test, "lib.tb_fir.passes");
        assert_eq!(r.full_test, "lib.tb_fir.rate=0.5,taps=8.passes");
        assert_eq!(
            r.config.into_iter().collect::<Vec<_>>(),
            [
                ("rate".to_string(), "0.5".to_string()),
                ("taps".to_string(), "8".to_string())
            ]
        );

        let r = parse_line("failed: lib.tb_uart.loopback").unwrap();
        assert_eq!(r.test, "lib.tb_uart.loopback");
        assert!(r.config.is_empty());
    }

    #[test]
    fn bad_lines() {
        assert!(parse_line("no separator").is_err());
        let err = parse_line("passed : lib.tb.oops.test").unwrap_err();
        assert!(err.to_string().contains("oops"), "{err}");
    }

    #[test]
    fn csv_output() {
        let results = parse(indoc! {"
            passed : lib.tb_fir.rate=0.5,taps=8.passes

            failed : lib.tb_uart.loopback
            skipped : lib.tb_fir.mode=fast.passes
        "})
        .unwrap();
        assert_eq!(
            render(&results),
            "status,test,rate,taps,mode,full_test\r\n\
             passed,lib.tb_fir.passes,0.5,8,,\
             \"lib.tb_fir.rate=0.5,taps=8.passes\"\r\n\
             failed,lib.tb_uart.loopback,,,,lib.tb_uart.loopback\r\n\
             skipped,lib.tb_fir.passes,,,fast,lib.tb_fir.mode=fast.passes\r\n"
        );
    }

    #[test]
    fn overwrite_prompt() {
        let path = Path::new("out.csv");
        for (answer, expected) in
            [("y\n", true), ("YES\n", true), ("n\n", false), ("", false)]
        {
            let mut out = vec![];
            let ok =
                confirm_overwrite(path, &mut answer.as_bytes(), &mut out)
                    .unwrap();
            assert_eq!(ok, expected, "{answer:?}");
            assert!(String::from_utf8(out).unwrap().contains("out.csv"));
        }
    }

    #[test]
    fn run_writes_csv_and_respects_force() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = output_dir(tmp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("test_status.txt"), "passed : a.b.c\n")
            .unwrap();

        let csv = run(tmp.path(), true).unwrap().unwrap();
        assert_eq!(
            std::fs::read_to_string(&csv).unwrap(),
            "status,test,full_test\r\npassed,a.b.c,a.b.c\r\n"
        );

        std::fs::write(dir.join("test_status.txt"), "\n").unwrap();
        assert!(run(tmp.path(), true).is_err());
    }
}
