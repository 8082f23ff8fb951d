// src/grep/scan.rs

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

/// One reference found in a scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepRecord {
    /// Resolved through a system search path.
    pub system: bool,
    /// 1-based.
    pub line: usize,
    /// 1-based, in bytes.
    pub col: usize,
    pub name: String,
}

/// Side file of `target` under `state_dir`: `grep/<2 hex>/<62 hex>` of the
/// blake3 hash of the target path.
pub fn side_file_path(state_dir: &Path, target: &Path) -> PathBuf {
    let hash = blake3::hash(target.to_string_lossy().as_bytes())
        .to_hex()
        .to_string();
    let (shard, rest) = hash.split_at(2);
    state_dir.join("grep").join(shard).join(rest)
}

/// Scan `path` against `regexes`.
///
/// The first capture group of a match is the referenced name; without
/// groups the whole match is. `system` is left `false`, the caller decides
/// it when resolving the name.
pub fn scan_file(path: &Path, regexes: &[Regex]) -> Result<Vec<GrepRecord>> {
    let file = File::open(path).with_context(|| format!("opening {:?} for scanning", path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (n, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        for re in regexes {
            for caps in re.captures_iter(&line) {
                let found = caps.get(1).or_else(|| caps.get(0));
                if let Some(m) = found {
                    if m.as_str().is_empty() {
                        continue;
                    }
                    records.push(GrepRecord {
                        system: false,
                        line: n + 1,
                        col: m.start() + 1,
                        name: m.as_str().to_string(),
                    });
                }
            }
        }
    }
    Ok(records)
}

/// Read a side file; lines are `sys line col name`.
pub fn read_side_file(path: &Path) -> Result<Vec<GrepRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading side file {:?}", path))?;
    let mut records = Vec::new();
    for line in text.lines() {
        let mut fields = line.splitn(4, ' ');
        let (Some(sys), Some(l), Some(c), Some(name)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let (Ok(l), Ok(c)) = (l.parse(), c.parse()) else {
            continue;
        };
        records.push(GrepRecord {
            system: sys == "1",
            line: l,
            col: c,
            name: name.to_string(),
        });
    }
    Ok(records)
}

pub fn write_side_file(path: &Path, records: &[GrepRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating side file directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("creating side file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    for r in records {
        writeln!(writer, "{} {} {} {}", u8::from(r.system), r.line, r.col, r.name)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_reports_capture_positions() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.c");
        fs::write(
            &src,
            "#include \"util.h\"\nint x;\n  #include <stdio.h>\n",
        )
        .unwrap();

        let re = Regex::new(r#"#include\s*["<]([^">]+)[">]"#).unwrap();
        let records = scan_file(&src, &[re]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "util.h");
        assert_eq!((records[0].line, records[0].col), (1, 11));
        assert_eq!(records[1].name, "stdio.h");
        assert_eq!(records[1].line, 3);
    }

    #[test]
    fn side_file_is_sharded_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let side = side_file_path(dir.path(), Path::new("/src/main.o"));
        let shard = side.parent().unwrap();
        assert_eq!(shard.file_name().unwrap().len(), 2);
        assert_eq!(side.file_name().unwrap().len(), 62);

        let records = vec![
            GrepRecord { system: true, line: 3, col: 1, name: "stdio.h".into() },
            GrepRecord { system: false, line: 1, col: 11, name: "my util.h".into() },
        ];
        write_side_file(&side, &records).unwrap();
        assert_eq!(read_side_file(&side).unwrap(), records);
    }
}
