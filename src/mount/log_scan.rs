//! Error extraction from the rclone log after an unexpected exit.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// One error line, with the file rclone was last looking up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogErrorEntry {
    pub line_number: usize,
    pub line: String,
    pub lookup: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogScan {
    pub errors: Vec<LogErrorEntry>,
    /// Line to resume from next time.
    pub next_line: usize,
}

fn is_exit_marker(line: &str) -> bool {
    line.contains("Exiting...") && (line.contains("INFO") || line.contains("\"level\":\"info\""))
}

fn is_error(line: &str) -> bool {
    line.contains("error") || line.contains("ERROR")
}

fn lookup_target(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("LOOKUP /")?;
    let target: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '"')
        .collect();
    Some(target)
}

/// Scan `log_path` from line `from_line`.
///
/// Errors reported before the last "Exiting..." marker belong to an earlier
/// run of the process and are dropped.
pub fn scan_errors(log_path: &Path, from_line: usize) -> io::Result<LogScan> {
    let reader = BufReader::new(File::open(log_path)?);
    let mut scan = LogScan::default();
    let mut lookup: Option<String> = None;
    let mut line_number = 0;

    for line in reader.lines() {
        let line = line?;
        if line_number >= from_line {
            if is_exit_marker(&line) {
                scan.errors.clear();
            } else if is_error(&line) {
                scan.errors.push(LogErrorEntry {
                    line_number,
                    line,
                    lookup: lookup.clone(),
                });
            } else if let Some(target) = lookup_target(&line) {
                lookup = Some(target);
            }
        }
        line_number += 1;
    }

    scan.next_line = line_number.max(from_line);
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
2024/01/01 10:00:00 DEBUG : /: LOOKUP /old.txt
2024/01/01 10:00:01 ERROR : old.txt: stale error
2024/01/01 10:00:02 INFO  : Exiting...
2024/01/01 10:00:03 DEBUG : /: LOOKUP /data/a.csv
2024/01/01 10:00:04 ERROR : a.csv: read error: connection reset
2024/01/01 10:00:05 DEBUG : /: Statfs
2024/01/01 10:00:06 ERROR : IO error: fuse closed
";

    #[test]
    fn test_errors_after_last_exit_marker() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("rclone.log");
        std::fs::write(&log, LOG).unwrap();

        let scan = scan_errors(&log, 0).unwrap();
        assert_eq!(scan.next_line, 7);
        assert_eq!(scan.errors.len(), 2);
        assert_eq!(scan.errors[0].line_number, 4);
        assert_eq!(scan.errors[0].lookup.as_deref(), Some("data/a.csv"));
        assert!(scan.errors[1].line.contains("fuse closed"));
    }

    #[test]
    fn test_cursor_skips_earlier_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("rclone.log");
        std::fs::write(&log, LOG).unwrap();

        let scan = scan_errors(&log, 6).unwrap();
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.errors[0].lookup, None);

        let past_end = scan_errors(&log, 50).unwrap();
        assert!(past_end.errors.is_empty());
        assert_eq!(past_end.next_line, 50);
    }

    #[test]
    fn test_json_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("rclone.log");
        std::fs::write(
            &log,
            "{\"level\":\"error\",\"msg\":\"first\"}\n{\"level\":\"info\",\"msg\":\"Exiting...\"}\n{\"level\":\"error\",\"msg\":\"second\"}\n",
        )
        .unwrap();
        let scan = scan_errors(&log, 0).unwrap();
        assert_eq!(scan.errors.len(), 1);
        assert!(scan.errors[0].line.contains("second"));
    }
}
