//! Trace file reader and writer
//!
//! A trace is zero or more `cycle:process` lines in non-decreasing cycle
//! order, terminated by one line carrying the claimed final cycle. Trailing
//! whitespace and blank lines are tolerated.

use krp_core::{KrpError, KrpResult, TraceEntry};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Parse a trace file into its entries and claimed final cycle.
pub fn parse_trace_file(path: &Path) -> KrpResult<(Vec<TraceEntry>, u64)> {
    let content = fs::read_to_string(path)?;
    parse_trace_str(&content)
}

/// Parse trace content from a string.
pub fn parse_trace_str(content: &str) -> KrpResult<(Vec<TraceEntry>, u64)> {
    let mut entries: Vec<TraceEntry> = Vec::new();
    let mut final_cycle: Option<u64> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if final_cycle.is_some() {
            return Err(located(
                line_num,
                "content after the final cycle line",
            ));
        }
        if let Some((cycle, process)) = line.split_once(':') {
            let cycle: u64 = cycle.trim().parse().map_err(|_| {
                located(line_num, format!("invalid cycle number: '{}'", cycle.trim()))
            })?;
            let process = process.trim();
            if process.is_empty() {
                return Err(located(line_num, "empty process name"));
            }
            if let Some(last) = entries.last() {
                if cycle < last.cycle {
                    return Err(located(
                        line_num,
                        format!(
                            "entries not in chronological order: cycle {cycle} \
                             comes after cycle {}",
                            last.cycle
                        ),
                    ));
                }
            }
            entries.push(TraceEntry {
                cycle,
                process: process.to_string(),
            });
        } else {
            let cycle: u64 = line.parse().map_err(|_| {
                located(line_num, format!("invalid final cycle: '{line}'"))
            })?;
            final_cycle = Some(cycle);
        }
    }

    let Some(final_cycle) = final_cycle else {
        return Err(KrpError::Trace {
            line: content.lines().count().max(1),
            message: "trace file missing the final cycle line".to_string(),
        });
    };
    Ok((entries, final_cycle))
}

/// Render a trace in its file format.
pub fn render_trace(entries: &[TraceEntry], final_cycle: u64) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{entry}");
    }
    let _ = writeln!(out, "{final_cycle}");
    out
}

/// Write a trace file.
pub fn write_trace_file(path: &Path, entries: &[TraceEntry], final_cycle: u64) -> KrpResult<()> {
    fs::write(path, render_trace(entries, final_cycle))?;
    Ok(())
}

fn located(line: usize, message: impl Into<String>) -> KrpError {
    KrpError::Trace {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let entries = vec![
            TraceEntry {
                cycle: 0,
                process: "achat".into(),
            },
            TraceEntry {
                cycle: 1,
                process: "vente".into(),
            },
        ];
        let text = render_trace(&entries, 3);
        assert_eq!(text, "0:achat\n1:vente\n3\n");

        let (parsed, final_cycle) = parse_trace_str(&text).unwrap();
        assert_eq!(parsed, entries);
        assert_eq!(final_cycle, 3);
    }

    #[test]
    fn test_blank_lines_and_whitespace_tolerated() {
        let text = "0:achat  \n\n 1 : vente \n\n10\n\n";
        let (entries, final_cycle) = parse_trace_str(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].process, "vente");
        assert_eq!(final_cycle, 10);
    }

    #[test]
    fn test_decreasing_cycles_rejected() {
        let text = "5:achat\n2:vente\n6\n";
        let err = parse_trace_str(text).unwrap_err();
        assert!(err.to_string().contains("chronological"));
    }

    #[test]
    fn test_missing_final_cycle_rejected() {
        let err = parse_trace_str("0:achat\n").unwrap_err();
        assert!(err.to_string().contains("missing the final cycle"));
    }

    #[test]
    fn test_entries_after_final_cycle_rejected() {
        let err = parse_trace_str("0:achat\n3\n4:vente\n").unwrap_err();
        assert!(err.to_string().contains("after the final cycle"));
    }

    #[test]
    fn test_empty_trace_is_just_a_final_cycle() {
        let (entries, final_cycle) = parse_trace_str("0\n").unwrap();
        assert!(entries.is_empty());
        assert_eq!(final_cycle, 0);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        let entries = vec![TraceEntry {
            cycle: 4,
            process: "make".into(),
        }];
        write_trace_file(&path, &entries, 5).unwrap();
        let (parsed, final_cycle) = parse_trace_file(&path).unwrap();
        assert_eq!(parsed, entries);
        assert_eq!(final_cycle, 5);
    }
}
