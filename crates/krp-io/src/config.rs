//! Configuration file parser
//!
//! Parses the line-oriented `.krpsim` format:
//!
//! ```text
//! # comment
//! stock_name:quantity
//! process_name:(need:qty;...):(result:qty;...):delay
//! optimize:(target;...)
//! ```
//!
//! The format is whitespace-insensitive and order-sensitive: all stock and
//! process lines precede the single `optimize:` directive. Every error is
//! located by its 1-based source line.

use krp_core::{Configuration, KrpError, KrpResult, Process, ResourceId, ResourceTable};
use std::fs;
use std::path::Path;

/// Parse a configuration file.
pub fn parse_config_file(path: &Path) -> KrpResult<Configuration> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration content from a string.
pub fn parse_config_str(content: &str) -> KrpResult<Configuration> {
    let mut resources = ResourceTable::new();
    // None marks a resource registered by a process line but never declared
    // as a stock; it starts at quantity 0.
    let mut declared: Vec<Option<u64>> = Vec::new();
    let mut processes: Vec<Process> = Vec::new();
    let mut targets: Vec<ResourceId> = Vec::new();
    let mut optimize_time = false;
    let mut optimize_seen = false;
    let mut last_line = 0;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_num = idx + 1;
        last_line = line_num;

        // `#` starts a comment running to end of line.
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("optimize:") {
            if optimize_seen {
                return Err(located(line_num, "multiple optimize directives"));
            }
            optimize_seen = true;
            parse_optimize(
                rest,
                line_num,
                &resources,
                &mut targets,
                &mut optimize_time,
            )?;
            continue;
        }

        let Some((name, rest)) = line.split_once(':') else {
            return Err(located(
                line_num,
                format!("unrecognized line format: '{line}'"),
            ));
        };
        let name = name.trim();
        validate_name(name, line_num)?;

        if rest.contains('(') {
            // Process definition.
            if optimize_seen {
                return Err(located(
                    line_num,
                    "process definitions must come before the optimize directive",
                ));
            }
            if processes.iter().any(|p| p.name == name) {
                return Err(located(
                    line_num,
                    format!("duplicate process name: '{name}'"),
                ));
            }
            let process = parse_process(name, rest, line_num, &mut resources)?;
            processes.push(process);
        } else {
            // Stock declaration.
            if optimize_seen {
                return Err(located(
                    line_num,
                    "stock definitions must come before the optimize directive",
                ));
            }
            let id = resources.intern(name);
            let qty: u64 = rest.trim().parse().map_err(|_| {
                located(
                    line_num,
                    format!("invalid quantity for stock '{name}': '{}'", rest.trim()),
                )
            })?;
            register_stock(&mut declared, id, qty, name, line_num)?;
        }
    }

    if !optimize_seen {
        return Err(located(last_line.max(1), "missing optimize directive"));
    }
    if processes.is_empty() {
        return Err(located(last_line.max(1), "no processes defined"));
    }

    declared.resize(resources.len(), None);
    let initial_stocks = declared.into_iter().map(|q| q.unwrap_or(0)).collect();

    Ok(Configuration {
        resources,
        initial_stocks,
        processes,
        targets,
        optimize_time,
    })
}

fn register_stock(
    declared: &mut Vec<Option<u64>>,
    id: ResourceId,
    qty: u64,
    name: &str,
    line_num: usize,
) -> KrpResult<()> {
    if declared.len() <= id.index() {
        declared.resize(id.index() + 1, None);
    }
    if declared[id.index()].is_some() {
        return Err(located(
            line_num,
            format!("duplicate stock definition: '{name}'"),
        ));
    }
    declared[id.index()] = Some(qty);
    Ok(())
}

fn parse_process(
    name: &str,
    rest: &str,
    line_num: usize,
    resources: &mut ResourceTable,
) -> KrpResult<Process> {
    let rest = rest.trim();
    let (needs_raw, rest) = take_group(rest, line_num)?;
    let rest = expect_colon(rest, line_num)?;
    let (results_raw, rest) = take_group(rest, line_num)?;
    let rest = expect_colon(rest, line_num)?;

    let needs = parse_pairs(needs_raw, line_num, resources)?;
    let results = parse_pairs(results_raw, line_num, resources)?;

    let delay: u64 = rest.trim().parse().map_err(|_| {
        located(line_num, format!("invalid delay: '{}'", rest.trim()))
    })?;
    if delay == 0 {
        return Err(located(line_num, "delay must be positive"));
    }

    Ok(Process {
        name: name.to_string(),
        needs,
        results,
        delay,
    })
}

/// Split off a leading parenthesised group, returning its interior and the
/// remainder after the closing parenthesis.
fn take_group(rest: &str, line_num: usize) -> KrpResult<(&str, &str)> {
    let rest = rest.trim_start();
    let Some(inner) = rest.strip_prefix('(') else {
        return Err(located(
            line_num,
            "expected 'name:(needs):(results):delay'",
        ));
    };
    let Some(close) = inner.find(')') else {
        return Err(located(line_num, "unclosed '(' in process definition"));
    };
    Ok((&inner[..close], &inner[close + 1..]))
}

fn expect_colon(rest: &str, line_num: usize) -> KrpResult<&str> {
    let rest = rest.trim_start();
    rest.strip_prefix(':').ok_or_else(|| {
        located(line_num, "expected 'name:(needs):(results):delay'")
    })
}

/// Parse a `name:qty;name:qty;...` list; the empty list is permitted.
fn parse_pairs(
    raw: &str,
    line_num: usize,
    resources: &mut ResourceTable,
) -> KrpResult<Vec<(ResourceId, u64)>> {
    let mut pairs: Vec<(ResourceId, u64)> = Vec::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((name, qty)) = segment.split_once(':') else {
            return Err(located(
                line_num,
                format!("invalid resource pair '{segment}', missing ':'"),
            ));
        };
        let name = name.trim();
        validate_name(name, line_num)?;
        let qty: u64 = qty.trim().parse().map_err(|_| {
            located(
                line_num,
                format!("invalid quantity for '{name}': '{}'", qty.trim()),
            )
        })?;
        if qty == 0 {
            return Err(located(
                line_num,
                format!("quantity for '{name}' must be positive"),
            ));
        }
        let id = resources.intern(name);
        if pairs.iter().any(|(r, _)| *r == id) {
            return Err(located(
                line_num,
                format!("duplicate resource '{name}' in pair list"),
            ));
        }
        pairs.push((id, qty));
    }
    Ok(pairs)
}

fn parse_optimize(
    rest: &str,
    line_num: usize,
    resources: &ResourceTable,
    targets: &mut Vec<ResourceId>,
    optimize_time: &mut bool,
) -> KrpResult<()> {
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| located(line_num, "malformed optimize line, expected 'optimize:(...)'"))?;

    let mut any = false;
    for segment in inner.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        any = true;
        if segment == "time" {
            *optimize_time = true;
        } else if let Some(id) = resources.get(segment) {
            targets.push(id);
        } else {
            return Err(located(
                line_num,
                format!("invalid optimize target '{segment}', not a known resource"),
            ));
        }
    }
    if !any {
        return Err(located(line_num, "optimize directive names no target"));
    }
    Ok(())
}

fn validate_name(name: &str, line_num: usize) -> KrpResult<()> {
    if name.is_empty() {
        return Err(located(line_num, "empty name"));
    }
    if name
        .chars()
        .any(|c| ":();#".contains(c) || c.is_whitespace())
    {
        return Err(located(line_num, format!("invalid name: '{name}'")));
    }
    Ok(())
}

fn located(line: usize, message: impl Into<String>) -> KrpError {
    KrpError::Configuration {
        line,
        message: message.into(),
    }
}
