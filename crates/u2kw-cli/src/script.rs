//! Step tables
//!
//! One step per line, cells separated by `|`:
//!
//! ```text
//! # comment
//! Connect Device | emulator-5554
//! ${login} | Find Element By Locator | resourceId=com.example:id/login
//! Click Element By Locator | ${login}
//! Dev Screenshot | shots/${name}.png
//! ```
//!
//! `key=value` cells are named arguments when `key` is a selector key or a
//! keyword parameter; quote a cell to pass it positionally as text.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use u2_keywords::{Automation, Connect, KeywordLibrary, KeywordValue, SelectorKey};

/// Parameter names of fixed-signature keywords and by-locator primitives
const PARAM_NAMES: &[&str] = &[
    "activity",
    "attribute",
    "data",
    "delay",
    "direction",
    "duration",
    "element",
    "filename",
    "fx",
    "fy",
    "key",
    "package",
    "parent",
    "serial",
    "status",
    "steps",
    "timeout",
    "tx",
    "txt",
    "ty",
    "x",
    "xpath",
    "y",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub line: usize,
    pub assign: Option<String>,
    pub keyword: String,
    pub args: Vec<String>,
}

fn variable_name(cell: &str) -> Option<&str> {
    cell.strip_prefix("${")?.strip_suffix('}').filter(|n| !n.is_empty())
}

pub fn parse_script(text: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut cells: Vec<String> = trimmed.split('|').map(|c| c.trim().to_string()).collect();
        let assign = match variable_name(&cells[0]) {
            Some(name) if cells.len() > 1 => {
                let name = name.to_string();
                cells.remove(0);
                Some(name)
            }
            _ => None,
        };

        let keyword = cells.remove(0);
        if keyword.is_empty() {
            bail!("line {}: missing keyword", line);
        }
        steps.push(Step {
            line,
            assign,
            keyword,
            args: cells.into_iter().filter(|c| !c.is_empty()).collect(),
        });
    }
    Ok(steps)
}

/// Read and parse a step table file
pub async fn load_script(path: &Path) -> Result<Vec<Step>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let steps = parse_script(&text).with_context(|| path.display().to_string())?;
    if steps.is_empty() {
        warn!("{} has no steps", path.display());
    }
    Ok(steps)
}

fn is_named_key(key: &str) -> bool {
    key.parse::<SelectorKey>().is_ok() || PARAM_NAMES.contains(&key)
}

/// Values assigned by earlier steps
#[derive(Debug, Default)]
pub struct Variables {
    values: HashMap<String, KeywordValue>,
}

impl Variables {
    pub fn set(&mut self, name: impl Into<String>, value: KeywordValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&KeywordValue> {
        self.values.get(name)
    }

    /// A cell that is exactly `${name}` keeps the stored value; otherwise
    /// every `${name}` is replaced by its text
    pub fn resolve(&self, cell: &str) -> Result<KeywordValue> {
        if let Some(name) = variable_name(cell) {
            if !name.contains("${") {
                return self
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("undefined variable ${{{}}}", name));
            }
        }
        Ok(KeywordValue::parse_literal(&self.substitute(cell)?))
    }

    fn substitute(&self, cell: &str) -> Result<String> {
        let mut out = String::with_capacity(cell.len());
        let mut rest = cell;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| anyhow!("unterminated variable in {:?}", cell))?;
            let name = &after[..end];
            let value = self
                .get(name)
                .ok_or_else(|| anyhow!("undefined variable ${{{}}}", name))?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Split raw cells into positional and named keyword arguments
pub fn split_args(
    cells: &[String],
    variables: &Variables,
) -> Result<(Vec<KeywordValue>, Vec<(String, KeywordValue)>)> {
    let mut args = Vec::new();
    let mut named = Vec::new();
    for cell in cells {
        let quoted = cell.starts_with('"');
        match cell.split_once('=') {
            Some((key, value)) if !quoted && is_named_key(key.trim()) => {
                named.push((key.trim().to_string(), variables.resolve(value.trim())?));
            }
            _ => args.push(variables.resolve(cell)?),
        }
    }
    Ok((args, named))
}

/// Run steps in order, stopping at the first failure
pub async fn run_steps<A: Automation + Connect>(
    library: &KeywordLibrary<A>,
    steps: &[Step],
    variables: &mut Variables,
) -> Result<usize> {
    for step in steps {
        let (args, named) = split_args(&step.args, variables)
            .with_context(|| format!("line {}: {}", step.line, step.keyword))?;
        let value = library
            .run_keyword(&step.keyword, args, named)
            .await
            .with_context(|| format!("line {}: {}", step.line, step.keyword))?;
        info!("line {}: {} -> {}", step.line, step.keyword, value);
        if let Some(name) = &step.assign {
            variables.set(name.clone(), value);
        }
    }
    Ok(steps.len())
}
