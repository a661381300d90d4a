//! Debug controls: step limits, tracing, breakpoints and watches.

use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    /// One line per executed instruction.
    Il,
    /// One line each time execution reaches a new source line.
    Src,
}

impl FromStr for TraceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "il" => Ok(TraceMode::Il),
            "src" => Ok(TraceMode::Src),
            other => Err(format!("unknown trace mode '{other}' (expected il or src)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakPoint {
    /// Stop on entry to every block with this label.
    Label(String),
    /// Stop at the first instruction attributed to `line`.
    Line { file: String, line: u32 },
}

impl FromStr for BreakPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty breakpoint".into());
        }
        if let Some((file, line)) = s.rsplit_once(':')
            && let Ok(line) = line.parse::<u32>()
        {
            return Ok(BreakPoint::Line { file: file.to_string(), line });
        }
        Ok(BreakPoint::Label(s.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    pub max_steps: Option<u64>,
    pub trace: Option<TraceMode>,
    pub breaks: Vec<BreakPoint>,
    /// Variable names whose slot stores are reported.
    pub watch: Vec<String>,
    /// Count calls per function.
    pub count: bool,
    /// Feed `INPUT` from this file instead of stdin.
    pub stdin_from: Option<PathBuf>,
}

impl DebugOptions {
    pub fn breaks_at_label(&self, label: &str) -> bool {
        self.breaks.iter().any(|b| matches!(b, BreakPoint::Label(l) if l == label))
    }

    pub fn break_at_line(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.breaks.iter().find_map(|b| match b {
            BreakPoint::Line { file, line: l } if *l == line => Some(file.as_str()),
            _ => None,
        })
    }

    /// The watched name a slot belongs to, if any.
    pub fn watched<'a>(&'a self, slot: &str) -> Option<&'a str> {
        if self.watch.is_empty() {
            return None;
        }
        let var = variable_of_slot(slot)?;
        self.watch.iter().find(|w| w.eq_ignore_ascii_case(var)).map(String::as_str)
    }
}

/// Source variable behind a slot temp: `x.addr` is `x`, and a local renamed
/// to `x_12` for its scope is still `x`.
pub fn variable_of_slot(slot: &str) -> Option<&str> {
    let base = slot.strip_suffix(".addr")?;
    let base = base.strip_suffix(".v").unwrap_or(base);
    match base.rsplit_once('_') {
        Some((name, id)) if !name.is_empty() && !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => Some(name),
        _ => Some(base),
    }
}
