//! Numbered file channels for `OPEN ... AS #n`.
//!
//! Channels are per-thread, like the console. Output channels write through
//! a [`LineWriter`] with a `\n` newline; input channels wrap a buffered
//! reader. Channel numbers are 1-based and each may be open at most once.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use super::console::{advance_column, strip_newline, zone_padding};
use super::linewriter::LineWriter;
use super::string::{format_f64, RtString};
use super::trap::{rt_trap_kind, TrapKind};

/// Open mode codes shared with the lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum OpenMode {
    Input = 0,
    Output = 1,
    Append = 2,
}

impl OpenMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(OpenMode::Input),
            1 => Some(OpenMode::Output),
            2 => Some(OpenMode::Append),
            _ => None,
        }
    }
}

enum Channel {
    Reader(BufReader<File>),
    Writer { out: LineWriter, column: usize },
}

thread_local! {
    static CHANNELS: RefCell<BTreeMap<i64, Channel>> = const { RefCell::new(BTreeMap::new()) };
}

fn with_channel<R>(ch: i64, who: &str, f: impl FnOnce(&mut Channel) -> R) -> R {
    CHANNELS.with(|t| {
        let mut table = t.borrow_mut();
        match table.get_mut(&ch) {
            Some(c) => f(c),
            None => rt_trap_kind(TrapKind::BadFileMode, &format!("{who}: channel {ch} not open")),
        }
    })
}

fn with_writer<R>(ch: i64, who: &str, f: impl FnOnce(&mut LineWriter, &mut usize) -> R) -> R {
    with_channel(ch, who, |c| match c {
        Channel::Writer { out, column } => f(out, column),
        Channel::Reader(_) => rt_trap_kind(
            TrapKind::BadFileMode,
            &format!("{who}: channel {ch} is not open for output"),
        ),
    })
}

fn with_reader<R>(ch: i64, who: &str, f: impl FnOnce(&mut BufReader<File>) -> R) -> R {
    with_channel(ch, who, |c| match c {
        Channel::Reader(r) => f(r),
        Channel::Writer { .. } => rt_trap_kind(
            TrapKind::BadFileMode,
            &format!("{who}: channel {ch} is not open for input"),
        ),
    })
}

pub fn rt_open(path: &RtString, mode: i64, ch: i64) {
    let Some(mode) = OpenMode::from_code(mode) else {
        rt_trap_kind(TrapKind::BadFileMode, &format!("OPEN: invalid mode {mode}"));
    };
    if ch < 1 {
        rt_trap_kind(TrapKind::InvalidArgument, &format!("OPEN: invalid channel {ch}"));
    }
    if CHANNELS.with(|t| t.borrow().contains_key(&ch)) {
        rt_trap_kind(TrapKind::BadFileMode, &format!("OPEN: channel {ch} already open"));
    }
    let channel = match mode {
        OpenMode::Input => {
            let p = path.to_string_lossy();
            match File::open(&p) {
                Ok(f) => Channel::Reader(BufReader::new(f)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    rt_trap_kind(TrapKind::FileNotFound, &format!("OPEN: file not found: {p}"))
                }
                Err(e) => rt_trap_kind(TrapKind::Io, &format!("OPEN: cannot open {p}: {e}")),
            }
        }
        OpenMode::Output | OpenMode::Append => {
            let mut out = LineWriter::open_with(path, mode == OpenMode::Append);
            out.set_newline(RtString::from_str("\n"));
            Channel::Writer { out, column: 0 }
        }
    };
    tracing::debug!(target: "ilc::runtime", channel = ch, ?mode, "open");
    CHANNELS.with(|t| t.borrow_mut().insert(ch, channel));
}

/// Closing a channel that is not open is a no-op.
pub fn rt_close(ch: i64) {
    let closed = CHANNELS.with(|t| t.borrow_mut().remove(&ch));
    drop(closed);
}

pub fn rt_close_all() {
    let all = CHANNELS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    drop(all);
}

/// Move to 1-based byte position `pos`.
pub fn rt_seek(ch: i64, pos: i64) {
    if pos < 1 {
        rt_trap_kind(TrapKind::InvalidArgument, &format!("SEEK: position must be >= 1 (got {pos})"));
    }
    let offset = (pos - 1) as u64;
    with_channel(ch, "SEEK", |c| match c {
        Channel::Reader(r) => {
            if let Err(e) = r.seek(SeekFrom::Start(offset)) {
                rt_trap_kind(TrapKind::Io, &format!("SEEK: I/O error: {e}"));
            }
        }
        Channel::Writer { out, column } => {
            out.seek(offset);
            *column = 0;
        }
    })
}

/// BASIC truth value: -1 at end of file, 0 otherwise. Output channels are
/// always at their end.
pub fn rt_eof(ch: i64) -> i64 {
    with_channel(ch, "EOF", |c| match c {
        Channel::Reader(r) => match r.fill_buf() {
            Ok(buf) if buf.is_empty() => -1,
            Ok(_) => 0,
            Err(e) => rt_trap_kind(TrapKind::Io, &format!("EOF: I/O error: {e}")),
        },
        Channel::Writer { .. } => -1,
    })
}

pub fn rt_line_input_ch(ch: i64) -> RtString {
    with_reader(ch, "LINE INPUT", |r| {
        let mut line = Vec::new();
        match r.read_until(b'\n', &mut line) {
            Ok(0) => rt_trap_kind(
                TrapKind::InputPastEnd,
                &format!("LINE INPUT: input past end of channel {ch}"),
            ),
            Ok(_) => {
                strip_newline(&mut line);
                RtString::from_bytes(&line)
            }
            Err(e) => rt_trap_kind(TrapKind::Io, &format!("LINE INPUT: I/O error: {e}")),
        }
    })
}

fn write_ch(ch: i64, bytes: &[u8]) {
    with_writer(ch, "PRINT #", |out, column| {
        *column = advance_column(*column, bytes);
        out.write(&RtString::from_bytes(bytes));
    })
}

pub fn rt_print_ch_str(ch: i64, s: &RtString) {
    write_ch(ch, s.as_bytes())
}

pub fn rt_print_ch_i64(ch: i64, v: i64) {
    write_ch(ch, v.to_string().as_bytes())
}

pub fn rt_print_ch_f64(ch: i64, v: f64) {
    write_ch(ch, format_f64(v).as_bytes())
}

pub fn rt_print_ch_nl(ch: i64) {
    with_writer(ch, "PRINT #", |out, column| {
        *column = 0;
        out.write_line(&RtString::empty());
    })
}

pub fn rt_print_ch_tab(ch: i64) {
    let pad = with_writer(ch, "PRINT #", |_, column| zone_padding(*column));
    write_ch(ch, &vec![b' '; pad]);
}
