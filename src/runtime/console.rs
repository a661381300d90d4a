//! Console output, line input and terminal control.
//!
//! Output goes through a per-thread sink. The default sink is the process
//! stdout; tests and the embedding API swap in a capture buffer with
//! [`capture_output`]. The sink tracks the current column so `PRINT a, b`
//! can pad to the next print zone.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use super::string::{format_f64, RtString};
use super::trap::{rt_trap_kind, TrapKind};

/// Width of one `PRINT` comma zone.
pub const ZONE_WIDTH: usize = 14;

enum Sink {
    Stdout,
    Capture(Vec<u8>),
}

enum Input {
    Stdin,
    Buffer(VecDeque<u8>),
}

struct Console {
    sink: Sink,
    input: Input,
    column: usize,
}

impl Console {
    fn write(&mut self, bytes: &[u8]) {
        self.column = advance_column(self.column, bytes);
        match &mut self.sink {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                if out.write_all(bytes).is_err() {
                    rt_trap_kind(TrapKind::Io, "PRINT: I/O error writing to stdout");
                }
            }
            Sink::Capture(buf) => buf.extend_from_slice(bytes),
        }
    }

    fn read_line(&mut self) -> Option<Vec<u8>> {
        let mut line = Vec::new();
        match &mut self.input {
            Input::Stdin => {
                let _ = std::io::stdout().flush();
                let n = std::io::stdin().lock().read_until(b'\n', &mut line).ok()?;
                if n == 0 {
                    return None;
                }
            }
            Input::Buffer(buf) => {
                if buf.is_empty() {
                    return None;
                }
                while let Some(b) = buf.pop_front() {
                    line.push(b);
                    if b == b'\n' {
                        break;
                    }
                }
            }
        }
        strip_newline(&mut line);
        Some(line)
    }
}

pub(crate) fn advance_column(mut column: usize, bytes: &[u8]) -> usize {
    for &b in bytes {
        match b {
            b'\n' | b'\r' => column = 0,
            _ => column += 1,
        }
    }
    column
}

pub(crate) fn strip_newline(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

/// Spaces needed to reach the next print zone from `column`.
pub(crate) fn zone_padding(column: usize) -> usize {
    ZONE_WIDTH - column % ZONE_WIDTH
}

thread_local! {
    static CONSOLE: RefCell<Console> = const {
        RefCell::new(Console { sink: Sink::Stdout, input: Input::Stdin, column: 0 })
    };
}

fn with_console<R>(f: impl FnOnce(&mut Console) -> R) -> R {
    CONSOLE.with(|c| f(&mut c.borrow_mut()))
}

/// Run `f` with console output captured, returning what it printed.
/// The previous sink is restored afterwards, also when `f` unwinds.
pub fn capture_output<R>(f: impl FnOnce() -> R) -> (R, String) {
    struct Restore(Option<(Sink, usize)>);
    impl Drop for Restore {
        fn drop(&mut self) {
            if let Some((sink, column)) = self.0.take() {
                with_console(|c| {
                    c.sink = sink;
                    c.column = column;
                });
            }
        }
    }

    let prev = with_console(|c| {
        let column = std::mem::replace(&mut c.column, 0);
        (std::mem::replace(&mut c.sink, Sink::Capture(Vec::new())), column)
    });
    let guard = Restore(Some(prev));
    let result = f();
    let captured = with_console(|c| match &mut c.sink {
        Sink::Capture(buf) => std::mem::take(buf),
        Sink::Stdout => Vec::new(),
    });
    drop(guard);
    (result, String::from_utf8_lossy(&captured).into_owned())
}

/// Feed `INPUT` from `bytes` instead of stdin for the rest of this thread.
pub fn set_input(bytes: Vec<u8>) {
    with_console(|c| c.input = Input::Buffer(bytes.into()));
}

pub fn reset_input() {
    with_console(|c| c.input = Input::Stdin);
}

pub fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

pub fn rt_print_str(s: &RtString) {
    with_console(|c| c.write(s.as_bytes()))
}

pub fn rt_print_i64(v: i64) {
    with_console(|c| c.write(v.to_string().as_bytes()))
}

pub fn rt_print_f64(v: f64) {
    with_console(|c| c.write(format_f64(v).as_bytes()))
}

pub fn rt_print_nl() {
    with_console(|c| c.write(b"\n"))
}

/// Pad with spaces to the next print zone.
pub fn rt_print_tab() {
    with_console(|c| {
        let pad = zone_padding(c.column);
        c.write(&vec![b' '; pad]);
    })
}

/// Read one line from the input source without its line terminator.
pub fn rt_input_line() -> RtString {
    match with_console(|c| c.read_line()) {
        Some(line) => RtString::from_bytes(&line),
        None => rt_trap_kind(TrapKind::InputPastEnd, "INPUT: input past end"),
    }
}

// ---------------------------------------------------------------------------
// Terminal control
// ---------------------------------------------------------------------------

pub fn rt_term_cls() {
    with_console(|c| {
        c.write(b"\x1b[2J\x1b[H");
        c.column = 0;
    })
}

/// Map a 0..=15 BASIC palette index to an SGR code, foreground or background.
///
/// BASIC orders the low three bits blue/green/red; ANSI orders them
/// red/green/blue, so bits 0 and 2 trade places.
fn sgr_color(index: i64, background: bool) -> Option<u32> {
    let index = u32::try_from(index).ok().filter(|&i| i < 16)?;
    let base = match (background, index >= 8) {
        (false, false) => 30,
        (false, true) => 90,
        (true, false) => 40,
        (true, true) => 100,
    };
    let low = index % 8;
    let ansi = (low & 0b010) | ((low & 0b001) << 2) | ((low & 0b100) >> 2);
    Some(base + ansi)
}

/// Negative colors leave that layer unchanged.
pub fn rt_term_color(fg: i64, bg: i64) {
    let mut codes = Vec::new();
    if fg >= 0 {
        match sgr_color(fg, false) {
            Some(code) => codes.push(code),
            None => rt_trap_kind(TrapKind::InvalidArgument, &format!("COLOR: invalid foreground {fg}")),
        }
    }
    if bg >= 0 {
        match sgr_color(bg, true) {
            Some(code) => codes.push(code),
            None => rt_trap_kind(TrapKind::InvalidArgument, &format!("COLOR: invalid background {bg}")),
        }
    }
    if codes.is_empty() {
        return;
    }
    let seq = codes.iter().map(u32::to_string).collect::<Vec<_>>().join(";");
    with_console(|c| {
        let col = c.column;
        c.write(format!("\x1b[{seq}m").as_bytes());
        c.column = col;
    })
}

/// 1-based row and column. A column below 1 keeps column 1.
pub fn rt_term_locate(row: i64, col: i64) {
    let row = row.max(1);
    let col = col.max(1);
    with_console(|c| {
        c.write(format!("\x1b[{row};{col}H").as_bytes());
        c.column = (col - 1) as usize;
    })
}
