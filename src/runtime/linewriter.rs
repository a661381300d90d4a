//! Line-oriented text file writer.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use super::object::RtObj;
use super::string::RtString;
use super::trap::rt_trap;

#[cfg(windows)]
pub const DEFAULT_NEWLINE: &[u8] = b"\r\n";
#[cfg(not(windows))]
pub const DEFAULT_NEWLINE: &[u8] = b"\n";

#[derive(Debug)]
pub struct LineWriter {
    file: Option<File>,
    newline: RtString,
}

impl LineWriter {
    pub(crate) fn open_with(path: &RtString, append: bool) -> LineWriter {
        let path_str = path.to_string_lossy();
        if path_str.is_empty() {
            rt_trap("LineWriter: invalid path");
        }
        let mut opts = OpenOptions::new();
        if append {
            opts.append(true).create(true);
        } else {
            opts.write(true).create(true).truncate(true);
        }
        match opts.open(&path_str) {
            Ok(file) => LineWriter { file: Some(file), newline: RtString::from_bytes(DEFAULT_NEWLINE) },
            Err(e) => rt_trap(&format!("LineWriter: failed to open '{path_str}': {e}")),
        }
    }

    fn file(&mut self, who: &str) -> &mut File {
        match self.file.as_mut() {
            Some(f) => f,
            None => rt_trap(&format!("{who}: writer is closed")),
        }
    }

    fn write_checked(&mut self, who: &str, what: &str, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let file = self.file(who);
        let mut written = 0;
        while written < bytes.len() {
            match file.write(&bytes[written..]) {
                Ok(0) | Err(_) => {
                    rt_trap(&format!("{who}: short write{what} (disk full or I/O error)"))
                }
                Ok(n) => written += n,
            }
        }
    }

    pub fn write(&mut self, text: &RtString) {
        self.write_checked("LineWriter.Write", "", text.as_bytes());
    }

    pub fn write_line(&mut self, text: &RtString) {
        self.file("LineWriter.WriteLn");
        self.write_checked("LineWriter.WriteLn", "", text.as_bytes());
        let nl = self.newline.clone();
        self.write_checked("LineWriter.WriteLn", " on newline", nl.as_bytes());
    }

    /// Bytes outside 0..=255 are ignored.
    pub fn write_char(&mut self, ch: i64) {
        self.file("LineWriter.WriteChar");
        if let Ok(b) = u8::try_from(ch) {
            self.write_checked("LineWriter.WriteChar", "", &[b]);
        }
    }

    /// No-op when closed.
    pub fn flush(&mut self) {
        if let Some(f) = self.file.as_mut() {
            if let Err(e) = f.flush() {
                tracing::warn!(target: "ilc::runtime", "LineWriter.Flush failed: {e}");
            }
        }
    }

    /// Idempotent.
    pub fn close(&mut self) {
        if let Some(mut f) = self.file.take() {
            if let Err(e) = f.flush() {
                tracing::warn!(target: "ilc::runtime", "LineWriter.Close flush failed: {e}");
            }
        }
    }

    /// Reposition to byte offset `pos` (0-based).
    pub fn seek(&mut self, pos: u64) {
        if let Err(e) = self.file("LineWriter.Seek").seek(SeekFrom::Start(pos)) {
            rt_trap(&format!("LineWriter.Seek: I/O error: {e}"));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn newline(&self) -> RtString {
        self.newline.clone()
    }

    pub fn set_newline(&mut self, nl: RtString) {
        self.newline = nl;
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        self.close();
    }
}

pub type RtLineWriter = RtObj<LineWriter>;

pub fn rt_linewriter_open(path: &RtString) -> RtLineWriter {
    RtObj::new(LineWriter::open_with(path, false))
}

pub fn rt_linewriter_append(path: &RtString) -> RtLineWriter {
    RtObj::new(LineWriter::open_with(path, true))
}

pub fn rt_linewriter_close(w: &RtLineWriter) {
    w.borrow_mut().close()
}

pub fn rt_linewriter_write(w: &RtLineWriter, text: &RtString) {
    w.borrow_mut().write(text)
}

pub fn rt_linewriter_write_ln(w: &RtLineWriter, text: &RtString) {
    w.borrow_mut().write_line(text)
}

pub fn rt_linewriter_write_char(w: &RtLineWriter, ch: i64) {
    w.borrow_mut().write_char(ch)
}

pub fn rt_linewriter_flush(w: &RtLineWriter) {
    w.borrow_mut().flush()
}

pub fn rt_linewriter_newline(w: Option<&RtLineWriter>) -> RtString {
    match w {
        Some(w) => w.borrow().newline(),
        None => RtString::from_bytes(DEFAULT_NEWLINE),
    }
}

pub fn rt_linewriter_set_newline(w: &RtLineWriter, nl: RtString) {
    w.borrow_mut().set_newline(nl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::trap::catch_trap;

    fn path_in(dir: &tempfile::TempDir, name: &str) -> RtString {
        RtString::from_str(&dir.path().join(name).to_string_lossy())
    }

    #[test]
    fn crlf_newline_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "out.txt");
        let w = rt_linewriter_open(&path);
        rt_linewriter_set_newline(&w, RtString::from_str("\r\n"));
        rt_linewriter_write_ln(&w, &RtString::from_str("Line 1"));
        rt_linewriter_write_ln(&w, &RtString::from_str("Line 2"));
        rt_linewriter_close(&w);
        let bytes = std::fs::read(dir.path().join("out.txt")).unwrap();
        assert_eq!(bytes, b"Line 1\r\nLine 2\r\n");
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let w = rt_linewriter_open(&path_in(&dir, "a.txt"));
        rt_linewriter_write(&w, &RtString::from_str("x"));
        rt_linewriter_close(&w);
        rt_linewriter_close(&w);
        assert!(w.borrow().is_closed());
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"x");
    }

    #[test]
    fn write_after_close_traps() {
        let dir = tempfile::tempdir().unwrap();
        let w = rt_linewriter_open(&path_in(&dir, "b.txt"));
        rt_linewriter_close(&w);
        let err = catch_trap(|| rt_linewriter_write(&w, &RtString::from_str("y"))).unwrap_err();
        assert_eq!(err.message, "LineWriter.Write: writer is closed");
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.txt"), b"old\n").unwrap();
        let w = rt_linewriter_append(&path_in(&dir, "c.txt"));
        rt_linewriter_set_newline(&w, RtString::from_str("\n"));
        rt_linewriter_write_ln(&w, &RtString::from_str("new"));
        rt_linewriter_write_char(&w, 33);
        rt_linewriter_write_char(&w, 999);
        drop(w);
        assert_eq!(std::fs::read(dir.path().join("c.txt")).unwrap(), b"old\nnew\n!");
    }

    #[test]
    fn default_newline_matches_platform() {
        assert_eq!(rt_linewriter_newline(None).as_bytes(), DEFAULT_NEWLINE);
    }

    #[test]
    fn open_missing_directory_traps() {
        let dir = tempfile::tempdir().unwrap();
        let bad = RtString::from_str(&dir.path().join("no/such/dir.txt").to_string_lossy());
        let err = catch_trap(|| rt_linewriter_open(&bad)).unwrap_err();
        assert!(err.message.starts_with("LineWriter: failed to open"));
    }
}
