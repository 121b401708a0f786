// src/supervisor/lines.rs

/// Splits a byte stream into lines across chunk boundaries.
///
/// Empty lines are dropped. A trailing `\r` is stripped so CRLF output reads
/// the same as LF output.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if let Some(text) = to_text(line) {
                lines.push(text);
            }
        }
        lines
    }

    /// Flush a final unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        to_text(std::mem::take(&mut self.buf))
    }
}

fn to_text(mut line: Vec<u8>) -> Option<String> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"listening on"), Vec::<String>::new());
        assert_eq!(s.push(b" :8080\nready\n\npartial"), vec!["listening on :8080", "ready"]);
        assert_eq!(s.finish(), Some("partial".to_string()));
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn crlf_and_blank_lines() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"a\r\n\r\n\nb\n"), vec!["a", "b"]);
    }
}
