//! Newline-aligned windowing of text for fixed-length embedding models.
//!
//! Text is cut only between lines. A window closes on the line that brings it
//! to `max_length` characters, or earlier at a blank line once it is past half
//! of `max_length`, so cuts tend to land between statements or blocks. A
//! single line is never split, so one long line makes its chunk longer than
//! `max_length`.

/// A contiguous run of lines from a larger text.
///
/// # Examples
///
/// ```
/// use codevec_index::chunker::{find_breakpoints, split_into_chunks};
///
/// let text = "a\nb\nc";
/// let chunks = split_into_chunks(text, &[0]);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].text, "a");
/// assert_eq!((chunks[1].start_line, chunks[1].end_line), (1, 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// First line offset (0-indexed, inclusive).
    pub start_line: usize,
    /// Last line offset (0-indexed, inclusive).
    pub end_line: usize,
    /// The lines joined by `\n`.
    pub text: String,
}

/// Find the line indices at which each window closes.
///
/// Each line counts its characters plus one for the terminator. A
/// breakpoint fires on the line whose count reaches `max_length` (that line
/// stays in the window, however long it is), or when
/// the line is blank and the count exceeds `max_length / 2`; the count then
/// restarts at zero. Text shorter than `max_length` needs no breakpoints.
///
/// # Examples
///
/// ```
/// use codevec_index::chunker::find_breakpoints;
///
/// let text = ["aaaaaaaaaa"; 5].join("\n");
/// assert_eq!(find_breakpoints(&text, 20), vec![1, 3]);
/// assert!(find_breakpoints("short", 20).is_empty());
/// ```
pub fn find_breakpoints(text: &str, max_length: usize) -> Vec<usize> {
    if text.chars().count() < max_length {
        return Vec::new();
    }

    let half = max_length / 2;
    let mut breakpoints = Vec::new();
    let mut current = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        current += line.chars().count() + 1;
        if current >= max_length || (line.trim().is_empty() && current > half) {
            breakpoints.push(i);
            current = 0;
        }
    }

    breakpoints
}

/// Partition `text` into chunks ending at each breakpoint (inclusive).
///
/// Lines after the last breakpoint form a trailing chunk. Joining the chunk
/// texts with `\n` reproduces `text`. Breakpoints out of range or not
/// strictly increasing are ignored.
pub fn split_into_chunks(text: &str, breakpoints: &[usize]) -> Vec<Chunk> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks = Vec::with_capacity(breakpoints.len() + 1);
    let mut start = 0usize;

    for &end in breakpoints {
        if end < start || end >= lines.len() {
            continue;
        }
        chunks.push(Chunk {
            start_line: start,
            end_line: end,
            text: lines[start..=end].join("\n"),
        });
        start = end + 1;
    }

    if start < lines.len() {
        chunks.push(Chunk {
            start_line: start,
            end_line: lines.len() - 1,
            text: lines[start..].join("\n"),
        });
    }

    chunks
}

/// Convenience wrapper: breakpoints then split.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<Chunk> {
    let breakpoints = find_breakpoints(text, max_length);
    split_into_chunks(text, &breakpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoin(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "fn main() {\n    println!(\"hi\");\n}\n";
        assert!(find_breakpoints(text, 1000).is_empty());

        let chunks = chunk_text(text, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn short_text_with_blank_lines_past_half_is_not_split() {
        // 15 chars with a blank line after the midpoint of 20.
        let text = "abcdefghijk\n\nxy";
        assert!(text.chars().count() < 20);
        assert!(find_breakpoints(text, 20).is_empty());
    }

    #[test]
    fn empty_text_yields_one_empty_chunk() {
        assert!(find_breakpoints("", 10).is_empty());
        let chunks = chunk_text("", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn breaks_every_second_line_when_lines_fill_the_window() {
        let text = ["0123456789"; 5].join("\n");
        let breakpoints = find_breakpoints(&text, 20);
        assert_eq!(breakpoints, vec![1, 3]);

        let chunks = split_into_chunks(&text, &breakpoints);
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (0, 1));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 3));
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (4, 4));
    }

    #[test]
    fn prefers_blank_lines_once_past_half() {
        // Window 40: first line is 25 (+1), the blank line lands at 27 > 20.
        let text = format!("{}\n\n{}\n{}", "a".repeat(25), "b".repeat(10), "c".repeat(30));
        let breakpoints = find_breakpoints(&text, 40);
        assert_eq!(breakpoints[0], 1);
    }

    #[test]
    fn blank_line_before_half_does_not_break() {
        let text = format!("{}\n\n{}", "a".repeat(5), "b".repeat(50));
        let breakpoints = find_breakpoints(&text, 40);
        assert_eq!(breakpoints, vec![2]);
    }

    #[test]
    fn trailing_newline_is_preserved() {
        let text = format!("{}\n{}\n", "x".repeat(30), "y".repeat(30));
        let chunks = chunk_text(&text, 40);
        assert!(chunks.len() >= 2);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn partition_is_lossless() {
        let samples = [
            String::new(),
            "\n\n\n".to_string(),
            "one line".to_string(),
            "public void a() {\n  int x = 1;\n\n  return;\n}\n\n\nclass B {}\n".repeat(40),
            "ünïcödé\n\n".repeat(100),
        ];
        for text in &samples {
            for max in [0, 1, 7, 64, 4096] {
                let chunks = chunk_text(text, max);
                assert_eq!(&rejoin(&chunks), text, "max={max}");
            }
        }
    }

    #[test]
    fn chunks_overshoot_the_window_by_at_most_one_line() {
        let line = "let value = compute(a, b);";
        let text = format!("{line}\n").repeat(200);
        let max = 128;
        for chunk in chunk_text(&text, max) {
            let n = chunk.text.chars().count();
            assert!(n < max + line.len(), "chunk of {n} chars");
        }
    }

    #[test]
    fn long_line_is_never_split() {
        let text = format!("{}\n{}", "a".repeat(15), "b".repeat(500));
        assert_eq!(find_breakpoints(&text, 20), vec![1]);

        let chunks = chunk_text(&text, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 516);
    }

    #[test]
    fn zero_max_length_does_not_panic() {
        let chunks = chunk_text("a\nb\nc", 0);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn out_of_range_breakpoints_are_ignored() {
        let chunks = split_into_chunks("a\nb", &[5, 0, 0]);
        assert_eq!(rejoin(&chunks), "a\nb");
        assert_eq!(chunks.len(), 2);
    }
}
