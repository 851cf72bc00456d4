//! Bounded buffer of rendered session text.

use std::collections::VecDeque;

/// Result of [`OutputBuffer::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    /// Text actually stored, possibly cut from the front
    pub text: String,
    /// Whether the buffer has ever dropped content
    pub truncated: bool,
}

/// FIFO text buffer capped at `max_size` bytes.
///
/// When an append would overflow, the oldest chunks are evicted. Text larger
/// than the whole buffer keeps only its tail. Once anything is dropped the
/// buffer reports `truncated` for the rest of its life.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    chunks: VecDeque<String>,
    current_size: usize,
    max_size: usize,
    truncated: bool,
}

impl OutputBuffer {
    /// Create an empty buffer holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            current_size: 0,
            max_size,
            truncated: false,
        }
    }

    /// Append text, evicting the oldest chunks as needed.
    pub fn append(&mut self, text: &str) -> Appended {
        let mut text = text;

        if text.len() > self.max_size {
            let mut start = text.len() - self.max_size;
            while !text.is_char_boundary(start) {
                start += 1;
            }
            text = &text[start..];
            self.chunks.clear();
            self.current_size = 0;
            self.truncated = true;
        }

        while self.current_size + text.len() > self.max_size {
            match self.chunks.pop_front() {
                Some(evicted) => {
                    self.current_size -= evicted.len();
                    self.truncated = true;
                }
                None => break,
            }
        }

        if !text.is_empty() {
            self.chunks.push_back(text.to_string());
            self.current_size += text.len();
        }

        Appended {
            text: text.to_string(),
            truncated: self.truncated,
        }
    }

    /// All retained text, oldest first.
    pub fn contents(&self) -> String {
        let mut contents = String::with_capacity(self.current_size);
        for chunk in &self.chunks {
            contents.push_str(chunk);
        }
        contents
    }

    /// Bytes currently retained.
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    /// Capacity in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Check if content was ever dropped.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Drop all retained text. The truncation flag is kept.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.current_size = 0;
    }
}
