/// Splits page text into overlapping chunks on word boundaries.
///
/// `size` and `overlap` are character budgets, counting the single spaces
/// that join words. A word longer than the whole budget becomes a chunk of
/// its own rather than being cut mid-word.
#[derive(Clone, Debug)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self { size, overlap: overlap.min(size.saturating_sub(1)) }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            let joined_len =
                if current.is_empty() { word_len } else { current_len + 1 + word_len };

            if !current.is_empty() && joined_len > self.size {
                chunks.push(current.join(" "));
                let tail = self.overlap_tail(&current);
                current_len = tail.iter().map(|w| w.chars().count()).sum::<usize>()
                    + tail.len().saturating_sub(1);
                current = tail;
            }

            if current.is_empty() {
                current_len = word_len;
            } else {
                current_len += 1 + word_len;
            }
            current.push(word);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    fn overlap_tail<'a>(&self, words: &[&'a str]) -> Vec<&'a str> {
        if self.overlap == 0 {
            return Vec::new();
        }

        let mut tail: Vec<&str> = Vec::new();
        let mut tail_len = 0usize;

        for word in words.iter().rev() {
            let word_len = word.chars().count();
            let joined_len = if tail.is_empty() { word_len } else { tail_len + 1 + word_len };
            if joined_len > self.overlap {
                break;
            }
            tail.push(word);
            tail_len = joined_len;
        }

        tail.reverse();
        tail
    }
}
