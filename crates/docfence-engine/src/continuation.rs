use crate::definitions::StartLine;

/// Rolling source buffer for `continuation` fences.
///
/// Holds the source of the previous eligible fence. Lives for one document
/// or one docstring pass.
#[derive(Debug, Default)]
pub struct ContinuationChain {
    previous: String,
}

impl ContinuationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Join `content` onto the chain, padded with blank lines so that its
    /// first line lands on document line `start_line + 1`.
    ///
    /// The result becomes the new chain. When the chain already spans past
    /// `start_line` no padding is possible and the start line is reported as
    /// [`StartLine::Unmapped`].
    pub fn extend(&mut self, content: &str, start_line: usize) -> (String, StartLine) {
        let existing = self.previous.matches('\n').count();
        let (padding, start) = match start_line.checked_sub(existing) {
            Some(padding) => (padding, StartLine::Exact(start_line)),
            None => (0, StartLine::Unmapped),
        };

        let mut source = String::with_capacity(self.previous.len() + padding + content.len());
        source.push_str(&self.previous);
        source.extend(std::iter::repeat_n('\n', padding));
        source.push_str(content);

        self.previous.clone_from(&source);
        (source, start)
    }
}
