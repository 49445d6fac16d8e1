use std::collections::VecDeque;

/// Ordered token stream read front to back.
///
/// Popped tokens are gone for good; `push_front` puts a token back so the next
/// `pop` returns it again.
#[derive(Debug, Clone, Default)]
pub struct TokenCursor {
    tokens: VecDeque<String>,
    consumed: usize,
}

impl TokenCursor {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            consumed: 0,
        }
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(String::as_str)
    }

    pub fn pop(&mut self) -> Option<String> {
        let token = self.tokens.pop_front()?;
        self.consumed += 1;
        Some(token)
    }

    pub fn push_front(&mut self, token: impl Into<String>) {
        self.tokens.push_front(token.into());
        self.consumed = self.consumed.saturating_sub(1);
    }

    /// Number of tokens popped so far (net of `push_front`).
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drain everything that has not been read yet.
    pub fn drain(&mut self) -> Vec<String> {
        self.consumed += self.tokens.len();
        self.tokens.drain(..).collect()
    }
}
