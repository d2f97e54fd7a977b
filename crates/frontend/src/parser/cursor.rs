use crate::lexer::Token;

/// Forward-only position in a token slice
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub(crate) const fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) const fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn tokens(&self) -> &'t [Token] {
        self.tokens
    }

    pub(crate) fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    /// Last consumed token
    pub(crate) fn previous(&self) -> Option<&'t Token> {
        self.pos.checked_sub(1).and_then(|idx| self.tokens.get(idx))
    }

    #[allow(clippy::should_implement_trait)]
    pub(crate) fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn at_period(&self) -> bool {
        self.peek().is_some_and(Token::is_period)
    }

    pub(crate) fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(word))
    }

    pub(crate) fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_period(&mut self) -> Option<&'t Token> {
        if self.at_period() {
            self.next()
        } else {
            None
        }
    }

    /// Stop on the next period (or the end)
    pub(crate) fn skip_to_period(&mut self) {
        while !self.at_end() && !self.at_period() {
            self.pos += 1;
        }
    }

    /// Consume through the next period; returns the last token consumed
    pub(crate) fn skip_past_period(&mut self) -> Option<&'t Token> {
        self.skip_to_period();
        self.next().or_else(|| self.previous())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrontendConfig;
    use crate::lexer::Lexer;
    use crate::preprocess::{InMemoryResolver, Preprocessor};

    #[test]
    fn skips_to_and_past_periods() {
        let config = FrontendConfig::default();
        let resolver = InMemoryResolver::new();
        let unit = Preprocessor::new(&config, &resolver)
            .expand("C", None, "       A B. C.\n")
            .unwrap()
            .unit;
        let tokens = Lexer::new(&config).tokenize(&unit).tokens;

        let mut cursor = Cursor::new(&tokens);
        assert_eq!(cursor.peek().map(|t| t.text.as_str()), Some("A"));
        cursor.skip_to_period();
        assert!(cursor.at_period());
        let last = cursor.skip_past_period().unwrap();
        assert!(last.is_period());
        assert_eq!(cursor.peek().map(|t| t.text.as_str()), Some("C"));
        cursor.skip_past_period();
        assert!(cursor.at_end());
    }
}
