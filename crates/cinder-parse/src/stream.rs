use std::collections::VecDeque;

use crate::token::{Token, TokenKind};

/// Cursor over the token list. Supports arbitrary lookahead and pushing
/// consumed tokens back onto the front.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(n)
    }

    /// Put `tok` back so it is the next token returned. Tokens pushed back
    /// in reverse order of consumption come out in their original order.
    pub fn push_back(&mut self, tok: Token) {
        self.tokens.push_front(tok);
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushback_restores_order() {
        let mut s = TokenStream::new(vec![
            Token::new(TokenKind::KwInt, "int"),
            Token::new(TokenKind::Ident, "x"),
            Token::new(TokenKind::Semicolon, ";"),
        ]);
        let a = s.next().unwrap();
        let b = s.next().unwrap();
        assert_eq!(s.peek_kind(), Some(TokenKind::Semicolon));
        s.push_back(b);
        s.push_back(a);
        assert_eq!(s.peek_kind(), Some(TokenKind::KwInt));
        assert_eq!(s.peek_nth(1).map(|t| t.text.as_str()), Some("x"));
        assert_eq!(s.count(), 3);
    }
}
