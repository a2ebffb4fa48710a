use crate::error::{ParseError, ParseResult};
use crate::token::{Token, TokenKind};

/// Split `src` into tokens.
pub fn tokenize(src: &str) -> ParseResult<Vec<Token>> {
    let mut lex = Lexer::new(src);
    let mut tokens = Vec::new();
    while let Some(tok) = lex.next_tok()? {
        tokens.push(tok);
    }
    tracing::debug!(count = tokens.len(), "tokenized source");
    Ok(tokens)
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            // line comment: //
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn token(&mut self, kind: TokenKind, start: usize, len: usize) -> Token {
        self.pos = start + len;
        Token::new(kind, &self.src[start..self.pos])
    }

    fn scan_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if pred(b)) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    pub fn next_tok(&mut self) -> ParseResult<Option<Token>> {
        self.skip_ws_and_comments();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        // identifiers and keywords; the whole word is scanned first so a
        // keyword never matches a prefix of a longer identifier
        if b.is_ascii_alphabetic() {
            let word = self.scan_while(|c| c.is_ascii_alphanumeric() || c == b'_');
            let kind = TokenKind::keyword(word).unwrap_or(TokenKind::Ident);
            return Ok(Some(Token::new(kind, word)));
        }

        if b.is_ascii_digit() {
            let digits = self.scan_while(|c| c.is_ascii_digit());
            if digits.parse::<i64>().is_err() {
                return Err(ParseError::IntegerOverflow {
                    text: digits.to_string(),
                });
            }
            return Ok(Some(Token::new(TokenKind::IntLiteral, digits)));
        }

        // 2-char operators before their 1-char prefixes
        let double = match (b, self.peek2()) {
            (b'<', Some(b'=')) => Some(TokenKind::Le),
            (b'>', Some(b'=')) => Some(TokenKind::Ge),
            (b'=', Some(b'=')) => Some(TokenKind::EqEq),
            (b'!', Some(b'=')) => Some(TokenKind::BangEq),
            (b'&', Some(b'&')) => Some(TokenKind::AndAnd),
            (b'|', Some(b'|')) => Some(TokenKind::OrOr),
            _ => None,
        };
        if let Some(kind) = double {
            return Ok(Some(self.token(kind, start, 2)));
        }

        let single = match b {
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'?' => TokenKind::Question,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'~' => TokenKind::Tilde,
            b'!' => TokenKind::Bang,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'=' => TokenKind::Eq,
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('\u{fffd}');
                return Err(ParseError::UnknownCharacter { ch, offset: start });
            }
        };
        Ok(Some(self.token(single, start, 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keyword_prefix_stays_identifier() {
        let toks = tokenize("integer int0 do done").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "integer");
        assert_eq!(toks[1].kind, TokenKind::Ident);
        assert_eq!(toks[2].kind, TokenKind::KwDo);
        assert_eq!(toks[3].kind, TokenKind::Ident);
    }

    #[test]
    fn two_char_operators_win() {
        use TokenKind::*;
        assert_eq!(
            kinds("<= < == = != ! && || >= >"),
            vec![Le, Lt, EqEq, Eq, BangEq, Bang, AndAnd, OrOr, Ge, Gt]
        );
    }

    #[test]
    fn lone_ampersand_is_rejected() {
        let err = tokenize("a & b").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownCharacter {
                ch: '&',
                offset: 2
            }
        );
    }

    #[test]
    fn line_comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("return 1; // done\n}"), vec![KwReturn, IntLiteral, Semicolon, RBrace]);
    }
}
