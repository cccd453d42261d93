//! Converts script source text to a token stream.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Let,
    Fn,
    Use,
    New,
    If,
    Else,
    True,
    False,
    Null,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semi,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "let" => TokenKind::Let,
        "fn" => TokenKind::Fn,
        "use" => TokenKind::Use,
        "new" => TokenKind::New,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    };
    Some(kind)
}

/// Lex the whole source. The returned stream always ends with `Eof`.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Line comment
        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            // '.' is a decimal point only when a digit follows
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| Error::syntax(line, format!("invalid number '{}'", text)))?;
            tokens.push(Token { kind: TokenKind::Number(n), line });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            let kind = keyword(&text).unwrap_or(TokenKind::Ident(text));
            tokens.push(Token { kind, line });
            continue;
        }

        if c == '"' {
            let start_line = line;
            pos += 1;
            let mut text = String::new();
            loop {
                let Some(&ch) = chars.get(pos) else {
                    return Err(Error::syntax(start_line, "unterminated string literal"));
                };
                pos += 1;
                match ch {
                    '"' => break,
                    '\\' => {
                        let escaped = chars.get(pos).copied();
                        pos += 1;
                        match escaped {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some('"') => text.push('"'),
                            Some('\\') => text.push('\\'),
                            Some(other) => {
                                return Err(Error::syntax(
                                    line,
                                    format!("unknown escape sequence '\\{}'", other),
                                ))
                            }
                            None => {
                                return Err(Error::syntax(start_line, "unterminated string literal"))
                            }
                        }
                    }
                    '\n' => {
                        line += 1;
                        text.push('\n');
                    }
                    other => text.push(other),
                }
            }
            tokens.push(Token { kind: TokenKind::Str(text), line: start_line });
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (kind, width) = match (c, next) {
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (';', _) => (TokenKind::Semi, 1),
            ('=', _) => (TokenKind::Assign, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            (other, _) => {
                return Err(Error::syntax(line, format!("unexpected character '{}'", other)));
            }
        };
        tokens.push(Token { kind, line });
        pos += width;
    }

    tokens.push(Token { kind: TokenKind::Eof, line });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            kinds("let x = 4.5;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".to_string()),
                TokenKind::Assign,
                TokenKind::Number(4.5),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a <= b && c != d"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Le,
                TokenKind::Ident("b".to_string()),
                TokenKind::AndAnd,
                TokenKind::Ident("c".to_string()),
                TokenKind::NotEq,
                TokenKind::Ident("d".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\"b\"""#),
            vec![TokenKind::Str("a\n\"b\"".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("// header\nx\n  y").unwrap();
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("a # b").is_err());
    }
}
