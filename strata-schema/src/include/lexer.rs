//! Tokenizer for include spec text.

use logos::Logos;
use smol_str::SmolStr;

/// A byte range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span covering two spans.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A double-quoted identifier, closed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quoted {
    /// `"..."` with `""` unescaped.
    Closed(SmolStr),
    /// Ran to end of input without a closing quote.
    Open,
}

/// Token types for include specs.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    /// Unquoted identifier.
    #[regex(r"[A-Za-z_][A-Za-z0-9_$]*", |lex| SmolStr::new(lex.slice()))]
    Bare(SmolStr),

    /// Quoted identifier.
    #[token("\"", lex_quoted)]
    Quoted(Quoted),

    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("->")]
    Arrow,
}

fn lex_quoted(lex: &mut logos::Lexer<'_, Token>) -> Quoted {
    let rest = lex.remainder();
    let mut value = String::new();
    let mut chars = rest.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '"' {
            value.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            value.push('"');
            continue;
        }
        lex.bump(offset + 1);
        return Quoted::Closed(SmolStr::new(value));
    }

    lex.bump(rest.len());
    Quoted::Open
}

/// A token with its span. `token` is `None` for input no token matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Option<Token>,
    pub span: Span,
}

/// Tokenize a source string.
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        tokens.push(SpannedToken {
            token: result.ok(),
            span: lexer.span().into(),
        });
    }
    tokens
}

/// Check whether `ident` can be written without quotes.
pub fn is_bare(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Option<Token>> {
        tokenize(source).into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("a.{b->c,}"),
            vec![
                Some(Token::Bare("a".into())),
                Some(Token::Dot),
                Some(Token::LBrace),
                Some(Token::Bare("b".into())),
                Some(Token::Arrow),
                Some(Token::Bare("c".into())),
                Some(Token::Comma),
                Some(Token::RBrace),
            ]
        );
    }

    #[test]
    fn test_bare_allows_dollar() {
        assert_eq!(kinds("price$usd"), vec![Some(Token::Bare("price$usd".into()))]);
    }

    #[test]
    fn test_quoted_escape() {
        let tokens = tokenize(r#""say ""hi""" . x"#);
        assert_eq!(
            tokens[0].token,
            Some(Token::Quoted(Quoted::Closed("say \"hi\"".into())))
        );
        assert_eq!(tokens[0].span, Span::new(0, 12));
        assert_eq!(tokens[1].token, Some(Token::Dot));
    }

    #[test]
    fn test_unterminated_quote() {
        let tokens = tokenize(r#"a."open"#);
        assert_eq!(tokens.last().unwrap().token, Some(Token::Quoted(Quoted::Open)));
        assert_eq!(tokens.last().unwrap().span, Span::new(2, 7));
    }

    #[test]
    fn test_unknown_input() {
        assert_eq!(kinds("-"), vec![None]);
    }

    #[test]
    fn test_is_bare() {
        assert!(is_bare("_private"));
        assert!(is_bare("a1$"));
        assert!(!is_bare("1a"));
        assert!(!is_bare("has space"));
        assert!(!is_bare(""));
    }
}
