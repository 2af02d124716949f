//! Recursive-descent parser for include specs.
//!
//! ```text
//! spec     := ident ( '.' subspec )?
//! subspec  := ident ( '->' ident )? ( '.' subspec )? | '{' spec ( ',' spec )* ','? '}'
//! ```
//!
//! Only a relation reached directly after a dot can be renamed. The root
//! table and the head of each group element are plain identifiers.

use smol_str::SmolStr;

use super::lexer::{Quoted, Span, SpannedToken, Token, tokenize};
use super::spec::{IncludeMap, IncludeRelation, IncludeSpec};
use crate::error::{IncludeSpecErrorKind as Kind, SchemaError, SchemaResult};

type ParseResult<T> = Result<T, (Kind, Span)>;

/// Parse include spec text into its canonical tree.
pub fn parse(source: &str) -> SchemaResult<IncludeSpec> {
    let mut parser = Parser {
        source,
        tokens: tokenize(source),
        pos: 0,
    };
    parser
        .spec()
        .map_err(|(kind, span)| SchemaError::include_syntax(source, span.start, span.end, kind))
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, token: &Token) -> bool {
        matches!(self.peek(), Some(SpannedToken { token: Some(t), .. }) if t == token)
    }

    fn bump(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> Option<Span> {
        if self.peek_is(token) {
            self.bump().map(|t| t.span)
        } else {
            None
        }
    }

    fn end(&self) -> Span {
        Span::new(self.source.len(), self.source.len())
    }

    fn spec(&mut self) -> ParseResult<IncludeSpec> {
        let Some(first) = self.peek() else {
            return Err((Kind::Empty, Span::new(0, self.source.len())));
        };
        let first_span = first.span;

        let table = match self.ident() {
            Ok(table) => table,
            Err((Kind::ExpectedIdentifier, _)) => return Err((Kind::InvalidStart, first_span)),
            Err(err) => return Err(err),
        };

        if let Some(arrow) = self.eat(&Token::Arrow) {
            return Err((Kind::MisplacedRename, arrow));
        }

        let relations = match self.eat(&Token::Dot) {
            Some(dot) => self.subspec(dot)?,
            None => IncludeMap::new(),
        };

        if let Some(extra) = self.peek() {
            return Err((Kind::TrailingInput, extra.span.merge(self.end())));
        }

        Ok(IncludeSpec { table, relations })
    }

    fn ident(&mut self) -> ParseResult<SmolStr> {
        let Some(token) = self.peek() else {
            return Err((Kind::ExpectedIdentifier, self.end()));
        };
        let span = token.span;

        let ident = match &token.token {
            Some(Token::Bare(name)) => name.clone(),
            Some(Token::Quoted(Quoted::Closed(name))) => name.clone(),
            Some(Token::Quoted(Quoted::Open)) => return Err((Kind::UnterminatedQuote, span)),
            _ => return Err((Kind::ExpectedIdentifier, span)),
        };
        self.pos += 1;
        Ok(ident)
    }

    fn subspec(&mut self, dot: Span) -> ParseResult<IncludeMap> {
        if self.peek_is(&Token::LBrace) {
            return self.group();
        }

        match self.peek() {
            None => Err((Kind::DanglingDot, dot)),
            Some(SpannedToken {
                token: Some(Token::Bare(_) | Token::Quoted(_)),
                ..
            }) => {
                let (alias, relation) = self.element(true)?;
                let mut map = IncludeMap::new();
                map.insert(alias, relation);
                Ok(map)
            }
            Some(other) => Err((Kind::DanglingDot, dot.merge(other.span))),
        }
    }

    fn element(&mut self, renamable: bool) -> ParseResult<(SmolStr, IncludeRelation)> {
        let relation = self.ident()?;

        let alias = match self.eat(&Token::Arrow) {
            Some(arrow) if !renamable => return Err((Kind::MisplacedRename, arrow)),
            Some(_) => self.ident()?,
            None => relation.clone(),
        };

        if let Some(arrow) = self.eat(&Token::Arrow) {
            return Err((Kind::MisplacedRename, arrow));
        }

        let children = match self.eat(&Token::Dot) {
            Some(dot) => self.subspec(dot)?,
            None => IncludeMap::new(),
        };

        Ok((alias, IncludeRelation::new(relation, children)))
    }

    fn group(&mut self) -> ParseResult<IncludeMap> {
        let Some(open) = self.eat(&Token::LBrace) else {
            return Err((Kind::ExpectedIdentifier, self.end()));
        };
        let mut map = IncludeMap::new();

        loop {
            if let Some(close) = self.eat(&Token::RBrace) {
                if map.is_empty() {
                    return Err((Kind::EmptyGroup, open.merge(close)));
                }
                return Ok(map);
            }
            let Some(start) = self.peek().map(|t| t.span) else {
                return Err((Kind::UnterminatedGroup, open.merge(self.end())));
            };

            let (alias, relation) = self.element(false)?;
            if map.contains(&alias) {
                let end = self.tokens[self.pos - 1].span;
                return Err((Kind::DuplicateRelation(alias.to_string()), start.merge(end)));
            }
            map.insert(alias, relation);

            if self.eat(&Token::Comma).is_some() || self.peek_is(&Token::RBrace) {
                continue;
            }
            let span = match self.peek() {
                Some(token) => token.span,
                None => open.merge(self.end()),
            };
            return Err((Kind::UnterminatedGroup, span));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind_of(source: &str) -> Kind {
        parse(source)
            .unwrap_err()
            .include_error_kind()
            .cloned()
            .expect("include syntax error")
    }

    fn p(source: &str) -> IncludeSpec {
        parse(source).unwrap()
    }

    #[test]
    fn test_root_only() {
        let spec = p("posts");
        assert_eq!(spec.table, "posts");
        assert!(spec.relations.is_empty());
    }

    #[test]
    fn test_dotted_chain() {
        let spec = p("posts.Author.Profile");
        let author = spec.relations.get("Author").unwrap();
        assert_eq!(author.relation, "Author");
        assert!(author.children.contains("Profile"));
    }

    #[test]
    fn test_canonical_equivalences() {
        assert_eq!(p("a.{b}"), p("a.b"));
        assert_eq!(p("a.x->x"), p("a.x"));
        assert_eq!(p("a.{b,}"), p("a.b"));
        assert_eq!(p(" a . b "), p("a.b"));
        assert_eq!(p("a.{c, b}"), p("a.{b, c}"));
        assert_eq!(p(r#""a"."b""#), p("a.b"));
    }

    #[test]
    fn test_rename() {
        let spec = p("posts.Author->writer.Profile");
        let writer = spec.relations.get("writer").unwrap();
        assert_eq!(writer.relation, "Author");
        assert!(writer.children.contains("Profile"));
        assert!(!spec.relations.contains("Author"));
    }

    #[test]
    fn test_rename_inside_group_element() {
        let spec = p("posts.{Author.Profile->bio, Comments}");
        assert_eq!(spec.relations.len(), 2);
        let author = spec.relations.get("Author").unwrap();
        assert_eq!(author.children.get("bio").unwrap().relation, "Profile");
    }

    #[test]
    fn test_empty_quoted_identifier() {
        let spec = p(r#"a.{"", b}"#);
        assert_eq!(spec.relations.get("").unwrap().relation, "");
        assert_eq!(spec.to_string(), r#"a.{"", b}"#);
    }

    #[test]
    fn test_nested_groups() {
        let spec = p("users.{Posts.{Comments, Tags,}, Profile}");
        let posts = spec.relations.get("Posts").unwrap();
        assert_eq!(posts.children.len(), 2);
        assert!(spec.relations.contains("Profile"));
    }

    #[test]
    fn test_round_trip() {
        for text in [
            "posts",
            "posts.Author",
            "posts.Author->writer.{Profile, Posts.Comments->notes}",
            r#""odd table".{"with ""quote""", plain}"#,
            "users.{Posts.{Comments.Author, Tags}, Profile}",
        ] {
            let first = p(text);
            let printed = first.to_string();
            assert_eq!(p(&printed), first, "round trip through `{}`", printed);
        }
    }

    #[test]
    fn test_error_empty() {
        assert_eq!(kind_of(""), Kind::Empty);
        assert_eq!(kind_of("   \n"), Kind::Empty);
    }

    #[test]
    fn test_error_invalid_start() {
        assert_eq!(kind_of(".a"), Kind::InvalidStart);
        assert_eq!(kind_of("{a}"), Kind::InvalidStart);
        assert_eq!(kind_of("1abc"), Kind::InvalidStart);
    }

    #[test]
    fn test_error_trailing_input() {
        assert_eq!(kind_of("a b"), Kind::TrailingInput);
        assert_eq!(kind_of("a.b }"), Kind::TrailingInput);
    }

    #[test]
    fn test_error_dangling_dot() {
        assert_eq!(kind_of("a."), Kind::DanglingDot);
        assert_eq!(kind_of("a.b."), Kind::DanglingDot);
        assert_eq!(kind_of("a.,"), Kind::DanglingDot);
    }

    #[test]
    fn test_error_groups() {
        assert_eq!(kind_of("a.{}"), Kind::EmptyGroup);
        assert_eq!(kind_of("a.{b"), Kind::UnterminatedGroup);
        assert_eq!(kind_of("a.{b,"), Kind::UnterminatedGroup);
        assert_eq!(kind_of("a.{b c}"), Kind::UnterminatedGroup);
    }

    #[test]
    fn test_error_unterminated_quote() {
        assert_eq!(kind_of(r#"a."b"#), Kind::UnterminatedQuote);
        assert_eq!(kind_of(r#""a"#), Kind::UnterminatedQuote);
    }

    #[test]
    fn test_error_misplaced_rename() {
        assert_eq!(kind_of("a->b"), Kind::MisplacedRename);
        assert_eq!(kind_of("a.b->c->d"), Kind::MisplacedRename);
        assert_eq!(kind_of("a.{b->c}"), Kind::MisplacedRename);
        assert_eq!(kind_of("a.{b, c.d, e->f}"), Kind::MisplacedRename);
    }

    #[test]
    fn test_error_duplicate_in_group() {
        assert_eq!(
            kind_of("a.{b, b.c}"),
            Kind::DuplicateRelation("b".to_string())
        );
    }

    #[test]
    fn test_error_span_points_at_token() {
        match parse("posts.Author }").unwrap_err() {
            SchemaError::IncludeSyntax { span, .. } => assert_eq!(span.offset(), 13),
            other => panic!("unexpected error: {other}"),
        }
    }
}
