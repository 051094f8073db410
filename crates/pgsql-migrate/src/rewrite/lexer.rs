//! T-SQL lexer producing tokens with byte ranges into the original text.
//!
//! The lexer is lossless: concatenating the text of every token reproduces
//! the input exactly. Whitespace and comments are tokens too.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{MigrateError, Result};

/// Words treated as keywords and never renamed.
///
/// The SQL Server reserved keyword list plus a few non-reserved words that
/// appear in module bodies in keyword position.
const KEYWORDS: &[&str] = &[
    "add", "all", "alter", "and", "any", "apply", "as", "asc", "authorization", "backup", "begin",
    "between", "break", "browse", "bulk", "by", "cascade", "case", "cast", "check", "checkpoint",
    "close", "clustered", "coalesce", "collate", "column", "commit", "compute", "constraint",
    "contains", "containstable", "continue", "convert", "create", "cross", "current",
    "current_date", "current_time", "current_timestamp", "current_user", "cursor", "database",
    "dbcc", "deallocate", "declare", "default", "delete", "deny", "desc", "disk", "distinct",
    "distributed", "double", "drop", "dump", "else", "end", "errlvl", "escape", "except", "exec",
    "execute", "exists", "exit", "external", "fetch", "file", "fillfactor", "for", "foreign",
    "freetext", "freetexttable", "from", "full", "function", "goto", "grant", "group", "having",
    "holdlock", "identity", "identity_insert", "identitycol", "if", "in", "index", "inner",
    "insert", "intersect", "into", "is", "join", "key", "kill", "left", "like", "lineno", "load",
    "merge", "national", "next", "nocheck", "nocount", "nonclustered", "not", "null", "nullif",
    "of", "off", "offset", "offsets", "on", "only", "open", "opendatasource", "openquery",
    "openrowset", "openxml", "option", "or", "order", "outer", "output", "over", "partition",
    "percent", "pivot", "plan", "precision", "primary", "print", "proc", "procedure", "public",
    "raiserror", "read", "readtext", "reconfigure", "references", "replication", "restore",
    "restrict", "return", "returns", "revert", "revoke", "right", "rollback", "rowcount", "rows",
    "rowguidcol", "rule", "save", "schema", "securityaudit", "select", "session_user", "set",
    "setuser", "shutdown", "some", "statistics", "system_user", "table", "tablesample",
    "textsize", "then", "to", "top", "tran", "transaction", "trigger", "truncate", "try_convert",
    "tsequal", "union", "unique", "unpivot", "update", "updatetext", "use", "user", "values",
    "varying", "view", "waitfor", "when", "where", "while", "with", "within", "writetext",
];

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    Keyword,
    /// Unquoted name.
    Identifier,
    /// `[name]`
    BracketIdentifier,
    /// `"name"`
    QuotedIdentifier,
    /// `'text'` or `N'text'`
    StringLiteral,
    NumberLiteral,
    /// `@local` or `@@global`
    Variable,
    /// `#temp` or `##global_temp`
    TempName,
    /// Operators and punctuation, one character each.
    Symbol,
}

/// A lexed token: its kind, text, and half-open byte range in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub range: Range<usize>,
}

impl<'a> Token<'a> {
    /// Whether the token carries no meaning (whitespace or comment).
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Whether the token names an object: plain, bracketed or double-quoted.
    pub fn is_identifier(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::BracketIdentifier | TokenKind::QuotedIdentifier
        )
    }

    /// Whether the token is the given keyword, ignoring case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// The identifier name with quoting removed and escapes resolved.
    pub fn identifier_name(&self) -> Cow<'a, str> {
        match self.kind {
            TokenKind::BracketIdentifier => unescape(self.inner(1), "]]", "]"),
            TokenKind::QuotedIdentifier => unescape(self.inner(1), "\"\"", "\""),
            _ => Cow::Borrowed(self.text),
        }
    }

    /// The value of a string literal with quotes and escapes removed.
    pub fn string_value(&self) -> Cow<'a, str> {
        let text: &'a str = self.text;
        let prefix = if text.starts_with(&['N', 'n'][..]) { 2 } else { 1 };
        unescape(&text[prefix..text.len() - 1], "''", "'")
    }

    fn inner(&self, prefix: usize) -> &'a str {
        let text: &'a str = self.text;
        &text[prefix..text.len() - 1]
    }
}

fn unescape<'a>(s: &'a str, escaped: &str, plain: &str) -> Cow<'a, str> {
    if s.contains(escaped) {
        Cow::Owned(s.replace(escaped, plain))
    } else {
        Cow::Borrowed(s)
    }
}

/// Split T-SQL text into tokens.
///
/// Fails with [`MigrateError::Tokenize`] on an unterminated string, quoted
/// identifier or block comment, and on an empty bracketed identifier.
pub fn tokenize(sql: &str) -> Result<Vec<Token<'_>>> {
    Lexer { sql, pos: 0 }.run()
}

struct Lexer<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token<'a>>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos;
            let kind = self.scan(c)?;
            tokens.push(Token {
                kind,
                text: &self.sql[start..self.pos],
                range: start..self.pos,
            });
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.sql[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn scan(&mut self, c: char) -> Result<TokenKind> {
        match c {
            c if c.is_whitespace() => {
                self.eat_while(char::is_whitespace);
                Ok(TokenKind::Whitespace)
            }
            '-' if self.peek_second() == Some('-') => {
                self.eat_while(|c| c != '\n');
                Ok(TokenKind::LineComment)
            }
            '/' if self.peek_second() == Some('*') => self.block_comment(),
            '\'' => {
                self.delimited('\'', "string literal")?;
                Ok(TokenKind::StringLiteral)
            }
            'N' | 'n' if self.peek_second() == Some('\'') => {
                self.bump();
                self.delimited('\'', "string literal")?;
                Ok(TokenKind::StringLiteral)
            }
            '[' => {
                let start = self.pos;
                self.delimited(']', "bracketed identifier")?;
                if self.pos - start == 2 {
                    return Err(MigrateError::tokenize(start, "empty bracketed identifier"));
                }
                Ok(TokenKind::BracketIdentifier)
            }
            '"' => {
                self.delimited('"', "quoted identifier")?;
                Ok(TokenKind::QuotedIdentifier)
            }
            '@' => {
                self.bump();
                self.eat_while(is_word_char);
                Ok(TokenKind::Variable)
            }
            '#' => {
                self.bump();
                self.eat_while(is_word_char);
                Ok(TokenKind::TempName)
            }
            c if c.is_ascii_digit() => {
                self.number();
                Ok(TokenKind::NumberLiteral)
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = self.pos;
                self.eat_while(is_word_char);
                let word = &self.sql[start..self.pos];
                if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                    Ok(TokenKind::Keyword)
                } else {
                    Ok(TokenKind::Identifier)
                }
            }
            _ => {
                self.bump();
                Ok(TokenKind::Symbol)
            }
        }
    }

    fn block_comment(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            let rest = self.rest();
            if rest.starts_with("/*") {
                depth += 1;
                self.pos += 2;
            } else if rest.starts_with("*/") {
                depth -= 1;
                self.pos += 2;
            } else if self.bump().is_none() {
                return Err(MigrateError::tokenize(start, "unterminated block comment"));
            }
        }
        Ok(TokenKind::BlockComment)
    }

    /// Consume an opening delimiter up to its closing one; a doubled closing
    /// delimiter is an escape.
    fn delimited(&mut self, close: char, what: &str) -> Result<()> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some(c) if c == close => {
                    if self.peek() == Some(close) {
                        self.bump();
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => {
                    return Err(MigrateError::tokenize(start, format!("unterminated {}", what)));
                }
            }
        }
    }

    fn number(&mut self) {
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
            self.eat_while(|c| c.is_ascii_hexdigit());
            return;
        }
        self.eat_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_digits = match self.peek_second() {
                Some('+' | '-') => self.rest().chars().nth(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_digits {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '$' | '#')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        tokenize(sql)
            .unwrap()
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_select() {
        let tokens = kinds("SELECT [Foo].[Bar] AS 'Baz' FROM [Foo]");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "SELECT"),
                (TokenKind::BracketIdentifier, "[Foo]"),
                (TokenKind::Symbol, "."),
                (TokenKind::BracketIdentifier, "[Bar]"),
                (TokenKind::Keyword, "AS"),
                (TokenKind::StringLiteral, "'Baz'"),
                (TokenKind::Keyword, "FROM"),
                (TokenKind::BracketIdentifier, "[Foo]"),
            ]
        );
    }

    #[test]
    fn test_tokens_cover_input() {
        let sql = "select a,\n  b -- trailing\n/* x /* nested */ y */ from t where c = N'it''s' + @p";
        let tokens = tokenize(sql).unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(rebuilt, sql);
        for window in tokens.windows(2) {
            assert_eq!(window[0].range.end, window[1].range.start);
        }
    }

    #[test]
    fn test_escapes() {
        let tokens = tokenize("[a]]b] \"c\"\"d\" 'e''f' N'g'").unwrap();
        let values: Vec<_> = tokens.iter().filter(|t| !t.is_trivia()).collect();
        assert_eq!(values[0].identifier_name(), "a]b");
        assert_eq!(values[1].identifier_name(), "c\"d");
        assert_eq!(values[2].string_value(), "e'f");
        assert_eq!(values[3].string_value(), "g");
    }

    #[test]
    fn test_variables_and_temp_names() {
        let tokens = kinds("@id @@ROWCOUNT #tmp ##shared");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Variable, "@id"),
                (TokenKind::Variable, "@@ROWCOUNT"),
                (TokenKind::TempName, "#tmp"),
                (TokenKind::TempName, "##shared"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1 2.5 3e10 0x1F 4.e");
        assert_eq!(tokens[0], (TokenKind::NumberLiteral, "1"));
        assert_eq!(tokens[1], (TokenKind::NumberLiteral, "2.5"));
        assert_eq!(tokens[2], (TokenKind::NumberLiteral, "3e10"));
        assert_eq!(tokens[3], (TokenKind::NumberLiteral, "0x1F"));
        assert_eq!(tokens[4], (TokenKind::NumberLiteral, "4."));
        assert_eq!(tokens[5], (TokenKind::Identifier, "e"));
    }

    #[test]
    fn test_non_ascii_ranges() {
        let sql = "SELECT 'café' AS [Prénom]";
        let tokens = tokenize(sql).unwrap();
        let ident = tokens.iter().find(|t| t.kind == TokenKind::BracketIdentifier).unwrap();
        assert_eq!(&sql[ident.range.clone()], "[Prénom]");
        assert_eq!(ident.identifier_name(), "Prénom");
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = tokenize("SELECT 'abc").unwrap_err();
        assert!(matches!(err, MigrateError::Tokenize { position: 7, .. }));
    }

    #[test]
    fn test_unterminated_comment_fails() {
        let err = tokenize("/* a /* b */").unwrap_err();
        assert!(matches!(err, MigrateError::Tokenize { position: 0, .. }));
    }

    #[test]
    fn test_unterminated_bracket_fails() {
        assert!(tokenize("SELECT [abc").is_err());
        assert!(tokenize("SELECT []").is_err());
    }

    #[test]
    fn test_keyword_detection_ignores_case() {
        let tokens = tokenize("As").unwrap();
        assert!(tokens[0].is_keyword("AS"));
    }
}
