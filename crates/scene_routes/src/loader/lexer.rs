//! Tokens of the classic (VRML97 / X3D classic) text encoding.
//!
//! Commas count as whitespace and `#` starts a comment running to the end of the line, which
//! also swallows the `#VRML V2.0 utf8` / `#X3D` header.
use std::ops::Range;

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n,]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,

    #[token("DEF")]
    Def,
    #[token("USE")]
    Use,
    #[token("ROUTE")]
    Route,
    #[token("TO")]
    To,
    #[token("NULL")]
    Null,
    #[token("TRUE")]
    True,
    #[token("FALSE")]
    False,
    #[token("PROTO")]
    Proto,
    #[token("EXTERNPROTO")]
    ExternProto,
    #[token("IS")]
    Is,

    #[regex(r"[+-]?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    #[regex(r"[+-]?0[xX][0-9a-fA-F]+", parse_hex)]
    Int(i64),

    #[regex(r"[+-]?[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[+-]?\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[+-]?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn parse_hex(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    let s = lex.slice();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = i64::from_str_radix(&digits[2..], 16).ok()?;
    Some(if negative { -value } else { value })
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl Token {
    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Int(v) => format!("number {v}"),
            Token::Float(v) => format!("number {v}"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Ident(s) => format!("'{s}'"),
            other => format!("{other:?}"),
        }
    }
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Splits `text` into tokens. `Err` carries the byte offset of the first unrecognised input.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, usize> {
    Token::lexer(text)
        .spanned()
        .map(|(token, span)| match token {
            Ok(token) => Ok(Spanned { token, span }),
            Err(()) => Err(span.start),
        })
        .collect()
}
