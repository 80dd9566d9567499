//! Lexical analysis, via `logos`.
//!
//! DJ's surface syntax is not part of the specified core (the driver's only
//! contract with the frontend is the tree schema in §3), so this grammar is
//! a straightforward, Java-flavored rendering of it: `class Name [extends
//! Super] { members }`, a distinguished `main { locals exprs }` block,
//! C-style `for`/`if`/`else`, and the operators `+ - * == > && ! = .`.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token<'src> {
    #[token("class")]
    Class,
    #[token("extends")]
    Extends,
    #[token("static")]
    Static,
    #[token("main")]
    Main,
    #[token("nat")]
    Nat,
    #[token("bool")]
    Bool,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("instanceof")]
    InstanceOf,
    #[token("printNat")]
    PrintNat,
    #[token("readNat")]
    ReadNat,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),
    #[regex(r"[0-9]+")]
    NatLiteral(&'src str),

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("&&")]
    AndAnd,
    #[token("!")]
    Bang,
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Class => write!(f, "`class`"),
            Token::Extends => write!(f, "`extends`"),
            Token::Static => write!(f, "`static`"),
            Token::Main => write!(f, "`main`"),
            Token::Nat => write!(f, "`nat`"),
            Token::Bool => write!(f, "`bool`"),
            Token::New => write!(f, "`new`"),
            Token::This => write!(f, "`this`"),
            Token::Null => write!(f, "`null`"),
            Token::True => write!(f, "`true`"),
            Token::False => write!(f, "`false`"),
            Token::If => write!(f, "`if`"),
            Token::Else => write!(f, "`else`"),
            Token::For => write!(f, "`for`"),
            Token::InstanceOf => write!(f, "`instanceof`"),
            Token::PrintNat => write!(f, "`printNat`"),
            Token::ReadNat => write!(f, "`readNat`"),
            Token::Ident(s) => write!(f, "identifier `{s}`"),
            Token::NatLiteral(s) => write!(f, "literal `{s}`"),
            Token::LBrace => write!(f, "`{{`"),
            Token::RBrace => write!(f, "`}}`"),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
            Token::Semi => write!(f, "`;`"),
            Token::Comma => write!(f, "`,`"),
            Token::Dot => write!(f, "`.`"),
            Token::Assign => write!(f, "`=`"),
            Token::EqEq => write!(f, "`==`"),
            Token::Gt => write!(f, "`>`"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Star => write!(f, "`*`"),
            Token::AndAnd => write!(f, "`&&`"),
            Token::Bang => write!(f, "`!`"),
        }
    }
}

/// A token paired with the 1-based source line it starts on.
#[derive(Debug, Clone, Copy)]
pub struct Spanned<'src> {
    pub token: Token<'src>,
    pub line: u32,
}

/// Run the lexer to completion, tracking line numbers by counting `\n`
/// bytes consumed between tokens (including inside skipped whitespace and
/// comments, which `logos` never hands back to us).
pub fn lex(src: &str) -> Result<Vec<Spanned<'_>>, (String, u32)> {
    let mut out = Vec::new();
    let mut lexer = Token::lexer(src);
    let mut line: u32 = 1;
    let mut consumed = 0usize;
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += src[consumed..span.start].matches('\n').count() as u32;
        consumed = span.start;
        match result {
            Ok(token) => out.push(Spanned { token, line }),
            Err(()) => return Err((format!("unrecognized character near byte {}", span.start), line)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_class_header() {
        let toks = lex("class Wallet extends Object {").unwrap();
        assert!(matches!(toks[0].token, Token::Class));
        assert!(matches!(toks[1].token, Token::Ident("Wallet")));
        assert!(matches!(toks[2].token, Token::Extends));
    }

    #[test]
    fn tracks_line_numbers_across_blank_lines() {
        let toks = lex("nat x;\n\n\nnat y;").unwrap();
        let y_line = toks.iter().find_map(|t| match t.token {
            Token::Ident("y") => Some(t.line),
            _ => None,
        });
        assert_eq!(y_line, Some(4));
    }

    #[test]
    fn rejects_stray_symbol() {
        assert!(lex("nat x = 1 $ 2;").is_err());
    }
}
