//! Hand-written recursive-descent grammar over the token stream.
//!
//! ```text
//! program     := class_decl* "main" "{" var_decl* expr_stmt* "}"
//! class_decl  := "class" ID ("extends" ID)? "{"
//!                    ("static" type ID ";")*
//!                    (type ID ";")*
//!                    method_decl*
//!                "}"
//! method_decl := type ID "(" type ID ")" "{" var_decl* expr_stmt* "}"
//! var_decl    := type ID ";"
//! type        := "nat" | "bool" | ID
//! expr_stmt   := expr ";"
//! ```
//! Expression precedence, low to high: assignment, `&&`, `==`, `instanceof`,
//! `>`, `+ -`, `*`, unary `!`, postfix (`.id`, `.id(arg)`), primary.

use crate::ast::{ClassDecl, Expr, MethodDecl, Program, TypeName, VarDecl};
use super::lexer::{Spanned, Token};

pub struct ParseError {
    pub message: String,
    pub line: u32,
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a, 'src> {
    tokens: &'a [Spanned<'src>],
    pos: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    pub fn new(tokens: &'a [Spanned<'src>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current_line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .map(|t| t.line)
            .or_else(|| self.tokens.last().map(|t| t.line))
            .unwrap_or(1)
    }

    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).map(|t| t.token)
    }

    fn bump(&mut self) -> Option<Token<'src>> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            message: msg.into(),
            line: self.current_line(),
        }
    }

    fn expect(&mut self, want: Token<'src>) -> PResult<()> {
        match self.bump() {
            Some(t) if std::mem::discriminant(&t) == std::mem::discriminant(&want) => Ok(()),
            Some(t) => Err(self.err(format!("expected {want}, found {t}"))),
            None => Err(self.err(format!("expected {want}, found end of input"))),
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s.to_owned()),
            Some(t) => Err(self.err(format!("expected identifier, found {t}"))),
            None => Err(self.err("expected identifier, found end of input")),
        }
    }

    fn eat(&mut self, want: Token<'src>) -> bool {
        match self.peek() {
            Some(t) if std::mem::discriminant(&t) == std::mem::discriminant(&want) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut classes = Vec::new();
        while matches!(self.peek(), Some(Token::Class)) {
            classes.push(self.parse_class_decl()?);
        }
        self.expect(Token::Main)?;
        self.expect(Token::LBrace)?;
        let main_locals = self.parse_var_decls()?;
        let main_body = self.parse_expr_stmts_until_rbrace()?;
        self.expect(Token::RBrace)?;
        if self.peek().is_some() {
            return Err(self.err(format!("unexpected {} after main block", self.peek().unwrap())));
        }
        Ok(Program {
            classes,
            main_locals,
            main_body,
        })
    }

    fn parse_class_decl(&mut self) -> PResult<ClassDecl> {
        self.expect(Token::Class)?;
        let name_line = self.current_line();
        let name = self.expect_ident()?;
        let mut superclass_line = name_line;
        let superclass_name = if self.eat(Token::Extends) {
            superclass_line = self.current_line();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::LBrace)?;

        let mut static_vars = Vec::new();
        while matches!(self.peek(), Some(Token::Static)) {
            self.bump();
            static_vars.push(self.parse_var_decl_tail()?);
        }

        let mut instance_vars = Vec::new();
        while self.looks_like_var_decl() {
            instance_vars.push(self.parse_var_decl()?);
        }

        let mut methods = Vec::new();
        while matches!(self.peek(), Some(Token::Nat | Token::Bool | Token::Ident(_))) {
            methods.push(self.parse_method_decl()?);
        }

        self.expect(Token::RBrace)?;
        Ok(ClassDecl {
            name,
            name_line,
            superclass_name,
            superclass_line,
            static_vars,
            instance_vars,
            methods,
        })
    }

    /// Disambiguates a field declaration (`type ID ;`) from a method
    /// declaration (`type ID ( ... )`) by looking two tokens ahead, without
    /// consuming anything.
    fn looks_like_var_decl(&self) -> bool {
        if !matches!(self.peek(), Some(Token::Nat | Token::Bool | Token::Ident(_))) {
            return false;
        }
        matches!(self.tokens.get(self.pos + 2).map(|t| t.token), Some(Token::Semi))
    }

    fn parse_type(&mut self) -> PResult<(TypeName, u32)> {
        let line = self.current_line();
        match self.bump() {
            Some(Token::Nat) => Ok((TypeName::Nat, line)),
            Some(Token::Bool) => Ok((TypeName::Bool, line)),
            Some(Token::Ident(s)) => Ok((TypeName::Class(s.to_owned()), line)),
            Some(t) => Err(self.err(format!("expected a type, found {t}"))),
            None => Err(self.err("expected a type, found end of input")),
        }
    }

    fn parse_var_decl(&mut self) -> PResult<VarDecl> {
        let (type_name, type_line) = self.parse_type()?;
        self.finish_var_decl(type_name, type_line)
    }

    /// Parses a var decl whose leading `static` keyword was already consumed.
    fn parse_var_decl_tail(&mut self) -> PResult<VarDecl> {
        self.parse_var_decl()
    }

    fn finish_var_decl(&mut self, type_name: TypeName, type_line: u32) -> PResult<VarDecl> {
        let name_line = self.current_line();
        let name = self.expect_ident()?;
        self.expect(Token::Semi)?;
        Ok(VarDecl {
            name,
            name_line,
            type_name,
            type_line,
        })
    }

    fn parse_var_decls(&mut self) -> PResult<Vec<VarDecl>> {
        let mut decls = Vec::new();
        while self.looks_like_var_decl() {
            decls.push(self.parse_var_decl()?);
        }
        Ok(decls)
    }

    fn parse_method_decl(&mut self) -> PResult<MethodDecl> {
        let (return_type, return_type_line) = self.parse_type()?;
        let name_line = self.current_line();
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let (param_type, param_type_line) = self.parse_type()?;
        let param_name_line = self.current_line();
        let param_name = self.expect_ident()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let locals = self.parse_var_decls()?;
        let body = self.parse_expr_stmts_until_rbrace()?;
        self.expect(Token::RBrace)?;
        Ok(MethodDecl {
            name,
            name_line,
            return_type,
            return_type_line,
            param_name,
            param_name_line,
            param_type,
            param_type_line,
            locals,
            body,
        })
    }

    fn parse_expr_stmts_until_rbrace(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        while !matches!(self.peek(), Some(Token::RBrace) | None) {
            exprs.push(self.parse_expr_stmt()?);
        }
        Ok(exprs)
    }

    fn parse_expr_stmt(&mut self) -> PResult<Expr> {
        let e = self.parse_expr()?;
        // `if`/`for` bodies are themselves expressions and are not
        // semicolon-terminated at the statement level they appear in.
        if matches!(e, Expr::If { .. } | Expr::For { .. }) {
            return Ok(e);
        }
        self.expect(Token::Semi)?;
        Ok(e)
    }

    // --- expressions, lowest to highest precedence ---

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let line = self.current_line();
        let lhs = self.parse_and()?;
        if matches!(self.peek(), Some(Token::Assign)) {
            self.bump();
            let value = Box::new(self.parse_assignment()?);
            return match lhs {
                Expr::Id { name, .. } => Ok(Expr::Assign {
                    name,
                    value,
                    line,
                    decoration: None,
                    null_context: None,
                }),
                Expr::DotId { object, name, .. } => Ok(Expr::DotAssign {
                    object,
                    name,
                    value,
                    line,
                    decoration: None,
                    null_context: None,
                }),
                _ => Err(ParseError {
                    message: "left-hand side of `=` must be a variable or field".to_owned(),
                    line,
                }),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            let line = self.current_line();
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::And {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_instanceof()?;
        while matches!(self.peek(), Some(Token::EqEq)) {
            let line = self.current_line();
            self.bump();
            let rhs = self.parse_instanceof()?;
            lhs = Expr::Equality {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
                null_context: None,
            };
        }
        Ok(lhs)
    }

    fn parse_instanceof(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        while matches!(self.peek(), Some(Token::InstanceOf)) {
            let line = self.current_line();
            self.bump();
            let class_name = self.expect_ident()?;
            lhs = Expr::InstanceOf {
                object: Box::new(lhs),
                class_name,
                line,
                class_ref: None,
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        while matches!(self.peek(), Some(Token::Gt)) {
            let line = self.current_line();
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::GreaterThan {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let line = self.current_line();
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Expr::Plus {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        line,
                    };
                }
                Some(Token::Minus) => {
                    self.bump();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Expr::Minus {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::Star)) {
            let line = self.current_line();
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Times {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if matches!(self.peek(), Some(Token::Bang)) {
            let line = self.current_line();
            self.bump();
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::Not { operand, line });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek(), Some(Token::Dot)) {
            let line = self.current_line();
            self.bump();
            let name = self.expect_ident()?;
            if matches!(self.peek(), Some(Token::LParen)) {
                self.bump();
                let arg = Box::new(self.parse_expr()?);
                self.expect(Token::RParen)?;
                expr = Expr::DotMethodCall {
                    object: Box::new(expr),
                    name,
                    arg,
                    line,
                    decoration: None,
                    null_context: None,
                };
            } else {
                expr = Expr::DotId {
                    object: Box::new(expr),
                    name,
                    line,
                    decoration: None,
                };
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let line = self.current_line();
        match self.peek() {
            Some(Token::NatLiteral(s)) => {
                self.bump();
                let value = s
                    .parse::<u32>()
                    .map_err(|_| self.err(format!("nat literal `{s}` out of range")))?;
                Ok(Expr::NatLiteral { value, line })
            }
            Some(Token::True) => {
                self.bump();
                Ok(Expr::True { line })
            }
            Some(Token::False) => {
                self.bump();
                Ok(Expr::False { line })
            }
            Some(Token::Null) => {
                self.bump();
                Ok(Expr::Null { line })
            }
            Some(Token::This) => {
                self.bump();
                Ok(Expr::This { line })
            }
            Some(Token::ReadNat) => {
                self.bump();
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Read { line })
            }
            Some(Token::PrintNat) => {
                self.bump();
                self.expect(Token::LParen)?;
                let operand = Box::new(self.parse_expr()?);
                self.expect(Token::RParen)?;
                Ok(Expr::Print { operand, line })
            }
            Some(Token::New) => {
                self.bump();
                let class_name = self.expect_ident()?;
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::New { class_name, line, class_ref: None })
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::For) => self.parse_for(),
            Some(Token::LParen) => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(s)) => {
                self.bump();
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.bump();
                    let arg = Box::new(self.parse_expr()?);
                    self.expect(Token::RParen)?;
                    Ok(Expr::MethodCall {
                        name: s.to_owned(),
                        arg,
                        line,
                        decoration: None,
                        null_context: None,
                    })
                } else {
                    Ok(Expr::Id {
                        name: s.to_owned(),
                        line,
                        decoration: None,
                    })
                }
            }
            Some(t) => Err(self.err(format!("unexpected {t} in expression"))),
            None => Err(self.err("unexpected end of input in expression")),
        }
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let line = self.current_line();
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let cond = Box::new(self.parse_expr()?);
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let then_branch = self.parse_expr_stmts_until_rbrace()?;
        self.expect(Token::RBrace)?;
        let else_branch = if self.eat(Token::Else) {
            self.expect(Token::LBrace)?;
            let body = self.parse_expr_stmts_until_rbrace()?;
            self.expect(Token::RBrace)?;
            body
        } else {
            Vec::new()
        };
        Ok(Expr::If {
            cond,
            then_branch,
            else_branch,
            line,
            result_type: None,
        })
    }

    fn parse_for(&mut self) -> PResult<Expr> {
        let line = self.current_line();
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;
        let init = Box::new(self.parse_expr()?);
        self.expect(Token::Semi)?;
        let test = Box::new(self.parse_expr()?);
        self.expect(Token::Semi)?;
        let update = Box::new(self.parse_expr()?);
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let body = self.parse_expr_stmts_until_rbrace()?;
        self.expect(Token::RBrace)?;
        Ok(Expr::For {
            init,
            test,
            update,
            body,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::lex;

    fn parse(src: &str) -> Program {
        let tokens = lex(src).expect("lex");
        Parser::new(&tokens).parse_program().unwrap_or_else(|e| panic!("{}: {}", e.line, e.message))
    }

    #[test]
    fn parses_empty_main() {
        let p = parse("main { }");
        assert!(p.classes.is_empty());
        assert!(p.main_body.is_empty());
    }

    #[test]
    fn parses_class_with_fields_and_method() {
        let p = parse(
            "class Wallet {\n\
               static nat total;\n\
               nat balance;\n\
               nat deposit(nat amount) {\n\
                 balance = balance + amount;\n\
               }\n\
             }\n\
             main { }",
        );
        let class = &p.classes[0];
        assert_eq!(class.name, "Wallet");
        assert_eq!(class.static_vars.len(), 1);
        assert_eq!(class.instance_vars.len(), 1);
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "deposit");
    }

    #[test]
    fn parses_inheritance() {
        let p = parse("class Savings extends Wallet { }\nmain { }");
        assert_eq!(p.classes[0].superclass_name.as_deref(), Some("Wallet"));
    }

    #[test]
    fn respects_operator_precedence() {
        let p = parse("main { nat x; x = 1 + 2 * 3; }");
        match &p.main_body[0] {
            Expr::Assign { value, .. } => match value.as_ref() {
                Expr::Plus { rhs, .. } => assert!(matches!(**rhs, Expr::Times { .. })),
                other => panic!("expected Plus, got {other:?}"),
            },
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_for_and_dot_chains() {
        let p = parse(
            "main {\n\
               nat x;\n\
               for (x = 0; x > 0; x = x - 1) {\n\
                 if (x == 0) { printNat(x); } else { printNat(x); }\n\
               }\n\
             }",
        );
        assert!(matches!(p.main_body[0], Expr::For { .. }));
    }

    #[test]
    fn parses_method_call_chains() {
        let p = parse("main { nat x; x = a.b.c(1); }");
        match &p.main_body[0] {
            Expr::Assign { value, .. } => assert!(matches!(**value, Expr::DotMethodCall { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_line_numbers_in_errors() {
        let tokens = lex("main {\n nat x\n}").unwrap();
        let err = Parser::new(&tokens).parse_program().unwrap_err();
        assert_eq!(err.line, 3);
    }
}
