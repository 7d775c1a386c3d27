// Recursive-descent parser over the token stream from `lexer.rs`, building
// the `ast::Program` the analyzer consumes. Like the lexer, this is the
// thin external-collaborator surface spec.md §1 excludes from the core's
// specification; only the tree shape it must produce (spec.md §6) is
// load-bearing.

use crate::ast::{ArithOp, BoolOp, Block, Expr, Function, Item, RelOp, Stmt, UnOp};
use crate::error::{CompileError, Result};
use crate::lexer::{self, Token};
use crate::types::Type;

pub fn parse(src: &str) -> Result<crate::ast::Program> {
    let tokens = lexer::tokenize(src).map_err(|e| CompileError::Parse(e.0))?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.parse_block_items()?;
    parser.expect(&Token::Eof)?;
    Ok(Block::new(program))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<Token> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(CompileError::Parse(format!("expected {expected}, found {}", self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(CompileError::Parse(format!("expected identifier, found {other}"))),
        }
    }

    fn peek_type(&self) -> Option<Type> {
        match self.peek() {
            Token::KwEntier => Some(Type::Integer),
            Token::KwBooleen => Some(Type::Boolean),
            _ => None,
        }
    }

    fn parse_type(&mut self) -> Result<Type> {
        match self.advance() {
            Token::KwEntier => Ok(Type::Integer),
            Token::KwBooleen => Ok(Type::Boolean),
            other => Err(CompileError::Parse(format!("expected a type, found {other}"))),
        }
    }

    /// True if the parser is positioned at a function definition rather
    /// than a declaration statement: both start with a type keyword, so
    /// this looks past `type IDENT` for a following `(`.
    fn at_function_def(&self) -> bool {
        if self.peek_type().is_none() {
            return false;
        }
        matches!(self.tokens.get(self.pos + 1), Some(Token::Ident(_)))
            && matches!(self.tokens.get(self.pos + 2), Some(Token::LParen))
    }

    fn parse_block_items(&mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Token::Eof | Token::RBrace => break,
                _ if self.at_function_def() => items.push(Item::Function(self.parse_function()?)),
                _ => items.push(Item::Stmt(self.parse_stmt()?)),
            }
        }
        Ok(items)
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(&Token::LBrace)?;
        let items = self.parse_block_items()?;
        self.expect(&Token::RBrace)?;
        Ok(Block::new(items))
    }

    fn parse_function(&mut self) -> Result<Function> {
        let return_type = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() != &Token::RParen {
            loop {
                let ty = self.parse_type()?;
                let name = self.expect_ident()?;
                params.push((name, ty));
                if self.peek() == &Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Function { name, return_type, params, body })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Token::KwSi => self.parse_if(),
            Token::KwTantque => self.parse_while(),
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::KwRetourner => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Return(expr))
            }
            _ if self.peek_type().is_some() => self.parse_decl(),
            Token::Ident(_) if matches!(self.tokens.get(self.pos + 1), Some(Token::Assign)) => self.parse_assign(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_decl(&mut self) -> Result<Stmt> {
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        let init = if self.peek() == &Token::Assign {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&Token::Semi)?;
        Ok(Stmt::Decl { ty, name, init })
    }

    fn parse_assign(&mut self) -> Result<Stmt> {
        let name = self.expect_ident()?;
        self.expect(&Token::Assign)?;
        let value = self.parse_expr()?;
        self.expect(&Token::Semi)?;
        Ok(Stmt::Assign { name, value })
    }

    /// Handles `sinon si ...` chains uniformly: the else arm is parsed as
    /// one ordinary statement, which recurses back into `parse_if` when
    /// the next token is `si`, rather than being unwrapped specially.
    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(&Token::KwSi)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.peek() == &Token::KwSinon {
            self.advance();
            let stmt = if self.peek() == &Token::KwSi { self.parse_if()? } else { Stmt::Block(self.parse_block()?) };
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.expect(&Token::KwTantque)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_ou()
    }

    fn parse_ou(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_et()?;
        while self.peek() == &Token::KwOu {
            self.advance();
            let rhs = self.parse_et()?;
            lhs = Expr::Logic(BoolOp::Ou, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_et(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_rel()?;
        while self.peek() == &Token::KwEt {
            self.advance();
            let rhs = self.parse_rel()?;
            lhs = Expr::Logic(BoolOp::Et, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Token::Eq => RelOp::Eq,
            Token::Ne => RelOp::Ne,
            Token::Lt => RelOp::Lt,
            Token::Le => RelOp::Le,
            Token::Gt => RelOp::Gt,
            Token::Ge => RelOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::Rel(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Percent => ArithOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::KwNon => {
                self.advance();
                Ok(Expr::Unary(UnOp::Non, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Entier(v) => Ok(Expr::Int(v)),
            Token::Booleen(v) => Ok(Expr::Bool(v)),
            Token::LParen => {
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.peek() == &Token::Comma {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(CompileError::Parse(format!("unexpected token in expression: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_function_and_a_call() {
        let program = parse("entier f(entier n) { retourner n + 1; } ecrire(f(10));").unwrap();
        let (stmts, funcs) = program.partition();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "f");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn parses_sinon_si_chain() {
        let program = parse("si (Vrai) { } sinon si (Faux) { } sinon { }").unwrap();
        let (stmts, _) = program.partition();
        let Stmt::If { else_branch, .. } = stmts[0] else {
            panic!("expected an if statement");
        };
        let else_stmt = else_branch.as_ref().expect("sinon si arm");
        assert!(matches!(**else_stmt, Stmt::If { .. }));
    }

    #[test]
    fn parses_declaration_and_while_loop() {
        let program = parse("entier x = 0; tantque (x < 10) { x = x + 1; }").unwrap();
        let (stmts, _) = program.partition();
        assert!(matches!(stmts[0], Stmt::Decl { .. }));
        assert!(matches!(stmts[1], Stmt::While { .. }));
    }
}
