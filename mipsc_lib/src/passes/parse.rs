//! Syntax analysis: recursive descent over the token stream, producing
//! the typed AST.
//!
//! The parser never gives up: a missing `;`, `)` or `]` is reported
//! (codes `i`, `j`, `k`, at the line of the token *before* the gap)
//! and parsing continues as if the token had been there.

use crate::ast::*;
use crate::diagnostic::{AggregateResult, Code, Diagnostic};
use crate::token::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> AggregateResult<CompUnit> {
    let mut parser = Parser::new(tokens);
    let unit = parser.comp_unit();
    AggregateResult::new(unit, parser.diagnostics)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prev_line: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_line: 1,
            diagnostics: Vec::new(),
        }
    }

    // === token plumbing ===

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind(0) == Some(kind)
    }

    fn line(&self) -> u32 {
        self.peek().map_or(self.prev_line, |t| t.line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if let Some(t) = &token {
            self.prev_line = t.line;
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn report(&mut self, code: Code, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(self.prev_line, code, message));
    }

    fn expect_semicolon(&mut self) {
        if !self.eat(TokenKind::Semicolon) {
            self.report(Code::MissingSemicolon, "expected `;`");
        }
    }

    fn expect_rparen(&mut self) {
        if !self.eat(TokenKind::RParen) {
            self.report(Code::MissingRightParen, "expected `)`");
        }
    }

    fn expect_rbracket(&mut self) {
        if !self.eat(TokenKind::RBracket) {
            self.report(Code::MissingRightBracket, "expected `]`");
        }
    }

    fn expect_ident(&mut self) -> (String, u32) {
        if self.check(TokenKind::Ident) {
            let t = self.advance().unwrap();
            (t.lexeme, t.line)
        } else {
            // Keep going with a placeholder; something upstream was
            // already malformed.
            (String::new(), self.line())
        }
    }

    // === productions ===

    // CompUnit → {Decl} {FuncDef} MainFuncDef
    fn comp_unit(&mut self) -> CompUnit {
        let mut items = Vec::new();
        while let Some(kind) = self.peek_kind(0) {
            match kind {
                TokenKind::Const | TokenKind::Static => items.push(Item::Decl(self.decl())),
                TokenKind::Void => items.push(Item::Func(self.func_def())),
                TokenKind::Int => match self.peek_kind(1) {
                    Some(TokenKind::Main) => items.push(Item::Main(self.main_def())),
                    Some(TokenKind::Ident) if self.peek_kind(2) == Some(TokenKind::LParen) => {
                        items.push(Item::Func(self.func_def()))
                    }
                    _ => items.push(Item::Decl(self.decl())),
                },
                _ => {
                    // Not a start of anything at the top level; skip it
                    // so we cannot loop forever.
                    self.advance();
                }
            }
        }
        CompUnit { items }
    }

    // ConstDecl → 'const' 'int' ConstDef {',' ConstDef} ';'
    // VarDecl   → ['static'] 'int' VarDef {',' VarDef} ';'
    fn decl(&mut self) -> Decl {
        let line = self.line();
        let is_const = self.eat(TokenKind::Const);
        let is_static = !is_const && self.eat(TokenKind::Static);
        self.eat(TokenKind::Int);

        let mut defs = vec![self.var_def(is_const)];
        while self.eat(TokenKind::Comma) {
            defs.push(self.var_def(is_const));
        }
        self.expect_semicolon();
        Decl {
            is_const,
            is_static,
            defs,
            line,
        }
    }

    // VarDef → Ident ['[' ConstExp ']'] ['=' InitVal]
    // ConstDef requires the initializer.
    fn var_def(&mut self, is_const: bool) -> VarDef {
        let (ident, line) = self.expect_ident();
        let array_len = if self.eat(TokenKind::LBracket) {
            let len = self.exp();
            self.expect_rbracket();
            Some(len)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Assign) {
            Some(self.init_val())
        } else if is_const {
            // `const` without `=` is malformed; recover with no init.
            None
        } else {
            None
        };
        VarDef {
            ident,
            array_len,
            init,
            line,
        }
    }

    // InitVal → Exp | '{' [Exp {',' Exp}] '}'
    fn init_val(&mut self) -> InitVal {
        if self.eat(TokenKind::LBrace) {
            let mut values = Vec::new();
            if !self.check(TokenKind::RBrace) {
                values.push(self.exp());
                while self.eat(TokenKind::Comma) {
                    values.push(self.exp());
                }
            }
            self.eat(TokenKind::RBrace);
            InitVal::List(values)
        } else {
            InitVal::Single(self.exp())
        }
    }

    // FuncDef → ('int'|'void') Ident '(' [FuncFParams] ')' Block
    fn func_def(&mut self) -> FuncDef {
        let line = self.line();
        let returns_int = self.eat(TokenKind::Int);
        if !returns_int {
            self.eat(TokenKind::Void);
        }
        let (ident, _) = self.expect_ident();
        self.eat(TokenKind::LParen);
        let mut params = Vec::new();
        if self.check(TokenKind::Int) {
            params.push(self.func_param());
            while self.eat(TokenKind::Comma) {
                params.push(self.func_param());
            }
        }
        self.expect_rparen();
        let body = self.block();
        FuncDef {
            returns_int,
            ident,
            params,
            body,
            line,
        }
    }

    // FuncFParam → 'int' Ident ['[' ']']
    fn func_param(&mut self) -> FuncParam {
        self.eat(TokenKind::Int);
        let (ident, line) = self.expect_ident();
        let is_array = if self.eat(TokenKind::LBracket) {
            self.expect_rbracket();
            true
        } else {
            false
        };
        FuncParam {
            ident,
            is_array,
            line,
        }
    }

    // MainFuncDef → 'int' 'main' '(' ')' Block
    fn main_def(&mut self) -> MainDef {
        let line = self.line();
        self.eat(TokenKind::Int);
        self.eat(TokenKind::Main);
        self.eat(TokenKind::LParen);
        self.expect_rparen();
        let body = self.block();
        MainDef { body, line }
    }

    // Block → '{' {BlockItem} '}'
    fn block(&mut self) -> Block {
        let line = self.line();
        self.eat(TokenKind::LBrace);
        let mut items = Vec::new();
        loop {
            match self.peek_kind(0) {
                None | Some(TokenKind::RBrace) => break,
                Some(TokenKind::Const | TokenKind::Static) => {
                    items.push(BlockItem::Decl(self.decl()))
                }
                Some(TokenKind::Int) => items.push(BlockItem::Decl(self.decl())),
                _ => items.push(BlockItem::Stmt(self.stmt())),
            }
        }
        let end_line = self.line();
        self.eat(TokenKind::RBrace);
        Block {
            items,
            line,
            end_line,
        }
    }

    fn stmt(&mut self) -> Stmt {
        let line = self.line();
        match self.peek_kind(0) {
            Some(TokenKind::LBrace) => Stmt::Block(self.block()),
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::For) => self.for_loop(),
            Some(TokenKind::Break) => {
                self.advance();
                self.expect_semicolon();
                Stmt::Break { line }
            }
            Some(TokenKind::Continue) => {
                self.advance();
                self.expect_semicolon();
                Stmt::Continue { line }
            }
            Some(TokenKind::Return) => {
                self.advance();
                let value = self.starts_exp().then(|| self.exp());
                self.expect_semicolon();
                Stmt::Return { value, line }
            }
            Some(TokenKind::Printf) => self.printf_stmt(),
            Some(TokenKind::Semicolon) => {
                self.advance();
                Stmt::Expr(None)
            }
            _ => {
                if self.lookahead_is_assignment() {
                    let target = self.lval();
                    self.eat(TokenKind::Assign);
                    let value = self.exp();
                    self.expect_semicolon();
                    Stmt::Assign {
                        target,
                        value,
                        line,
                    }
                } else {
                    let expr = self.exp();
                    self.expect_semicolon();
                    Stmt::Expr(Some(expr))
                }
            }
        }
    }

    /// Distinguishes `LVal '=' Exp ';'` from an expression statement by
    /// scanning for a top-level `=` before the statement ends.
    fn lookahead_is_assignment(&self) -> bool {
        let mut depth = 0usize;
        for token in &self.tokens[self.pos..] {
            match token.kind {
                TokenKind::Assign if depth == 0 => return true,
                TokenKind::LBracket | TokenKind::LParen => depth += 1,
                TokenKind::RBracket | TokenKind::RParen => depth = depth.saturating_sub(1),
                TokenKind::Semicolon | TokenKind::LBrace | TokenKind::RBrace => return false,
                _ => {}
            }
        }
        false
    }

    fn if_stmt(&mut self) -> Stmt {
        let line = self.line();
        self.advance(); // 'if'
        self.eat(TokenKind::LParen);
        let cond = self.cond();
        self.expect_rparen();
        let then_branch = Box::new(self.stmt());
        let else_branch = self
            .eat(TokenKind::Else)
            .then(|| Box::new(self.stmt()));
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        }
    }

    // 'for' '(' [ForStmt] ';' [Cond] ';' [ForStmt] ')' Stmt
    fn for_loop(&mut self) -> Stmt {
        let line = self.line();
        self.advance(); // 'for'
        self.eat(TokenKind::LParen);
        let init = (!self.check(TokenKind::Semicolon)).then(|| self.for_stmt());
        self.expect_semicolon();
        let cond = (!self.check(TokenKind::Semicolon)).then(|| self.cond());
        self.expect_semicolon();
        let step = (!self.check(TokenKind::RParen)).then(|| self.for_stmt());
        self.expect_rparen();
        let body = Box::new(self.stmt());
        Stmt::For {
            init,
            cond,
            step,
            body,
            line,
        }
    }

    // ForStmt → LVal '=' Exp {',' LVal '=' Exp}
    fn for_stmt(&mut self) -> ForStmt {
        let line = self.line();
        let mut assigns = Vec::new();
        loop {
            let target = self.lval();
            self.eat(TokenKind::Assign);
            let value = self.exp();
            assigns.push((target, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        ForStmt { assigns, line }
    }

    // 'printf' '(' StrCon {',' Exp} ')' ';'
    fn printf_stmt(&mut self) -> Stmt {
        let line = self.line();
        self.advance(); // 'printf'
        self.eat(TokenKind::LParen);
        let format = if self.check(TokenKind::StrConst) {
            self.advance().unwrap().lexeme
        } else {
            String::from("\"\"")
        };
        let mut args = Vec::new();
        while self.eat(TokenKind::Comma) {
            args.push(self.exp());
        }
        self.expect_rparen();
        self.expect_semicolon();
        Stmt::Printf { format, args, line }
    }

    fn starts_exp(&self) -> bool {
        matches!(
            self.peek_kind(0),
            Some(
                TokenKind::Ident
                    | TokenKind::IntConst
                    | TokenKind::LParen
                    | TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Not
            )
        )
    }

    // === expressions ===

    // Exp / ConstExp → AddExp
    fn exp(&mut self) -> Expr {
        self.add_exp()
    }

    fn add_exp(&mut self) -> Expr {
        let mut lhs = self.mul_exp();
        loop {
            let op = match self.peek_kind(0) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_exp();
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }

    fn mul_exp(&mut self) -> Expr {
        let mut lhs = self.unary_exp();
        loop {
            let op = match self.peek_kind(0) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_exp();
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }

    // UnaryExp → PrimaryExp | Ident '(' [FuncRParams] ')' | UnaryOp UnaryExp
    fn unary_exp(&mut self) -> Expr {
        let op = match self.peek_kind(0) {
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.unary_exp());
            return Expr::Unary { op, operand };
        }

        if self.check(TokenKind::Ident) && self.peek_kind(1) == Some(TokenKind::LParen) {
            let token = self.advance().unwrap();
            self.advance(); // '('
            let mut args = Vec::new();
            if self.starts_exp() {
                args.push(self.exp());
                while self.eat(TokenKind::Comma) {
                    args.push(self.exp());
                }
            }
            self.expect_rparen();
            return Expr::Call {
                ident: token.lexeme,
                args,
                line: token.line,
            };
        }

        self.primary_exp()
    }

    // PrimaryExp → '(' Exp ')' | LVal | Number
    fn primary_exp(&mut self) -> Expr {
        match self.peek_kind(0) {
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.exp();
                self.expect_rparen();
                inner
            }
            Some(TokenKind::IntConst) => {
                let token = self.advance().unwrap();
                Expr::Number(token.lexeme.parse().unwrap_or(0))
            }
            Some(TokenKind::Ident) => Expr::LVal(self.lval()),
            _ => {
                // Malformed expression; produce a neutral value and let
                // the caller continue.
                self.advance();
                Expr::Number(0)
            }
        }
    }

    // LVal → Ident ['[' Exp ']']
    fn lval(&mut self) -> LVal {
        let (ident, line) = self.expect_ident();
        let index = if self.eat(TokenKind::LBracket) {
            let index = self.exp();
            self.expect_rbracket();
            Some(Box::new(index))
        } else {
            None
        };
        LVal { ident, index, line }
    }

    // === conditions (short-circuit tree) ===

    // Cond → LOrExp
    fn cond(&mut self) -> Cond {
        self.lor_exp()
    }

    fn lor_exp(&mut self) -> Cond {
        let mut lhs = self.land_exp();
        while self.eat(TokenKind::OrOr) {
            let rhs = self.land_exp();
            lhs = Cond::Or(Box::new(lhs), Box::new(rhs));
        }
        lhs
    }

    fn land_exp(&mut self) -> Cond {
        let mut lhs = Cond::Expr(self.eq_exp());
        while self.eat(TokenKind::AndAnd) {
            let rhs = Cond::Expr(self.eq_exp());
            lhs = Cond::And(Box::new(lhs), Box::new(rhs));
        }
        lhs
    }

    fn eq_exp(&mut self) -> Expr {
        let mut lhs = self.rel_exp();
        loop {
            let op = match self.peek_kind(0) {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.rel_exp();
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }

    fn rel_exp(&mut self) -> Expr {
        let mut lhs = self.add_exp();
        loop {
            let op = match self.peek_kind(0) {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.add_exp();
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        lhs
    }
}
