pub mod ast;

use std::collections::HashSet;

use crate::builtins::Builtin;
use crate::diagnostics::CompileError;
use crate::lexer::token::Token;
use crate::span::{Span, Spanned};
use ast::*;

/// Recursive-descent parser over the token stream produced by [`crate::lexer::lex`].
///
/// Newlines and `:` separate statements. A bare integer at the start of a
/// statement is a line label.
pub struct Parser<'a> {
    tokens: &'a [Spanned<Token>],
    source: &'a str,
    pos: usize,
    /// Names of top-level FUNCTION/SUB declarations, so `f(x)` can be told
    /// apart from an array element before semantic analysis.
    proc_names: HashSet<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned<Token>], source: &'a str) -> Self {
        Self { tokens, source, pos: 0, proc_names: HashSet::new() }
    }

    fn peek(&self) -> Option<&'a Spanned<Token>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Spanned<Token>> {
        self.tokens.get(self.pos + offset)
    }

    fn check(&self, expected: &Token) -> bool {
        self.check_at(0, expected)
    }

    fn check_at(&self, offset: usize, expected: &Token) -> bool {
        matches!(self.peek_at(offset), Some(tok) if std::mem::discriminant(&tok.node) == std::mem::discriminant(expected))
    }

    fn advance(&mut self) -> Option<&'a Spanned<Token>> {
        if self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    /// Consume `expected` if it is next.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        match self.tokens.get(self.pos) {
            Some(tok) if std::mem::discriminant(&tok.node) == std::mem::discriminant(expected) => {
                self.pos += 1;
                Ok(tok.span)
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected '{expected}', found {}", tok.node.describe()),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                format!("expected '{expected}', found end of file"),
                self.eof_span(),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, CompileError> {
        match self.tokens.get(self.pos) {
            Some(tok) if matches!(tok.node, Token::Ident) => {
                let name = self.text(tok.span).to_string();
                self.pos += 1;
                Ok(Spanned::new(name, tok.span))
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected identifier, found {}", tok.node.describe()),
                tok.span,
            )),
            None => Err(CompileError::syntax("expected identifier, found end of file", self.eof_span())),
        }
    }

    fn expect_int(&mut self) -> Result<Spanned<i64>, CompileError> {
        match self.tokens.get(self.pos) {
            Some(Spanned { node: Token::IntLit(n), span }) => {
                let (n, span) = (*n, *span);
                self.pos += 1;
                Ok(Spanned::new(n, span))
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected line number, found {}", tok.node.describe()),
                tok.span,
            )),
            None => Err(CompileError::syntax("expected line number, found end of file", self.eof_span())),
        }
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    fn eof_span(&self) -> Span {
        if let Some(last) = self.tokens.last() {
            Span::new(last.span.end, last.span.end)
        } else {
            Span::dummy()
        }
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    /// End of the last consumed token.
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(tok) => matches!(tok.node, Token::Newline | Token::Colon | Token::Else),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(t) if matches!(t.node, Token::Newline | Token::Colon)) {
            self.pos += 1;
        }
    }

    fn expect_statement_end(&mut self) -> Result<(), CompileError> {
        if self.at_statement_end() {
            Ok(())
        } else {
            let tok = &self.tokens[self.pos];
            Err(CompileError::syntax(
                format!("expected end of statement, found {}", tok.node.describe()),
                tok.span,
            ))
        }
    }

    /// `END <tok>` is next.
    fn at_end_of(&self, tok: &Token) -> bool {
        self.check(&Token::End) && self.check_at(1, tok)
    }

    fn pre_scan_proc_names(&mut self) {
        let mut in_class = false;
        let mut i = 0;
        while i + 1 < self.tokens.len() {
            let tok = &self.tokens[i].node;
            let at_line_start = i == 0 || matches!(self.tokens[i - 1].node, Token::Newline | Token::Colon);
            match tok {
                Token::Class | Token::Type if at_line_start => in_class = true,
                Token::End if matches!(self.tokens[i + 1].node, Token::Class | Token::Type) => in_class = false,
                Token::Function | Token::Sub if at_line_start && !in_class => {
                    if matches!(self.tokens[i + 1].node, Token::Ident) {
                        self.proc_names.insert(self.text(self.tokens[i + 1].span).to_string());
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        self.pre_scan_proc_names();
        let mut program = Program::default();

        loop {
            self.skip_separators();
            let Some(tok) = self.peek() else { break };
            match tok.node {
                Token::Function | Token::Sub => {
                    let proc = self.parse_proc()?;
                    program.procs.push(proc);
                }
                Token::Class | Token::Type => {
                    let class = self.parse_class()?;
                    program.classes.push(class);
                }
                _ => {
                    let stmt = self.parse_labeled_or_stmt()?;
                    program.main.push(stmt);
                }
            }
        }

        tracing::debug!(
            target: "ilc::parse",
            procs = program.procs.len(),
            classes = program.classes.len(),
            stmts = program.main.len(),
            "parsed"
        );
        Ok(program)
    }

    /// A label is a statement of its own and needs no separator after it.
    fn parse_labeled_or_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        if let Some(Spanned { node: Token::IntLit(n), span }) = self.peek() {
            let (n, span) = (*n, *span);
            self.advance();
            return Ok(Spanned::new(Stmt::Label(n), span));
        }
        let stmt = self.parse_stmt()?;
        self.expect_statement_end()?;
        Ok(stmt)
    }

    fn parse_block(&mut self, stop: fn(&Parser<'a>) -> bool) -> Result<Vec<Spanned<Stmt>>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() || stop(self) {
                return Ok(stmts);
            }
            if matches!(self.peek().map(|t| &t.node), Some(Token::Function | Token::Sub)) {
                return Err(CompileError::syntax(
                    "procedures must be declared at the top level",
                    self.current_span(),
                ));
            }
            stmts.push(self.parse_labeled_or_stmt()?);
        }
    }

    // ── declarations ─────────────────────────────────────────────────

    fn parse_type_name(&mut self) -> Result<TypeName, CompileError> {
        let Some(tok) = self.advance() else {
            return Err(CompileError::syntax("expected type name, found end of file", self.eof_span()));
        };
        let span = tok.span;
        match tok.node {
            Token::Integer | Token::Long | Token::Boolean => Ok(TypeName::Int),
            Token::Double | Token::Single => Ok(TypeName::Float),
            Token::StringKw => Ok(TypeName::Str),
            Token::Ident => Ok(TypeName::Class(self.text(span).to_string())),
            ref other => Err(CompileError::syntax(
                format!("expected type name, found {}", other.describe()),
                span,
            )),
        }
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        if !self.eat(&Token::LParen) {
            return Ok(params);
        }
        while !self.check(&Token::RParen) {
            if !params.is_empty() {
                self.expect(&Token::Comma)?;
            }
            let explicit_ref = if self.eat(&Token::ByRef) {
                true
            } else {
                self.eat(&Token::ByVal);
                false
            };
            let name = self.expect_ident()?;
            let is_array = if self.check(&Token::LParen) && self.check_at(1, &Token::RParen) {
                self.pos += 2;
                true
            } else {
                false
            };
            let ty = if self.eat(&Token::As) {
                self.parse_type_name()?
            } else {
                TypeName::from_suffix(&name.node)
            };
            params.push(Param { name, ty, is_array, by_ref: explicit_ref || is_array });
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_proc(&mut self) -> Result<Spanned<Proc>, CompileError> {
        let start = self.current_span().start;
        let kind = if self.eat(&Token::Function) {
            ProcKind::Function
        } else {
            self.expect(&Token::Sub)?;
            ProcKind::Sub
        };

        // `SUB NEW` is a class constructor.
        let name = if kind == ProcKind::Sub && self.check(&Token::New) {
            let span = self.expect(&Token::New)?;
            Spanned::new("NEW".to_string(), span)
        } else {
            self.expect_ident()?
        };

        let params = self.parse_params()?;
        let ret = match kind {
            ProcKind::Function if self.eat(&Token::As) => Some(self.parse_type_name()?),
            ProcKind::Function => Some(TypeName::from_suffix(&name.node)),
            ProcKind::Sub => None,
        };
        let header_end = self.prev_end();
        self.expect_statement_end()?;

        let body = match kind {
            ProcKind::Function => self.parse_block(|p| p.at_end_of(&Token::Function))?,
            ProcKind::Sub => self.parse_block(|p| p.at_end_of(&Token::Sub))?,
        };

        let end_start = self.current_span().start;
        self.expect(&Token::End).map_err(|_| {
            CompileError::syntax(format!("missing END {kind} for '{}'", name.node), name.span)
        })?;
        match kind {
            ProcKind::Function => self.expect(&Token::Function)?,
            ProcKind::Sub => self.expect(&Token::Sub)?,
        };
        let end_span = Span::new(end_start, self.prev_end());

        Ok(Spanned::new(
            Proc { kind, name, params, ret, body, end_span: Some(end_span) },
            Span::new(start, header_end),
        ))
    }

    fn parse_class(&mut self) -> Result<Spanned<ClassDecl>, CompileError> {
        let start = self.current_span().start;
        let is_record = if self.eat(&Token::Type) {
            true
        } else {
            self.expect(&Token::Class)?;
            false
        };
        let name = self.expect_ident()?;
        let header_end = self.prev_end();
        self.expect_statement_end()?;

        let closer = if is_record { Token::Type } else { Token::Class };
        let mut decl = ClassDecl {
            name,
            is_record,
            fields: Vec::new(),
            ctor: None,
            dtor: None,
            methods: Vec::new(),
        };

        loop {
            self.skip_separators();
            if self.at_end_of(&closer) {
                self.pos += 2;
                break;
            }
            let Some(tok) = self.peek() else {
                return Err(CompileError::syntax(
                    format!("missing END {closer} for '{}'", decl.name.node),
                    decl.name.span,
                ));
            };
            match tok.node {
                Token::Ident => {
                    let field = self.expect_ident()?;
                    let ty = if self.eat(&Token::As) {
                        self.parse_type_name()?
                    } else {
                        TypeName::from_suffix(&field.node)
                    };
                    self.expect_statement_end()?;
                    decl.fields.push(FieldDecl { name: field, ty });
                }
                Token::Function | Token::Sub if !is_record => {
                    let proc = self.parse_proc()?;
                    let upper = proc.node.name.node.to_ascii_uppercase();
                    if proc.node.kind == ProcKind::Sub && upper == "NEW" {
                        decl.ctor = Some(proc);
                    } else if proc.node.kind == ProcKind::Sub && upper == "DESTROY" {
                        decl.dtor = Some(proc);
                    } else {
                        decl.methods.push(proc);
                    }
                }
                ref other => {
                    let what = if is_record { "TYPE" } else { "CLASS" };
                    return Err(CompileError::syntax(
                        format!("unexpected {} in {what} body", other.describe()),
                        tok.span,
                    ));
                }
            }
        }

        Ok(Spanned::new(decl, Span::new(start, header_end)))
    }

    // ── statements ───────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let Some(tok) = self.peek() else {
            return Err(CompileError::syntax("expected statement, found end of file", self.eof_span()));
        };
        let start = tok.span.start;
        let stmt = match tok.node {
            Token::Print => self.parse_print()?,
            Token::Let => {
                self.advance();
                self.parse_assign_or_call()?
            }
            Token::Ident | Token::Me => self.parse_assign_or_call()?,
            Token::Call => {
                self.advance();
                let target = self.parse_postfix()?;
                match target.node {
                    Expr::Call { .. } | Expr::MethodCall { .. } => Stmt::Call(target),
                    Expr::Var(name) => Stmt::Call(Spanned::new(
                        Expr::Call { name: Spanned::new(name, target.span), args: Vec::new() },
                        target.span,
                    )),
                    _ => return Err(CompileError::syntax("CALL expects a procedure", target.span)),
                }
            }
            Token::Dim => self.parse_dim()?,
            Token::Redim => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(&Token::LParen)?;
                let size = self.parse_expr(0)?;
                self.expect(&Token::RParen)?;
                Stmt::ReDim { name, size }
            }
            Token::If => self.parse_if()?,
            Token::Select => self.parse_select()?,
            Token::While => {
                self.advance();
                let cond = self.parse_expr(0)?;
                let body = self.parse_block(|p| p.check(&Token::Wend) || p.at_end_of(&Token::While))?;
                if !self.eat(&Token::Wend) {
                    self.expect(&Token::End).map_err(|_| CompileError::syntax("missing WEND", Span::new(start, start + 5)))?;
                    self.expect(&Token::While)?;
                }
                Stmt::While { cond, body }
            }
            Token::Do => self.parse_do()?,
            Token::For => self.parse_for()?,
            Token::Next => {
                self.advance();
                let var = if self.check(&Token::Ident) { Some(self.expect_ident()?) } else { None };
                Stmt::Next { var }
            }
            Token::Exit => {
                self.advance();
                let Some(what) = self.advance() else {
                    return Err(CompileError::syntax("EXIT expects FOR, WHILE, DO, FUNCTION or SUB", self.eof_span()));
                };
                let kind = match what.node {
                    Token::For => ExitKind::For,
                    Token::While => ExitKind::While,
                    Token::Do => ExitKind::Do,
                    Token::Function => ExitKind::Function,
                    Token::Sub => ExitKind::Sub,
                    ref other => {
                        return Err(CompileError::syntax(
                            format!("EXIT expects FOR, WHILE, DO, FUNCTION or SUB, found {}", other.describe()),
                            what.span,
                        ));
                    }
                };
                Stmt::Exit(kind)
            }
            Token::Goto => {
                self.advance();
                Stmt::Goto(self.expect_int()?)
            }
            Token::Gosub => {
                self.advance();
                Stmt::Gosub(self.expect_int()?)
            }
            Token::Return => {
                self.advance();
                let value = if self.at_statement_end() { None } else { Some(self.parse_expr(0)?) };
                Stmt::Return { value }
            }
            Token::Open => self.parse_open()?,
            Token::Close => {
                self.advance();
                let channel = if self.at_statement_end() {
                    None
                } else {
                    self.eat(&Token::Hash);
                    Some(self.parse_expr(0)?)
                };
                Stmt::Close { channel }
            }
            Token::Seek => {
                self.advance();
                self.eat(&Token::Hash);
                let channel = self.parse_expr(0)?;
                self.expect(&Token::Comma)?;
                let pos = self.parse_expr(0)?;
                Stmt::Seek { channel, pos }
            }
            Token::On => {
                self.advance();
                self.expect(&Token::Error)?;
                self.expect(&Token::Goto)?;
                let target = self.expect_int()?;
                Stmt::OnErrorGoto(if target.node == 0 { None } else { Some(target) })
            }
            Token::Resume => {
                self.advance();
                if self.eat(&Token::Next) {
                    Stmt::Resume(ResumeKind::Next)
                } else if self.check(&Token::IntLit(0)) {
                    Stmt::Resume(ResumeKind::Label(self.expect_int()?))
                } else {
                    Stmt::Resume(ResumeKind::Same)
                }
            }
            Token::End => {
                self.advance();
                Stmt::End
            }
            Token::Input => self.parse_input()?,
            Token::Line => {
                self.advance();
                self.expect(&Token::Input)?;
                let channel = if self.eat(&Token::Hash) {
                    let ch = self.parse_expr(0)?;
                    self.expect(&Token::Comma)?;
                    Some(ch)
                } else {
                    None
                };
                let target = self.expect_ident()?;
                Stmt::LineInput { channel, target }
            }
            Token::Cls => {
                self.advance();
                Stmt::Cls
            }
            Token::Color => {
                self.advance();
                let fg = self.parse_expr(0)?;
                let bg = if self.eat(&Token::Comma) { Some(self.parse_expr(0)?) } else { None };
                Stmt::Color { fg, bg }
            }
            Token::Locate => {
                self.advance();
                let row = self.parse_expr(0)?;
                let col = if self.eat(&Token::Comma) { Some(self.parse_expr(0)?) } else { None };
                Stmt::Locate { row, col }
            }
            Token::Randomize => {
                self.advance();
                let seed = if self.at_statement_end() { None } else { Some(self.parse_expr(0)?) };
                Stmt::Randomize { seed }
            }
            Token::Delete => {
                self.advance();
                let target = self.parse_expr(0)?;
                Stmt::Delete { target }
            }
            ref other => {
                return Err(CompileError::syntax(
                    format!("expected statement, found {}", other.describe()),
                    tok.span,
                ));
            }
        };
        Ok(Spanned::new(stmt, Span::new(start, self.prev_end())))
    }

    fn parse_print(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::Print)?;
        let channel = if self.eat(&Token::Hash) {
            let ch = self.parse_expr(0)?;
            self.expect(&Token::Comma)?;
            Some(ch)
        } else {
            None
        };
        let mut items = Vec::new();
        while !self.at_statement_end() {
            if self.eat(&Token::Semicolon) {
                items.push(PrintItem::Semicolon);
            } else if self.eat(&Token::Comma) {
                items.push(PrintItem::Comma);
            } else {
                items.push(PrintItem::Expr(self.parse_expr(0)?));
            }
        }
        Ok(Stmt::Print { channel, items })
    }

    /// Statement starting with a name: assignment, or a call in statement position.
    fn parse_assign_or_call(&mut self) -> Result<Stmt, CompileError> {
        let target = self.parse_postfix()?;
        if self.eat(&Token::Eq) {
            let value = self.parse_expr(0)?;
            return Ok(Stmt::Let { target, value });
        }
        match target.node {
            Expr::Call { .. } | Expr::MethodCall { .. } => Ok(Stmt::Call(target)),
            // `name arg, arg` without parentheses
            Expr::Var(ref name) if self.proc_names.contains(name) => {
                let mut args = Vec::new();
                while !self.at_statement_end() {
                    if !args.is_empty() {
                        self.expect(&Token::Comma)?;
                    }
                    args.push(self.parse_expr(0)?);
                }
                let span = Span::new(target.span.start, self.prev_end());
                let name = Spanned::new(name.clone(), target.span);
                Ok(Stmt::Call(Spanned::new(Expr::Call { name, args }, span)))
            }
            _ => {
                let span = self.current_span();
                Err(CompileError::syntax("expected '=' in assignment", span))
            }
        }
    }

    fn parse_dim(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::Dim)?;
        let name = self.expect_ident()?;
        let size = if self.eat(&Token::LParen) {
            let size = self.parse_expr(0)?;
            self.expect(&Token::RParen)?;
            Some(size)
        } else {
            None
        };
        let ty = if self.eat(&Token::As) { Some(self.parse_type_name()?) } else { None };
        Ok(Stmt::Dim { name, size, ty })
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let if_span = self.expect(&Token::If)?;
        let cond = self.parse_expr(0)?;
        self.expect(&Token::Then)?;

        if !matches!(self.peek().map(|t| &t.node), None | Some(Token::Newline)) {
            return self.parse_single_line_if(cond);
        }

        let arm_end = |p: &Parser<'a>| p.check(&Token::ElseIf) || p.check(&Token::Else) || p.at_end_of(&Token::If);
        let then_body = self.parse_block(arm_end)?;
        let mut elseifs = Vec::new();
        let mut else_body = None;

        loop {
            if self.eat(&Token::ElseIf) || (self.check(&Token::Else) && self.check_at(1, &Token::If)) {
                if self.check(&Token::If) {
                    self.advance();
                }
                let c = self.parse_expr(0)?;
                self.expect(&Token::Then)?;
                let body = self.parse_block(arm_end)?;
                elseifs.push((c, body));
            } else if self.eat(&Token::Else) {
                else_body = Some(self.parse_block(|p| p.at_end_of(&Token::If))?);
            } else {
                break;
            }
        }

        if !self.at_end_of(&Token::If) {
            return Err(CompileError::syntax("missing END IF", if_span));
        }
        self.pos += 2;
        Ok(Stmt::If { cond, then_body, elseifs, else_body })
    }

    /// `IF c THEN s1 : s2 ELSE s3`, or `IF c THEN 100` as a GOTO.
    fn parse_single_line_if(&mut self, cond: Spanned<Expr>) -> Result<Stmt, CompileError> {
        let then_body = self.parse_inline_stmts()?;
        let else_body = if self.eat(&Token::Else) { Some(self.parse_inline_stmts()?) } else { None };
        Ok(Stmt::If { cond, then_body, elseifs: Vec::new(), else_body })
    }

    fn parse_inline_stmts(&mut self) -> Result<Vec<Spanned<Stmt>>, CompileError> {
        let mut stmts = Vec::new();
        if let Some(Spanned { node: Token::IntLit(_), .. }) = self.peek() {
            let target = self.expect_int()?;
            let span = target.span;
            stmts.push(Spanned::new(Stmt::Goto(target), span));
            return Ok(stmts);
        }
        loop {
            stmts.push(self.parse_stmt()?);
            if self.check(&Token::Colon) && !matches!(self.peek_at(1).map(|t| &t.node), None | Some(Token::Newline)) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(stmts)
    }

    fn parse_select(&mut self) -> Result<Stmt, CompileError> {
        let select_span = self.expect(&Token::Select)?;
        self.expect(&Token::Case)?;
        let selector = self.parse_expr(0)?;
        self.expect_statement_end()?;

        let mut arms = Vec::new();
        let mut else_body = None;
        let arm_end = |p: &Parser<'a>| p.check(&Token::Case) || p.at_end_of(&Token::Select);

        loop {
            self.skip_separators();
            if self.at_end_of(&Token::Select) {
                self.pos += 2;
                break;
            }
            let case_span = self.expect(&Token::Case).map_err(|_| {
                CompileError::syntax("missing END SELECT", select_span)
            })?;
            if self.eat(&Token::Else) {
                if else_body.is_some() {
                    return Err(CompileError::syntax("duplicate CASE ELSE", case_span));
                }
                else_body = Some(self.parse_block(arm_end)?);
                continue;
            }
            if else_body.is_some() {
                return Err(CompileError::syntax("CASE after CASE ELSE", case_span));
            }
            let mut labels = Vec::new();
            loop {
                labels.push(self.parse_case_label()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            let span = Span::new(case_span.start, self.prev_end());
            let body = self.parse_block(arm_end)?;
            arms.push(CaseArm { labels, body, span });
        }

        Ok(Stmt::SelectCase { selector, arms, else_body })
    }

    fn parse_case_label(&mut self) -> Result<CaseLabel, CompileError> {
        if self.eat(&Token::Is) {
            let Some(tok) = self.advance() else {
                return Err(CompileError::syntax("expected comparison after IS", self.eof_span()));
            };
            let op = match tok.node {
                Token::Eq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::LtEq => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::GtEq => BinOp::Ge,
                ref other => {
                    return Err(CompileError::syntax(
                        format!("expected comparison after IS, found {}", other.describe()),
                        tok.span,
                    ));
                }
            };
            return Ok(CaseLabel::Is(op, self.parse_expr(0)?));
        }
        let lo = self.parse_expr(0)?;
        if self.eat(&Token::To) {
            let hi = self.parse_expr(0)?;
            return Ok(CaseLabel::Range(lo, hi));
        }
        Ok(CaseLabel::Value(lo))
    }

    fn parse_loop_cond(&mut self) -> Result<Option<LoopCond>, CompileError> {
        let kind = if self.eat(&Token::While) {
            LoopCondKind::While
        } else if self.eat(&Token::Until) {
            LoopCondKind::Until
        } else {
            return Ok(None);
        };
        Ok(Some(LoopCond { kind, expr: self.parse_expr(0)? }))
    }

    fn parse_do(&mut self) -> Result<Stmt, CompileError> {
        let do_span = self.expect(&Token::Do)?;
        let pre = self.parse_loop_cond()?;
        let body = self.parse_block(|p| p.check(&Token::Loop))?;
        self.expect(&Token::Loop).map_err(|_| CompileError::syntax("missing LOOP", do_span))?;
        let post = self.parse_loop_cond()?;
        if let (Some(_), Some(p)) = (&pre, &post) {
            return Err(CompileError::syntax("DO loop cannot have both a pre and a post condition", p.expr.span));
        }
        Ok(Stmt::Do { pre, body, post })
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        let for_span = self.expect(&Token::For)?;
        let var = self.expect_ident()?;
        self.expect(&Token::Eq)?;
        let start = self.parse_expr(0)?;
        self.expect(&Token::To)?;
        let end = self.parse_expr(0)?;
        let step = if self.eat(&Token::Step) { Some(self.parse_expr(0)?) } else { None };
        let body = self.parse_block(|p| p.check(&Token::Next))?;
        self.expect(&Token::Next).map_err(|_| CompileError::syntax("missing NEXT", for_span))?;
        let next_var = if self.check(&Token::Ident) { Some(self.expect_ident()?) } else { None };
        Ok(Stmt::For { var, start, end, step, body, next_var })
    }

    fn parse_open(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::Open)?;
        let path = self.parse_expr(0)?;
        self.expect(&Token::For)?;
        let Some(tok) = self.advance() else {
            return Err(CompileError::syntax("expected INPUT, OUTPUT or APPEND", self.eof_span()));
        };
        let mode = match tok.node {
            Token::Input => OpenMode::Input,
            Token::Output => OpenMode::Output,
            Token::Append => OpenMode::Append,
            ref other => {
                return Err(CompileError::syntax(
                    format!("expected INPUT, OUTPUT or APPEND, found {}", other.describe()),
                    tok.span,
                ));
            }
        };
        self.expect(&Token::As)?;
        self.eat(&Token::Hash);
        let channel = self.parse_expr(0)?;
        Ok(Stmt::Open { path, mode, channel })
    }

    fn parse_input(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::Input)?;
        let prompt = match self.peek() {
            Some(Spanned { node: Token::StringLit(s), .. }) => {
                let s = s.clone();
                self.advance();
                if !self.eat(&Token::Semicolon) {
                    self.expect(&Token::Comma)?;
                }
                Some(s)
            }
            _ => None,
        };
        let mut vars = vec![self.expect_ident()?];
        while self.eat(&Token::Comma) {
            vars.push(self.expect_ident()?);
        }
        Ok(Stmt::Input { prompt, vars })
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn parse_expr(&mut self, min_bp: u8) -> Result<Spanned<Expr>, CompileError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(op) = self.peek().and_then(|t| binop_for(&t.node)) else { break };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(r_bp)?;
            let span = Span::new(lhs.span.start, rhs.span.end);
            lhs = Spanned::new(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let start = self.current_span().start;
        let op = match self.peek().map(|t| &t.node) {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Not) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        // NOT applies to a whole comparison; sign binds tighter than `*` but looser than `^`.
        let bp = if op == UnaryOp::Not { NOT_BP } else { UNARY_BP };
        let operand = self.parse_expr(bp)?;
        let span = Span::new(start, operand.span.end);
        Ok(Spanned::new(Expr::Unary { op, operand: Box::new(operand) }, span))
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let member = self.expect_ident()?;
            if self.check(&Token::LParen) {
                let args = self.parse_args()?;
                let span = Span::new(expr.span.start, self.prev_end());
                expr = Spanned::new(Expr::MethodCall { object: Box::new(expr), method: member, args }, span);
            } else {
                let span = Span::new(expr.span.start, member.span.end);
                expr = Spanned::new(Expr::Member { object: Box::new(expr), field: member }, span);
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Spanned<Expr>>, CompileError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if !args.is_empty() {
                self.expect(&Token::Comma)?;
            }
            // `EOF(#1)`
            self.eat(&Token::Hash);
            args.push(self.parse_expr(0)?);
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let Some(tok) = self.advance() else {
            return Err(CompileError::syntax("expected expression, found end of file", self.eof_span()));
        };
        let span = tok.span;
        let node = match tok.node {
            Token::IntLit(n) => Expr::IntLit(n),
            Token::FloatLit(f) => Expr::FloatLit(f),
            Token::StringLit(ref s) => Expr::StringLit(s.clone()),
            Token::True => Expr::BoolLit(true),
            Token::False => Expr::BoolLit(false),
            Token::Me => Expr::Me,
            Token::LParen => {
                let inner = self.parse_expr(0)?;
                self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, Span::new(span.start, self.prev_end())));
            }
            Token::LBound | Token::UBound => {
                let is_lower = matches!(tok.node, Token::LBound);
                self.expect(&Token::LParen)?;
                let name = self.expect_ident()?;
                self.expect(&Token::RParen)?;
                let node = if is_lower { Expr::LBound { name } } else { Expr::UBound { name } };
                return Ok(Spanned::new(node, Span::new(span.start, self.prev_end())));
            }
            Token::New => {
                let class = self.expect_ident()?;
                let args = if self.check(&Token::LParen) { self.parse_args()? } else { Vec::new() };
                return Ok(Spanned::new(Expr::New { class, args }, Span::new(span.start, self.prev_end())));
            }
            Token::Ident => {
                let name = self.text(span).to_string();
                return self.parse_after_ident(Spanned::new(name, span));
            }
            ref other => {
                return Err(CompileError::syntax(
                    format!("expected expression, found {}", other.describe()),
                    span,
                ));
            }
        };
        Ok(Spanned::new(node, span))
    }

    fn parse_after_ident(&mut self, name: Spanned<String>) -> Result<Spanned<Expr>, CompileError> {
        let start = name.span.start;
        if let Some(builtin) = Builtin::lookup(&name.node) {
            let args = if self.check(&Token::LParen) {
                self.parse_args()?
            } else if builtin.info().min_args == 0 {
                Vec::new()
            } else {
                return Err(CompileError::syntax(format!("{builtin} expects arguments"), name.span));
            };
            return Ok(Spanned::new(Expr::Builtin { builtin, args }, Span::new(start, self.prev_end())));
        }

        if !self.check(&Token::LParen) {
            return Ok(Spanned::new(Expr::Var(name.node), name.span));
        }

        if self.proc_names.contains(&name.node) {
            let args = self.parse_args()?;
            return Ok(Spanned::new(Expr::Call { name, args }, Span::new(start, self.prev_end())));
        }

        self.expect(&Token::LParen)?;
        let index = self.parse_expr(0)?;
        if self.check(&Token::Comma) {
            return Err(CompileError::syntax("multi-dimensional arrays are not supported", self.current_span()));
        }
        self.expect(&Token::RParen)?;
        Ok(Spanned::new(
            Expr::ArrayElem { name, index: Box::new(index) },
            Span::new(start, self.prev_end()),
        ))
    }
}

const NOT_BP: u8 = 5;
const UNARY_BP: u8 = 17;

fn binop_for(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Backslash => BinOp::IDiv,
        Token::Mod => BinOp::Mod,
        Token::Caret => BinOp::Pow,
        Token::Amp => BinOp::Concat,
        Token::Eq => BinOp::Eq,
        Token::NotEq => BinOp::Ne,
        Token::Lt => BinOp::Lt,
        Token::LtEq => BinOp::Le,
        Token::Gt => BinOp::Gt,
        Token::GtEq => BinOp::Ge,
        Token::And => BinOp::And,
        Token::Or => BinOp::Or,
        Token::Xor => BinOp::Xor,
        Token::AndAlso => BinOp::AndAlso,
        Token::OrElse => BinOp::OrElse,
        _ => return None,
    })
}

fn infix_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or | BinOp::OrElse | BinOp::Xor => (1, 2),
        BinOp::And | BinOp::AndAlso => (3, 4),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (5, 6),
        BinOp::Concat => (7, 8),
        BinOp::Add | BinOp::Sub => (9, 10),
        BinOp::Mod => (11, 12),
        BinOp::IDiv => (13, 14),
        BinOp::Mul | BinOp::Div => (15, 16),
        BinOp::Pow => (19, 20),
    }
}

/// Lex and parse `source` in one step.
pub fn parse_source(source: &str) -> Result<Program, CompileError> {
    let tokens = crate::lexer::lex(source)?;
    Parser::new(&tokens, source).parse_program()
}
