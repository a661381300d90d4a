//! Reader for the text form produced by [`super::print`].
//!
//! The reader works line by line. Signatures of every `func` and `extern`
//! are collected up front so a call may name a function defined further
//! down. Temps spelled `%t<N>` keep id `N`; any other name gets an id above
//! the largest such `N` in its function.

use std::collections::HashMap;

use logos::Logos;

use super::{Block, Extern, Function, Global, Instr, Module, Opcode, Param, Signature, TempId, Type, Value};
use crate::diagnostics::CompileError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"//[^\n]*")]
enum Tok {
    #[regex(r"%[A-Za-z0-9_.$#]+", |lex| lex.slice()[1..].to_string())]
    Temp(String),
    #[regex(r"@[A-Za-z0-9_.$#]+", |lex| lex.slice()[1..].to_string())]
    Global(String),
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"-?[0-9]+\.[0-9]*([eE][-+]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][-+]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_.$]*", |lex| lex.slice().to_string())]
    Word(String),
    #[token(".loc")]
    Loc,
    #[token("-inf")]
    NegInf,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token("->")]
    Arrow,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
}

fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(char::from(u8::from_str_radix(&hex, 16).ok()?));
            }
            _ => return None,
        }
    }
    Some(out)
}

fn lex_line(text: &str, line: usize) -> Result<Vec<Tok>, CompileError> {
    let mut lexer = Tok::lexer(text);
    let mut toks = Vec::new();
    while let Some(t) = lexer.next() {
        match t {
            Ok(t) => toks.push(t),
            Err(()) => {
                return Err(CompileError::il_parse(format!("unexpected '{}'", lexer.slice()), line));
            }
        }
    }
    Ok(toks)
}

/// Token cursor over one line.
struct Cursor {
    toks: Vec<Tok>,
    pos: usize,
    line: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> CompileError {
        CompileError::il_parse(msg, self.line)
    }

    fn expect(&mut self, t: Tok, what: &str) -> Result<(), CompileError> {
        if self.eat(&t) { Ok(()) } else { Err(self.err(format!("expected {what}"))) }
    }

    fn word(&mut self) -> Result<String, CompileError> {
        match self.next() {
            Some(Tok::Word(w)) => Ok(w),
            other => Err(self.err(format!("expected name, found {other:?}"))),
        }
    }

    fn global(&mut self) -> Result<String, CompileError> {
        match self.next() {
            Some(Tok::Global(g)) => Ok(g),
            other => Err(self.err(format!("expected @name, found {other:?}"))),
        }
    }

    fn ty(&mut self) -> Result<Type, CompileError> {
        let w = self.word()?;
        Type::parse(&w).ok_or_else(|| self.err(format!("unknown type '{w}'")))
    }

    fn finish(&self) -> Result<(), CompileError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing {:?}", self.toks[self.pos])))
        }
    }
}

/// Parse `ty, ty, ...` inside parentheses (the opening one already taken).
fn type_list(c: &mut Cursor) -> Result<Vec<Type>, CompileError> {
    let mut out = Vec::new();
    if c.eat(&Tok::RParen) {
        return Ok(out);
    }
    loop {
        out.push(c.ty()?);
        if c.eat(&Tok::RParen) {
            return Ok(out);
        }
        c.expect(Tok::Comma, "',' or ')'")?;
    }
}

/// Parse `%name: ty, ...` inside parentheses (the opening one already taken).
fn param_list(c: &mut Cursor) -> Result<Vec<(String, Type)>, CompileError> {
    let mut out = Vec::new();
    if c.eat(&Tok::RParen) {
        return Ok(out);
    }
    loop {
        let name = match c.next() {
            Some(Tok::Temp(n)) => n,
            other => return Err(c.err(format!("expected %name, found {other:?}"))),
        };
        c.expect(Tok::Colon, "':'")?;
        out.push((name, c.ty()?));
        if c.eat(&Tok::RParen) {
            return Ok(out);
        }
        c.expect(Tok::Comma, "',' or ')'")?;
    }
}

struct FuncHeader {
    name: String,
    params: Vec<(String, Type)>,
    ret: Type,
}

fn func_header(c: &mut Cursor) -> Result<FuncHeader, CompileError> {
    let name = c.global()?;
    c.expect(Tok::LParen, "'('")?;
    let params = param_list(c)?;
    c.expect(Tok::Arrow, "'->'")?;
    let ret = c.ty()?;
    c.expect(Tok::LBrace, "'{'")?;
    c.finish()?;
    Ok(FuncHeader { name, params, ret })
}

pub fn parse_module(text: &str) -> Result<Module, CompileError> {
    let lines: Vec<(usize, Vec<Tok>)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| lex_line(l, i + 1).map(|t| (i + 1, t)))
        .collect::<Result<_, _>>()?;
    let lines: Vec<(usize, Vec<Tok>)> = lines.into_iter().filter(|(_, t)| !t.is_empty()).collect();

    let mut module = Module::default();
    let mut sigs: HashMap<String, Signature> = HashMap::new();

    // Signatures first, so calls can refer forward.
    for (line, toks) in &lines {
        let Some(Tok::Word(w)) = toks.first() else { continue };
        let mut c = Cursor { toks: toks[1..].to_vec(), pos: 0, line: *line };
        if w == "func" {
            let h = func_header(&mut c)?;
            let sig = Signature { params: h.params.iter().map(|p| p.1).collect(), ret: h.ret };
            if sigs.insert(h.name.clone(), sig).is_some() {
                return Err(CompileError::il_parse(format!("duplicate function @{}", h.name), *line));
            }
        } else if w == "extern" {
            let name = c.global()?;
            c.expect(Tok::LParen, "'('")?;
            let params = type_list(&mut c)?;
            c.expect(Tok::Arrow, "'->'")?;
            let ret = c.ty()?;
            sigs.insert(name, Signature { params, ret });
        }
    }

    let mut iter = lines.into_iter();
    let Some((line, header)) = iter.next() else {
        return Err(CompileError::il_parse("empty module", 1));
    };
    match header.as_slice() {
        [Tok::Word(il), Tok::Float(v)] if il == "il" => module.version = format_version(*v),
        [Tok::Word(il), Tok::Word(v)] if il == "il" => module.version = v.clone(),
        _ => return Err(CompileError::il_parse("expected 'il <version>' header", line)),
    }

    while let Some((line, toks)) = iter.next() {
        let mut c = Cursor { toks, pos: 0, line };
        let kw = c.word()?;
        match kw.as_str() {
            "extern" => {
                let name = c.global()?;
                c.expect(Tok::LParen, "'('")?;
                let params = type_list(&mut c)?;
                c.expect(Tok::Arrow, "'->'")?;
                let ret = c.ty()?;
                c.finish()?;
                module.externs.push(Extern { name, params, ret });
            }
            "global" => {
                if c.word()? != "const" || c.word()? != "str" {
                    return Err(c.err("expected 'global const str'"));
                }
                let name = c.global()?;
                c.expect(Tok::Eq, "'='")?;
                let value = match c.next() {
                    Some(Tok::Str(s)) => s,
                    _ => return Err(c.err("expected string literal")),
                };
                c.finish()?;
                module.globals.push(Global { name, value });
            }
            "func" => {
                let h = func_header(&mut c)?;
                let mut body = Vec::new();
                loop {
                    match iter.next() {
                        Some((_, t)) if t == [Tok::RBrace] => break,
                        Some(l) => body.push(l),
                        None => return Err(CompileError::il_parse(format!("unterminated function @{}", h.name), line)),
                    }
                }
                let f = FunctionReader::new(&sigs).read(h, body)?;
                module.functions.push(f);
            }
            other => return Err(c.err(format!("unexpected '{other}' at top level"))),
        }
    }
    tracing::debug!(target: "ilc::il", functions = module.functions.len(), "parsed IL module");
    Ok(module)
}

fn format_version(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') { s } else { format!("{s}.0") }
}

struct FunctionReader<'s> {
    sigs: &'s HashMap<String, Signature>,
    names: HashMap<String, TempId>,
    next_id: TempId,
}

fn numbered_temp(name: &str) -> Option<TempId> {
    let digits = name.strip_prefix('t')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl<'s> FunctionReader<'s> {
    fn new(sigs: &'s HashMap<String, Signature>) -> Self {
        FunctionReader { sigs, names: HashMap::new(), next_id: 0 }
    }

    fn read(mut self, h: FuncHeader, body: Vec<(usize, Vec<Tok>)>) -> Result<Function, CompileError> {
        let in_body = body.iter().flat_map(|(_, toks)| toks).filter_map(|t| match t {
            Tok::Temp(n) => numbered_temp(n),
            _ => None,
        });
        let max_numbered = h.params.iter().filter_map(|(n, _)| numbered_temp(n)).chain(in_body).max();
        self.next_id = max_numbered.map_or(0, |m| m + 1);

        let mut f = Function::new(h.name, h.ret);
        for (name, ty) in &h.params {
            let id = self.id_of(name);
            f.params.push(Param { id, ty: *ty });
        }

        let mut current: Option<Block> = None;
        let mut loc = 0;
        for (line, toks) in body {
            let mut c = Cursor { toks, pos: 0, line };
            if c.eat(&Tok::Loc) {
                loc = match c.next() {
                    Some(Tok::Int(n)) if n >= 0 => n as u32,
                    _ => return Err(c.err("expected line number after .loc")),
                };
                c.finish()?;
                continue;
            }
            if matches!(c.toks.last(), Some(Tok::Colon)) {
                if let Some(b) = current.take() {
                    f.blocks.push(b);
                }
                current = Some(self.block_header(&mut c)?);
                loc = 0;
                continue;
            }
            let Some(block) = current.as_mut() else {
                return Err(c.err("instruction outside of a block"));
            };
            let mut instr = self.instr(&mut c)?;
            instr.loc = loc;
            if block.terminated {
                return Err(c.err(format!("instruction after terminator in block {}", block.label)));
            }
            block.terminated = instr.op.is_terminator();
            block.instrs.push(instr);
        }
        if let Some(b) = current.take() {
            f.blocks.push(b);
        }

        let mut names = vec![None; self.next_id as usize];
        for (name, id) in self.names {
            if numbered_temp(&name).is_none() {
                names[id as usize] = Some(name);
            }
        }
        f.value_names = names;
        Ok(f)
    }

    fn id_of(&mut self, name: &str) -> TempId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = numbered_temp(name).unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });
        self.names.insert(name.to_string(), id);
        id
    }

    fn block_header(&mut self, c: &mut Cursor) -> Result<Block, CompileError> {
        let label = c.word()?;
        let mut block = Block::new(label);
        if c.eat(&Tok::LParen) {
            for (name, ty) in param_list(c)? {
                let id = self.id_of(&name);
                block.params.push(Param { id, ty });
            }
        }
        c.expect(Tok::Colon, "':'")?;
        c.finish()?;
        Ok(block)
    }

    fn value(&mut self, c: &mut Cursor) -> Result<Value, CompileError> {
        match c.next() {
            Some(Tok::Temp(n)) => Ok(Value::Temp(self.id_of(&n))),
            Some(Tok::Int(v)) => Ok(Value::ConstInt(v)),
            Some(Tok::Float(v)) => Ok(Value::ConstFloat(v)),
            Some(Tok::Global(g)) => Ok(Value::Global(g)),
            Some(Tok::NegInf) => Ok(Value::ConstFloat(f64::NEG_INFINITY)),
            Some(Tok::Word(w)) if w == "null" => Ok(Value::Null),
            Some(Tok::Word(w)) if w == "nan" => Ok(Value::ConstFloat(f64::NAN)),
            Some(Tok::Word(w)) if w == "inf" => Ok(Value::ConstFloat(f64::INFINITY)),
            other => Err(c.err(format!("expected value, found {other:?}"))),
        }
    }

    fn value_list(&mut self, c: &mut Cursor) -> Result<Vec<Value>, CompileError> {
        let mut out = Vec::new();
        if c.at_end() {
            return Ok(out);
        }
        loop {
            out.push(self.value(c)?);
            if !c.eat(&Tok::Comma) {
                return Ok(out);
            }
        }
    }

    /// `label` or `label(v, ...)`.
    fn target(&mut self, c: &mut Cursor) -> Result<(String, Vec<Value>), CompileError> {
        let label = c.word()?;
        let mut args = Vec::new();
        if c.eat(&Tok::LParen) && !c.eat(&Tok::RParen) {
            loop {
                args.push(self.value(c)?);
                if c.eat(&Tok::RParen) {
                    break;
                }
                c.expect(Tok::Comma, "',' or ')'")?;
            }
        }
        Ok((label, args))
    }

    fn push_target(&mut self, c: &mut Cursor, instr: &mut Instr) -> Result<(), CompileError> {
        let (label, args) = self.target(c)?;
        instr.labels.push(label);
        instr.br_args.push(args);
        Ok(())
    }

    fn instr(&mut self, c: &mut Cursor) -> Result<Instr, CompileError> {
        let result = match (c.toks.first(), c.toks.get(1)) {
            (Some(Tok::Temp(n)), Some(Tok::Eq)) => {
                let n = n.clone();
                c.pos = 2;
                Some(self.id_of(&n))
            }
            _ => None,
        };
        let mnemonic = c.word()?;
        let op = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| c.err(format!("unknown opcode '{mnemonic}'")))?;
        let mut instr = Instr::new(op, op.fixed_result().unwrap_or(Type::Void), Vec::new());
        instr.result = result;
        match op {
            Opcode::Call => {
                let callee = c.global()?;
                let sig = self.sigs.get(&callee).ok_or_else(|| c.err(format!("call to unknown @{callee}")))?;
                instr.ty = sig.ret;
                c.expect(Tok::LParen, "'('")?;
                if !c.eat(&Tok::RParen) {
                    instr.operands = self.value_list(c)?;
                    c.expect(Tok::RParen, "')'")?;
                }
                instr.callee = Some(callee);
            }
            Opcode::Load | Opcode::Store => {
                instr.ty = c.ty()?;
                c.expect(Tok::Comma, "','")?;
                instr.operands = self.value_list(c)?;
            }
            Opcode::Br => self.push_target(c, &mut instr)?,
            Opcode::CBr => {
                instr.operands.push(self.value(c)?);
                c.expect(Tok::Comma, "','")?;
                self.push_target(c, &mut instr)?;
                c.expect(Tok::Comma, "','")?;
                self.push_target(c, &mut instr)?;
            }
            Opcode::SwitchI32 => {
                instr.operands.push(self.value(c)?);
                c.expect(Tok::Comma, "','")?;
                self.push_target(c, &mut instr)?;
                while c.eat(&Tok::Comma) {
                    let v = match c.next() {
                        Some(Tok::Int(v)) => v,
                        _ => return Err(c.err("expected case value")),
                    };
                    c.expect(Tok::Arrow, "'->'")?;
                    instr.operands.push(Value::ConstInt(v));
                    self.push_target(c, &mut instr)?;
                }
            }
            Opcode::EhPush | Opcode::ResumeLabel => {
                let label = c.word()?;
                instr.labels.push(label);
                instr.br_args.push(Vec::new());
            }
            _ => instr.operands = self.value_list(c)?,
        }
        c.finish()?;
        if instr.result.is_some() && instr.ty == Type::Void {
            return Err(c.err(format!("'{mnemonic}' produces no value")));
        }
        Ok(instr)
    }
}
