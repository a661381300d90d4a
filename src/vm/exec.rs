//! The instruction loop.

use crate::il::print::instr_text;
use crate::il::{self, Function, Instr, Opcode, Type};
use crate::runtime::{catch_trap, trap, Trap, TrapKind};
use crate::transform::const_fold::{fp_to_si, int_binary};

use super::debug::TraceMode;
use super::{Handle, Value, Vm, VmError, MAX_CALL_DEPTH};

/// Activation record of one call.
pub(super) struct Frame<'m> {
    func: &'m Function,
    /// Temp values indexed by id, `None` until defined.
    values: Vec<Option<Value>>,
    block: usize,
    ip: usize,
    /// Handler blocks installed by `eh.push`, innermost last.
    handlers: Vec<usize>,
    in_handler: bool,
    /// Where the trap being handled happened.
    fault: Option<(usize, usize)>,
}

impl<'m> Frame<'m> {
    fn new(func: &'m Function) -> Self {
        Frame {
            func,
            values: vec![None; func.value_names.len()],
            block: 0,
            ip: 0,
            handlers: Vec::new(),
            in_handler: false,
            fault: None,
        }
    }

    fn set(&mut self, id: il::TempId, v: Value) {
        let idx = id as usize;
        if idx >= self.values.len() {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(v);
    }

    fn label(&self) -> &'m str {
        self.func.blocks.get(self.block).map_or("?", |b| b.label.as_str())
    }

    fn active_handler(&self) -> Option<usize> {
        if self.in_handler { None } else { self.handlers.last().copied() }
    }
}

/// What an instruction asks the loop to do next.
enum Step {
    Next,
    Jump { block: usize, args: Vec<Value> },
    /// Continue at an exact position without entering the block afresh.
    Goto { block: usize, ip: usize },
    Return(Value),
}

enum Fault {
    Trap(Trap),
    Error(VmError),
}

impl From<VmError> for Fault {
    fn from(e: VmError) -> Self {
        Fault::Error(e)
    }
}

fn raise(kind: TrapKind, message: impl Into<String>) -> Fault {
    Fault::Trap(Trap { kind, message: message.into() })
}

fn malformed(msg: impl Into<String>) -> Fault {
    Fault::Error(VmError::Malformed(msg.into()))
}

impl<'m> Vm<'m> {
    pub(super) fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let func = self
            .functions
            .get(name)
            .map(|info| info.func)
            .ok_or_else(|| VmError::UnknownFunction(name.to_string()))?;
        if self.opts.count {
            *self.calls.entry(name.to_string()).or_default() += 1;
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(VmError::Trap {
                kind: TrapKind::OutOfMemory,
                message: format!("call depth exceeds {MAX_CALL_DEPTH}"),
                function: name.to_string(),
                block: func.blocks.first().map(|b| b.label.clone()).unwrap_or_default(),
                line: 0,
            });
        }
        if args.len() != func.params.len() {
            return Err(VmError::Malformed(format!(
                "@{name} expects {} arguments, got {}",
                func.params.len(),
                args.len()
            )));
        }

        let mut frame = Frame::new(func);
        for (p, a) in func.params.iter().zip(args) {
            frame.set(p.id, a);
        }
        self.depth += 1;
        let slot_base = self.slots.len();
        let result = self.execute(&mut frame);
        self.slots.truncate(slot_base);
        self.slot_names.truncate(slot_base);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, fr: &mut Frame<'m>) -> Result<Value, VmError> {
        if fr.func.blocks.is_empty() {
            return Err(VmError::Malformed(format!("@{} has no body", fr.func.name)));
        }
        self.enter_block(fr, 0, Vec::new())?;
        loop {
            let func = fr.func;
            let block = &func.blocks[fr.block];
            let Some(instr) = block.instrs.get(fr.ip) else {
                return Err(VmError::Malformed(format!("block {} of @{} falls through", block.label, func.name)));
            };
            self.before_instr(fr, instr)?;

            match self.step(fr, instr) {
                Ok(Step::Next) => fr.ip += 1,
                Ok(Step::Jump { block, args }) => self.enter_block(fr, block, args)?,
                Ok(Step::Goto { block, ip }) => {
                    fr.block = block;
                    fr.ip = ip;
                }
                Ok(Step::Return(v)) => return Ok(v),
                Err(Fault::Trap(t)) => match fr.active_handler() {
                    Some(h) => self.handle(fr, h, t.code())?,
                    None => {
                        return Err(VmError::Trap {
                            kind: t.kind,
                            message: t.message,
                            function: func.name.clone(),
                            block: block.label.clone(),
                            line: instr.loc,
                        });
                    }
                },
                Err(Fault::Error(e)) => {
                    // A trap escaping a callee is catchable here.
                    let code = match &e {
                        VmError::Trap { kind, .. } => Some(*kind as i64),
                        _ => None,
                    };
                    match (code, fr.active_handler()) {
                        (Some(code), Some(h)) => self.handle(fr, h, code)?,
                        _ => return Err(e),
                    }
                }
            }
        }
    }

    /// Transfer to an `ON ERROR` handler.
    fn handle(&mut self, fr: &mut Frame<'m>, handler: usize, code: i64) -> Result<(), VmError> {
        trap::set_last_error(code);
        fr.fault = Some((fr.block, fr.ip));
        fr.in_handler = true;
        let params = fr.func.blocks[handler].params.len();
        tracing::trace!(target: "ilc::vm", function = %fr.func.name, code, "entering error handler");
        self.enter_block(fr, handler, vec![Value::Int(code); params])
    }

    fn enter_block(&mut self, fr: &mut Frame<'m>, block: usize, args: Vec<Value>) -> Result<(), VmError> {
        let func = fr.func;
        let target = &func.blocks[block];
        if target.params.len() != args.len() {
            return Err(VmError::Malformed(format!(
                "block {} takes {} arguments, got {}",
                target.label,
                target.params.len(),
                args.len()
            )));
        }
        for (p, a) in target.params.iter().zip(args) {
            fr.set(p.id, a);
        }
        fr.block = block;
        fr.ip = 0;
        if self.opts.breaks_at_label(&target.label) {
            let (function, label) = (func.name.clone(), target.label.clone());
            self.debug_line(format_args!("[BREAK] fn=@{function} blk={label} reason=label"));
            return Err(VmError::Break { function, block: label, reason: "label".into() });
        }
        Ok(())
    }

    /// Step accounting, tracing and source-line breakpoints.
    fn before_instr(&mut self, fr: &Frame<'m>, instr: &Instr) -> Result<(), VmError> {
        self.steps += 1;
        if let Some(limit) = self.opts.max_steps
            && self.steps > limit
        {
            return Err(VmError::StepLimit { limit });
        }
        if self.opts.trace == Some(TraceMode::Il) {
            let text = instr_text(fr.func, instr);
            self.debug_line(format_args!("[IL] fn=@{} blk={} ip=#{} {}", fr.func.name, fr.label(), fr.ip, text));
        }
        if instr.loc == 0 || instr.loc == self.last_line {
            return Ok(());
        }
        self.last_line = instr.loc;
        if self.opts.trace == Some(TraceMode::Src) {
            self.debug_line(format_args!("[SRC] line={} fn=@{}", instr.loc, fr.func.name));
        }
        if let Some(file) = self.opts.break_at_line(instr.loc) {
            let reason = format!("{file}:{}", instr.loc);
            let (function, label) = (fr.func.name.clone(), fr.label().to_string());
            self.debug_line(format_args!("[BREAK] src={reason} fn=@{function} blk={label} ip=#{}", fr.ip));
            return Err(VmError::Break { function, block: label, reason });
        }
        Ok(())
    }

    fn operand(&self, fr: &Frame<'m>, v: &il::Value) -> Result<Value, Fault> {
        Ok(match v {
            il::Value::ConstInt(c) => Value::Int(*c),
            il::Value::ConstFloat(x) => Value::Float(*x),
            il::Value::Null => Value::Ptr(Handle::Null),
            il::Value::Global(g) => Value::Str(
                self.strings
                    .get(g)
                    .cloned()
                    .ok_or_else(|| malformed(format!("unknown global @{g}")))?,
            ),
            il::Value::Temp(t) => fr
                .values
                .get(*t as usize)
                .cloned()
                .flatten()
                .ok_or_else(|| malformed(format!("%{} read before it is defined", fr.func.temp_name(*t))))?,
        })
    }

    fn operands(&self, fr: &Frame<'m>, vs: &[il::Value]) -> Result<Vec<Value>, Fault> {
        vs.iter().map(|v| self.operand(fr, v)).collect()
    }

    fn int(&self, fr: &Frame<'m>, instr: &Instr, k: usize) -> Result<i64, Fault> {
        let v = instr.operands.get(k).ok_or_else(|| malformed(format!("{} is missing operand {k}", instr.op)))?;
        self.operand(fr, v)?
            .as_int()
            .ok_or_else(|| malformed(format!("{} expects an integer operand", instr.op)))
    }

    fn float(&self, fr: &Frame<'m>, instr: &Instr, k: usize) -> Result<f64, Fault> {
        let v = instr.operands.get(k).ok_or_else(|| malformed(format!("{} is missing operand {k}", instr.op)))?;
        self.operand(fr, v)?
            .as_float()
            .ok_or_else(|| malformed(format!("{} expects a float operand", instr.op)))
    }

    fn slot(&self, fr: &Frame<'m>, instr: &Instr) -> Result<usize, Fault> {
        let ptr = instr.operands.first().ok_or_else(|| malformed(format!("{} without a pointer", instr.op)))?;
        match self.operand(fr, ptr)? {
            Value::Ptr(Handle::Slot(i)) if i < self.slots.len() => Ok(i),
            Value::Ptr(Handle::Null) => Err(raise(TrapKind::InvalidArgument, "null pointer dereference")),
            other => Err(malformed(format!("{} through {other}", instr.op))),
        }
    }

    fn target(&self, fr: &Frame<'m>, instr: &Instr, k: usize) -> Result<usize, Fault> {
        let label = instr.labels.get(k).ok_or_else(|| malformed(format!("{} is missing a label", instr.op)))?;
        self.functions
            .get(fr.func.name.as_str())
            .and_then(|info| info.labels.get(label.as_str()))
            .copied()
            .ok_or_else(|| malformed(format!("unknown label {label} in @{}", fr.func.name)))
    }

    fn jump(&self, fr: &Frame<'m>, instr: &Instr, k: usize) -> Result<Step, Fault> {
        let block = self.target(fr, instr, k)?;
        let args = match instr.br_args.get(k) {
            Some(args) => self.operands(fr, args)?,
            None => Vec::new(),
        };
        Ok(Step::Jump { block, args })
    }

    fn step(&mut self, fr: &mut Frame<'m>, instr: &Instr) -> Result<Step, Fault> {
        let op = instr.op;
        let result = if op.is_int_binary() {
            let (a, b) = (self.int(fr, instr, 0)?, self.int(fr, instr, 1)?);
            Value::Int(int_op(op, instr.ty, a, b)?)
        } else if op.is_float_binary() {
            let (a, b) = (self.float(fr, instr, 0)?, self.float(fr, instr, 1)?);
            Value::Float(match op {
                Opcode::FAdd => a + b,
                Opcode::FSub => a - b,
                Opcode::FMul => a * b,
                _ => a / b,
            })
        } else if op.is_int_compare() {
            let (a, b) = (self.int(fr, instr, 0)?, self.int(fr, instr, 1)?);
            let r = match op {
                Opcode::ICmpEq => a == b,
                Opcode::ICmpNe => a != b,
                Opcode::SCmpLt => a < b,
                Opcode::SCmpLe => a <= b,
                Opcode::SCmpGt => a > b,
                _ => a >= b,
            };
            Value::Int(r as i64)
        } else if op.is_float_compare() {
            let (a, b) = (self.float(fr, instr, 0)?, self.float(fr, instr, 1)?);
            let r = match op {
                Opcode::FCmpEq => a == b,
                Opcode::FCmpNe => a != b,
                Opcode::FCmpLt => a < b,
                Opcode::FCmpLe => a <= b,
                Opcode::FCmpGt => a > b,
                _ => a >= b,
            };
            Value::Int(r as i64)
        } else {
            return self.step_other(fr, instr);
        };
        if let Some(r) = instr.result {
            fr.set(r, result);
        }
        Ok(Step::Next)
    }

    fn step_other(&mut self, fr: &mut Frame<'m>, instr: &Instr) -> Result<Step, Fault> {
        let value = match instr.op {
            Opcode::SIToFP => Value::Float(self.int(fr, instr, 0)? as f64),
            Opcode::FPToSI => {
                let x = self.float(fr, instr, 0)?;
                Value::Int(fp_to_si(x).ok_or_else(|| raise(TrapKind::Overflow, format!("fptosi overflow on {x}")))?)
            }
            Opcode::Zext1 => Value::Int((self.int(fr, instr, 0)? != 0) as i64),
            Opcode::Trunc1 => Value::Int(self.int(fr, instr, 0)? & 1),
            Opcode::CastSiNarrowChk => {
                let a = self.int(fr, instr, 0)?;
                i32::try_from(a).map_err(|_| raise(TrapKind::Overflow, format!("narrowing overflow on {a}")))?;
                Value::Int(a)
            }
            Opcode::Alloca => {
                self.slots.push(Value::Void);
                self.slot_names.push(instr.result.map(|r| fr.func.temp_name(r)));
                Value::Ptr(Handle::Slot(self.slots.len() - 1))
            }
            Opcode::Load => {
                let i = self.slot(fr, instr)?;
                match &self.slots[i] {
                    Value::Void => Value::zero(instr.ty),
                    v => v.clone(),
                }
            }
            Opcode::Store => {
                let i = self.slot(fr, instr)?;
                let v = match instr.operands.get(1) {
                    Some(v) => self.operand(fr, v)?,
                    None => return Err(malformed("store without a value")),
                };
                self.watch(fr, i, &v);
                self.slots[i] = v;
                return Ok(Step::Next);
            }
            Opcode::ConstStr => match instr.operands.first() {
                Some(g @ il::Value::Global(_)) => self.operand(fr, g)?,
                _ => return Err(malformed("const_str needs a global")),
            },
            Opcode::ConstNull => Value::Ptr(Handle::Null),
            Opcode::Call => {
                let v = self.call(fr, instr)?;
                if self.halted {
                    return Ok(Step::Return(Value::Void));
                }
                v
            }
            Opcode::Br => return self.jump(fr, instr, 0),
            Opcode::CBr => {
                let taken = if self.int(fr, instr, 0)? != 0 { 0 } else { 1 };
                return self.jump(fr, instr, taken);
            }
            Opcode::SwitchI32 => {
                let v = self.int(fr, instr, 0)?;
                let mut arm = 0;
                for k in 1..instr.operands.len() {
                    if self.int(fr, instr, k)? == v {
                        arm = k;
                        break;
                    }
                }
                return self.jump(fr, instr, arm);
            }
            Opcode::Ret => {
                let v = match instr.operands.first() {
                    Some(v) => self.operand(fr, v)?,
                    None => Value::Void,
                };
                return Ok(Step::Return(v));
            }
            Opcode::Trap => return Err(raise(TrapKind::Generic, "trap")),
            Opcode::EhPush => {
                let h = self.target(fr, instr, 0)?;
                fr.handlers.push(h);
                return Ok(Step::Next);
            }
            Opcode::EhPop => {
                fr.handlers.pop();
                return Ok(Step::Next);
            }
            Opcode::ResumeSame | Opcode::ResumeNext | Opcode::ResumeLabel => return self.resume(fr, instr),
            op => return Err(malformed(format!("unexpected {op}"))),
        };
        if let Some(r) = instr.result {
            fr.set(r, value);
        }
        Ok(Step::Next)
    }

    fn resume(&mut self, fr: &mut Frame<'m>, instr: &Instr) -> Result<Step, Fault> {
        let Some((block, ip)) = fr.fault.take() else {
            return Err(raise(TrapKind::Generic, "RESUME without error"));
        };
        fr.in_handler = false;
        trap::set_last_error(0);
        match instr.op {
            Opcode::ResumeSame => Ok(Step::Goto { block, ip }),
            Opcode::ResumeNext => Ok(Step::Goto { block, ip: ip + 1 }),
            _ => self.jump(fr, instr, 0),
        }
    }

    fn call(&mut self, fr: &Frame<'m>, instr: &Instr) -> Result<Value, Fault> {
        let callee = instr.callee.as_deref().ok_or_else(|| malformed("call without callee"))?;
        let args = self.operands(fr, &instr.operands)?;
        if callee == "rt_end" {
            self.halted = true;
            return Ok(Value::Void);
        }
        if self.functions.contains_key(callee) {
            return Ok(self.call_function(callee, args)?);
        }
        let handler = *self
            .externs
            .get(callee)
            .ok_or_else(|| VmError::UnknownFunction(callee.to_string()))?;
        if self.opts.count {
            *self.calls.entry(callee.to_string()).or_default() += 1;
        }
        catch_trap(|| handler(&args)).map_err(Fault::Trap)
    }

    fn watch(&mut self, fr: &Frame<'m>, slot: usize, v: &Value) {
        let Some(Some(name)) = self.slot_names.get(slot) else {
            return;
        };
        if let Some(var) = self.opts.watched(name) {
            let var = var.to_string();
            self.debug_line(format_args!("[WATCH] {var}={v} (fn=@{} blk={})", fr.func.name, fr.label()));
        }
    }
}

/// Integer arithmetic with the trapping rules of each opcode. `i32`-typed
/// results wrap or trap at 32 bits.
fn int_op(op: Opcode, ty: Type, a: i64, b: i64) -> Result<i64, Fault> {
    let checked = matches!(op, Opcode::IAddOvf | Opcode::ISubOvf | Opcode::IMulOvf);
    let v = match int_binary(op, a, b) {
        Some(v) => v,
        None if matches!(op, Opcode::SDivChk0 | Opcode::SRemChk0) && b == 0 => {
            return Err(raise(TrapKind::DivideByZero, "divide by zero"));
        }
        None => return Err(raise(TrapKind::Overflow, format!("integer overflow in {op}"))),
    };
    if ty != Type::I32 {
        return Ok(v);
    }
    match i32::try_from(v) {
        Ok(n) => Ok(n as i64),
        Err(_) if checked => Err(raise(TrapKind::Overflow, format!("integer overflow in {op}"))),
        Err(_) => Ok(v as i32 as i64),
    }
}
