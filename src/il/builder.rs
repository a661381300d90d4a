use super::{Block, Function, Instr, Opcode, Param, TempId, Type, Value};

/// Appends instructions to one function, tracking the insertion block.
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current: usize,
    loc: u32,
}

impl<'f> FunctionBuilder<'f> {
    /// Start building into `func`, creating its entry block if needed.
    pub fn new(func: &'f mut Function) -> Self {
        if func.blocks.is_empty() {
            func.blocks.push(Block::new("entry"));
        }
        FunctionBuilder { func, current: 0, loc: 0 }
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn param(&mut self, name: &str, ty: Type) -> Value {
        let id = self.func.new_named_temp(name);
        self.func.params.push(Param { id, ty });
        Value::Temp(id)
    }

    /// Create an empty block with a label derived from `base`.
    pub fn create_block(&mut self, base: &str) -> String {
        let label = self.func.fresh_label(base);
        self.func.blocks.push(Block::new(label.clone()));
        label
    }

    pub fn block_param(&mut self, label: &str, ty: Type) -> Value {
        let id = self.func.new_temp();
        if let Some(b) = self.func.blocks.iter_mut().find(|b| b.label == label) {
            b.params.push(Param { id, ty });
        }
        Value::Temp(id)
    }

    pub fn switch_to(&mut self, label: &str) {
        if let Some(i) = self.func.block_index(label) {
            self.current = i;
        }
    }

    pub fn current_label(&self) -> &str {
        &self.func.blocks[self.current].label
    }

    pub fn is_terminated(&self) -> bool {
        self.func.blocks[self.current].terminated
    }

    pub fn set_loc(&mut self, line: u32) {
        self.loc = line;
    }

    /// Append `instr`. Code after a terminator goes to a fresh block
    /// nothing branches to.
    pub fn emit(&mut self, mut instr: Instr) {
        if self.is_terminated() {
            let dead = self.create_block("dead");
            self.switch_to(&dead);
        }
        instr.loc = self.loc;
        let block = &mut self.func.blocks[self.current];
        if instr.op.is_terminator() {
            block.terminated = true;
        }
        block.instrs.push(instr);
    }

    fn emit_value(&mut self, op: Opcode, ty: Type, operands: Vec<Value>) -> Value {
        let id = self.func.new_temp();
        let mut instr = Instr::new(op, ty, operands);
        instr.result = Some(id);
        self.emit(instr);
        Value::Temp(id)
    }

    /// Any opcode with a fixed result type.
    pub fn op(&mut self, op: Opcode, operands: Vec<Value>) -> Value {
        let ty = op.fixed_result().unwrap_or(Type::I64);
        self.emit_value(op, ty, operands)
    }

    pub fn binary(&mut self, op: Opcode, lhs: Value, rhs: Value) -> Value {
        self.op(op, vec![lhs, rhs])
    }

    pub fn unary(&mut self, op: Opcode, v: Value) -> Value {
        self.op(op, vec![v])
    }

    pub fn alloca(&mut self) -> Value {
        self.emit_value(Opcode::Alloca, Type::Ptr, vec![Value::ConstInt(8)])
    }

    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.emit_value(Opcode::Load, ty, vec![ptr])
    }

    pub fn store(&mut self, ty: Type, ptr: Value, v: Value) {
        self.emit(Instr::new(Opcode::Store, ty, vec![ptr, v]));
    }

    pub fn const_str(&mut self, global: &str) -> Value {
        self.emit_value(Opcode::ConstStr, Type::Str, vec![Value::Global(global.to_string())])
    }

    pub fn const_null(&mut self) -> Value {
        self.emit_value(Opcode::ConstNull, Type::Ptr, Vec::new())
    }

    /// Emit a call; the result is `None` for `void` callees.
    pub fn call(&mut self, callee: &str, ret: Type, args: Vec<Value>) -> Option<Value> {
        let mut instr = Instr::new(Opcode::Call, ret, args);
        instr.callee = Some(callee.to_string());
        let result = (ret != Type::Void).then(|| self.func.new_temp());
        instr.result = result;
        self.emit(instr);
        result.map(Value::Temp)
    }

    pub fn br(&mut self, label: &str, args: Vec<Value>) {
        self.emit(Instr::br(label, args));
    }

    pub fn cbr(&mut self, cond: Value, t: &str, f: &str) {
        self.emit(Instr::cbr(cond, t, Vec::new(), f, Vec::new()));
    }

    /// `switch_i32` on `v`: `cases` are (value, label) pairs.
    pub fn switch_i32(&mut self, v: Value, default: &str, cases: &[(i64, String)]) {
        let mut instr = Instr::new(Opcode::SwitchI32, Type::Void, vec![v]);
        instr.labels.push(default.to_string());
        instr.br_args.push(Vec::new());
        for (value, label) in cases {
            instr.operands.push(Value::ConstInt(*value));
            instr.labels.push(label.clone());
            instr.br_args.push(Vec::new());
        }
        self.emit(instr);
    }

    pub fn ret(&mut self, v: Option<Value>) {
        self.emit(Instr::ret(v));
    }

    pub fn trap(&mut self) {
        self.emit(Instr::new(Opcode::Trap, Type::Void, Vec::new()));
    }

    pub fn eh_push(&mut self, handler: &str) {
        let mut instr = Instr::new(Opcode::EhPush, Type::Void, Vec::new());
        instr.labels.push(handler.to_string());
        instr.br_args.push(Vec::new());
        self.emit(instr);
    }

    pub fn eh_pop(&mut self) {
        self.emit(Instr::new(Opcode::EhPop, Type::Void, Vec::new()));
    }

    pub fn resume(&mut self, op: Opcode, label: Option<&str>) {
        let mut instr = Instr::new(op, Type::Void, Vec::new());
        if let Some(l) = label {
            instr.labels.push(l.to_string());
            instr.br_args.push(Vec::new());
        }
        self.emit(instr);
    }

    pub fn temp(&mut self) -> TempId {
        self.func.new_temp()
    }

    pub fn named_temp(&mut self, name: &str) -> TempId {
        self.func.new_named_temp(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitting_after_a_terminator_opens_a_dead_block() {
        let mut f = Function::new("f", Type::Void);
        let mut b = FunctionBuilder::new(&mut f);
        b.ret(None);
        b.call("rt_print_nl", Type::Void, Vec::new());
        b.ret(None);
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[1].label, "dead");
        assert!(f.blocks.iter().all(|b| b.terminated));
    }

    #[test]
    fn results_get_fresh_temps() {
        let mut f = Function::new("f", Type::I64);
        let mut b = FunctionBuilder::new(&mut f);
        let n = b.param("n", Type::I64);
        let sum = b.binary(Opcode::IAddOvf, n.clone(), Value::ConstInt(1));
        assert_eq!(n, Value::Temp(0));
        assert_eq!(sum, Value::Temp(1));
        assert_eq!(f.temp_name(0), "n");
        assert_eq!(f.temp_name(1), "t1");
    }
}
