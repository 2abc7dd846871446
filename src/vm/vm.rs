use crate::common::chunk::Chunk;
use crate::common::opcode::Opcode;
use crate::common::value::{Array, Range, Ref, Value};
use crate::vm::trace::{Trace, TraceKind};

use std::rc::Rc;

/// The default operand stack size, in slots.
pub const DEFAULT_STACK_SIZE: usize = 1 << 10;

/// A stack-and-slots execution engine.
///
/// The operand stack and the named-variable slots share the same
/// storage: slot `i` is simply `stack[i]`, with the slot base pinned
/// at the bottom (there is a single frame, alive for the whole run).
/// Reference counting rides on `Rc`: reading a slot or constant into
/// the stack clones (retains), popping drops (releases), and
/// overwriting a slot drops the old value after the new one is in
/// place.
#[derive(Debug)]
pub struct VM {
    stack: Vec<Value>,
    size: usize,
}

impl VM {
    /// Creates a VM with a fixed-size operand stack.
    pub fn init(stack_size: usize) -> VM {
        VM {
            stack: Vec::with_capacity(stack_size),
            size: stack_size,
        }
    }

    /// Pushes a value, checking for overflow.
    pub fn push(&mut self, val: Value) -> Result<(), Trace> {
        if self.stack.len() >= self.size {
            return Err(Trace::error(TraceKind::Range, "stack overflow"));
        }
        self.stack.push(val);
        Ok(())
    }

    /// The top of the stack, if any; useful for post-mortem
    /// inspection after a failed run.
    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Pops and hands over the top of the stack, if any.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    fn pop_value(&mut self) -> Result<Value, Trace> {
        self.stack
            .pop()
            .ok_or_else(|| Trace::error(TraceKind::Range, "stack underflow"))
    }

    /// Reads the `Ref` held in `slot`; anything else there means the
    /// compiler and the VM disagree about which slots are bindings.
    fn get_ref(&self, slot: usize) -> Result<Ref, Trace> {
        match &self.stack[slot] {
            Value::Ref(r) => Ok(r.clone()),
            other => Err(Trace::error(
                TraceKind::Type,
                format!("cannot dereference {}", other.type_name()),
            )),
        }
    }

    /// Interprets `chunk` from its first byte until `Return` halts
    /// the run. On success the stack holds exactly one value: the
    /// program's result. On error the stack is preserved as-is.
    pub fn run(&mut self, chunk: &Chunk) -> Result<(), Trace> {
        log::debug!(
            "running chunk: {} code byte(s), {} constant(s)",
            chunk.code.len(),
            chunk.constants.len()
        );

        let mut ip = 0;
        while ip < chunk.code.len() {
            let op = Opcode::try_from(chunk.code[ip])
                .map_err(|_| Trace::error(TraceKind::Range, "invalid opcode"))?;
            log::trace!("[{:04x}] {}", ip, op.name());

            let imm = if op.has_operand() {
                let byte = *chunk
                    .code
                    .get(ip + 1)
                    .ok_or_else(|| Trace::error(TraceKind::Range, "malformed bytecode"))?;
                ip += 2;
                byte
            } else {
                ip += 1;
                0
            };

            match op {
                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::False => self.push(Value::Bool(false))?,
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::Int => self.push(Value::Number(imm as f64))?,
                Opcode::Const => {
                    let val = chunk.constants[imm as usize].clone();
                    self.push(val)?;
                }
                Opcode::Range => {
                    let end = self.pop_value()?;
                    let start = self.pop_value()?;
                    if !start.is_int() || !end.is_int() {
                        return Err(Trace::error(
                            TraceKind::Type,
                            format!(
                                "cannot create a range with {} and {}",
                                start.type_name(),
                                end.type_name()
                            ),
                        ));
                    }
                    let range = Range::new(start.as_int(), end.as_int());
                    self.push(Value::Range(Rc::new(range)))?;
                }
                Opcode::Array => {
                    let n = imm as usize;
                    let elements = self.stack.split_off(self.stack.len() - n);
                    self.push(Value::Array(Rc::new(Array::from_vec(elements))))?;
                }
                Opcode::LocalRef => self.push(Value::Ref(Ref::Slot(imm as usize)))?,
                Opcode::Pop => {
                    self.pop_value()?;
                }
                Opcode::GetLocal => {
                    let val = self.stack[imm as usize].clone();
                    self.push(val)?;
                }
                Opcode::SetLocal => {
                    let val = self.pop_value()?;
                    self.stack[imm as usize] = val;
                }
                Opcode::GetLocalByRef => {
                    let val = match self.get_ref(imm as usize)? {
                        Ref::Slot(slot) => self.stack[slot].clone(),
                        Ref::Element(arr, index) => arr.get(index),
                    };
                    self.push(val)?;
                }
                Opcode::SetLocalByRef => {
                    let val = self.pop_value()?;
                    match self.get_ref(imm as usize)? {
                        Ref::Slot(slot) => self.stack[slot] = val,
                        Ref::Element(arr, index) => arr.set(index, val),
                    }
                }
                Opcode::GetElement => {
                    let index = self.pop_value()?;
                    let target = self.pop_value()?;
                    match target {
                        Value::Array(arr) => {
                            let i = check_index(&index, arr.count() as i64)?;
                            let elem = arr.get(i as usize);
                            self.push(elem)?;
                        }
                        Value::Range(range) => {
                            let i = check_index(&index, range.count())?;
                            self.push(Value::Number(range.get(i) as f64))?;
                        }
                        other => {
                            return Err(Trace::error(
                                TraceKind::Type,
                                format!("cannot index {}", other.type_name()),
                            ));
                        }
                    }
                }
                Opcode::ElementRef => {
                    let index = self.pop_value()?;
                    let target = self.pop_value()?;
                    match target {
                        Value::Array(arr) => {
                            let i = check_index(&index, arr.count() as i64)?;
                            self.push(Value::Ref(Ref::Element(arr, i as usize)))?;
                        }
                        other => {
                            return Err(Trace::error(
                                TraceKind::Type,
                                format!("cannot reference into {}", other.type_name()),
                            ));
                        }
                    }
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                    self.binary(op)?;
                }
                Opcode::Neg => {
                    let val = self.pop_value()?;
                    match val {
                        Value::Number(n) => self.push(Value::Number(-n))?,
                        other => {
                            return Err(Trace::error(
                                TraceKind::Type,
                                format!("cannot negate {}", other.type_name()),
                            ));
                        }
                    }
                }
                Opcode::Return => {
                    // the result survives; every local beneath it is released
                    let result = self.pop_value()?;
                    self.stack.clear();
                    self.stack.push(result);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn binary(&mut self, op: Opcode) -> Result<(), Trace> {
        let rhs = self.pop_value()?;
        let lhs = self.pop_value()?;
        let (a, b) = match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                let (l, r) = (lhs.type_name(), rhs.type_name());
                let message = match op {
                    Opcode::Add => format!("cannot add {} and {}", l, r),
                    Opcode::Sub => format!("cannot subtract {} from {}", r, l),
                    Opcode::Mul => format!("cannot multiply {} by {}", l, r),
                    Opcode::Div => format!("cannot divide {} by {}", l, r),
                    Opcode::Mod => format!("cannot calculate the modulus of {} by {}", l, r),
                    _ => unreachable!("not a binary opcode"),
                };
                return Err(Trace::error(TraceKind::Type, message));
            }
        };
        // `%` on f64 is fmod
        let num = match op {
            Opcode::Add => a + b,
            Opcode::Sub => a - b,
            Opcode::Mul => a * b,
            Opcode::Div => a / b,
            Opcode::Mod => a % b,
            _ => unreachable!("not a binary opcode"),
        };
        self.push(Value::Number(num))
    }
}

fn check_index(index: &Value, count: i64) -> Result<i64, Trace> {
    if !index.is_int() {
        return Err(Trace::error(
            TraceKind::Type,
            format!("cannot use {} as an index", index.type_name()),
        ));
    }
    let i = index.as_int();
    if i < 0 || i >= count {
        return Err(Trace::error(TraceKind::Range, "index out of range"));
    }
    Ok(i)
}
