//! A tiny interpreter for the instruction subset the generator emits, so
//! tests can check what a program returns without an assembler.

#![allow(dead_code)]

use std::collections::HashMap;

use cinder_codegen::{generate, generate_with, GenOptions, LabelAllocator};
use cinder_parse::parse_str;

const STACK_TOP: i64 = 0x7fff_0000;
const RETURN_SENTINEL: i64 = -1;
const STEP_LIMIT: usize = 5_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    DivideByZero,
    UnknownLabel(String),
    UnknownInstruction(String),
    BadOperand(String),
    StepLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// `%rax` when `_main` returned.
    pub value: i64,
    /// Calls made with `%rsp` not 16-byte aligned.
    pub misaligned_calls: usize,
    /// Deepest stack use in bytes.
    pub max_stack_bytes: i64,
}

pub fn compile(src: &str) -> String {
    let program = parse_str("<test>", src).expect("parse ok");
    generate(&program).expect("codegen ok")
}

pub fn compile_with(src: &str, options: GenOptions) -> String {
    let program = parse_str("<test>", src).expect("parse ok");
    generate_with(&program, &mut LabelAllocator::new(), options).expect("codegen ok")
}

/// Compile and run `src`, returning what `main` returned.
pub fn run(src: &str) -> i64 {
    execute(&compile(src)).expect("program runs").value
}

struct Instr {
    op: String,
    operands: Vec<String>,
}

struct Machine {
    regs: HashMap<&'static str, i64>,
    stack: HashMap<i64, i64>,
    globals: HashMap<String, i64>,
    /// Operands of the last `cmp src, dst`, as (dst, src).
    flags: (i64, i64),
}

const REGISTERS: [&str; 8] = ["rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp"];

impl Machine {
    fn reg(&self, name: &str) -> i64 {
        self.regs.get(name).copied().unwrap_or(0)
    }

    fn set_reg(&mut self, name: &str, value: i64) -> Result<(), Fault> {
        let key = REGISTERS
            .iter()
            .find(|r| **r == name)
            .ok_or_else(|| Fault::BadOperand(name.to_string()))?;
        self.regs.insert(*key, value);
        Ok(())
    }

    fn push(&mut self, value: i64) {
        let sp = self.reg("rsp") - 8;
        self.regs.insert("rsp", sp);
        self.stack.insert(sp, value);
    }

    fn pop(&mut self) -> i64 {
        let sp = self.reg("rsp");
        self.regs.insert("rsp", sp + 8);
        self.stack.get(&sp).copied().unwrap_or(0)
    }

    fn read(&self, operand: &str) -> Result<i64, Fault> {
        if let Some(imm) = operand.strip_prefix('$') {
            return imm
                .parse()
                .map_err(|_| Fault::BadOperand(operand.to_string()));
        }
        if operand == "%al" {
            return Ok(self.reg("rax") & 0xff);
        }
        if let Some(reg) = operand.strip_prefix('%') {
            return Ok(self.reg(reg));
        }
        if let Some(symbol) = operand.strip_suffix("(%rip)") {
            return self
                .globals
                .get(symbol)
                .copied()
                .ok_or_else(|| Fault::UnknownLabel(symbol.to_string()));
        }
        if let Some(offset) = operand.strip_suffix("(%rbp)") {
            let offset: i64 = offset
                .parse()
                .map_err(|_| Fault::BadOperand(operand.to_string()))?;
            let addr = self.reg("rbp") + offset;
            return Ok(self.stack.get(&addr).copied().unwrap_or(0));
        }
        Err(Fault::BadOperand(operand.to_string()))
    }

    fn write(&mut self, operand: &str, value: i64) -> Result<(), Fault> {
        if operand == "%al" {
            let rax = self.reg("rax");
            self.regs.insert("rax", (rax & !0xff) | (value & 0xff));
            return Ok(());
        }
        if let Some(reg) = operand.strip_prefix('%') {
            return self.set_reg(reg, value);
        }
        if let Some(symbol) = operand.strip_suffix("(%rip)") {
            return match self.globals.get_mut(symbol) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(Fault::UnknownLabel(symbol.to_string())),
            };
        }
        if let Some(offset) = operand.strip_suffix("(%rbp)") {
            let offset: i64 = offset
                .parse()
                .map_err(|_| Fault::BadOperand(operand.to_string()))?;
            let addr = self.reg("rbp") + offset;
            self.stack.insert(addr, value);
            return Ok(());
        }
        Err(Fault::BadOperand(operand.to_string()))
    }
}

/// Split assembly text into instructions, jump targets and initial globals.
fn load(asm: &str) -> (Vec<Instr>, HashMap<String, usize>, HashMap<String, i64>) {
    let mut instrs = Vec::new();
    let mut labels = HashMap::new();
    let mut globals = HashMap::new();
    let mut in_data = false;
    let mut current_symbol = None;

    for line in asm.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with(".section") {
            in_data = true;
            continue;
        }
        if let Some(label) = line.strip_suffix(':') {
            if in_data {
                current_symbol = Some(label.to_string());
            } else {
                labels.insert(label.to_string(), instrs.len());
            }
            continue;
        }
        if in_data {
            if let (Some(value), Some(symbol)) = (line.strip_prefix(".quad "), &current_symbol) {
                globals.insert(symbol.clone(), value.trim().parse().expect("quad value"));
            }
            continue;
        }
        if line.starts_with('.') {
            continue;
        }
        let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
        let operands = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        instrs.push(Instr {
            op: op.to_string(),
            operands,
        });
    }
    (instrs, labels, globals)
}

fn operand(instr: &Instr, i: usize) -> Result<&str, Fault> {
    instr
        .operands
        .get(i)
        .map(String::as_str)
        .ok_or_else(|| Fault::BadOperand(format!("{} missing operand {i}", instr.op)))
}

/// Run `_main` from the given assembly.
pub fn execute(asm: &str) -> Result<Outcome, Fault> {
    let (instrs, labels, globals) = load(asm);
    let mut m = Machine {
        regs: HashMap::new(),
        stack: HashMap::new(),
        globals,
        flags: (0, 0),
    };
    m.regs.insert("rsp", STACK_TOP);
    m.push(RETURN_SENTINEL);

    let target = |name: &str| {
        labels
            .get(name)
            .copied()
            .ok_or_else(|| Fault::UnknownLabel(name.to_string()))
    };

    let mut pc = target("_main")?;
    let mut misaligned_calls = 0;
    let mut max_stack_bytes = 0;

    for _ in 0..STEP_LIMIT {
        let instr = instrs
            .get(pc)
            .ok_or_else(|| Fault::UnknownInstruction(format!("pc {pc} out of range")))?;
        let arg = |i: usize| operand(instr, i);
        pc += 1;

        match instr.op.as_str() {
            "movq" | "mov" => {
                let v = m.read(arg(0)?)?;
                m.write(arg(1)?, v)?;
            }
            "movzbq" => {
                let v = m.read(arg(0)?)? & 0xff;
                m.write(arg(1)?, v)?;
            }
            "push" => {
                let v = m.read(arg(0)?)?;
                m.push(v);
            }
            "pop" => {
                let v = m.pop();
                m.write(arg(0)?, v)?;
            }
            "add" | "sub" | "imul" | "xor" => {
                let src = m.read(arg(0)?)?;
                let dst = m.read(arg(1)?)?;
                let v = match instr.op.as_str() {
                    "add" => dst.wrapping_add(src),
                    "sub" => dst.wrapping_sub(src),
                    "imul" => dst.wrapping_mul(src),
                    _ => dst ^ src,
                };
                m.write(arg(1)?, v)?;
            }
            "neg" => {
                let v = m.read(arg(0)?)?;
                m.write(arg(0)?, v.wrapping_neg())?;
            }
            "not" => {
                let v = m.read(arg(0)?)?;
                m.write(arg(0)?, !v)?;
            }
            "cqo" => {
                let rdx = if m.reg("rax") < 0 { -1 } else { 0 };
                m.regs.insert("rdx", rdx);
            }
            "idiv" => {
                let divisor = m.read(arg(0)?)? as i128;
                if divisor == 0 {
                    return Err(Fault::DivideByZero);
                }
                let dividend = ((m.reg("rdx") as i128) << 64) | (m.reg("rax") as u64 as i128);
                m.regs.insert("rax", (dividend / divisor) as i64);
                m.regs.insert("rdx", (dividend % divisor) as i64);
            }
            "cmp" => {
                let src = m.read(arg(0)?)?;
                let dst = m.read(arg(1)?)?;
                m.flags = (dst, src);
            }
            "sete" | "setne" | "setl" | "setle" | "setg" | "setge" => {
                let (a, b) = m.flags;
                let bit = match instr.op.as_str() {
                    "sete" => a == b,
                    "setne" => a != b,
                    "setl" => a < b,
                    "setle" => a <= b,
                    "setg" => a > b,
                    _ => a >= b,
                };
                m.write(arg(0)?, bit as i64)?;
            }
            "jmp" => pc = target(arg(0)?)?,
            "je" => {
                if m.flags.0 == m.flags.1 {
                    pc = target(arg(0)?)?;
                }
            }
            "jne" => {
                if m.flags.0 != m.flags.1 {
                    pc = target(arg(0)?)?;
                }
            }
            "callq" | "call" => {
                if m.reg("rsp") % 16 != 0 {
                    misaligned_calls += 1;
                }
                let dest = target(arg(0)?)?;
                m.push(pc as i64);
                pc = dest;
            }
            "ret" => {
                let back = m.pop();
                if back == RETURN_SENTINEL {
                    return Ok(Outcome {
                        value: m.reg("rax"),
                        misaligned_calls,
                        max_stack_bytes,
                    });
                }
                pc = back as usize;
            }
            other => return Err(Fault::UnknownInstruction(other.to_string())),
        }

        max_stack_bytes = max_stack_bytes.max(STACK_TOP - m.reg("rsp"));
    }
    Err(Fault::StepLimit)
}
