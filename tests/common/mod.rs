//! Shared helpers for the integration tests.
//!
//! Besides a few AST fixtures this module carries a small interpreter for the AArch64
//! subset qcc emits, so tests can check what generated code computes rather than only
//! what it looks like. The interpreter models x0..x30, sp, a byte-addressed memory
//! holding the stack and the `.data` section, and the two Darwin system calls the
//! builtins use (`write` and `exit`).

#![allow(dead_code)]

use std::collections::HashMap;

use qcc::{compile_unit, AstBuilder, BinaryOp, CodegenOptions, FnDef, FnSignature, Param, Type};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const MEM_BASE: u64 = 0x1000_0000;
const MEM_SIZE: usize = 1 << 20;
const DATA_BASE: u64 = MEM_BASE + 0x100;
const RETURN_SENTINEL: u64 = 0xdead_0000;
const STEP_LIMIT: usize = 1_000_000;

/// Compile a unit with default options, panicking on errors.
pub fn compile(defs: &[FnDef<'_>]) -> String {
    compile_unit(&[], defs, CodegenOptions::default()).expect("unit should compile")
}

/// Result of running one function to completion.
#[derive(Debug)]
pub struct Outcome {
    pub ret: i64,
    pub stdout: String,
    pub exit_code: Option<i64>,
    pub steps: usize,
}

/// Run `function` (unprefixed name) of `asm` with integer arguments.
pub fn run(asm: &str, function: &str, args: &[i64]) -> Outcome {
    let program = Program::parse(asm);
    let mut machine = Machine::new(&program);
    let ret = machine.call(function, args);
    Outcome {
        ret,
        stdout: String::from_utf8_lossy(&machine.stdout).into_owned(),
        exit_code: machine.exit_code,
        steps: machine.steps,
    }
}

/// Instruction lines of `asm` with indentation removed.
pub fn lines(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Text of one function, from its label to its closing `ret`.
pub fn function_text<'t>(asm: &'t str, name: &str) -> &'t str {
    let start = asm
        .find(&format!("\n_{name}:\n"))
        .unwrap_or_else(|| panic!("function {name} not found"));
    let tail = &asm[start + 1..];
    let end = tail.find("\n        ret\n").map_or(tail.len(), |i| i + "\n        ret\n".len());
    &tail[..end]
}

// ---- fixtures ----

/// `int add(int a, int b) { return a + b; }`
pub fn add_function<'a>(b: &AstBuilder<'a>) -> FnDef<'a> {
    let sum = b
        .binary(BinaryOp::Add, b.var("a", Type::Int), b.var("b", Type::Int))
        .unwrap();
    b.function(
        FnSignature::new(
            Type::Int,
            "add",
            vec![Param::new(Type::Int, "a"), Param::new(Type::Int, "b")],
        ),
        [b.ret(sum)],
    )
}

/// `int count(int n) { int i = 0; while (i < n) { i = i + 1; } return i; }`
pub fn count_function<'a>(b: &AstBuilder<'a>) -> FnDef<'a> {
    let body = [
        b.initialize(Type::Int, "i", b.int(0)).unwrap(),
        b.while_loop(
            b.binary(BinaryOp::Lt, b.var("i", Type::Int), b.var("n", Type::Int)).unwrap(),
            [b.assign(
                "i",
                b.binary(BinaryOp::Add, b.var("i", Type::Int), b.int(1)).unwrap(),
            )
            .unwrap()],
        )
        .unwrap(),
        b.ret(b.var("i", Type::Int)),
    ];
    b.function(
        FnSignature::new(Type::Int, "count", vec![Param::new(Type::Int, "n")]),
        body,
    )
}

// ---- interpreter ----

/// Parsed assembly: instructions, code labels and the initial data image.
pub struct Program {
    insts: Vec<String>,
    labels: HashMap<String, usize>,
    data: Vec<u8>,
    data_labels: HashMap<String, u64>,
}

impl Program {
    pub fn parse(asm: &str) -> Self {
        let mut insts = Vec::new();
        let mut labels = HashMap::new();
        let mut data = Vec::new();
        let mut data_labels = HashMap::new();
        let mut in_data = false;

        for raw in asm.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = line.strip_suffix(':') {
                if in_data {
                    data_labels.insert(label.to_owned(), DATA_BASE + data.len() as u64);
                } else {
                    assert!(
                        labels.insert(label.to_owned(), insts.len()).is_none(),
                        "duplicate label {label}"
                    );
                }
                continue;
            }
            match line {
                ".text" => in_data = false,
                ".data" => in_data = true,
                _ if line.starts_with(".asciz ") => {
                    data.extend(unescape(&line[".asciz ".len()..]));
                    data.push(0);
                }
                _ if line.starts_with('.') => {}
                _ => insts.push(line.to_owned()),
            }
        }

        Self { insts, labels, data, data_labels }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }
}

fn unescape(quoted: &str) -> Vec<u8> {
    let inner = quoted.trim().trim_start_matches('"').trim_end_matches('"');
    let bytes = inner.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'0'..=b'7' => {
                let digits = std::str::from_utf8(&bytes[i - 1..i + 2]).unwrap();
                out.push(u8::from_str_radix(digits, 8).unwrap());
                i += 2;
            }
            other => out.push(other),
        }
    }
    out
}

/// Operands of one instruction, split at top-level commas.
fn operands(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if !text[start..].trim().is_empty() {
        out.push(text[start..].trim());
    }
    out
}

fn immediate(text: &str) -> i64 {
    let digits = text.trim().trim_start_matches('#');
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse(),
    }
    .unwrap_or_else(|_| panic!("bad immediate {text}"));
    if negative {
        -value
    } else {
        value
    }
}

pub struct Machine<'p> {
    program: &'p Program,
    x: [u64; 31],
    sp: u64,
    mem: Vec<u8>,
    flags: (i64, i64),
    pc: usize,
    pub stdout: Vec<u8>,
    pub exit_code: Option<i64>,
    pub steps: usize,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        let mut mem = vec![0; MEM_SIZE];
        let data_start = (DATA_BASE - MEM_BASE) as usize;
        mem[data_start..data_start + program.data.len()].copy_from_slice(&program.data);
        Self {
            program,
            x: [0; 31],
            sp: MEM_BASE + MEM_SIZE as u64,
            mem,
            flags: (0, 0),
            pc: 0,
            stdout: Vec::new(),
            exit_code: None,
            steps: 0,
        }
    }

    /// Call `_name` with `args` in x0.. and return x0. Checks that the stack pointer and
    /// frame pointer survive the call.
    pub fn call(&mut self, name: &str, args: &[i64]) -> i64 {
        for (i, arg) in args.iter().enumerate() {
            self.x[i] = *arg as u64;
        }
        let sp = self.sp;
        let fp = 0x5eed_f00d;
        self.x[29] = fp;
        self.x[30] = RETURN_SENTINEL;
        self.pc = self.label(&format!("_{name}"));

        while self.exit_code.is_none() {
            if self.pc == RETURN_SENTINEL as usize {
                assert_eq!(self.sp, sp, "stack pointer not restored by {name}");
                assert_eq!(self.x[29], fp, "frame pointer not restored by {name}");
                break;
            }
            self.steps += 1;
            assert!(self.steps < STEP_LIMIT, "step limit exceeded");
            let inst = self.program.insts[self.pc].clone();
            self.pc += 1;
            self.step(&inst);
        }
        self.x[0] as i64
    }

    fn label(&self, label: &str) -> usize {
        *self
            .program
            .labels
            .get(label)
            .unwrap_or_else(|| panic!("undefined label {label}"))
    }

    fn read(&self, reg: &str) -> u64 {
        match reg {
            "sp" => self.sp,
            "xzr" | "wzr" => 0,
            _ => {
                let (wide, index) = reg.split_at(1);
                let value = self.x[index.parse::<usize>().unwrap_or_else(|_| panic!("bad register {reg}"))];
                if wide == "w" {
                    value & 0xffff_ffff
                } else {
                    value
                }
            }
        }
    }

    fn write(&mut self, reg: &str, value: u64) {
        match reg {
            "sp" => self.sp = value,
            "xzr" | "wzr" => {}
            _ => {
                let (wide, index) = reg.split_at(1);
                let index: usize = index.parse().unwrap_or_else(|_| panic!("bad register {reg}"));
                self.x[index] = if wide == "w" { value & 0xffff_ffff } else { value };
            }
        }
    }

    fn value(&self, operand: &str) -> u64 {
        if operand.starts_with('#') {
            immediate(operand) as u64
        } else if operand.ends_with("@PAGEOFF") {
            0
        } else if let Some(label) = operand.strip_suffix("@PAGE") {
            *self
                .program
                .data_labels
                .get(label)
                .unwrap_or_else(|| panic!("undefined data label {label}"))
        } else {
            self.read(operand)
        }
    }

    fn index(&self, addr: u64, width: usize) -> usize {
        let index = addr
            .checked_sub(MEM_BASE)
            .unwrap_or_else(|| panic!("address {addr:#x} below memory")) as usize;
        assert!(index + width <= MEM_SIZE, "address {addr:#x} above memory");
        index
    }

    fn load(&self, addr: u64, width: usize) -> u64 {
        let index = self.index(addr, width);
        let mut bytes = [0; 8];
        bytes[..width].copy_from_slice(&self.mem[index..index + width]);
        u64::from_le_bytes(bytes)
    }

    fn store(&mut self, addr: u64, width: usize, value: u64) {
        let index = self.index(addr, width);
        self.mem[index..index + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }

    /// Effective address of a memory operand, applying pre- or post-index writeback.
    fn address(&mut self, mem: &str, post: Option<&str>) -> u64 {
        let pre = mem.ends_with('!');
        let inner = mem.trim_end_matches('!').trim_start_matches('[').trim_end_matches(']');
        let mut parts = inner.split(',').map(str::trim);
        let base = parts.next().unwrap_or_default();
        let offset = parts.next().map_or(0, immediate);
        let base_value = self.read(base);

        if pre {
            let addr = base_value.wrapping_add(offset as u64);
            self.write(base, addr);
            addr
        } else if let Some(post) = post {
            self.write(base, base_value.wrapping_add(immediate(post) as u64));
            base_value
        } else {
            base_value.wrapping_add(offset as u64)
        }
    }

    fn condition(&self, cond: &str) -> bool {
        let (a, b) = self.flags;
        match cond {
            "eq" => a == b,
            "ne" => a != b,
            "lt" => a < b,
            "gt" => a > b,
            "le" => a <= b,
            "ge" => a >= b,
            _ => panic!("unknown condition {cond}"),
        }
    }

    fn step(&mut self, inst: &str) {
        let (mnemonic, rest) = inst.split_once(' ').unwrap_or((inst, ""));
        let ops = operands(rest);

        if let Some(cond) = mnemonic.strip_prefix("b.") {
            if self.condition(cond) {
                self.pc = self.label(ops[0]);
            }
            return;
        }

        match mnemonic {
            "mov" => self.write(ops[0], self.value(ops[1])),
            "movk" => {
                let shift = immediate(ops[2].trim_start_matches("LSL").trim());
                let old = self.read(ops[0]) & !(0xffff << shift);
                self.write(ops[0], old | ((immediate(ops[1]) as u64) << shift));
            }
            "adrp" => self.write(ops[0], self.value(ops[1])),
            "add" | "sub" | "mul" | "sdiv" | "udiv" | "and" | "orr" | "eor" => {
                let a = self.value(ops[1]);
                let shift = ops.get(3).map_or(0, |s| immediate(s.trim_start_matches("lsl").trim()));
                let b = self.value(ops[2]) << shift;
                let result = match mnemonic {
                    "add" => a.wrapping_add(b),
                    "sub" => a.wrapping_sub(b),
                    "mul" => a.wrapping_mul(b),
                    "sdiv" if b == 0 => 0,
                    "sdiv" => (a as i64).wrapping_div(b as i64) as u64,
                    "udiv" if b == 0 => 0,
                    "udiv" => a / b,
                    "and" => a & b,
                    "orr" => a | b,
                    _ => a ^ b,
                };
                self.write(ops[0], result);
            }
            "msub" => {
                let product = self.value(ops[1]).wrapping_mul(self.value(ops[2]));
                self.write(ops[0], self.value(ops[3]).wrapping_sub(product));
            }
            "neg" => self.write(ops[0], self.value(ops[1]).wrapping_neg()),
            "mvn" => self.write(ops[0], !self.value(ops[1])),
            "cmp" => self.flags = (self.value(ops[0]) as i64, self.value(ops[1]) as i64),
            "cset" => self.write(ops[0], u64::from(self.condition(ops[1]))),
            "cneg" => {
                let value = self.value(ops[1]);
                let result = if self.condition(ops[2]) { value.wrapping_neg() } else { value };
                self.write(ops[0], result);
            }
            "ldr" | "ldrb" => {
                let width = if mnemonic == "ldrb" { 1 } else { 8 };
                let addr = self.address(ops[1], ops.get(2).copied());
                let value = self.load(addr, width);
                self.write(ops[0], value);
            }
            "str" | "strb" => {
                let width = if mnemonic == "strb" { 1 } else { 8 };
                let value = self.read(ops[0]);
                let addr = self.address(ops[1], ops.get(2).copied());
                self.store(addr, width, value);
            }
            "stp" => {
                let (a, b) = (self.read(ops[0]), self.read(ops[1]));
                let addr = self.address(ops[2], ops.get(3).copied());
                self.store(addr, 8, a);
                self.store(addr + 8, 8, b);
            }
            "ldp" => {
                let addr = self.address(ops[2], ops.get(3).copied());
                let (a, b) = (self.load(addr, 8), self.load(addr + 8, 8));
                self.write(ops[0], a);
                self.write(ops[1], b);
            }
            "b" => self.pc = self.label(ops[0]),
            "cbnz" => {
                if self.read(ops[0]) != 0 {
                    self.pc = self.label(ops[1]);
                }
            }
            "bl" => {
                assert_eq!(self.sp % 16, 0, "misaligned stack at call to {}", ops[0]);
                self.x[30] = self.pc as u64;
                self.pc = self.label(ops[0]);
            }
            "ret" => self.pc = self.x[30] as usize,
            "svc" => self.syscall(),
            _ => panic!("unsupported instruction: {inst}"),
        }
    }

    fn syscall(&mut self) {
        match self.x[16] {
            1 => self.exit_code = Some(self.x[0] as i64),
            4 => {
                let (addr, len) = (self.x[1], self.x[2] as usize);
                let index = self.index(addr, len);
                let bytes = self.mem[index..index + len].to_vec();
                self.stdout.extend(bytes);
                self.x[0] = len as u64;
            }
            other => panic!("unsupported system call {other}"),
        }
    }
}
