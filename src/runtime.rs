use std::fmt::Write as _;

use crate::air::{Instruction, Op, Program};
use crate::mem::Memory;
use crate::output::{Category, DiagSink, StderrSink};
use crate::parse::{parse_int, sign_extend_12, split_mem_operand};
use crate::parser::AsmParser;
use crate::symbol::{Register, RegisterError};

/// Default memory capacity in bytes.
pub const DEFAULT_MEMORY: usize = 4096;

/// Complete machine state: registers, PC, memory, the loaded program, and
/// the diagnostic sink. One instance per emulated machine; strictly
/// sequential.
pub struct RunState {
    /// 32x 32-bit two's-complement registers. x0 is pinned to zero.
    reg: [i32; 32],
    /// Program counter, in bytes.
    pc: i32,
    mem: Memory,
    program: Program,
    diag: Box<dyn DiagSink>,
}

/// What an executed instruction did to control flow.
enum Flow {
    /// Fall through to the next instruction.
    Next,
    /// PC already assigned.
    Jump,
    /// Stop stepping; PC untouched.
    Halt,
}

impl RunState {
    pub fn new() -> Self {
        Self::with_capacity_and_sink(DEFAULT_MEMORY, Box::new(StderrSink))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_sink(capacity, Box::new(StderrSink))
    }

    pub fn with_sink(sink: Box<dyn DiagSink>) -> Self {
        Self::with_capacity_and_sink(DEFAULT_MEMORY, sink)
    }

    pub fn with_capacity_and_sink(capacity: usize, sink: Box<dyn DiagSink>) -> Self {
        let mut state = RunState {
            reg: [0; 32],
            pc: 0,
            mem: Memory::new(capacity),
            program: Program::new(),
            diag: sink,
        };
        state.reset_state();
        state
    }

    /// Construction-time architectural state: everything zero except the
    /// stack pointer (top of memory) and global pointer (middle).
    fn reset_state(&mut self) {
        self.reg = [0; 32];
        self.reg[Register::SP.index()] = self.mem.capacity() as i32;
        self.reg[Register::GP.index()] = (self.mem.capacity() / 2) as i32;
        self.mem.reset();
        self.pc = 0;
    }

    /// Replace the program from source text (lines separated by `\n`) and
    /// re-initialize registers, memory, and PC. Never fails; problems are
    /// reported through the sink.
    pub fn load_program(&mut self, src: &str) {
        self.program = AsmParser::new(src).parse(self.diag.as_mut());
        self.reset_state();
    }

    /// Execute one instruction. Returns `false` when the machine halts:
    /// ECALL, PC out of range, or an unrecoverable access.
    pub fn step(&mut self) -> bool {
        self.reg[0] = 0;

        let index = self.pc / 4;
        let fetched = if self.pc >= 0 {
            self.program.get(index as usize).cloned()
        } else {
            None
        };
        let inst = match fetched {
            Some(inst) => inst,
            None => {
                self.report(Category::Core, "PC out of range - halting.");
                return false;
            }
        };

        self.report(
            Category::Exec,
            &format!("{} (PC={}, Line={})", inst, self.pc, inst.line),
        );

        match self.execute(&inst) {
            Flow::Next => {
                self.pc = self.pc.wrapping_add(4);
                self.reg[0] = 0;
                true
            }
            Flow::Jump => {
                self.reg[0] = 0;
                true
            }
            Flow::Halt => false,
        }
    }

    /// Step until halt or until `max_steps` is exhausted. Returns the
    /// number of steps taken.
    pub fn run(&mut self, max_steps: usize) -> usize {
        for steps in 0..max_steps {
            if !self.step() {
                return steps + 1;
            }
        }
        max_steps
    }

    // ---- Observation ----

    pub fn reg(&self, index: usize) -> i32 {
        self.reg[index]
    }

    /// Writes to register 0 are discarded.
    pub fn set_reg(&mut self, index: usize, val: i32) {
        if index != 0 {
            self.reg[index] = val;
        }
    }

    pub fn pc(&self) -> i32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: i32) {
        self.pc = pc;
    }

    /// Read-only view of the memory buffer.
    pub fn memory(&self) -> &[u8] {
        self.mem.as_bytes()
    }

    pub fn memory_capacity(&self) -> usize {
        self.mem.capacity()
    }

    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    pub fn label(&self, name: &str) -> Option<i32> {
        self.program.label(name)
    }

    pub fn label_count(&self) -> usize {
        self.program.label_count()
    }

    /// Source-line back-reference for the instruction at `pc`, -1 if out
    /// of range.
    pub fn source_line_for_pc(&self, pc: i32) -> i32 {
        self.program.source_line_for_pc(pc)
    }

    /// Human-readable snapshot: PC, all registers, and the first 64 memory
    /// words reconstructed little-endian.
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "PC={:#x}", self.pc);
        for (i, val) in self.reg.iter().enumerate() {
            let _ = write!(out, "x{i:02}={val:>11}");
            out.push_str(if (i + 1) % 8 == 0 { "\n" } else { "  " });
        }
        out.push_str("\nMemory[words 0..63]: ");
        for chunk in self.mem.as_bytes().chunks_exact(4).take(64) {
            let val = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let _ = write!(out, "{val}({val:#x}) ");
        }
        out.push('\n');
        out
    }

    // ---- Execution ----

    fn report(&mut self, category: Category, message: &str) {
        self.diag.emit(category, message);
    }

    fn read(&self, r: Register) -> i32 {
        self.reg[r.index()]
    }

    fn write_reg(&mut self, rd: Register, val: i32) {
        if rd != Register::ZERO {
            self.reg[rd.index()] = val;
        }
    }

    /// Resolve a register operand, substituting x0 on failure.
    fn register(&mut self, token: &str) -> Register {
        Register::resolve(token).unwrap_or_else(|e| {
            let category = match e {
                RegisterError::BadIndex(_) => Category::Error,
                RegisterError::UnknownName(_) => Category::Warning,
            };
            self.report(category, &e.to_string());
            Register::ZERO
        })
    }

    /// Resolve an integer operand, substituting 0 on failure.
    fn number(&mut self, token: &str) -> i32 {
        parse_int(token).unwrap_or_else(|e| {
            self.report(Category::Error, &e.to_string());
            0
        })
    }

    /// Resolve an `IMM(REG)` operand into a sign-extended displacement and
    /// base register. Missing parentheses are a hard failure.
    fn mem_operand(&mut self, token: &str) -> Result<(i32, Register), miette::Report> {
        let (imm, reg) = split_mem_operand(token)?;
        let imm = sign_extend_12(self.number(imm));
        let rs1 = self.register(reg);
        Ok((imm, rs1))
    }

    fn execute(&mut self, inst: &Instruction) -> Flow {
        match &inst.op {
            Op::Add => self.alu3(inst, |a, b| a.wrapping_add(b)),
            Op::Sub => self.alu3(inst, |a, b| a.wrapping_sub(b)),
            Op::Mul => self.alu3(inst, |a, b| a.wrapping_mul(b)),
            // Division by zero yields 0, no trap
            Op::Div => self.alu3(inst, |a, b| if b == 0 { 0 } else { a.wrapping_div(b) }),
            Op::Rem => self.alu3(inst, |a, b| if b == 0 { 0 } else { a.wrapping_rem(b) }),
            Op::And => self.alu3(inst, |a, b| a & b),
            Op::Or => self.alu3(inst, |a, b| a | b),
            Op::Xor => self.alu3(inst, |a, b| a ^ b),
            // wrapping_shl/shr mask the amount to the low 5 bits
            Op::Sll => self.alu3(inst, |a, b| a.wrapping_shl(b as u32)),
            Op::Srl => self.alu3(inst, |a, b| ((a as u32).wrapping_shr(b as u32)) as i32),
            Op::Sra => self.alu3(inst, |a, b| a.wrapping_shr(b as u32)),
            Op::Slt => self.alu3(inst, |a, b| (a < b) as i32),
            Op::Sltu => self.alu3(inst, |a, b| ((a as u32) < (b as u32)) as i32),

            Op::Addi => self.alu_i(inst, |a, b| a.wrapping_add(b)),
            Op::Andi => self.alu_i(inst, |a, b| a & b),
            Op::Ori => self.alu_i(inst, |a, b| a | b),
            Op::Xori => self.alu_i(inst, |a, b| a ^ b),
            Op::Slti => self.alu_i(inst, |a, b| (a < b) as i32),
            Op::Sltiu => self.alu_i(inst, |a, b| ((a as u32) < (b as u32)) as i32),
            Op::Slli => self.alu_i(inst, |a, shamt| a.wrapping_shl(shamt as u32)),
            Op::Srli => self.alu_i(inst, |a, shamt| {
                ((a as u32).wrapping_shr(shamt as u32)) as i32
            }),
            Op::Srai => self.alu_i(inst, |a, shamt| a.wrapping_shr(shamt as u32)),

            Op::Lui => {
                let rd = self.register(inst.arg(0));
                let imm = self.number(inst.arg(1));
                self.write_reg(rd, imm.wrapping_shl(12));
                Flow::Next
            }
            Op::Auipc => {
                let rd = self.register(inst.arg(0));
                let imm = self.number(inst.arg(1));
                self.write_reg(rd, self.pc.wrapping_add(imm.wrapping_shl(12)));
                Flow::Next
            }
            Op::La => self.load_address(inst),

            Op::Lb | Op::Lbu | Op::Lh | Op::Lhu | Op::Lw => self.load(inst),
            Op::Sb | Op::Sh | Op::Sw => self.store(inst),

            Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => self.branch(inst),

            Op::Jal => {
                let rd = self.register(inst.arg(0));
                let target = inst.arg(1);
                self.write_reg(rd, self.pc.wrapping_add(4));

                if let Some(addr) = self.program.label(target) {
                    self.pc = addr;
                } else {
                    // Numeric targets are byte offsets from the jump itself
                    match parse_int(target) {
                        Ok(offset) => self.pc = self.pc.wrapping_add(offset),
                        Err(_) => {
                            self.report(
                                Category::Warning,
                                &format!("JAL target not found: {target}"),
                            );
                            self.pc = self.pc.wrapping_add(4);
                        }
                    }
                }
                self.report(Category::Core, &format!("JAL -> {target} (PC={})", self.pc));
                Flow::Jump
            }
            Op::Jalr => {
                let rd = self.register(inst.arg(0));
                let (imm, rs1) = match self.mem_operand(inst.arg(1)) {
                    Ok(operand) => operand,
                    Err(e) => {
                        self.report(Category::Error, &e.to_string());
                        return Flow::Halt;
                    }
                };
                self.write_reg(rd, self.pc.wrapping_add(4));
                self.pc = self.read(rs1).wrapping_add(imm) & !1;
                self.report(Category::Core, &format!("JALR -> addr={}", self.pc));
                Flow::Jump
            }

            Op::Ecall => {
                self.report(Category::Core, "ECALL - program halted.");
                Flow::Halt
            }

            Op::Unknown(name) => {
                self.report(Category::Warning, &format!("Unknown opcode: {name}"));
                Flow::Next
            }
        }
    }

    /// R-type skeleton: `rd, rs1, rs2`.
    fn alu3(&mut self, inst: &Instruction, f: impl Fn(i32, i32) -> i32) -> Flow {
        let rd = self.register(inst.arg(0));
        let rs1 = self.register(inst.arg(1));
        let rs2 = self.register(inst.arg(2));
        let result = f(self.read(rs1), self.read(rs2));
        self.write_reg(rd, result);
        Flow::Next
    }

    /// I-type skeleton: `rd, rs1, imm` with a 12-bit sign-extended
    /// immediate.
    fn alu_i(&mut self, inst: &Instruction, f: impl Fn(i32, i32) -> i32) -> Flow {
        let rd = self.register(inst.arg(0));
        let rs1 = self.register(inst.arg(1));
        let imm = sign_extend_12(self.number(inst.arg(2)));
        let result = f(self.read(rs1), imm);
        self.write_reg(rd, result);
        Flow::Next
    }

    /// LA rd, label: materialize a label address via the LUI+ADDI halves
    /// without touching an intermediate register.
    fn load_address(&mut self, inst: &Instruction) -> Flow {
        let rd = self.register(inst.arg(0));
        let label = inst.arg(1);
        let addr = match self.program.label(label) {
            Some(addr) => addr,
            None => {
                self.report(Category::Warning, &format!("LA label not found: {label}"));
                return Flow::Next;
            }
        };
        let upper = addr.wrapping_add(0x800) >> 12;
        let mut lower = addr & 0xFFF;
        if lower & 0x800 != 0 {
            lower -= 0x1000;
        }
        self.write_reg(rd, (upper.wrapping_shl(12)).wrapping_add(lower));
        Flow::Next
    }

    fn load(&mut self, inst: &Instruction) -> Flow {
        let rd = self.register(inst.arg(0));
        let (imm, rs1) = match self.mem_operand(inst.arg(1)) {
            Ok(operand) => operand,
            Err(e) => {
                self.report(Category::Error, &e.to_string());
                return Flow::Halt;
            }
        };
        let addr = self.read(rs1).wrapping_add(imm);

        let loaded = match inst.op {
            Op::Lb => self.mem.load8(addr).map(|v| v as i8 as i32),
            Op::Lbu => self.mem.load8(addr).map(|v| v as i32),
            Op::Lh => self.mem.load16(addr, "LH").map(|v| v as i16 as i32),
            Op::Lhu => self.mem.load16(addr, "LHU").map(|v| v as i32),
            Op::Lw => self.mem.load32(addr, "LW").map(|v| v as i32),
            _ => unreachable!("load called on a non-load opcode"),
        };
        match loaded {
            Ok(val) => {
                self.write_reg(rd, val);
                Flow::Next
            }
            Err(e) => {
                self.report(Category::Warning, &e.to_string());
                Flow::Halt
            }
        }
    }

    fn store(&mut self, inst: &Instruction) -> Flow {
        let rs2 = self.register(inst.arg(0));
        let (imm, rs1) = match self.mem_operand(inst.arg(1)) {
            Ok(operand) => operand,
            Err(e) => {
                self.report(Category::Error, &e.to_string());
                return Flow::Halt;
            }
        };
        let addr = self.read(rs1).wrapping_add(imm);
        let val = self.read(rs2);

        let stored = match inst.op {
            Op::Sb => self.mem.store8(addr, val as u8),
            Op::Sh => self.mem.store16(addr, val as u16, "SH"),
            Op::Sw => self.mem.store32(addr, val as u32, "SW"),
            _ => unreachable!("store called on a non-store opcode"),
        };
        match stored {
            Ok(()) => Flow::Next,
            Err(e) => {
                self.report(Category::Warning, &e.to_string());
                Flow::Halt
            }
        }
    }

    fn branch(&mut self, inst: &Instruction) -> Flow {
        let rs1 = self.register(inst.arg(0));
        let rs2 = self.register(inst.arg(1));
        let target = inst.arg(2);

        // Labels give a PC-relative byte offset; otherwise the operand is
        // a 12-bit sign-extended offset
        let offset = match self.program.label(target) {
            Some(addr) => addr.wrapping_sub(self.pc),
            None => sign_extend_12(self.number(target)),
        };

        let a = self.read(rs1);
        let b = self.read(rs2);
        let take = match inst.op {
            Op::Beq => a == b,
            Op::Bne => a != b,
            Op::Blt => a < b,
            Op::Bge => a >= b,
            Op::Bltu => (a as u32) < (b as u32),
            Op::Bgeu => (a as u32) >= (b as u32),
            _ => unreachable!("branch called on a non-branch opcode"),
        };

        if take {
            self.pc = self.pc.wrapping_add(offset);
            self.report(
                Category::Core,
                &format!("{} taken -> PC={}", inst.op, self.pc),
            );
            Flow::Jump
        } else {
            self.report(
                Category::Core,
                &format!("{} not taken -> next PC={}", inst.op, self.pc.wrapping_add(4)),
            );
            Flow::Next
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
