use std::fmt;

use fxhash::FxHashMap;

/// Canonical opcode tag. Everything here is dispatched directly by the
/// stepper; pseudo-instructions other than `LA` are rewritten away during
/// loading and never appear in a program.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Op {
    // R-type
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Sll,
    Srl,
    Sra,
    Slt,
    Sltu,
    // I-type
    Addi,
    Andi,
    Ori,
    Xori,
    Slti,
    Sltiu,
    Slli,
    Srli,
    Srai,
    // Upper immediate
    Lui,
    Auipc,
    // Loads / stores
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Sb,
    Sh,
    Sw,
    // Branches
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    // Jumps
    Jal,
    Jalr,
    /// Load-address pseudo, kept and resolved at execute time.
    La,
    /// Environment call; the only system instruction, halts the machine.
    Ecall,
    /// Anything unrecognized, kept verbatim for diagnostics.
    Unknown(String),
}

impl Op {
    /// Map an uppercased mnemonic onto its tag. `La` is absent here: it
    /// enters a program only through the expander, which checks arity.
    pub fn from_mnemonic(mnemonic: &str) -> Op {
        match mnemonic {
            "ADD" => Op::Add,
            "SUB" => Op::Sub,
            "MUL" => Op::Mul,
            "DIV" => Op::Div,
            "REM" => Op::Rem,
            "AND" => Op::And,
            "OR" => Op::Or,
            "XOR" => Op::Xor,
            "SLL" => Op::Sll,
            "SRL" => Op::Srl,
            "SRA" => Op::Sra,
            "SLT" => Op::Slt,
            "SLTU" => Op::Sltu,
            "ADDI" => Op::Addi,
            "ANDI" => Op::Andi,
            "ORI" => Op::Ori,
            "XORI" => Op::Xori,
            "SLTI" => Op::Slti,
            "SLTIU" => Op::Sltiu,
            "SLLI" => Op::Slli,
            "SRLI" => Op::Srli,
            "SRAI" => Op::Srai,
            "LUI" => Op::Lui,
            "AUIPC" => Op::Auipc,
            "LB" => Op::Lb,
            "LBU" => Op::Lbu,
            "LH" => Op::Lh,
            "LHU" => Op::Lhu,
            "LW" => Op::Lw,
            "SB" => Op::Sb,
            "SH" => Op::Sh,
            "SW" => Op::Sw,
            "BEQ" => Op::Beq,
            "BNE" => Op::Bne,
            "BLT" => Op::Blt,
            "BGE" => Op::Bge,
            "BLTU" => Op::Bltu,
            "BGEU" => Op::Bgeu,
            "JAL" => Op::Jal,
            "JALR" => Op::Jalr,
            "ECALL" => Op::Ecall,
            other => Op::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Rem => "REM",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Xor => "XOR",
            Op::Sll => "SLL",
            Op::Srl => "SRL",
            Op::Sra => "SRA",
            Op::Slt => "SLT",
            Op::Sltu => "SLTU",
            Op::Addi => "ADDI",
            Op::Andi => "ANDI",
            Op::Ori => "ORI",
            Op::Xori => "XORI",
            Op::Slti => "SLTI",
            Op::Sltiu => "SLTIU",
            Op::Slli => "SLLI",
            Op::Srli => "SRLI",
            Op::Srai => "SRAI",
            Op::Lui => "LUI",
            Op::Auipc => "AUIPC",
            Op::Lb => "LB",
            Op::Lbu => "LBU",
            Op::Lh => "LH",
            Op::Lhu => "LHU",
            Op::Lw => "LW",
            Op::Sb => "SB",
            Op::Sh => "SH",
            Op::Sw => "SW",
            Op::Beq => "BEQ",
            Op::Bne => "BNE",
            Op::Blt => "BLT",
            Op::Bge => "BGE",
            Op::Bltu => "BLTU",
            Op::Bgeu => "BGEU",
            Op::Jal => "JAL",
            Op::Jalr => "JALR",
            Op::La => "LA",
            Op::Ecall => "ECALL",
            Op::Unknown(name) => name,
        };
        f.write_str(name)
    }
}

/// One canonical instruction. Operands stay as raw source tokens and are
/// resolved on every execution.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub op: Op,
    pub args: Vec<String>,
    /// Zero-based line index in the original input, -1 if unknown.
    pub line: i32,
}

impl Instruction {
    pub fn new(op: Op, args: Vec<String>, line: i32) -> Self {
        Instruction { op, args, line }
    }

    /// Operand token by position; missing operands read as empty.
    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map_or("", String::as_str)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for (i, arg) in self.args.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{arg}")?;
        }
        Ok(())
    }
}

/// A loaded program: the instruction vector plus the label table. The
/// byte address of the instruction at index `i` is `4 * i`.
#[derive(Default, Debug)]
pub struct Program {
    ast: Vec<Instruction>,
    labels: FxHashMap<String, i32>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn push(&mut self, inst: Instruction) {
        self.ast.push(inst);
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.ast.get(index)
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Byte address one past the last instruction; where the next label
    /// would bind.
    pub fn end_address(&self) -> i32 {
        (self.ast.len() * 4) as i32
    }

    /// Bind a label to a byte address. Rebinding overwrites.
    pub fn bind_label(&mut self, name: &str, address: i32) {
        self.labels.insert(name.to_string(), address);
    }

    pub fn label(&self, name: &str) -> Option<i32> {
        self.labels.get(name).copied()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Source-line back-reference for the instruction at a byte address,
    /// -1 when the address maps outside the program.
    pub fn source_line_for_pc(&self, pc: i32) -> i32 {
        if pc < 0 {
            return -1;
        }
        match self.ast.get((pc / 4) as usize) {
            Some(inst) => inst.line,
            None => -1,
        }
    }
}
