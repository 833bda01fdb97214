use crate::air::{Instruction, Op, Program};
use crate::lexer::{lex_line, RawStmt};
use crate::output::{Category, DiagSink};
use crate::parse::parse_int;

/// Transforms source text into a loaded [`Program`].
///
/// Loading never fails: malformed pieces substitute defaults and report
/// through the diagnostic sink, so the result is always runnable (possibly
/// empty).
pub struct AsmParser<'a> {
    src: &'a str,
    program: Program,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser {
            src,
            program: Program::new(),
        }
    }

    /// Consume the parser, producing the program vector and label table.
    pub fn parse(mut self, diag: &mut dyn DiagSink) -> Program {
        for (index, raw) in self.src.lines().enumerate() {
            let lexed = lex_line(raw);

            // Labels bind to the byte address of the next instruction
            for label in &lexed.labels {
                let addr = self.program.end_address();
                self.program.bind_label(label, addr);
                diag.emit(Category::Label, &format!("{label} -> {addr:#x}"));
            }

            if let Some(stmt) = lexed.stmt {
                for inst in expand_pseudo(stmt, index as i32, diag) {
                    self.program.push(inst);
                }
            }
        }

        diag.emit(
            Category::Core,
            &format!(
                "Program loaded: {} instructions, {} labels.",
                self.program.len(),
                self.program.label_count()
            ),
        );
        self.program
    }
}

/// Rewrite a pseudo-instruction into its canonical sequence. Mnemonics
/// that are not pseudos, or whose operand count does not match, pass
/// through unchanged. Every produced instruction inherits the source line.
fn expand_pseudo(stmt: RawStmt, line: i32, diag: &mut dyn DiagSink) -> Vec<Instruction> {
    let RawStmt { opcode, args } = stmt;

    match (opcode.as_str(), args.len()) {
        // MV rd, rs -> ADDI rd, rs, 0
        ("MV", 2) => vec![Instruction::new(
            Op::Addi,
            vec![args[0].clone(), args[1].clone(), "0".into()],
            line,
        )],
        // LI rd, imm -> ADDI, or LUI + ADDI when imm does not fit 12 bits
        ("LI", 2) => {
            let imm = parse_int(&args[1]).unwrap_or_else(|e| {
                diag.emit(Category::Error, &e.to_string());
                0
            });
            let rd = args[0].clone();

            if (-2048..=2047).contains(&imm) {
                vec![Instruction::new(
                    Op::Addi,
                    vec![rd, "x0".into(), imm.to_string()],
                    line,
                )]
            } else {
                let uimm = imm as u32;
                let upper = (uimm.wrapping_add(0x800) >> 12) as i32;
                let mut lower = (uimm & 0xFFF) as i32;
                if lower & 0x800 != 0 {
                    lower -= 0x1000;
                }
                vec![
                    Instruction::new(Op::Lui, vec![rd.clone(), upper.to_string()], line),
                    Instruction::new(Op::Addi, vec![rd.clone(), rd, lower.to_string()], line),
                ]
            }
        }
        // J label -> JAL x0, label
        ("J", 1) => vec![Instruction::new(
            Op::Jal,
            vec!["x0".into(), args[0].clone()],
            line,
        )],
        // JR rs -> JALR x0, 0(rs)
        ("JR", 1) => vec![Instruction::new(
            Op::Jalr,
            vec!["x0".into(), format!("0({})", args[0])],
            line,
        )],
        // RET -> JALR x0, 0(x1)
        ("RET", 0) => vec![Instruction::new(
            Op::Jalr,
            vec!["x0".into(), "0(x1)".into()],
            line,
        )],
        // LA stays a pseudo, resolved at execution
        ("LA", 2) => vec![Instruction::new(Op::La, args, line)],
        // Everything else dispatches as-is
        _ => vec![Instruction::new(Op::from_mnemonic(&opcode), args, line)],
    }
}
