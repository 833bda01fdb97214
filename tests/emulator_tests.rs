//! End-to-end scenarios driven through the public surface: load a source
//! program, step it, observe registers, memory, and diagnostics.

use rivet::{BufferSink, Category, NullSink, RunState};

fn machine(src: &str) -> RunState {
    let mut state = RunState::with_sink(Box::new(NullSink));
    state.load_program(src);
    state
}

#[test]
fn addition() {
    let mut state = machine(
        "addi x5, x0, 10\n\
         addi x6, x0, 32\n\
         add x7, x5, x6\n\
         ecall\n",
    );
    assert!(state.step());
    assert!(state.step());
    assert!(state.step());
    assert_eq!(state.reg(7), 42);
    assert!(!state.step());
}

#[test]
fn loop_sum_one_to_ten() {
    // Sum 1..=10 into x5, halting by stepping past the last instruction
    let src = "\
        addi x5, x0, 0\n\
        addi x6, x0, 0\n\
loop:   addi x6, x6, 1\n\
        add x5, x5, x6\n\
        addi x7, x0, 10\n\
        bne x6, x7, loop\n";

    let sink = BufferSink::new();
    let mut state = RunState::with_sink(Box::new(sink.clone()));
    state.load_program(src);

    let steps = state.run(1000);
    assert_eq!(state.reg(5), 55);
    // 2 setup steps, 10 iterations of 4, and the failing fetch
    assert_eq!(steps, 43);
    assert_eq!(
        sink.messages(Category::Core)
            .iter()
            .filter(|m| m.contains("BNE taken"))
            .count(),
        9
    );
    assert!(sink.contains(Category::Core, "PC out of range"));
}

#[test]
fn little_endian_store_load() {
    let mut state = machine(
        "li x5, 0x12345678\n\
         sw x5, 0(x0)\n\
         lbu x6, 0(x0)\n\
         lbu x7, 3(x0)\n",
    );
    state.run(100);
    assert_eq!(state.reg(6), 0x78);
    assert_eq!(state.reg(7), 0x12);
    assert_eq!(&state.memory()[..4], &[0x78, 0x56, 0x34, 0x12]);
}

#[test]
fn unaligned_halfword_load() {
    let sink = BufferSink::new();
    let mut state = RunState::with_sink(Box::new(sink.clone()));
    state.load_program("lh x5, 1(x0)\n");
    assert!(!state.step());
    assert_eq!(state.reg(5), 0);
    assert!(sink.contains(Category::Warning, "Misaligned"));
}

#[test]
fn jal_ret_round_trip() {
    let mut state = machine(
        "main: jal ra, fn\n\
               addi x5, x0, 1\n\
               ecall\n\
         fn:   ret\n",
    );
    assert!(state.step());
    assert_eq!(state.pc(), 12);
    assert_eq!(state.reg(1), 4); // address of the instruction after the JAL
    assert!(state.step()); // ret
    assert_eq!(state.pc(), 4);
    assert!(state.step());
    assert_eq!(state.reg(5), 1);
    assert!(!state.step()); // ecall
}

#[test]
fn la_of_labeled_datum() {
    let mut state = machine(
        "la x5, data\n\
         ecall\n\
         data: addi x0, x0, 0\n",
    );
    assert!(state.step());
    assert_eq!(state.reg(5), 8); // 4 * index of the instruction after data:
}

#[test]
fn la_matches_label_table() {
    let mut state = machine(
        "addi x6, x0, 1\n\
         here: la x5, here\n\
         ecall\n",
    );
    state.run(100);
    assert_eq!(Some(state.reg(5)), state.label("here"));
}

#[test]
fn pseudo_mv_equals_addi() {
    let mut via_mv = machine("addi x5, x0, 7\nmv x7, x5\necall");
    let mut via_addi = machine("addi x5, x0, 7\naddi x7, x5, 0\necall");
    via_mv.run(100);
    via_addi.run(100);
    assert_eq!(via_mv.reg(7), via_addi.reg(7));
    assert_eq!(via_mv.pc(), via_addi.pc());
}

#[test]
fn li_boundary_values() {
    let mut state = machine("li x5, 2047\nli x6, 2048\nli x7, -1\necall");
    state.run(100);
    assert_eq!(state.reg(5), 2047);
    assert_eq!(state.reg(6), 2048);
    assert_eq!(state.reg(7), -1);
    // 2047 fits a single ADDI, 2048 takes the LUI+ADDI pair
    assert_eq!(state.program_len(), 1 + 2 + 1 + 1);
}

#[test]
fn literal_round_trip_via_addi() {
    for (text, expected) in [
        ("0", 0),
        ("2047", 2047),
        ("-2048", -2048),
        ("0x7ff", 2047),
        ("-0x1", -1),
    ] {
        let mut state = machine(&format!("addi x5, x0, {text}\necall"));
        state.run(10);
        assert_eq!(state.reg(5), expected, "literal {text}");
    }
}

#[test]
fn x0_stays_zero_through_a_program() {
    let mut state = machine(
        "addi x0, x0, 5\n\
         li x0, 123456\n\
         add x0, x2, x3\n\
         lui x0, 20\n\
         la x0, end\n\
         jal x0, end\n\
         end: ecall\n",
    );
    loop {
        let more = state.step();
        assert_eq!(state.reg(0), 0);
        if !more {
            break;
        }
    }
}

#[test]
fn registers_reset_between_loads() {
    let mut state = machine("addi x10, x0, 1\nsb x10, 0(x0)\necall");
    state.run(10);
    assert_eq!(state.reg(10), 1);
    assert_eq!(state.memory()[0], 1);

    state.load_program("ecall");
    assert_eq!(state.reg(10), 0);
    assert_eq!(state.memory()[0], 0);
    assert_eq!(state.reg(2), state.memory_capacity() as i32);
    assert_eq!(state.reg(3), (state.memory_capacity() / 2) as i32);
}

#[test]
fn custom_capacity() {
    let mut state = RunState::with_capacity_and_sink(64, Box::new(NullSink));
    state.load_program("sw x0, 60(x0)\nsw x0, 64(x0)");
    assert_eq!(state.reg(2), 64);
    assert_eq!(state.reg(3), 32);
    assert!(state.step());
    assert!(!state.step()); // one past the end
}

#[test]
fn diagnostics_on_load() {
    let sink = BufferSink::new();
    let mut state = RunState::with_sink(Box::new(sink.clone()));
    state.load_program("start: addi x5, x0, 1\nj start\n");
    assert!(sink.contains(Category::Label, "start"));
    assert!(sink.contains(Category::Core, "Program loaded: 2 instructions, 1 labels."));
}

#[test]
fn exec_trace_carries_source_lines() {
    let sink = BufferSink::new();
    let mut state = RunState::with_sink(Box::new(sink.clone()));
    state.load_program("# leading comment\naddi x5, x0, 1\necall");
    state.run(10);
    let exec = sink.messages(Category::Exec);
    assert_eq!(exec.len(), 2);
    assert!(exec[0].contains("ADDI x5, x0, 1"));
    assert!(exec[0].contains("Line=1"));
    assert!(exec[1].contains("ECALL"));
}
