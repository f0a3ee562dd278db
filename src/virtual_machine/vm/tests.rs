use super::*;
use crate::storage::snapshot_store::{self, SnapshotLoad};
use crate::utils::test_utils::utils::{counting_program, vm_with_lines, vm_with_program};
use crate::virtual_machine::errors::DecodeError;
use tempfile::tempdir;

fn run_to_end(vm: &mut VirtualMachine) -> Vec<RegisterDump> {
    let mut dumps = Vec::new();
    loop {
        let report = vm.run_slice().expect("vm run failed");
        dumps.extend(report.dumps);
        match report.stop {
            SliceStop::SliceExhausted => continue,
            SliceStop::Finished => return dumps,
            SliceStop::MigrationRequested(t) => panic!("unexpected migration to {t}"),
        }
    }
}

fn run_and_get(lines: &[&str], reg: u8) -> i32 {
    let mut vm = vm_with_program("test", lines, 64);
    run_to_end(&mut vm);
    vm.registers().get(reg)
}

fn run_expect_err(lines: &[&str]) -> VMError {
    let mut vm = vm_with_program("test", lines, 64);
    vm.run_slice().expect_err("expected error")
}

// ==================== Arithmetic ====================

#[test]
fn load_immediate() {
    assert_eq!(run_and_get(&["li $4, 42"], 4), 42);
    assert_eq!(run_and_get(&["li $4, -1"], 4), -1);
}

#[test]
fn add_registers() {
    assert_eq!(run_and_get(&["li $3, 5", "li $4, 7", "add $2, $3, $4"], 2), 12);
}

#[test]
fn sub_registers() {
    assert_eq!(run_and_get(&["li $3, 5", "li $4, 7", "sub $2, $3, $4"], 2), -2);
}

#[test]
fn mul_registers() {
    assert_eq!(run_and_get(&["li $3, -6", "li $4, 7", "mul $2, $3, $4"], 2), -42);
}

#[test]
fn addi_adds_immediate() {
    assert_eq!(run_and_get(&["li $1, 10", "addi $2, $1, -15"], 2), -5);
}

#[test]
fn arithmetic_wraps_on_overflow() {
    assert_eq!(
        run_and_get(&["li $1, 2147483647", "addi $1, $1, 1"], 1),
        i32::MIN
    );
    assert_eq!(
        run_and_get(&["li $1, -2147483648", "li $2, 1", "sub $3, $1, $2"], 3),
        i32::MAX
    );
    assert_eq!(
        run_and_get(&["li $1, 65536", "mul $2, $1, $1"], 2),
        0
    );
}

#[test]
fn bitwise_ops() {
    let prelude = ["li $1, 12", "li $2, 10"];
    let with = |op: &str| {
        let mut lines = prelude.to_vec();
        lines.push(op);
        run_and_get(&lines, 3)
    };
    assert_eq!(with("and $3, $1, $2"), 8);
    assert_eq!(with("or $3, $1, $2"), 14);
    assert_eq!(with("or $3, $1, 3"), 15);
    assert_eq!(with("xor $3, $1, $2"), 6);
}

#[test]
fn shift_left() {
    assert_eq!(run_and_get(&["li $3, 1", "sll $2, $3, 2"], 2), 4);
    assert_eq!(run_and_get(&["li $3, 1", "sll $2, $3, 31"], 2), i32::MIN);
}

#[test]
fn shift_right_is_logical() {
    let v = run_and_get(&["li $3, -2", "srl $2, $3, 1"], 2);
    assert_eq!(v, 0x7FFF_FFFF);
    assert!(v > 0);
    assert_eq!(run_and_get(&["li $3, -1", "srl $2, $3, 31"], 2), 1);
    assert_eq!(run_and_get(&["li $3, 64", "srl $2, $3, 3"], 2), 8);
}

#[test]
fn zero_register_is_ordinary() {
    assert_eq!(run_and_get(&["li $0, 9", "addi $0, $0, 1"], 0), 10);
}

// ==================== Decoding failures ====================

#[test]
fn decode_failure_reports_pc_and_line() {
    match run_expect_err(&["li $1, 1", "add $2, $1"]) {
        VMError::Decode { pc, line, source } => {
            assert_eq!(pc, 1);
            assert_eq!(line, "add $2, $1");
            assert!(matches!(source, DecodeError::ArityMismatch { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn decode_failure_never_writes_partially() {
    let mut vm = vm_with_program("test", &["li $1, 5", "addi $1, $1, oops"], 8);
    assert!(vm.run_slice().is_err());
    assert_eq!(vm.registers().get(1), 5);
    assert_eq!(vm.pc(), 1);
}

#[test]
fn unknown_register_is_error() {
    assert!(matches!(
        run_expect_err(&["li $32, 1"]),
        VMError::Decode {
            source: DecodeError::InvalidRegister(_),
            ..
        }
    ));
}

#[test]
fn exact_case_rejects_uppercase_arithmetic() {
    assert!(matches!(
        run_expect_err(&["LI $1, 1"]),
        VMError::Decode {
            source: DecodeError::UnknownInstruction(_),
            ..
        }
    ));
}

#[test]
fn insensitive_case_is_per_vm() {
    let mut vm = VirtualMachine::new("loose").with_opcode_case(OpcodeCase::Insensitive);
    vm.configure(4).unwrap();
    vm.load(Program::from_lines(["LI $1, 3", "Add $2, $1, $1"]))
        .unwrap();
    run_to_end(&mut vm);
    assert_eq!(vm.registers().get(2), 6);
}

// ==================== Slicing ====================

#[test]
fn end_to_end_single_slice_dump() {
    let mut vm = vm_with_program(
        "Local Machine",
        &[
            "li $1,10",
            "li $2,20",
            "add $3,$1,$2",
            "DUMP_PROCESSOR_STATE",
        ],
        4,
    );
    let report = vm.run_slice().unwrap();
    assert_eq!(report.executed, 4);
    assert_eq!(report.stop, SliceStop::Finished);
    assert_eq!(report.dumps.len(), 1);
    assert_eq!(report.dumps[0].get(3), 30);
    assert_eq!(report.dumps[0].vm_name, "Local Machine");
    assert!(report.dumps[0].to_string().contains("R3: 30"));
}

#[test]
fn slice_bounds_instruction_count() {
    let mut vm = vm_with_lines("test", counting_program(5), 2);

    let first = vm.run_slice().unwrap();
    assert_eq!(first.executed, 2);
    assert_eq!(first.stop, SliceStop::SliceExhausted);
    assert_eq!(vm.pc(), 2);

    let second = vm.run_slice().unwrap();
    assert_eq!(second.executed, 2);
    assert_eq!(vm.pc(), 4);

    let third = vm.run_slice().unwrap();
    assert_eq!(third.executed, 1);
    assert_eq!(third.stop, SliceStop::Finished);
    assert_eq!(vm.registers().get(1), 5);
}

#[test]
fn slice_ending_exactly_at_end_reports_finished() {
    let mut vm = vm_with_lines("test", counting_program(4), 2);
    vm.run_slice().unwrap();
    let report = vm.run_slice().unwrap();
    assert_eq!(report.executed, 2);
    assert_eq!(report.stop, SliceStop::Finished);
    assert!(vm.is_finished());
}

#[test]
fn step_past_end_is_finished() {
    let mut vm = vm_with_program("test", &[], 1);
    assert_eq!(vm.step().unwrap(), Step::Finished);
    assert_eq!(vm.run_slice().unwrap().stop, SliceStop::Finished);
}

#[test]
fn blank_lines_occupy_slots() {
    let mut vm = vm_with_program("test", &["li $1, 1", "", "# note", "li $2, 2"], 10);
    let report = vm.run_slice().unwrap();
    assert_eq!(report.executed, 4);
    assert_eq!(vm.pc(), 4);
}

// ==================== Configuration ====================

#[test]
fn zero_slice_rejected() {
    let mut vm = VirtualMachine::new("test");
    assert!(matches!(vm.configure(0), Err(VMError::InvalidSlice)));
    assert_eq!(vm.slice(), DEFAULT_SLICE);
}

#[test]
fn program_loads_once() {
    let mut vm = VirtualMachine::new("test");
    vm.load(Program::from_lines(["li $1, 1"])).unwrap();
    assert!(matches!(
        vm.load(Program::from_lines(["li $1, 2"])),
        Err(VMError::ProgramAlreadyLoaded)
    ));
    assert_eq!(vm.program_len(), 1);
}

#[test]
fn load_file_missing_program() {
    let dir = tempdir().unwrap();
    let mut vm = VirtualMachine::new("test");
    assert!(matches!(
        vm.load_file(dir.path().join("missing.asm")),
        Err(VMError::ProgramNotFound { .. })
    ));
}

// ==================== Migration halts ====================

#[test]
fn migrate_halts_before_executing() {
    let mut vm = vm_with_program(
        "src",
        &[
            "li $1, 42",
            "li $2, 1",
            "li $3, 2",
            "MIGRATE 127.0.0.1",
            "li $1, 0",
        ],
        10,
    );
    let report = vm.run_slice().unwrap();
    assert_eq!(
        report.stop,
        SliceStop::MigrationRequested(Ipv4Addr::LOCALHOST)
    );
    assert_eq!(report.executed, 3);
    assert_eq!(vm.pc(), 3);
    assert_eq!(vm.registers().get(1), 42);

    // Stays halted on the same instruction.
    assert_eq!(
        vm.step().unwrap(),
        Step::MigrationRequested(Ipv4Addr::LOCALHOST)
    );
    assert_eq!(vm.pc(), 3);
}

#[test]
fn migrate_as_first_instruction_halts_immediately() {
    let mut vm = vm_with_program("src", &["MIGRATE 10.1.2.3", "li $1, 1"], 4);
    let report = vm.run_slice().unwrap();
    assert_eq!(report.executed, 0);
    assert_eq!(
        report.stop,
        SliceStop::MigrationRequested(Ipv4Addr::new(10, 1, 2, 3))
    );
    assert_eq!(vm.pc(), 0);
}

#[test]
fn destination_treats_migrate_as_nop() {
    let mut vm = VirtualMachine::new("dst").with_role(VmRole::Destination);
    vm.configure(10).unwrap();
    vm.load(Program::from_lines(["MIGRATE 127.0.0.1", "li $1, 7"]))
        .unwrap();
    let report = vm.run_slice().unwrap();
    assert_eq!(report.stop, SliceStop::Finished);
    assert_eq!(vm.registers().get(1), 7);
}

#[test]
fn resume_after_migration_skips_migrate_instruction() {
    let lines = ["li $1, 42", "", "", "MIGRATE 127.0.0.1", "addi $2, $1, 1"];
    let mut src = vm_with_program("src", &["li $1, 42", "", "", "MIGRATE 127.0.0.1"], 10);
    src.run_slice().unwrap();

    let mut dst = VirtualMachine::new("dst").with_role(VmRole::Destination);
    dst.configure(10).unwrap();
    dst.load(Program::from_lines(lines)).unwrap();
    dst.resume_after_migration(src.state());
    assert_eq!(dst.pc(), 4);
    assert_eq!(dst.registers().get(1), 42);

    let report = dst.run_slice().unwrap();
    assert_eq!(report.stop, SliceStop::Finished);
    assert_eq!(dst.registers().get(2), 43);
}

// ==================== Snapshots ====================

#[test]
fn snapshot_instruction_writes_registers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vm.snap");
    let snapshot = format!("SNAPSHOT {}", path.display());
    let mut vm = vm_with_program("snap", &["li $5, 55", &snapshot, "li $5, 0"], 10);
    run_to_end(&mut vm);

    match snapshot_store::load(&path).unwrap() {
        SnapshotLoad::Restored(regs) => assert_eq!(regs.get(5), 55),
        SnapshotLoad::ColdStart => panic!("snapshot missing"),
    }
    assert_eq!(vm.registers().get(5), 0);
}

#[test]
fn failed_snapshot_does_not_stop_execution() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no_such_dir").join("vm.snap");
    let snapshot = format!("SNAPSHOT {}", path.display());
    let mut vm = vm_with_program("snap", &[&snapshot, "li $1, 1"], 10);
    let report = vm.run_slice().unwrap();
    assert_eq!(report.stop, SliceStop::Finished);
    assert_eq!(vm.registers().get(1), 1);
}

#[test]
fn restore_registers_restarts_at_zero() {
    let mut vm = vm_with_lines("test", counting_program(3), 2);
    vm.run_slice().unwrap();
    assert_eq!(vm.pc(), 2);

    let mut regs = RegisterFile::new();
    regs.set(1, 100);
    vm.restore_registers(regs);
    assert_eq!(vm.pc(), 0);
    run_to_end(&mut vm);
    assert_eq!(vm.registers().get(1), 103);
}

// ==================== State ====================

#[test]
fn state_and_restore_round_trip() {
    let mut vm = vm_with_program("a", &["li $7, -7", "li $8, 8", "li $9, 9"], 2);
    vm.run_slice().unwrap();
    let state = vm.state();

    let mut other = vm_with_program("b", &["li $7, -7", "li $8, 8", "li $9, 9"], 2);
    other.restore(state);
    assert_eq!(other.pc(), 2);
    assert_eq!(other.registers(), vm.registers());
}

#[test]
fn dump_state_is_index_ordered() {
    let vm = vm_with_program("d", &[], 1);
    let dump = vm.dump_state();
    let text = dump.to_string();
    let idx2 = text.find("R2: ").unwrap();
    let idx10 = text.find("R10: ").unwrap();
    assert!(idx2 < idx10);
}
