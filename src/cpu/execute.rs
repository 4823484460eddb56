//! CPU execution engine for the SM213.
//!
//! Implements the two phases of the instruction cycle and all instruction
//! behaviors. `fetch` reads the instruction at PC into the instruction
//! register and advances PC by the consumed length; `execute` decodes the
//! instruction register and performs the effect. `cycle` composes the two
//! and owns the Running/Halted/Faulted state machine.

use crate::cpu::decode::{self, DecodeError, Instruction, InstructionWord};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::RegisterError;
use crate::cpu::{Memory, Registers};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Executing instructions normally.
    Running,
    /// Stopped by a halt instruction. Terminal.
    Halted,
    /// Stopped by a decode, memory, or register fault. Terminal.
    Faulted,
}

/// What an executed instruction asks the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Proceed to the next instruction.
    Continue,
    /// Stop the machine in the halted state.
    Halt,
}

/// The result of one full cycle, as seen by a driving loop.
///
/// Halting is an expected outcome of running a program, so it is reported
/// as a value alongside normal continuation rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The instruction completed; the machine is still running.
    Continued,
    /// The instruction was a halt; the machine is now halted.
    Halted,
    /// The cycle faulted; the machine is now faulted and the error says why.
    Faulted(CpuError),
}

/// The SM213 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Register file (r0-r7 and the PC).
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Completed instruction count.
    pub cycles: u64,
    /// Instruction register: the most recently fetched instruction word.
    ir: InstructionWord,
    /// Last successfully executed instruction (for tracing).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed registers and default-sized memory.
    pub fn new() -> Self {
        Self::with_memory_size(crate::cpu::memory::DEFAULT_SIZE)
    }

    /// Create a new CPU with a memory of the given size in bytes.
    pub fn with_memory_size(size: usize) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::with_size(size),
            state: CpuState::Running,
            cycles: 0,
            ir: InstructionWord::default(),
            last_instr: None,
        }
    }

    /// Reset the CPU to its initial state, clearing memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.ir = InstructionWord::default();
        self.last_instr = None;
    }

    /// Load a program image into memory at address 0.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_image(0, image)
    }

    /// Fetch phase: read the instruction at PC into the instruction
    /// register and advance PC past it.
    ///
    /// The header is read first; if its opcode carries an extension word,
    /// that is read through the unaligned path at PC+2. PC is updated only
    /// after every read has succeeded, so a failed fetch leaves it pointing
    /// at the faulting instruction. Does not update `state`; [`Cpu::cycle`]
    /// owns the state machine.
    pub fn fetch(&mut self) -> Result<(), CpuError> {
        let pc = self.regs.pc();

        let header = self.mem.read_bytes(pc, 2)?;
        let (byte0, byte1) = (header[0], header[1]);

        let mut iw = InstructionWord::from_parts(byte0, byte1, 0);
        if iw.has_extension() {
            iw.ext = self.mem.read_int_unaligned(pc.wrapping_add(2))? as u32;
        }

        self.regs.set_pc(pc.wrapping_add(iw.byte_len()));
        self.ir = iw;
        Ok(())
    }

    /// Execute phase: decode the instruction register and perform its
    /// effect on registers and memory.
    ///
    /// Returns the control signal of the executed instruction. A fault
    /// leaves registers and memory untouched by the faulting instruction
    /// (the PC advance from fetch stands). Does not update `state`;
    /// [`Cpu::cycle`] owns the state machine.
    pub fn execute(&mut self) -> Result<Signal, CpuError> {
        let instr = decode::decode(&self.ir)?;

        let signal = match instr {
            // ==================== Loads ====================

            Instruction::LoadImm { value, dst } => {
                self.regs.set(dst, value as i32)?;
                Signal::Continue
            }

            Instruction::LoadOffset { offset, base, dst } => {
                let addr = self.regs.get(base)?.wrapping_add(offset as i32) as u32;
                let value = self.mem.read_int(addr)?;
                self.regs.set(dst, value)?;
                Signal::Continue
            }

            Instruction::LoadIndexed { base, index, dst } => {
                let scaled = self.regs.get(index)?.wrapping_shl(2);
                let addr = self.regs.get(base)?.wrapping_add(scaled) as u32;
                let value = self.mem.read_int(addr)?;
                self.regs.set(dst, value)?;
                Signal::Continue
            }

            // ==================== Stores ====================

            Instruction::StoreOffset { src, offset, base } => {
                let addr = self.regs.get(base)?.wrapping_add(offset as i32) as u32;
                let value = self.regs.get(src)?;
                self.mem.write_int(addr, value)?;
                Signal::Continue
            }

            Instruction::StoreIndexed { src, base, index } => {
                let scaled = self.regs.get(index)?.wrapping_shl(2);
                let addr = self.regs.get(base)?.wrapping_add(scaled) as u32;
                let value = self.regs.get(src)?;
                self.mem.write_int(addr, value)?;
                Signal::Continue
            }

            // ==================== ALU ====================

            Instruction::Mov { src, dst } => {
                let value = self.regs.get(src)?;
                self.regs.set(dst, value)?;
                Signal::Continue
            }

            Instruction::Add { src, dst } => {
                let sum = self.regs.get(dst)?.wrapping_add(self.regs.get(src)?);
                self.regs.set(dst, sum)?;
                Signal::Continue
            }

            Instruction::And { src, dst } => {
                let value = self.regs.get(dst)? & self.regs.get(src)?;
                self.regs.set(dst, value)?;
                Signal::Continue
            }

            Instruction::Inc { reg } => {
                let value = self.regs.get(reg)?.wrapping_add(1);
                self.regs.set(reg, value)?;
                Signal::Continue
            }

            Instruction::Inca { reg } => {
                let value = self.regs.get(reg)?.wrapping_add(4);
                self.regs.set(reg, value)?;
                Signal::Continue
            }

            Instruction::Dec { reg } => {
                let value = self.regs.get(reg)?.wrapping_sub(1);
                self.regs.set(reg, value)?;
                Signal::Continue
            }

            Instruction::Deca { reg } => {
                let value = self.regs.get(reg)?.wrapping_sub(4);
                self.regs.set(reg, value)?;
                Signal::Continue
            }

            Instruction::Not { reg } => {
                let value = !self.regs.get(reg)?;
                self.regs.set(reg, value)?;
                Signal::Continue
            }

            // ==================== Shifts ====================

            Instruction::Shift { reg, amount } => {
                // Positive shifts left, non-positive shifts right
                // arithmetically; the 32-bit shifter uses the count mod 32.
                let value = self.regs.get(reg)?;
                let shifted = if amount > 0 {
                    value.wrapping_shl(amount as u32)
                } else {
                    value.wrapping_shr(amount.unsigned_abs() as u32)
                };
                self.regs.set(reg, shifted)?;
                Signal::Continue
            }

            // ==================== Control ====================

            Instruction::Halt => Signal::Halt,

            Instruction::Nop => Signal::Continue,
        };

        self.last_instr = Some(instr);
        Ok(signal)
    }

    /// Run one full cycle: fetch, then execute, then apply the outcome to
    /// the CPU state.
    ///
    /// Cycling a machine that is not running reports `NotRunning` without
    /// disturbing the terminal state. The cycle counter counts completed
    /// instructions, so a halt counts and a fault does not.
    pub fn cycle(&mut self) -> CycleOutcome {
        if self.state != CpuState::Running {
            return CycleOutcome::Faulted(CpuError::NotRunning(self.state));
        }

        match self.fetch().and_then(|_| self.execute()) {
            Ok(Signal::Continue) => {
                self.cycles += 1;
                CycleOutcome::Continued
            }
            Ok(Signal::Halt) => {
                self.cycles += 1;
                self.state = CpuState::Halted;
                CycleOutcome::Halted
            }
            Err(e) => {
                self.state = CpuState::Faulted;
                CycleOutcome::Faulted(e)
            }
        }
    }

    /// Run until halt or fault.
    ///
    /// Returns the number of instructions executed; a fault is returned as
    /// the error. Calling this on an already-stopped machine is a no-op.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            match self.cycle() {
                CycleOutcome::Continued => {}
                CycleOutcome::Halted => break,
                CycleOutcome::Faulted(e) => return Err(e),
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            match self.cycle() {
                CycleOutcome::Continued => {}
                CycleOutcome::Halted => break,
                CycleOutcome::Faulted(e) => return Err(e),
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// The instruction register: the most recently fetched instruction.
    pub fn ir(&self) -> InstructionWord {
        self.ir
    }

    /// The last successfully executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during a CPU cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory fault: {0}")]
    MemoryFault(#[from] MemoryError),

    #[error("register fault: {0}")]
    RegisterFault(#[from] RegisterError),

    #[error("decode fault: {0}")]
    DecodeFault(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use proptest::prelude::*;

    fn assemble(instrs: &[Instruction]) -> Vec<u8> {
        instrs.iter().flat_map(encode).collect()
    }

    fn run_program(instrs: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(instrs)).unwrap();
        cpu.run().unwrap();
        cpu
    }

    #[test]
    fn test_halt() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[Instruction::Halt])).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc(), 2);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_nop_then_halt() {
        let cpu = run_program(&[
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Halt,
        ]);

        assert_eq!(cpu.cycles, 4);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_load_imm() {
        let cpu = run_program(&[
            Instruction::LoadImm { value: 0x2a, dst: 1 },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.get(1).unwrap(), 0x2a);
        // 6-byte immediate load plus 2-byte halt.
        assert_eq!(cpu.regs.pc(), 8);
    }

    #[test]
    fn test_load_imm_keeps_all_bits() {
        let cpu = run_program(&[
            Instruction::LoadImm {
                value: 0xffff_fffe,
                dst: 0,
            },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.get(0).unwrap(), -2);
    }

    #[test]
    fn test_load_offset() {
        let mut cpu = Cpu::new();
        cpu.mem.write_int(0x104, 77).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::LoadImm { value: 0x100, dst: 0 },
            Instruction::LoadOffset {
                offset: 4,
                base: 0,
                dst: 1,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(1).unwrap(), 77);
    }

    #[test]
    fn test_load_indexed() {
        let mut cpu = Cpu::new();
        cpu.mem.write_int(0x108, 99).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::LoadImm { value: 0x100, dst: 0 },
            Instruction::LoadImm { value: 2, dst: 1 },
            Instruction::LoadIndexed {
                base: 0,
                index: 1,
                dst: 2,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(2).unwrap(), 99);
    }

    #[test]
    fn test_store_offset() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 0x200).unwrap();
        cpu.regs.set(1, -123).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::StoreOffset {
                src: 1,
                offset: 8,
                base: 0,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.mem.read_int(0x208).unwrap(), -123);
    }

    #[test]
    fn test_store_indexed() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 55).unwrap();
        cpu.regs.set(1, 0x200).unwrap();
        cpu.regs.set(2, 3).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::StoreIndexed {
                src: 0,
                base: 1,
                index: 2,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.mem.read_int(0x20c).unwrap(), 55);
    }

    #[test]
    fn test_store_then_load_roundtrip() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 0x300).unwrap();
        cpu.regs.set(1, 0x5a5a_5a5a_u32 as i32).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::StoreOffset {
                src: 1,
                offset: 0,
                base: 0,
            },
            Instruction::LoadOffset {
                offset: 0,
                base: 0,
                dst: 2,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(2).unwrap(), 0x5a5a_5a5a_u32 as i32);
    }

    #[test]
    fn test_alu_ops() {
        let mut cpu = Cpu::new();
        cpu.regs.set(1, 0b1100).unwrap();
        cpu.regs.set(2, 0b1010).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::And { src: 1, dst: 2 },
            Instruction::Halt,
        ]))
        .unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(2).unwrap(), 0b1000);

        let mut cpu = Cpu::new();
        cpu.regs.set(3, 10).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::Mov { src: 3, dst: 4 },
            Instruction::Inc { reg: 4 },
            Instruction::Inca { reg: 4 },
            Instruction::Dec { reg: 3 },
            Instruction::Deca { reg: 3 },
            Instruction::Halt,
        ]))
        .unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(4).unwrap(), 15);
        assert_eq!(cpu.regs.get(3).unwrap(), 5);

        let mut cpu = Cpu::new();
        cpu.regs.set(0, 0).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::Not { reg: 0 },
            Instruction::Halt,
        ]))
        .unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(0).unwrap(), -1);
    }

    #[test]
    fn test_add_wraps_around() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, i32::MAX).unwrap();
        cpu.regs.set(1, 1).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::Add { src: 1, dst: 0 },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0).unwrap(), i32::MIN);
    }

    #[test]
    fn test_shift_left() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 1).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::Shift { reg: 0, amount: 3 },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0).unwrap(), 8);
    }

    #[test]
    fn test_shift_right_is_arithmetic() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 8).unwrap();
        cpu.regs.set(1, -8).unwrap();
        cpu.load_image(&assemble(&[
            Instruction::Shift { reg: 0, amount: -2 },
            Instruction::Shift { reg: 1, amount: -1 },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0).unwrap(), 2);
        assert_eq!(cpu.regs.get(1).unwrap(), -4);
    }

    #[test]
    fn test_shift_count_is_mod_32() {
        let mut cpu = Cpu::new();
        cpu.regs.set(0, 0x1234).unwrap();
        // -(-128) = 128, which the 32-bit shifter reduces to 0.
        cpu.load_image(&assemble(&[
            Instruction::Shift {
                reg: 0,
                amount: -128,
            },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0).unwrap(), 0x1234);
    }

    #[test]
    fn test_halt_is_terminal() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[Instruction::Halt])).unwrap();
        cpu.run().unwrap();

        let pc = cpu.regs.pc();
        let cycles = cpu.cycles;
        let outcome = cpu.cycle();

        assert_eq!(
            outcome,
            CycleOutcome::Faulted(CpuError::NotRunning(CpuState::Halted))
        );
        assert_eq!(cpu.state, CpuState::Halted);
        assert_eq!(cpu.regs.pc(), pc);
        assert_eq!(cpu.cycles, cycles);
    }

    #[test]
    fn test_illegal_opcode_faults() {
        let mut cpu = Cpu::new();
        cpu.load_image(&[0x50, 0x00]).unwrap();

        let outcome = cpu.cycle();

        assert_eq!(
            outcome,
            CycleOutcome::Faulted(CpuError::DecodeFault(DecodeError::IllegalOpcode(0x5)))
        );
        assert_eq!(cpu.state, CpuState::Faulted);
        // The PC advance from fetch stands; nothing else changed.
        assert_eq!(cpu.regs.pc(), 2);
        assert_eq!(cpu.regs.gpr(), &[0; 8]);
        assert_eq!(cpu.cycles, 0);
    }

    #[test]
    fn test_reserved_jump_opcode_fetches_six_bytes() {
        let mut cpu = Cpu::new();
        cpu.load_image(&[0xb0, 0x00, 0x00, 0x00, 0x01, 0x00]).unwrap();

        let outcome = cpu.cycle();

        assert!(matches!(
            outcome,
            CycleOutcome::Faulted(CpuError::DecodeFault(DecodeError::IllegalOpcode(0xb)))
        ));
        assert_eq!(cpu.regs.pc(), 6);
    }

    #[test]
    fn test_register_out_of_range_faults() {
        let mut cpu = Cpu::new();
        // ALU add naming r8 as source.
        cpu.load_image(&[0x61, 0x82]).unwrap();

        let outcome = cpu.cycle();

        assert_eq!(
            outcome,
            CycleOutcome::Faulted(CpuError::RegisterFault(RegisterError::OutOfRange {
                index: 8
            }))
        );
        assert_eq!(cpu.state, CpuState::Faulted);
        assert_eq!(cpu.regs.gpr(), &[0; 8]);
    }

    #[test]
    fn test_misaligned_data_access_faults() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[
            Instruction::LoadImm { value: 0x102, dst: 0 },
            Instruction::LoadOffset {
                offset: 0,
                base: 0,
                dst: 1,
            },
        ]))
        .unwrap();

        let result = cpu.run();

        assert_eq!(
            result,
            Err(CpuError::MemoryFault(MemoryError::Misaligned {
                addr: 0x102
            }))
        );
        assert_eq!(cpu.state, CpuState::Faulted);
        // The faulting load mutated nothing.
        assert_eq!(cpu.regs.get(1).unwrap(), 0);
    }

    #[test]
    fn test_failed_fetch_leaves_pc() {
        let mut cpu = Cpu::with_memory_size(4);
        cpu.regs.set_pc(3);

        let outcome = cpu.cycle();

        assert!(matches!(
            outcome,
            CycleOutcome::Faulted(CpuError::MemoryFault(MemoryError::OutOfRange { .. }))
        ));
        assert_eq!(cpu.regs.pc(), 3);
    }

    #[test]
    fn test_truncated_extension_leaves_pc() {
        // The header of an immediate load fits, its extension does not; the
        // fetch must fail without a partial PC update.
        let mut cpu = Cpu::with_memory_size(4);
        cpu.mem.write_bytes(0, &[0x01, 0x00, 0x00, 0x00]).unwrap();

        let outcome = cpu.cycle();

        assert!(matches!(
            outcome,
            CycleOutcome::Faulted(CpuError::MemoryFault(MemoryError::OutOfRange { .. }))
        ));
        assert_eq!(cpu.regs.pc(), 0);
    }

    #[test]
    fn test_extension_fetch_ignores_alignment() {
        // Two nops push the immediate load to address 4, so its extension
        // word sits at the odd word address 6.
        let cpu = run_program(&[
            Instruction::Nop,
            Instruction::Nop,
            Instruction::LoadImm {
                value: 0x0102_0304,
                dst: 5,
            },
            Instruction::Halt,
        ]);

        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.get(5).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_cycle_outcomes() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[Instruction::Nop, Instruction::Halt]))
            .unwrap();

        assert_eq!(cpu.cycle(), CycleOutcome::Continued);
        assert_eq!(cpu.cycle(), CycleOutcome::Halted);
    }

    #[test]
    fn test_run_limited() {
        let mut cpu = Cpu::new();
        // No halt anywhere; memory full of ff00 nops would run forever.
        let nops: Vec<u8> = [0xff, 0x00].repeat(100);
        cpu.load_image(&nops).unwrap();

        let executed = cpu.run_limited(10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
        assert_eq!(cpu.regs.pc(), 20);
    }

    #[test]
    fn test_cycles_counts_completed_instructions() {
        let mut cpu = Cpu::new();
        cpu.load_image(&[0xff, 0x00, 0x50, 0x00]).unwrap();

        assert_eq!(cpu.cycle(), CycleOutcome::Continued);
        assert!(matches!(cpu.cycle(), CycleOutcome::Faulted(_)));

        // The nop counted; the faulting instruction did not.
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_last_instruction() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[
            Instruction::Inc { reg: 2 },
            Instruction::Halt,
        ]))
        .unwrap();

        assert_eq!(cpu.last_instruction(), None);
        cpu.cycle();
        assert_eq!(cpu.last_instruction(), Some(Instruction::Inc { reg: 2 }));
    }

    #[test]
    fn test_reset() {
        let mut cpu = Cpu::new();
        cpu.load_image(&assemble(&[
            Instruction::LoadImm { value: 7, dst: 0 },
            Instruction::Halt,
        ]))
        .unwrap();
        cpu.run().unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.pc(), 0);
        assert_eq!(cpu.regs.get(0).unwrap(), 0);
        assert_eq!(cpu.mem.read_byte(0).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_fetch_advances_pc_by_length(byte0: u8, byte1: u8, ext: u32) {
            let mut cpu = Cpu::new();
            let mut image = vec![byte0, byte1];
            image.extend_from_slice(&ext.to_be_bytes());
            cpu.load_image(&image).unwrap();

            cpu.fetch().unwrap();

            let expected = if byte0 >> 4 == 0x0 || byte0 >> 4 == 0xb { 6 } else { 2 };
            prop_assert_eq!(cpu.regs.pc(), expected);
            prop_assert_eq!(cpu.ir().byte_len(), expected);
        }

        #[test]
        fn prop_add_wraps(a: i32, b: i32) {
            let mut cpu = Cpu::new();
            cpu.regs.set(0, a).unwrap();
            cpu.regs.set(1, b).unwrap();
            cpu.load_image(&assemble(&[
                Instruction::Add { src: 0, dst: 1 },
                Instruction::Halt,
            ])).unwrap();

            cpu.run().unwrap();

            prop_assert_eq!(cpu.regs.get(1).unwrap(), b.wrapping_add(a));
        }
    }
}
