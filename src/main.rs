//! SM213 Emulator - CLI Entry Point
//!
//! Commands:
//! - `sm213-emu run <program>` - Run a memory image or assembly file
//! - `sm213-emu debug <program>` - Interactive debugger
//! - `sm213-emu asm <source>` - Assemble to a memory image
//! - `sm213-emu disasm <image>` - Disassemble a memory image
//! - `sm213-emu test` - Run the built-in self-test

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sm213-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator and toolchain for the SM213 'Simple Machine' teaching computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the memory image or assembly source to execute
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show per-cycle trace output
        #[arg(short, long)]
        trace: bool,
        /// Starting PC, as a byte address
        #[arg(short, long, default_value = "0")]
        entry: u32,
        /// Print the final machine state as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the memory image or assembly source to debug
        program: String,
    },
    /// Assemble source to a memory image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a memory image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, entry, json }) => {
            run_program(&program, max_cycles, trace, entry, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("SM213 Emulator v0.1.0");
            println!("The 'Simple Machine' teaching computer");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_simple_machine();
        }
    }
}

/// Load program bytes from a path: `.s`/`.asm` files are assembled, anything
/// else is read as a memory image.
fn load_program_bytes(path: &str, quiet: bool) -> Vec<u8> {
    use sm213::asm::assemble;
    use sm213::asm::image::load_image;

    if path.ends_with(".s") || path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(bytes) => {
                if !quiet {
                    println!("📝 Assembled {} bytes", bytes.len());
                }
                bytes
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                if !quiet {
                    println!("📂 Loaded {} bytes", image.len());
                }
                image.bytes
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Final machine state, as reported by `run --json`.
#[derive(serde::Serialize)]
struct FinalState<'a> {
    state: sm213::CpuState,
    cycles: u64,
    pc: u32,
    registers: &'a [i32; 8],
}

fn print_json_state(cpu: &sm213::Cpu) {
    let report = FinalState {
        state: cpu.state,
        cycles: cpu.cycles,
        pc: cpu.regs.pc(),
        registers: cpu.regs.gpr(),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("❌ Failed to serialize state: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, entry: u32, json: bool) {
    use sm213::asm::disasm::disassemble_instruction;
    use sm213::{Cpu, CycleOutcome};

    if !json {
        println!("🔧 Running: {}", path);
    }

    let image = load_program_bytes(path, json);
    if image.is_empty() {
        eprintln!("❌ No program bytes to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_image(&image) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    cpu.regs.set_pc(entry);

    if !json {
        println!();
        println!("━━━ Execution ━━━");
    }

    while cpu.is_running() && cpu.cycles < max_cycles {
        let pc = cpu.regs.pc();

        match cpu.cycle() {
            CycleOutcome::Continued | CycleOutcome::Halted => {
                if trace {
                    println!("{:04x}: {}", pc, disassemble_instruction(&cpu.ir()));
                }
            }
            CycleOutcome::Faulted(e) => {
                eprintln!("❌ CPU fault at PC={:#06x}: {}", pc, e);
                if json {
                    print_json_state(&cpu);
                }
                std::process::exit(1);
            }
        }
    }

    if json {
        print_json_state(&cpu);
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles);
    println!("State: {:?}", cpu.state);
    println!("PC: {:#010x}", cpu.regs.pc());
    for (i, value) in cpu.regs.gpr().iter().enumerate() {
        println!("r{}: {:#010x} ({})", i, *value as u32, value);
    }

    if cpu.is_running() {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use sm213::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let image = load_program_bytes(path, false);
    if image.is_empty() {
        eprintln!("❌ No program bytes to execute");
        std::process::exit(1);
    }

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(image) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ This build has no debugger; rebuild with the 'tui' feature enabled");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use sm213::asm::assemble;
    use sm213::asm::image::save_image;

    let out_path = output.unwrap_or_else(|| {
        let stem = source_path
            .strip_suffix(".s")
            .or_else(|| source_path.strip_suffix(".asm"))
            .unwrap_or(source_path);
        format!("{}.img", stem)
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes", bytes.len());

    if let Err(e) = save_image(&out_path, &bytes) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    use sm213::asm::disasm::disassemble;
    use sm213::asm::image::load_image;

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", disassemble(&image.bytes));
}

fn demo_simple_machine() {
    use sm213::asm::{assemble, disassemble};
    use sm213::Cpu;

    println!("━━━ Simple Machine Demo ━━━");
    println!();

    let source = "\
        ld $a, r0       # base of the array\n\
        ld 0(r0), r1    # x\n\
        ld 4(r0), r2    # y\n\
        add r1, r2      # y += x\n\
        st r2, 8(r0)    # sum\n\
        halt\n\
        .pos 0x100\n\
a:      .long 30\n\
        .long 12\n\
        .long 0\n";

    println!("Source:");
    for line in source.lines() {
        println!("  {}", line);
    }
    println!();

    let image = assemble(source).unwrap();

    // The code region is the first 16 bytes; the rest is data at 0x100.
    println!("Assembled {} bytes; code disassembly:", image.len());
    print!("{}", disassemble(&image[..16]));
    println!();

    let mut cpu = Cpu::new();
    cpu.load_image(&image).unwrap();
    cpu.run().unwrap();

    println!(
        "After {} cycles: r1 = {}, r2 = {}, sum at 0x108 = {}",
        cpu.cycles,
        cpu.regs.get(1).unwrap(),
        cpu.regs.get(2).unwrap(),
        cpu.mem.read_int(0x108).unwrap()
    );
    println!();
    println!("✓ Core machine working!");
}

fn run_self_test() {
    use sm213::asm::assemble;
    use sm213::cpu::decode::{decode, encode, Instruction, InstructionWord};
    use sm213::Cpu;

    println!("━━━ SM213 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: Header field extraction
    print!("Instruction field extraction... ");
    let iw = InstructionWord::from_parts(0x61, 0x23, 0);
    if iw.opcode == 0x6 && iw.op0 == 0x1 && iw.op1 == 0x2 && iw.op2 == 0x3 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 2: Encode/decode round-trip
    print!("Encode/decode round-trip... ");
    let mut ok = true;
    for instr in [
        Instruction::LoadImm { value: 0x1234, dst: 1 },
        Instruction::LoadOffset { offset: 8, base: 2, dst: 3 },
        Instruction::StoreIndexed { src: 4, base: 5, index: 6 },
        Instruction::Add { src: 2, dst: 3 },
        Instruction::Shift { reg: 4, amount: -5 },
        Instruction::Halt,
    ] {
        let bytes = encode(&instr);
        let ext = if bytes.len() == 6 {
            u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]])
        } else {
            0
        };
        let iw = InstructionWord::from_parts(bytes[0], bytes[1], ext);
        if decode(&iw) != Ok(instr) {
            ok = false;
            break;
        }
    }
    if ok {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 3: CPU halt instruction
    print!("CPU halt instruction... ");
    let mut cpu = Cpu::new();
    cpu.load_image(&encode(&Instruction::Halt)).unwrap();
    let result = cpu.run();
    if result.is_ok() && cpu.is_halted() && cpu.regs.pc() == 2 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 4: Add wraparound
    print!("Add wraparound... ");
    let mut cpu = Cpu::new();
    cpu.regs.set(0, i32::MAX).unwrap();
    cpu.regs.set(1, 1).unwrap();
    let mut program = encode(&Instruction::Add { src: 1, dst: 0 });
    program.extend(encode(&Instruction::Halt));
    cpu.load_image(&program).unwrap();
    cpu.run().unwrap();
    if cpu.regs.get(0).unwrap() == i32::MIN {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {}, expected {})", cpu.regs.get(0).unwrap(), i32::MIN);
        failed += 1;
    }

    // Test 5: Arithmetic right shift
    print!("Arithmetic right shift... ");
    let mut cpu = Cpu::new();
    cpu.regs.set(0, -8).unwrap();
    let mut program = encode(&Instruction::Shift { reg: 0, amount: -1 });
    program.extend(encode(&Instruction::Halt));
    cpu.load_image(&program).unwrap();
    cpu.run().unwrap();
    if cpu.regs.get(0).unwrap() == -4 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {}, expected -4)", cpu.regs.get(0).unwrap());
        failed += 1;
    }

    // Test 6: Store/load round-trip
    print!("Store/load round-trip... ");
    let mut cpu = Cpu::new();
    cpu.regs.set(0, 0x200).unwrap();
    cpu.regs.set(1, -777).unwrap();
    let mut program = encode(&Instruction::StoreOffset { src: 1, offset: 4, base: 0 });
    program.extend(encode(&Instruction::LoadOffset { offset: 4, base: 0, dst: 2 }));
    program.extend(encode(&Instruction::Halt));
    cpu.load_image(&program).unwrap();
    cpu.run().unwrap();
    if cpu.regs.get(2).unwrap() == -777 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {}, expected -777)", cpu.regs.get(2).unwrap());
        failed += 1;
    }

    // Test 7: Assembled program execution
    print!("Assembled program execution... ");
    let source = "ld $x, r0\nld 0(r0), r1\ninc r1\nhalt\n.pos 0x40\nx: .long 41";
    let mut cpu = Cpu::new();
    cpu.load_image(&assemble(source).unwrap()).unwrap();
    cpu.run().unwrap();
    if cpu.regs.get(1).unwrap() == 42 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {}, expected 42)", cpu.regs.get(1).unwrap());
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
