//! Debugger application state and logic.

use crate::asm::disasm::{disassemble_at, format_instruction};
use crate::{Cpu, CycleOutcome};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program image, for reset.
    pub image: Vec<u8>,
    /// Breakpoints (by byte address).
    pub breakpoints: HashSet<u32>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program image.
    pub fn new(image: Vec<u8>) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_image(&image) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".to_string(),
            Err(e) => format!("Image load failed: {}", e),
        };

        Self {
            cpu,
            image,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc();
        match self.cpu.cycle() {
            CycleOutcome::Continued => {
                let text = self
                    .cpu
                    .last_instruction()
                    .map(|i| format_instruction(&i))
                    .unwrap_or_default();
                self.status = format!("{:04x}: {}", pc, text);
            }
            CycleOutcome::Halted => {
                self.running = false;
                self.status = format!("Halted after {} cycles", self.cpu.cycles);
            }
            CycleOutcome::Faulted(e) => {
                self.running = false;
                self.status = format!("Fault at {:04x}: {}", pc, e);
            }
        }
    }

    /// Start continuous execution.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles", self.cpu.cycles);
            return;
        }

        // Check for a breakpoint before executing.
        let pc = self.cpu.regs.pc();
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at {:04x}", pc);
            return;
        }

        self.step();
    }

    /// Toggle a breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc();
        if self.breakpoints.contains(&pc) {
            self.breakpoints.remove(&pc);
            self.status = format!("Removed breakpoint at {:04x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at {:04x}", pc);
        }
    }

    /// Reset the CPU and reload the program image.
    pub fn reset(&mut self) {
        self.cpu.reset();
        let _ = self.cpu.load_image(&self.image);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Disassembly rows around the current PC: (address, text, is_current).
    ///
    /// Instruction boundaries only line up when walking from address 0, so
    /// this decodes forward from 0 and then trims to a window centred on
    /// the PC's row.
    pub fn disassembly_window(&self, lines: usize) -> Vec<(u32, String, bool)> {
        let pc = self.cpu.regs.pc() as usize;
        let stop = (pc + lines * 6).max(self.image.len()).min(self.cpu.mem.len());
        let mem = match self.cpu.mem.read_bytes(0, stop as u32) {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };

        let mut rows = Vec::new();
        let mut pc_row = 0usize;
        let mut pos = 0usize;
        while pos < mem.len() {
            let (len, text) = disassemble_at(mem, pos);
            if pos == pc {
                pc_row = rows.len();
            }
            rows.push((pos as u32, text, pos == pc));
            pos += len;
        }

        let start = pc_row.saturating_sub(lines / 2);
        rows.into_iter().skip(start).take(lines).collect()
    }
}

/// Run the debugger with a program image.
pub fn run_debugger(image: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(image);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            if app.mem_scroll > 0 {
                                app.mem_scroll -= 1;
                            }
                        }
                        KeyCode::Down => {
                            let rows = app.cpu.mem.len().div_ceil(super::ui::MEM_ROW_LEN);
                            if app.mem_scroll + 1 < rows {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
