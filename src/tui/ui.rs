//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::CpuState;
use super::app::DebuggerApp;

/// Bytes shown per memory row.
pub const MEM_ROW_LEN: usize = 16;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .split(frame.area());

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw the disassembly view, centred on the current PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = app.disassembly_window((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = rows
        .iter()
        .map(|(addr, text, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}{:04x}: {}", bp, prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the register file, PC, and cycle state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let gpr = app.cpu.regs.gpr();

    let reg_line = |from: usize| {
        let spans: Vec<Span> = (from..from + 4)
            .flat_map(|i| {
                [
                    Span::raw(format!("r{}: ", i)),
                    Span::styled(
                        format!("{:08x}  ", gpr[i] as u32),
                        Style::default().fg(Color::White),
                    ),
                ]
            })
            .collect();
        Line::from(spans)
    };

    let content = vec![
        reg_line(0),
        reg_line(4),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(
                format!("{:08x}", app.cpu.regs.pc()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("   IR: "),
            Span::styled(
                format!("{:012x}", app.cpu.ir().raw()),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(
                format!("{:?}", app.cpu.state),
                match app.cpu.state {
                    CpuState::Running => Style::default().fg(Color::Green),
                    CpuState::Halted => Style::default().fg(Color::Yellow),
                    CpuState::Faulted => Style::default().fg(Color::Red),
                },
            ),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the memory hex dump.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let total_rows = app.cpu.mem.len().div_ceil(MEM_ROW_LEN);
    let start = app.mem_scroll.min(total_rows.saturating_sub(1));
    let end = (start + visible_rows).min(total_rows);
    let pc_row = app.cpu.regs.pc() as usize / MEM_ROW_LEN;

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let addr = row * MEM_ROW_LEN;
            let len = MEM_ROW_LEN.min(app.cpu.mem.len() - addr);
            let bytes = app
                .cpu
                .mem
                .read_bytes(addr as u32, len as u32)
                .unwrap_or(&[]);

            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            let text = format!("{:04x}: {}", addr, hex.join(" "));

            let style = if row == pc_row {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if bytes.iter().any(|b| *b != 0) {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
