use crate::{
    app::{App, InputMode, InputPurpose, LogLevel},
    entries::Category,
};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Padding, Paragraph, Row, Table, TableState, Tabs,
    },
};
use std::{io, time::Duration};

const LOG_PANEL_HEIGHT: u16 = 6;

#[derive(Clone)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    border: Color,
    text: Color,
    muted: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(120, 190, 255),
            accent_soft: Color::Rgb(70, 110, 160),
            border: Color::Rgb(65, 75, 90),
            text: Color::Rgb(220, 230, 240),
            muted: Color::Rgb(135, 145, 155),
            warning: Color::Rgb(230, 200, 120),
            error: Color::Rgb(235, 100, 95),
            header_bg: Color::Rgb(22, 28, 36),
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        })
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        app.clamp_selection();
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key);
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != event::KeyEventKind::Press {
        return;
    }
    let mode = std::mem::replace(&mut app.input_mode, InputMode::Normal);
    match mode {
        InputMode::Normal => {
            app.input_mode = InputMode::Normal;
            handle_normal_mode(app, key);
        }
        InputMode::Editing {
            prompt,
            mut buffer,
            purpose,
        } => match key.code {
            KeyCode::Enter => {
                app.handle_submit(purpose, buffer);
            }
            KeyCode::Esc => {
                app.status = "Edit cancelled".to_string();
            }
            KeyCode::Backspace => {
                buffer.pop();
                app.input_mode = InputMode::Editing {
                    prompt,
                    buffer,
                    purpose,
                };
            }
            KeyCode::Char(ch) => {
                buffer.push(ch);
                app.input_mode = InputMode::Editing {
                    prompt,
                    buffer,
                    purpose,
                };
            }
            _ => {
                app.input_mode = InputMode::Editing {
                    prompt,
                    buffer,
                    purpose,
                };
            }
        },
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Tab => app.switch_tab(true),
        KeyCode::BackTab => app.switch_tab(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Char(' ') => app.toggle_mark(),
        KeyCode::Char('x') => app.extract(),
        KeyCode::Char('w') => app.write_output(),
        KeyCode::Char('u') => app.level_up_rows(),
        KeyCode::Char('d') => app.level_down_rows(),
        KeyCode::Char('c') => app.clear_rows(),
        KeyCode::Char('r') => app.reset_rows(),
        KeyCode::Enter | KeyCode::F(2) | KeyCode::Char('e') => app.begin_edit_selected_path(),
        KeyCode::Char('p') => app.begin_edit(InputPurpose::ProjectPath),
        KeyCode::Char('o') => app.begin_edit(InputPurpose::SourceExe),
        KeyCode::Char('n') => app.begin_edit(InputPurpose::DestExe),
        KeyCode::Char('s') => app.begin_edit(InputPurpose::OutputName),
        KeyCode::Char('f') => app.begin_edit(InputPurpose::SearchText),
        KeyCode::Char('g') => app.begin_edit(InputPurpose::ReplaceText),
        // shift+a arrives as Char('A'), not as a modifier on Char('a')
        KeyCode::Char('a') => app.replace_in_rows(true),
        KeyCode::Char('A') => app.replace_in_rows(false),
        _ => {}
    }
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.size();
    let theme = Theme::new();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(LOG_PANEL_HEIGHT),
            Constraint::Length(2),
        ])
        .split(area);

    draw_header(frame, app, &theme, chunks[0]);
    draw_tabs(frame, app, &theme, chunks[1]);
    draw_table(frame, app, &theme, chunks[2]);
    draw_log(frame, app, &theme, chunks[3]);
    draw_footer(frame, app, &theme, chunks[4]);
}

fn draw_header(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let project = app
        .project_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(drop or type a .pmm path with p)".to_string());
    let root_span = |label: &'static str, value: &str| {
        let shown = if value.is_empty() { "(unset)" } else { value };
        vec![
            Span::styled(label, Style::default().fg(theme.muted)),
            Span::styled(
                shown.to_string(),
                Style::default().fg(if value.is_empty() {
                    theme.warning
                } else {
                    theme.text
                }),
            ),
        ]
    };

    let mut source_line = root_span("Source root: ", &app.source_root);
    source_line.push(Span::raw("   "));
    source_line.extend(root_span("Destination root: ", &app.dest_root));
    source_line.push(Span::raw("   "));
    source_line.extend(root_span("Suffix: ", &app.config.output_name));

    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "PMM Path Manager",
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(project, Style::default().fg(theme.text)),
        ]),
        Line::from(""),
        Line::from(source_line),
    ])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Left);
    frame.render_widget(header, area);
}

fn draw_tabs(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let titles: Vec<Line<'_>> = Category::all()
        .into_iter()
        .map(|category| {
            let count = app.entries.rows(category).len();
            Line::from(format!("{} ({count})", category.label()))
        })
        .collect();
    let selected = Category::all()
        .into_iter()
        .position(|category| category == app.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(theme.muted))
        .highlight_style(
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn draw_table(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let entries = app.entries.rows(app.tab);
    if entries.is_empty() {
        let empty = Paragraph::new("No entries. Set the source exe (o), a project (p), then extract (x).")
            .style(Style::default().fg(theme.muted))
            .block(theme.panel("Paths"))
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    let marked = app.marked_rows();
    let rows: Vec<Row<'_>> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mark = if marked.contains(&index) { "*" } else { " " };
            let path_style = if entry.is_cleared() {
                Style::default().fg(theme.warning)
            } else if entry.current != entry.original_resolved {
                Style::default().fg(theme.accent)
            } else {
                Style::default().fg(theme.text)
            };
            Row::new(vec![
                Cell::from(format!("{mark}{:>3}", index + 1)),
                Cell::from(entry.display_name.clone())
                    .style(Style::default().fg(theme.muted)),
                Cell::from(entry.current.clone()).style(path_style),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(20),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec![Cell::from("No."), Cell::from("Name"), Cell::from("Path")])
            .style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
    )
    .column_spacing(1)
    .block(theme.panel("Paths"))
    .highlight_style(
        Style::default()
            .bg(theme.accent_soft)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol(">");

    let mut state = TableState::default();
    state.select(Some(app.selected_row()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_log(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let visible = (area.height.saturating_sub(2)) as usize;
    let lines: Vec<Line<'_>> = app
        .logs
        .iter()
        .rev()
        .take(visible.max(1))
        .rev()
        .map(|entry| {
            let style = match entry.level {
                LogLevel::Info => Style::default().fg(theme.text),
                LogLevel::Warn => Style::default().fg(theme.warning),
                LogLevel::Error => Style::default().fg(theme.error),
            };
            Line::from(Span::styled(entry.message.clone(), style))
        })
        .collect();
    let log = Paragraph::new(lines).block(theme.panel("Log"));
    frame.render_widget(log, area);
}

fn draw_footer(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let first = match &app.input_mode {
        InputMode::Editing { prompt, buffer, .. } => Line::from(vec![
            Span::styled(
                format!("{prompt}: "),
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled(buffer.clone(), Style::default().fg(theme.text)),
            Span::styled("▏", Style::default().fg(theme.accent)),
        ]),
        InputMode::Normal => Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(theme.text),
        )),
    };
    let replace_hint = format!(
        "search '{}' replace '{}'",
        app.search_text, app.replace_with
    );
    let second = Line::from(Span::styled(
        format!(
            "q quit  tab category  space mark  x extract  w write  u/d level  c clear  r reset  e edit  a replace-all  A replace-first  {replace_hint}"
        ),
        Style::default().fg(theme.muted),
    ));
    let footer = Paragraph::new(vec![first, second]);
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entries::EntrySet,
        project::{ModelRecord, ProjectError, ProjectIo, ProjectRecords},
    };
    use crossterm::event::KeyModifiers;
    use std::path::Path;

    struct NullIo;

    impl ProjectIo for NullIo {
        fn extract(&self, _: &Path) -> Result<ProjectRecords, ProjectError> {
            Ok(ProjectRecords::default())
        }

        fn apply(&self, _: &Path, _: &ProjectRecords) -> Result<(), ProjectError> {
            Ok(())
        }
    }

    fn app_with_rows() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut app =
            App::with_bridge(Box::new(NullIo), dir.path().join("config.txt")).unwrap();
        let records = ProjectRecords {
            models: vec![
                ModelRecord {
                    name: None,
                    path: Some("x/model.pmx".to_string()),
                },
                ModelRecord {
                    name: None,
                    path: Some("y/model.pmx".to_string()),
                },
            ],
            accessories: Vec::new(),
            media: None,
        };
        app.entries = EntrySet::from_records(&records, "");
        app.search_text = "model".to_string();
        app.replace_with = "dancer".to_string();
        app.toggle_mark();
        app.move_selection(1);
        app.toggle_mark();
        (app, dir)
    }

    #[test]
    fn lowercase_a_replaces_in_every_marked_row() {
        let (mut app, _dir) = app_with_rows();
        handle_normal_mode(&mut app, KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(app.entries.models[0].current, "x/dancer.pmx");
        assert_eq!(app.entries.models[1].current, "y/dancer.pmx");
    }

    #[test]
    fn shifted_a_replaces_first_match_only() {
        let (mut app, _dir) = app_with_rows();
        handle_normal_mode(&mut app, KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT));
        assert_eq!(app.entries.models[0].current, "x/dancer.pmx");
        assert_eq!(app.entries.models[1].current, "y/model.pmx");
    }
}
