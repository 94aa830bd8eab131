// tui.rs

use crate::app::{App, InputMode, Panel, ToastLevel};
use crate::storage::Storage;
use crate::task::Task;
use chrono::{DateTime, Local, TimeZone, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use ratatui::{
    Terminal,
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::{io, time::Duration};

pub fn run_app<B: Backend, S: Storage + Clone>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()>
where
    std::io::Error: From<<B as Backend>::Error>,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Tab => app.switch_panel(),
                KeyCode::Char('a') => app.begin_add(),
                KeyCode::Char('x') | KeyCode::Delete => app.delete_selected(),
                KeyCode::Char('h') => app.open_history(),
                KeyCode::Char('t') => app.toggle_theme(),
                KeyCode::Char(' ') if app.panel == Panel::Tasks => app.toggle_selected_task(),
                KeyCode::Char('*') if app.panel == Panel::Tasks => app.activate_selected_task(),
                KeyCode::Enter => match app.panel {
                    Panel::Links => app.open_selected_link(),
                    Panel::Tasks => app.toggle_selected_task(),
                },
                KeyCode::Down | KeyCode::Char('j') => app.select_next(),
                KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
                KeyCode::Esc => app.toast = None,
                _ => {}
            },
            InputMode::EditingTask => match key.code {
                KeyCode::Enter => app.submit_task(),
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Char(c) => app.input_task.push(c),
                KeyCode::Backspace => {
                    app.input_task.pop();
                }
                _ => {}
            },
            InputMode::EditingLinkUrl => match key.code {
                KeyCode::Enter => app.input_mode = InputMode::EditingLinkName,
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Char(c) => app.link_form.url.push(c),
                KeyCode::Backspace => {
                    app.link_form.url.pop();
                }
                _ => {}
            },
            InputMode::EditingLinkName => match key.code {
                KeyCode::Enter => app.input_mode = InputMode::EditingLinkIcon,
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Char(c) => app.link_form.name.push(c),
                KeyCode::Backspace => {
                    app.link_form.name.pop();
                }
                _ => {}
            },
            InputMode::EditingLinkIcon => match key.code {
                KeyCode::Enter => app.submit_link(),
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Char(c) => app.link_form.icon_url.push(c),
                KeyCode::Backspace => {
                    app.link_form.icon_url.pop();
                }
                _ => {}
            },
            InputMode::History => match key.code {
                KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => {
                    app.input_mode = InputMode::Normal;
                }
                KeyCode::Char('f') => app.cycle_history_filter(),
                KeyCode::Char('r') | KeyCode::Enter => app.restore_selected_history(),
                KeyCode::Char('X') => app.purge_selected_history(),
                KeyCode::Char('C') => app.clear_history(),
                KeyCode::Down | KeyCode::Char('j') => app.select_next(),
                KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
                _ => {}
            },
        }
    }
}

/// Time only for today, otherwise a short date and time.
pub fn format_date_time<Tz: TimeZone>(ts: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = ts.with_timezone(&now.timezone());
    if local.date_naive() == now.date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%m/%d/%y %H:%M").to_string()
    }
}

fn task_item<'a>(t: &Task, now: &DateTime<Local>, accent: Color) -> ListItem<'a> {
    let check = if t.completed { "[x]" } else { "[ ]" };
    let marker = if t.active { "* " } else { "" };
    let text_style = if t.completed {
        Style::default().fg(Color::DarkGray)
    } else if t.active {
        Style::default().fg(accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut meta = format!("    Created: {}", format_date_time(t.created_at, now));
    if let (true, Some(done)) = (t.completed, t.completed_at) {
        meta.push_str(&format!("  Completed: {}", format_date_time(done, now)));
    }
    ListItem::new(vec![
        Line::from(vec![
            Span::raw(format!("{} {}", check, marker)),
            Span::styled(t.text.clone(), text_style),
        ]),
        Line::from(Span::styled(meta, Style::default().fg(Color::Gray))),
    ])
}

fn input_box<'a>(value: &str, title: &'a str) -> Paragraph<'a> {
    let caret = "|";
    Paragraph::new(format!("{}{}", value, caret))
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true })
}

fn ui<S: Storage + Clone>(f: &mut ratatui::Frame<'_>, app: &App<S>) {
    let size = f.area();
    let accent = app.theme.get().accent_color();
    let now = Local::now();

    let needs_input = matches!(
        app.input_mode,
        InputMode::EditingTask
            | InputMode::EditingLinkUrl
            | InputMode::EditingLinkName
            | InputMode::EditingLinkIcon
    );
    let mut constraints = vec![
        Constraint::Length(1), // title
        Constraint::Length(1), // help
        Constraint::Min(5),    // panels
    ];
    if needs_input {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(1)); // toast
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(size);

    let title = Paragraph::new(Line::from(vec![
        Span::styled("RustyTab", Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}", now.format("%A %d %B %H:%M"))),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let b = Style::default().add_modifier(Modifier::BOLD);
    let help = if app.input_mode == InputMode::History {
        Line::from(vec![
            Span::styled("f", b), Span::raw(format!(" filter ({}), ", app.history_filter.label())),
            Span::styled("r", b), Span::raw(" restore, "),
            Span::styled("X", b), Span::raw(" purge, "),
            Span::styled("C", b), Span::raw(" clear all, "),
            Span::styled("Esc", b), Span::raw(" back"),
        ])
    } else {
        Line::from(vec![
            Span::styled("Tab", b), Span::raw(" panel, "),
            Span::styled("a", b), Span::raw(" add, "),
            Span::styled("Enter", b), Span::raw(" open/toggle, "),
            Span::styled("*", b), Span::raw(" focus, "),
            Span::styled("x", b), Span::raw(" delete, "),
            Span::styled("h", b), Span::raw(" history, "),
            Span::styled("t", b), Span::raw(" theme, "),
            Span::styled("q", b), Span::raw(" quit"),
        ])
    };
    f.render_widget(Paragraph::new(help).alignment(Alignment::Center), chunks[1]);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[2]);

    let highlight = Style::default()
        .bg(accent)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let border = |focused: bool| {
        if focused {
            Style::default().fg(accent)
        } else {
            Style::default()
        }
    };

    // HotLinks
    let link_items: Vec<ListItem> = app
        .links
        .links()
        .iter()
        .map(|l| {
            let label = if l.name.is_empty() { l.url.clone() } else { l.name.clone() };
            ListItem::new(vec![
                Line::from(Span::styled(label, Style::default().add_modifier(Modifier::BOLD))),
                Line::from(Span::styled(format!("  {}", l.url), Style::default().fg(Color::Gray))),
            ])
        })
        .collect();
    let mut link_state = ListState::default();
    if !link_items.is_empty() {
        link_state.select(Some(app.selected_link.min(link_items.len() - 1)));
    }
    let links_focused = app.panel == Panel::Links && app.input_mode != InputMode::History;
    let links_list = List::new(link_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border(links_focused))
                .title("HotLinks"),
        )
        .highlight_style(if links_focused { highlight } else { Style::default() })
        .highlight_symbol(">> ");
    f.render_stateful_widget(links_list, panels[0], &mut link_state);

    if app.input_mode == InputMode::History {
        render_history(f, app, panels[1], highlight, &now);
    } else {
        let task_items: Vec<ListItem> = app
            .tasks
            .sorted()
            .into_iter()
            .map(|t| task_item(t, &now, accent))
            .collect();
        let mut task_state = ListState::default();
        if !task_items.is_empty() {
            task_state.select(Some(app.selected_task.min(task_items.len() - 1)));
        }
        let tasks_focused = app.panel == Panel::Tasks;
        let tasks_list = List::new(task_items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border(tasks_focused))
                    .title("Todo List"),
            )
            .highlight_style(if tasks_focused { highlight } else { Style::default() })
            .highlight_symbol(">> ");
        f.render_stateful_widget(tasks_list, panels[1], &mut task_state);
    }

    if needs_input {
        let widget = match app.input_mode {
            InputMode::EditingLinkUrl => input_box(&app.link_form.url, "URL"),
            InputMode::EditingLinkName => input_box(&app.link_form.name, "Name (optional)"),
            InputMode::EditingLinkIcon => input_box(&app.link_form.icon_url, "Custom Icon URL (optional)"),
            _ => input_box(&app.input_task, "Add a new task"),
        };
        f.render_widget(widget, chunks[3]);
    }

    if let Some(toast) = &app.toast {
        let color = match toast.level {
            ToastLevel::Success => Color::Green,
            ToastLevel::Warning => Color::Yellow,
            ToastLevel::Error => Color::Red,
        };
        let widget = Paragraph::new(toast.text.as_str())
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center);
        f.render_widget(widget, chunks[chunks.len() - 1]);
    }
}

fn render_history<S: Storage + Clone>(
    f: &mut ratatui::Frame<'_>,
    app: &App<S>,
    area: Rect,
    highlight: Style,
    now: &DateTime<Local>,
) {
    let mut items: Vec<ListItem> = Vec::new();
    let mut selected_row = None;
    let mut flat = 0usize;
    for group in app.tasks.history_local(app.history_filter) {
        items.push(ListItem::new(Line::from(Span::styled(
            group.date.format("%Y-%m-%d").to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))));
        for t in group.tasks {
            if flat == app.selected_history {
                selected_row = Some(items.len());
            }
            let check = if t.completed { "[x]" } else { "[ ]" };
            let deleted = t
                .deleted_at
                .map(|d| format_date_time(d, now))
                .unwrap_or_default();
            items.push(ListItem::new(Line::from(vec![
                Span::raw(format!("  {} {}", check, t.text)),
                Span::styled(format!("  deleted {}", deleted), Style::default().fg(Color::Gray)),
            ])));
            flat += 1;
        }
    }
    if items.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            "No deleted tasks",
            Style::default().fg(Color::Gray),
        ))));
    }

    let mut state = ListState::default();
    state.select(selected_row);
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("History ({})", app.history_filter.label())),
        )
        .highlight_style(highlight)
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, area, &mut state);
}
