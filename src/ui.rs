pub mod charting;
pub mod screen;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};

use crate::{
    app::App,
    celebration::Celebration,
    guide::{guide_for, COACH_GREETING, SUGGESTED_PROMPTS},
    models::Severity,
    timer::TimerState,
    util::{format_secs, truncate},
};

const HORIZONTAL_MARGIN: u16 = 2;

/// Render whichever screen the app is on
pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(app.state).render(app, f);
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Minor => Color::Cyan,
        Severity::Major => Color::Rgb(249, 115, 22),
        Severity::Critical => Color::Red,
    }
}

fn bordered(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(title)
}

pub(crate) fn render_practice(app: &App, f: &mut Frame) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let flow = &app.flow;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(8),    // body
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(f.area());

    // header
    let who = match app.session().and_then(|s| s.profile.as_ref()) {
        Some(profile) => profile.display_name().to_string(),
        None if app.session().is_some() => "signed in".to_string(),
        None => "not signed in".to_string(),
    };
    let task = flow.task();
    let mut header = vec![Span::styled(task.name.clone(), bold)];
    if let Some(category) = &task.category {
        header.push(Span::styled(format!("  {category}"), dim));
    }
    header.push(Span::styled(format!("  ({who})"), dim));
    f.render_widget(
        Paragraph::new(Line::from(header)).block(bordered("surgitrack")),
        rows[0],
    );

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(cols[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Min(3),
        ])
        .split(cols[1]);

    render_standard(app, f, left[0]);
    render_error_list(app, f, left[1]);
    render_timer(app, f, right[0]);
    render_result(app, f, right[1]);
    render_history(app, f, right[2]);

    if let Some(notice) = flow.notice() {
        let color = if notice.is_error() {
            Color::Red
        } else {
            Color::Green
        };
        f.render_widget(
            Paragraph::new(Span::styled(
                notice.text().to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            rows[2],
        );
    }

    let legend = if flow.timer().is_running() {
        "(enter) stop & submit / (x) toggle error / (↑↓) move / (esc) quit"
    } else {
        "(space) start / (enter) stop & submit / (r) retry / (←→) standard / (x) error / (g) guide / (esc) quit"
    };
    f.render_widget(
        Paragraph::new(Span::styled(
            legend,
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        rows[3],
    );

    if app.celebration.is_active() {
        render_celebration(&app.celebration, f);
    }
}

fn render_standard(app: &App, f: &mut Frame, area: Rect) {
    let flow = &app.flow;
    let position = flow
        .standard_id()
        .and_then(|id| flow.standards().iter().position(|s| s.id == id));
    let title = match position {
        Some(i) => format!("Standard {}/{}", i + 1, flow.standards().len()),
        None => "Standard".to_string(),
    };

    let lines = match flow.current_standard() {
        Some(standard) => vec![
            Line::from(Span::styled(
                standard.level.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(standard.aim()),
            Line::from(Span::styled(
                format!(
                    "tagged so far: {} minor, {} major, {} critical",
                    flow.selected_count(Severity::Minor),
                    flow.selected_count(Severity::Major),
                    flow.selected_count(Severity::Critical)
                ),
                Style::default().add_modifier(Modifier::DIM),
            )),
        ],
        None => vec![Line::from(Span::styled(
            "Select a standard first",
            Style::default().fg(Color::Yellow),
        ))],
    };
    f.render_widget(
        Paragraph::new(lines)
            .block(bordered(&title))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_error_list(app: &App, f: &mut Frame, area: Rect) {
    let flow = &app.flow;
    let width = area.width.saturating_sub(16) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let skip = app.cursor.saturating_sub(height.saturating_sub(1));

    let lines: Vec<Line> = flow
        .error_types()
        .iter()
        .enumerate()
        .skip(skip)
        .take(height)
        .map(|(i, err)| {
            let mark = if flow.is_error_selected(err.id) {
                "[x]"
            } else {
                "[ ]"
            };
            let mut name_style = Style::default();
            if i == app.cursor {
                name_style = name_style.add_modifier(Modifier::REVERSED);
            }
            Line::from(vec![
                Span::raw(format!("{mark} ")),
                Span::styled(truncate(&err.name, width), name_style),
                Span::styled(
                    format!("  {}", err.severity.to_string().to_uppercase()),
                    Style::default().fg(severity_color(err.severity)),
                ),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(bordered("Errors")), area);
}

fn render_timer(app: &App, f: &mut Frame, area: Rect) {
    let timer = app.flow.timer();
    let (label, color) = match timer.state() {
        TimerState::Idle => ("ready", Color::Gray),
        TimerState::Running => ("running", Color::Green),
        TimerState::Stopped => ("stopped", Color::Yellow),
    };
    let target = app
        .flow
        .current_standard()
        .map(|s| format!(" / {}", format_secs(s.target_time_seconds as i64)))
        .unwrap_or_default();
    let lines = vec![
        Line::from(Span::styled(
            format!("{}{}", format_secs(timer.elapsed_secs()), target),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            label,
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(bordered("Elapsed")),
        area,
    );
}

fn render_result(app: &App, f: &mut Frame, area: Rect) {
    let lines = match app.flow.result() {
        Some(result) => {
            let (verdict, color) = if result.proficiency {
                ("PROFICIENT", Color::Green)
            } else {
                ("not yet proficient", Color::Yellow)
            };
            let errors = if result.errors.is_empty() {
                "no errors".to_string()
            } else {
                result
                    .errors
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            vec![
                Line::from(Span::styled(
                    format!("Score {}", result.score),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(verdict, Style::default().fg(color))),
                Line::from(format!("Time {}", format_secs(result.time_seconds))),
                Line::from(errors),
            ]
        }
        None => vec![Line::from(Span::styled(
            "No attempt submitted yet",
            Style::default().add_modifier(Modifier::DIM),
        ))],
    };
    f.render_widget(
        Paragraph::new(lines)
            .block(bordered("Last result"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_history(app: &App, f: &mut Frame, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let points = charting::score_points(&app.history);
    if points.len() < 2 {
        f.render_widget(
            Paragraph::new(format!("{} attempt(s) on record", points.len()))
                .block(bordered("History")),
            area,
        );
        return;
    }
    let (attempts, highest) = charting::compute_chart_params(&points);
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];
    let chart = Chart::new(datasets)
        .block(bordered("History"))
        .x_axis(
            Axis::default()
                .title("attempt")
                .bounds([1.0, attempts])
                .labels(vec![
                    Span::styled("1", bold),
                    Span::styled(charting::format_label(attempts), bold),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("score")
                .bounds([0.0, highest])
                .labels(vec![
                    Span::styled("0", bold),
                    Span::styled(charting::format_label(highest), bold),
                ]),
        );
    f.render_widget(chart, area);
}

pub(crate) fn render_guide(app: &App, f: &mut Frame) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let guide = guide_for(&app.flow.task().slug);

    let mut lines = vec![
        Line::from(Span::styled(app.flow.task().name.clone(), bold)),
        Line::from(guide.overview),
        Line::from(""),
        Line::from(Span::styled("Steps", bold)),
    ];
    lines.extend(
        guide
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| Line::from(format!("{}. {s}", i + 1))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Pitfalls", bold)));
    lines.extend(guide.pitfalls.iter().map(|p| Line::from(format!("- {p}"))));
    if !guide.instruments.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Instruments", bold)));
        lines.push(Line::from(guide.instruments.join(", ")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Resources", bold)));
    lines.extend(
        guide
            .resources
            .iter()
            .map(|r| Line::from(format!("{}: {}", r.title, r.url))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        COACH_GREETING,
        Style::default().fg(Color::Cyan),
    )));
    lines.extend(SUGGESTED_PROMPTS.iter().map(|p| {
        Line::from(Span::styled(
            format!("  surgitrack coach {} \"{p}\"", app.flow.task().slug),
            Style::default().add_modifier(Modifier::DIM),
        ))
    }));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(g/esc) back / (q) quit",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    let area = f.area();
    f.render_widget(
        Paragraph::new(lines)
            .block(bordered("Guide"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_celebration(celebration: &Celebration, f: &mut Frame) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::LightRed,
        Color::Blue,
    ];
    let area = f.area();
    let buf = f.buffer_mut();
    for particle in &celebration.particles {
        if particle.x < 0.0 || particle.y < 0.0 {
            continue;
        }
        let (x, y) = (particle.x as u16, particle.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }
        let mut style = Style::default().fg(colors[particle.color_index % colors.len()]);
        if particle.pinned || particle.life() > 0.5 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_char(particle.symbol).set_style(style);
        }
    }
}
