use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
};

use crate::dashboard::Dashboard;
use crate::input::{FocusPane, PanelLayout};
use crate::panel::INSTANCE_HEADERS;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const HIGHLIGHT: Color = Color::Rgb(24, 36, 58);
const DETAIL_PLACEHOLDER: &str = "Select an instance to inspect it.";

pub fn render(frame: &mut Frame, dash: &mut Dashboard) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], dash);
    render_body(frame, root[1], dash);
    render_footer(frame, root[2], dash);
}

fn render_header(frame: &mut Frame, area: Rect, dash: &Dashboard) {
    let target = dash.target();
    let cluster = dash.panels().clusters.selected_label();
    let namespace = if target.namespace.is_empty() {
        "all namespaces"
    } else {
        target.namespace.as_str()
    };
    let spans = vec![
        Span::styled(
            " kestrel ",
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ctx {} ", compact_text(&target.context, 28)),
            Style::default().fg(Color::White).bg(PL_A),
        ),
        Span::styled(
            format!(
                " {} ",
                compact_text(&display_cluster_endpoint(&target.cluster), 36)
            ),
            Style::default().fg(Color::White).bg(PL_B),
        ),
        Span::styled(
            format!(" ns {namespace} "),
            Style::default().fg(MUTED).bg(BG),
        ),
        Span::styled(
            format!(" watching {} ", target.kinds.join(",")),
            Style::default().fg(MUTED).bg(BG),
        ),
        Span::styled(format!(" @ {cluster} "), Style::default().fg(WARN).bg(BG)),
    ];
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, dash: &mut Dashboard) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 6), Constraint::Ratio(5, 6)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(2, 3), Constraint::Ratio(1, 3)])
        .split(columns[1]);
    let layout = PanelLayout {
        clusters: columns[0],
        instances: right[0],
        details: right[1],
    };

    let cluster_offset = render_clusters(frame, layout.clusters, dash);
    let instance_offset = render_instances(frame, layout.instances, dash);
    let detail_max_scroll = render_details(frame, layout.details, dash);
    dash.set_frame_geometry(layout, instance_offset, cluster_offset, detail_max_scroll);
}

fn render_clusters(frame: &mut Frame, area: Rect, dash: &Dashboard) -> usize {
    let panel = &dash.panels().clusters;
    let items = panel
        .clusters()
        .names()
        .iter()
        .map(|name| ListItem::new(Line::from(name.clone())).style(Style::default().fg(Color::White)))
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(panel_block(
            panel.title(),
            dash.focus() == FocusPane::Clusters,
        ))
        .highlight_style(
            Style::default()
                .bg(HIGHLIGHT)
                .fg(ACCENT)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = ListState::default()
        .with_offset(dash.cluster_offset())
        .with_selected(Some(panel.selected()));
    frame.render_stateful_widget(list, area, &mut state);
    state.offset()
}

fn render_instances(frame: &mut Frame, area: Rect, dash: &Dashboard) -> usize {
    let header_row = Row::new(INSTANCE_HEADERS.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = dash.panels().instances.rows().iter().map(|columns| {
        Row::new(columns.iter().enumerate().map(|(index, column)| {
            let color = if index == 1 {
                status_color(column)
            } else {
                Color::White
            };
            Cell::from(column.clone()).style(Style::default().fg(color))
        }))
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ],
    )
    .header(header_row)
    .block(panel_block(
        dash.panels().instances_title(),
        dash.focus() == FocusPane::Instances,
    ))
    .column_spacing(1)
    .row_highlight_style(Style::default().bg(HIGHLIGHT).add_modifier(Modifier::BOLD))
    .highlight_symbol("▶ ");

    let mut state = TableState::default()
        .with_offset(dash.instance_offset())
        .with_selected(dash.selection().selected().checked_sub(1));
    frame.render_stateful_widget(table, area, &mut state);
    state.offset()
}

fn render_details(frame: &mut Frame, area: Rect, dash: &Dashboard) -> u16 {
    let selection = dash.selection();
    let title = match selection.shown() {
        Some(key) => format!("[3] Details · {}", key.name),
        None => "[3] Details".to_string(),
    };
    let text = if selection.shown().is_none() {
        Text::from(Line::from(Span::styled(
            DETAIL_PLACEHOLDER,
            Style::default().fg(MUTED),
        )))
    } else {
        highlight_yaml_text(selection.detail())
    };

    let (width, height) = detail_viewport(area);
    let max_scroll = wrapped_line_count(selection.detail(), width).saturating_sub(height);
    let paragraph = Paragraph::new(text)
        .block(panel_block(title, dash.focus() == FocusPane::Details))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((selection.detail_scroll().min(max_scroll), 0));
    frame.render_widget(paragraph, area);
    max_scroll
}

fn render_footer(frame: &mut Frame, area: Rect, dash: &Dashboard) {
    let status = dash.status();
    let status_color = if status.contains("error") || status.contains("failed") {
        ERROR
    } else if status.contains("retrying") {
        WARN
    } else {
        Color::White
    };
    let changed = dash
        .last_change()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let status_width = area.width.saturating_sub(64).max(16) as usize;

    let spans = vec![
        Span::styled(
            format!(" {} ", dash.focus().label()),
            Style::default().fg(Color::White).bg(PL_A),
        ),
        Span::styled(
            format!(" {} ", compact_text(status, status_width)),
            Style::default().fg(status_color).bg(PANEL),
        ),
        Span::styled(
            format!(" last change {changed} "),
            Style::default().fg(MUTED).bg(BG),
        ),
        Span::styled(
            " 1/2/3 focus  ←/→ panels  ↑/↓ move  esc quit ",
            Style::default().fg(MUTED).bg(BG),
        ),
    ];
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL))
}

fn status_color(status: &str) -> Color {
    match status {
        "Running" | "Available" | "Ready" | "Active" | "Complete" | "Succeeded" | "Bound" => ACCENT,
        "Pending" | "Progressing" | "ScaledDown" | "Unknown" => WARN,
        "Failed" | "CrashLoopBackOff" | "Error" => ERROR,
        _ => Color::White,
    }
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    let lines = input
        .lines()
        .map(highlight_yaml_line)
        .collect::<Vec<Line<'static>>>();
    Text::from(lines)
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line
        .as_bytes()
        .iter()
        .take_while(|byte| **byte == b' ' || **byte == b'\t')
        .count();
    let indent = &line[..indent_len];
    let trimmed = &line[indent_len..];

    let mut spans = vec![Span::raw(indent.to_string())];
    if trimmed.is_empty() {
        return Line::from(spans);
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        spans.push(Span::styled(
            format!("#{comment}"),
            Style::default().fg(MUTED),
        ));
        return Line::from(spans);
    }

    if let Some(rest) = trimmed.strip_prefix("- ") {
        spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
        spans.extend(highlight_yaml_content(rest));
        return Line::from(spans);
    }

    spans.extend(highlight_yaml_content(trimmed));
    Line::from(spans)
}

fn highlight_yaml_content(content: &str) -> Vec<Span<'static>> {
    let Some((key, value)) = split_yaml_key_value(content) else {
        return vec![Span::styled(
            content.to_string(),
            Style::default().fg(Color::White),
        )];
    };

    let mut spans = vec![
        Span::styled(
            key.to_string(),
            Style::default().fg(Color::Rgb(103, 232, 249)),
        ),
        Span::styled(":", Style::default().fg(MUTED)),
    ];
    if value.trim().is_empty() {
        return spans;
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        value.trim_start().to_string(),
        Style::default().fg(yaml_value_color(value.trim())),
    ));
    spans
}

fn split_yaml_key_value(content: &str) -> Option<(&str, &str)> {
    let (key, value) = content.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || key.contains(' ') {
        return None;
    }
    Some((key, value))
}

fn yaml_value_color(value: &str) -> Color {
    if value.starts_with('"') || value.starts_with('\'') {
        Color::Rgb(125, 211, 252)
    } else if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else if value.starts_with('{') || value.starts_with('[') {
        MUTED
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn detail_viewport(area: Rect) -> (u16, u16) {
    let width = area.width.saturating_sub(2).max(1);
    let height = area.height.saturating_sub(2).max(1);
    (width, height)
}

/// Approximate rendered height of `text` when wrapped at `width` columns.
fn wrapped_line_count(text: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let lines = text
        .lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum::<usize>();
    u16::try_from(lines).unwrap_or(u16::MAX)
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        DETAIL_PLACEHOLDER, compact_text, display_cluster_endpoint, highlight_yaml_line, render,
        wrapped_line_count,
    };
    use crate::dashboard::{Dashboard, Target};
    use crate::model::{ClusterList, Instance, WatchEvent};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_three_panels_with_selected_detail() {
        let mut dash = Dashboard::new(
            Target {
                context: "kind-dev".to_string(),
                cluster: "https://127.0.0.1:6443".to_string(),
                namespace: String::new(),
                kinds: vec!["deployments".to_string()],
            },
            ClusterList::new(["dev"]),
        );
        dash.apply(WatchEvent::Added(Instance {
            name: "web".to_string(),
            status: "Available".to_string(),
            kind: "Deployment".to_string(),
            address: "apps/v1".to_string(),
            cluster_label: "default".to_string(),
            detail_text: "metadata:\n  name: web\n".to_string(),
        }));
        dash.on_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE));

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, &mut dash))
            .expect("frame drawn");
        let screen = screen_text(&terminal);

        assert!(screen.contains("[1] Clusters (2)"));
        assert!(screen.contains("[2] Instances (1)"));
        assert!(screen.contains("[3] Details · web"));
        assert!(screen.contains("Available"));
        assert!(screen.contains("127.0.0.1:6443"));
        assert!(screen.contains("name: web"));
    }

    #[test]
    fn selected_instance_without_detail_renders_empty_body() {
        let mut dash = Dashboard::new(Target::default(), ClusterList::default());
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, &mut dash))
            .expect("frame drawn");
        assert!(screen_text(&terminal).contains(DETAIL_PLACEHOLDER));

        dash.apply(WatchEvent::Added(Instance {
            name: "opaque".to_string(),
            status: "Unknown".to_string(),
            kind: "Deployment".to_string(),
            address: "apps/v1".to_string(),
            cluster_label: "default".to_string(),
            detail_text: String::new(),
        }));
        dash.on_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE));
        terminal
            .draw(|frame| render(frame, &mut dash))
            .expect("frame drawn");
        let screen = screen_text(&terminal);
        assert!(screen.contains("[3] Details · opaque"));
        assert!(!screen.contains(DETAIL_PLACEHOLDER));
    }

    #[test]
    fn yaml_keys_and_values_are_split() {
        let line = highlight_yaml_line("  replicas: 3");
        let content = line
            .spans
            .iter()
            .map(|span| span.content.to_string())
            .collect::<Vec<_>>();
        assert_eq!(content, vec!["  ", "replicas", ":", " ", "3"]);
    }

    #[test]
    fn helpers_shorten_text() {
        assert_eq!(compact_text("abcdef", 4), "abc…");
        assert_eq!(compact_text("abc", 4), "abc");
        assert_eq!(display_cluster_endpoint("https://k8s.local/"), "k8s.local");
        assert_eq!(wrapped_line_count("abcdef\n\nxy", 4), 4);
    }
}
