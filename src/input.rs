use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FocusPane {
    Clusters,
    Instances,
    Details,
}

impl FocusPane {
    pub fn label(self) -> &'static str {
        match self {
            Self::Clusters => "clusters",
            Self::Instances => "instances",
            Self::Details => "details",
        }
    }
}

/// What the focus layer decided to do with a key.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputOutcome {
    Quit,
    Focused(FocusPane),
    Forward(FocusPane, KeyEvent),
}

/// Where a mouse event landed, after focus has been moved there.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MouseTarget {
    pub pane: FocusPane,
    pub kind: MouseEventKind,
    /// Line offset inside the panel's content area. `None` on a border row.
    pub line: Option<u16>,
}

/// Screen areas of the three panels from the last frame.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PanelLayout {
    pub clusters: Rect,
    pub instances: Rect,
    pub details: Rect,
}

impl PanelLayout {
    pub fn pane_at(&self, column: u16, row: u16) -> Option<FocusPane> {
        let position = Position::new(column, row);
        if self.clusters.contains(position) {
            Some(FocusPane::Clusters)
        } else if self.instances.contains(position) {
            Some(FocusPane::Instances)
        } else if self.details.contains(position) {
            Some(FocusPane::Details)
        } else {
            None
        }
    }

    pub fn area(&self, pane: FocusPane) -> Rect {
        match pane {
            FocusPane::Clusters => self.clusters,
            FocusPane::Instances => self.instances,
            FocusPane::Details => self.details,
        }
    }
}

pub trait InputListener {
    fn on_input(&mut self, key: KeyEvent) -> InputOutcome;
}

pub trait MouseListener {
    fn on_mouse(&mut self, mouse: MouseEvent, layout: &PanelLayout) -> Option<MouseTarget>;
}

/// Governs which panel receives keyboard input.
#[derive(Debug)]
pub struct FocusController {
    focus: FocusPane,
}

impl Default for FocusController {
    fn default() -> Self {
        Self {
            focus: FocusPane::Instances,
        }
    }
}

impl FocusController {
    pub fn focus(&self) -> FocusPane {
        self.focus
    }

    #[cfg(test)]
    pub fn set_focus(&mut self, pane: FocusPane) {
        self.focus = pane;
    }
}

impl InputListener for FocusController {
    fn on_input(&mut self, key: KeyEvent) -> InputOutcome {
        if is_quit_key(key) {
            return InputOutcome::Quit;
        }
        match focus_target(key) {
            Some(pane) => {
                self.focus = pane;
                InputOutcome::Focused(pane)
            }
            None => InputOutcome::Forward(self.focus, key),
        }
    }
}

impl MouseListener for FocusController {
    fn on_mouse(&mut self, mouse: MouseEvent, layout: &PanelLayout) -> Option<MouseTarget> {
        let pane = layout.pane_at(mouse.column, mouse.row)?;
        if matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            self.focus = pane;
        }
        Some(MouseTarget {
            pane,
            kind: mouse.kind,
            line: content_line(layout.area(pane), mouse.row),
        })
    }
}

fn content_line(area: Rect, row: u16) -> Option<u16> {
    let first = area.y.saturating_add(1);
    let last = area.bottom().saturating_sub(2);
    (row >= first && row <= last).then(|| row - first)
}

fn is_quit_key(key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn focus_target(key: KeyEvent) -> Option<FocusPane> {
    let plain = key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT;
    match key.code {
        KeyCode::Left if key.modifiers.is_empty() => Some(FocusPane::Clusters),
        KeyCode::Right if key.modifiers.is_empty() => Some(FocusPane::Instances),
        KeyCode::Char('1') if plain => Some(FocusPane::Clusters),
        KeyCode::Char('2') if plain => Some(FocusPane::Instances),
        KeyCode::Char('3') if plain => Some(FocusPane::Details),
        _ => None,
    }
}

/// Movement understood by every panel once a key has been forwarded.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PanelAction {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

pub fn map_panel_key(key: KeyEvent) -> Option<PanelAction> {
    match key.code {
        KeyCode::Up => Some(PanelAction::Up),
        KeyCode::Down => Some(PanelAction::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(PanelAction::Up),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(PanelAction::Down),
        KeyCode::PageUp => Some(PanelAction::PageUp),
        KeyCode::PageDown => Some(PanelAction::PageDown),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PanelAction::PageUp)
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PanelAction::PageDown)
        }
        KeyCode::Home => Some(PanelAction::Top),
        KeyCode::Char('g') if key.modifiers.is_empty() => Some(PanelAction::Top),
        KeyCode::End => Some(PanelAction::Bottom),
        KeyCode::Char('G') => Some(PanelAction::Bottom),
        _ => None,
    }
}
