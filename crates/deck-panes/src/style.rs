/// How a content pane relates to the operator's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneFocus {
    /// Visible but unrelated to the tree cursor.
    Inactive,
    /// The row under the tree cursor while the tree holds keyboard focus.
    TreeFocus,
    /// The multiplexer's focused pane.
    Active,
}

/// tmux style strings for a pane: `window` applies while the pane is not
/// focused, `active` once it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneStyle {
    pub window: String,
    pub active: String,
}

struct Palette {
    inactive_bg: &'static str,
    tree_bg: &'static str,
    fg: &'static str,
}

const CLAUDE: Palette = Palette {
    inactive_bg: "#2a2420",
    tree_bg: "#3b3029",
    fg: "#d8cfc4",
};

const CODEX: Palette = Palette {
    inactive_bg: "#1f2429",
    tree_bg: "#28323b",
    fg: "#cdd6df",
};

const GEMINI: Palette = Palette {
    inactive_bg: "#22212b",
    tree_bg: "#2e2c3d",
    fg: "#d3d0e6",
};

const NEUTRAL: Palette = Palette {
    inactive_bg: "#232323",
    tree_bg: "#303030",
    fg: "#d0d0d0",
};

const HEADLESS_FG: &str = "#7a7a7a";

fn palette(agent: Option<&str>) -> &'static Palette {
    match agent.map(|name| name.trim().to_ascii_lowercase()).as_deref() {
        Some("claude") => &CLAUDE,
        Some("codex") => &CODEX,
        Some("gemini") => &GEMINI,
        _ => &NEUTRAL,
    }
}

fn style_string(palette: &Palette, headless: bool, focus: PaneFocus) -> String {
    let fg = if headless { HEADLESS_FG } else { palette.fg };
    match focus {
        PaneFocus::Inactive => format!("bg={},fg={fg}", palette.inactive_bg),
        PaneFocus::TreeFocus => format!("bg={},fg={fg}", palette.tree_bg),
        PaneFocus::Active => {
            let fg = if headless { HEADLESS_FG } else { "default" };
            format!("bg=default,fg={fg}")
        }
    }
}

pub fn pane_style(agent: Option<&str>, headless: bool, focus: PaneFocus) -> PaneStyle {
    let palette = palette(agent);
    PaneStyle {
        window: style_string(palette, headless, focus),
        active: style_string(palette, headless, PaneFocus::Active),
    }
}
