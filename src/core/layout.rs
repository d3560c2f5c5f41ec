use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grid arrangements, in the order the layout button cycles through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutMode {
    #[default]
    #[serde(rename = "1x4")]
    OneByFour,
    #[serde(rename = "1x3")]
    OneByThree,
    #[serde(rename = "1x2")]
    OneByTwo,
    #[serde(rename = "1x1")]
    OneByOne,
    #[serde(rename = "2x2")]
    TwoByTwo,
}

pub const LAYOUT_CYCLE: [LayoutMode; 5] = [
    LayoutMode::OneByFour,
    LayoutMode::OneByThree,
    LayoutMode::OneByTwo,
    LayoutMode::OneByOne,
    LayoutMode::TwoByTwo,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub fn to_vec2(self) -> egui::Vec2 {
        egui::vec2(self.width as f32, self.height as f32)
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything the window needs to arrange panes for one layout mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub rows: usize,
    pub columns: usize,
    /// One cell per visible pane, indexed by pane number.
    pub cells: Vec<GridCell>,
    pub window: WindowSize,
}

impl LayoutMode {
    pub fn next(self) -> Self {
        let position = LAYOUT_CYCLE.iter().position(|mode| *mode == self).unwrap_or(0);
        LAYOUT_CYCLE[(position + 1) % LAYOUT_CYCLE.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            LayoutMode::OneByFour => "1x4",
            LayoutMode::OneByThree => "1x3",
            LayoutMode::OneByTwo => "1x2",
            LayoutMode::OneByOne => "1x1",
            LayoutMode::TwoByTwo => "2x2",
        }
    }

    pub fn visible_panes(self) -> usize {
        match self {
            LayoutMode::OneByFour | LayoutMode::TwoByTwo => 4,
            LayoutMode::OneByThree => 3,
            LayoutMode::OneByTwo => 2,
            LayoutMode::OneByOne => 1,
        }
    }

    pub fn window_size(self) -> WindowSize {
        let (width, height) = match self {
            LayoutMode::OneByFour => (1280, 400),
            LayoutMode::OneByThree => (960, 400),
            LayoutMode::OneByTwo => (640, 400),
            LayoutMode::OneByOne => (400, 400),
            LayoutMode::TwoByTwo => (760, 680),
        };
        WindowSize { width, height }
    }

    /// Grid position of `pane`, or `None` when the pane is hidden.
    pub fn cell(self, pane: usize) -> Option<GridCell> {
        if pane >= self.visible_panes() {
            return None;
        }
        Some(match self {
            LayoutMode::TwoByTwo => GridCell { row: pane / 2, column: pane % 2 },
            _ => GridCell { row: 0, column: pane },
        })
    }

    pub fn geometry(self) -> LayoutGeometry {
        let (rows, columns) = match self {
            LayoutMode::TwoByTwo => (2, 2),
            other => (1, other.visible_panes()),
        };
        LayoutGeometry {
            rows,
            columns,
            cells: (0..self.visible_panes()).filter_map(|pane| self.cell(pane)).collect(),
            window: self.window_size(),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LayoutMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LAYOUT_CYCLE
            .iter()
            .copied()
            .find(|mode| mode.label() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("Unknown layout mode: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_order() {
        let mut mode = LayoutMode::OneByFour;
        let mut seen = Vec::new();
        for _ in 0..5 {
            mode = mode.next();
            seen.push(mode.label());
        }
        assert_eq!(seen, ["1x3", "1x2", "1x1", "2x2", "1x4"]);
    }

    #[test]
    fn test_full_cycle_restores_geometry() {
        let start = LayoutMode::OneByFour;
        let original = start.geometry();
        let mut mode = start;
        for _ in 0..LAYOUT_CYCLE.len() {
            mode = mode.next();
        }
        assert_eq!(mode, start);
        assert_eq!(mode.geometry(), original);
        assert_eq!(mode.window_size().to_string(), "1280x400");
    }

    #[test]
    fn test_window_sizes() {
        let sizes: Vec<String> = LAYOUT_CYCLE.iter().map(|m| m.window_size().to_string()).collect();
        assert_eq!(sizes, ["1280x400", "960x400", "640x400", "400x400", "760x680"]);
    }

    #[test]
    fn test_two_by_two_cells() {
        let geometry = LayoutMode::TwoByTwo.geometry();
        assert_eq!((geometry.rows, geometry.columns), (2, 2));
        assert_eq!(geometry.cells[3], GridCell { row: 1, column: 1 });
        assert_eq!(LayoutMode::TwoByTwo.cell(2), Some(GridCell { row: 1, column: 0 }));
    }

    #[test]
    fn test_hidden_panes_have_no_cell() {
        assert_eq!(LayoutMode::OneByTwo.cell(2), None);
        assert_eq!(LayoutMode::OneByOne.geometry().cells.len(), 1);
        assert_eq!(LayoutMode::OneByThree.geometry().columns, 3);
    }

    #[test]
    fn test_parse_and_serde_names() {
        assert_eq!("2x2".parse::<LayoutMode>().unwrap(), LayoutMode::TwoByTwo);
        assert!("3x3".parse::<LayoutMode>().is_err());
        let json = serde_json::to_string(&LayoutMode::OneByThree).unwrap();
        assert_eq!(json, "\"1x3\"");
    }
}
