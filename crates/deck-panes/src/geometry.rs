//! Fixed pane arrangements, keyed by the total pane count (dashboard
//! included). Content slots are numbered column by column, top to bottom.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Dashboard,
    Content(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub width_pct: u16,
    pub cells: &'static [Cell],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub id: u8,
    pub columns: &'static [Column],
}

use Cell::{Content, Dashboard};

pub const GEOMETRIES: [Geometry; 6] = [
    Geometry {
        id: 1,
        columns: &[Column {
            width_pct: 100,
            cells: &[Dashboard],
        }],
    },
    Geometry {
        id: 2,
        columns: &[
            Column {
                width_pct: 40,
                cells: &[Dashboard],
            },
            Column {
                width_pct: 60,
                cells: &[Content(0)],
            },
        ],
    },
    Geometry {
        id: 3,
        columns: &[
            Column {
                width_pct: 40,
                cells: &[Dashboard],
            },
            Column {
                width_pct: 60,
                cells: &[Content(0), Content(1)],
            },
        ],
    },
    Geometry {
        id: 4,
        columns: &[
            Column {
                width_pct: 34,
                cells: &[Dashboard],
            },
            Column {
                width_pct: 33,
                cells: &[Content(0), Content(1)],
            },
            Column {
                width_pct: 33,
                cells: &[Content(2)],
            },
        ],
    },
    Geometry {
        id: 5,
        columns: &[
            Column {
                width_pct: 34,
                cells: &[Dashboard],
            },
            Column {
                width_pct: 33,
                cells: &[Content(0), Content(1)],
            },
            Column {
                width_pct: 33,
                cells: &[Content(2), Content(3)],
            },
        ],
    },
    Geometry {
        id: 6,
        columns: &[
            Column {
                width_pct: 34,
                cells: &[Dashboard, Content(0)],
            },
            Column {
                width_pct: 33,
                cells: &[Content(1), Content(2)],
            },
            Column {
                width_pct: 33,
                cells: &[Content(3), Content(4)],
            },
        ],
    },
];

pub fn geometry_for(total_panes: usize) -> Option<&'static Geometry> {
    GEOMETRIES
        .iter()
        .find(|geometry| usize::from(geometry.id) == total_panes)
}

impl Geometry {
    pub fn content_slots(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|column| column.cells.iter())
            .filter(|cell| matches!(cell, Cell::Content(_)))
            .count()
    }
}
