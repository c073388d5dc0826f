//! Keeps the multiplexer's pane tree in line with a desired layout.
//!
//! [`plan_layout`] is pure and may run on the interactive side. Everything
//! on [`PaneOrchestrator`] that talks to the multiplexer runs on the serial
//! writer's thread only; it is the sole owner of [`PaneState`].

use crate::geometry::{geometry_for, Cell, Geometry};
use crate::mux::{Multiplexer, SplitDirection, SplitRequest};
use crate::spec::PaneSpec;
use crate::style::{pane_style, PaneFocus, PaneStyle};
use crate::MAX_CONTENT_PANES;
use deck_core::PaneKey;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotSignature {
    Sticky(PaneKey),
    Active,
}

/// Structural fingerprint: which geometry, and which slot holds which pinned
/// key. Swapping the active slot's content leaves it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutSignature {
    pub geometry: u8,
    pub slots: Vec<SlotSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub specs: Vec<PaneSpec>,
    pub active_slot: Option<usize>,
    pub signature: LayoutSignature,
}

impl LayoutPlan {
    pub fn active_spec(&self) -> Option<&PaneSpec> {
        self.active_slot.and_then(|slot| self.specs.get(slot))
    }

    pub fn geometry(&self) -> Option<&'static Geometry> {
        geometry_for(usize::from(self.signature.geometry))
    }
}

/// One complete desired state for the writer to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutJob {
    pub plan: LayoutPlan,
    pub focus: Option<PaneKey>,
    pub tree_focus: Option<PaneKey>,
    pub status_bar_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Dashboard pane unresolved; retried on the next job.
    Skipped,
    Unchanged,
    Swapped,
    Rebuilt,
    /// A split failed part way; the next job rebuilds.
    Incomplete,
}

pub fn plan_layout(sticky: Vec<PaneSpec>, active: Option<PaneSpec>) -> LayoutPlan {
    let mut specs: Vec<PaneSpec> = Vec::with_capacity(sticky.len() + 1);
    for mut spec in sticky {
        if specs.iter().any(|existing| existing.key == spec.key) {
            continue;
        }
        spec.sticky = true;
        specs.push(spec);
    }
    let mut active_slot = None;
    if let Some(mut spec) = active {
        if !specs.iter().any(|existing| existing.key == spec.key) {
            spec.sticky = false;
            active_slot = Some(specs.len());
            specs.push(spec);
        }
    }
    if specs.len() > MAX_CONTENT_PANES {
        warn!(
            event = "layout_truncated",
            requested = specs.len(),
            max = MAX_CONTENT_PANES
        );
        specs.truncate(MAX_CONTENT_PANES);
        if active_slot.is_some_and(|slot| slot >= MAX_CONTENT_PANES) {
            active_slot = None;
        }
    }
    let slots = specs
        .iter()
        .map(|spec| {
            if spec.sticky {
                SlotSignature::Sticky(spec.key.clone())
            } else {
                SlotSignature::Active
            }
        })
        .collect();
    LayoutPlan {
        signature: LayoutSignature {
            geometry: (specs.len() + 1) as u8,
            slots,
        },
        specs,
        active_slot,
    }
}

#[derive(Debug, Default)]
pub struct PaneState {
    key_to_pane: HashMap<PaneKey, String>,
    pane_to_key: HashMap<String, PaneKey>,
    active_pane: Option<String>,
    sticky_panes: HashSet<String>,
    signature: Option<LayoutSignature>,
    styles: HashMap<String, PaneStyle>,
}

impl PaneState {
    fn track(&mut self, key: PaneKey, pane: String, sticky: bool) {
        if sticky {
            self.sticky_panes.insert(pane.clone());
        } else {
            self.active_pane = Some(pane.clone());
        }
        self.pane_to_key.insert(pane.clone(), key.clone());
        self.key_to_pane.insert(key, pane);
    }

    fn remap(&mut self, pane: &str, key: PaneKey) {
        if let Some(old) = self.pane_to_key.remove(pane) {
            self.key_to_pane.remove(&old);
        }
        self.pane_to_key.insert(pane.to_string(), key.clone());
        self.key_to_pane.insert(key, pane.to_string());
    }

    fn clear(&mut self) {
        *self = PaneState::default();
    }

    pub fn pane_for(&self, key: &PaneKey) -> Option<&str> {
        self.key_to_pane.get(key).map(String::as_str)
    }

    pub fn key_for(&self, pane: &str) -> Option<&PaneKey> {
        self.pane_to_key.get(pane)
    }

    pub fn active_pane(&self) -> Option<&str> {
        self.active_pane.as_deref()
    }

    pub fn is_sticky_pane(&self, pane: &str) -> bool {
        self.sticky_panes.contains(pane)
    }

    pub fn tracked_panes(&self) -> Vec<String> {
        self.pane_to_key.keys().cloned().collect()
    }
}

pub struct PaneOrchestrator<M: Multiplexer> {
    mux: M,
    state: PaneState,
    dashboard_pane: Option<String>,
    status_bar: Option<bool>,
}

impl<M: Multiplexer> PaneOrchestrator<M> {
    pub fn new(mux: M) -> Self {
        Self {
            mux,
            state: PaneState::default(),
            dashboard_pane: None,
            status_bar: None,
        }
    }

    pub fn state(&self) -> &PaneState {
        &self.state
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    fn resolve_dashboard(&mut self) -> Option<String> {
        if self.dashboard_pane.is_none() {
            self.dashboard_pane = self.mux.current_pane_id();
            if let Some(pane) = &self.dashboard_pane {
                info!(
                    event = "dashboard_pane_resolved",
                    pane = %pane,
                    tty = %self.mux.pane_tty(pane).unwrap_or_default()
                );
            }
        }
        self.dashboard_pane.clone()
    }

    pub fn apply(&mut self, job: &LayoutJob) -> ApplyOutcome {
        let Some(dashboard) = self.resolve_dashboard() else {
            warn!(event = "dashboard_pane_unresolved");
            return ApplyOutcome::Skipped;
        };

        if self.status_bar != Some(job.status_bar_visible) {
            self.mux.set_status_bar(&dashboard, job.status_bar_visible);
            self.status_bar = Some(job.status_bar_visible);
        }

        let plan = &job.plan;
        let outcome = if self.state.signature.as_ref() == Some(&plan.signature) {
            match self.swap_active(plan) {
                Some(outcome) => outcome,
                None => self.rebuild(&dashboard, plan),
            }
        } else {
            self.rebuild(&dashboard, plan)
        };

        self.apply_styles(plan, job.tree_focus.as_ref());
        if let Some(key) = &job.focus {
            match self.state.pane_for(key) {
                Some(pane) => {
                    let pane = pane.to_string();
                    self.mux.select_pane(&pane);
                }
                None => debug!(event = "focus_target_missing", key = %key),
            }
        }
        outcome
    }

    /// Cheap path for an unchanged signature. `None` means the active pane
    /// is gone or could not be respawned and a rebuild is needed.
    fn swap_active(&mut self, plan: &LayoutPlan) -> Option<ApplyOutcome> {
        let Some(spec) = plan.active_spec() else {
            return Some(ApplyOutcome::Unchanged);
        };
        let pane = self.state.active_pane.clone()?;
        if self.state.key_for(&pane) == Some(&spec.key) {
            return Some(ApplyOutcome::Unchanged);
        }
        self.mux.pane_tty(&pane)?;
        if !self.mux.respawn_pane(&pane, &spec.command) {
            return None;
        }
        self.state.remap(&pane, spec.key.clone());
        self.state.styles.remove(&pane);
        debug!(event = "active_pane_swapped", pane = %pane, key = %spec.key);
        Some(ApplyOutcome::Swapped)
    }

    fn rebuild(&mut self, dashboard: &str, plan: &LayoutPlan) -> ApplyOutcome {
        self.kill_tracked(dashboard);

        let Some(geometry) = plan.geometry() else {
            warn!(event = "geometry_missing", panes = plan.specs.len() + 1);
            return ApplyOutcome::Incomplete;
        };

        let mut column_tops: Vec<String> = vec![dashboard.to_string()];
        let mut previous_width = geometry.columns[0].width_pct;
        let mut remaining: u16 = geometry.columns[1..]
            .iter()
            .map(|column| column.width_pct)
            .sum();
        for column in &geometry.columns[1..] {
            let Some(top) = column.cells.first() else {
                continue;
            };
            let size_pct = remaining * 100 / (previous_width + remaining).max(1);
            let left = column_tops[column_tops.len() - 1].clone();
            let Some(pane) =
                self.split_cell(&left, SplitDirection::Horizontal, size_pct, *top, plan)
            else {
                return ApplyOutcome::Incomplete;
            };
            column_tops.push(pane);
            remaining = remaining.saturating_sub(column.width_pct);
            previous_width = column.width_pct;
        }

        for (column, top) in geometry.columns.iter().zip(column_tops.iter()) {
            let rows = column.cells.len();
            let mut above = top.clone();
            for (row, cell) in column.cells.iter().enumerate().skip(1) {
                let below = (rows - row) as u16;
                let size_pct = below * 100 / (below + 1);
                let Some(pane) =
                    self.split_cell(&above, SplitDirection::Vertical, size_pct, *cell, plan)
                else {
                    return ApplyOutcome::Incomplete;
                };
                above = pane;
            }
        }

        self.state.signature = Some(plan.signature.clone());
        info!(
            event = "layout_rebuilt",
            geometry = plan.signature.geometry,
            panes = plan.specs.len()
        );
        ApplyOutcome::Rebuilt
    }

    fn split_cell(
        &mut self,
        target: &str,
        direction: SplitDirection,
        size_pct: u16,
        cell: Cell,
        plan: &LayoutPlan,
    ) -> Option<String> {
        let Cell::Content(slot) = cell else {
            return None;
        };
        let spec = plan.specs.get(slot)?;
        let request = SplitRequest {
            target: target.to_string(),
            direction,
            size_pct,
            command: spec.command.clone(),
        };
        match self.mux.split_window(&request) {
            Some(pane) => {
                self.state.track(spec.key.clone(), pane.clone(), spec.sticky);
                Some(pane)
            }
            None => {
                warn!(event = "pane_split_failed", target = %target, key = %spec.key);
                None
            }
        }
    }

    fn kill_tracked(&mut self, dashboard: &str) {
        let tracked = self.state.tracked_panes();
        if !tracked.is_empty() {
            let live: HashSet<String> = self.mux.list_panes().into_iter().collect();
            for pane in tracked {
                if pane != dashboard && live.contains(&pane) {
                    self.mux.kill_pane(&pane);
                }
            }
        }
        self.state.clear();
    }

    fn apply_styles(&mut self, plan: &LayoutPlan, tree_focus: Option<&PaneKey>) {
        for spec in &plan.specs {
            let Some(pane) = self.state.pane_for(&spec.key).map(str::to_string) else {
                continue;
            };
            let focus = if tree_focus == Some(&spec.key) {
                PaneFocus::TreeFocus
            } else {
                PaneFocus::Inactive
            };
            let style = pane_style(spec.agent.as_deref(), spec.headless, focus);
            if self.state.styles.get(&pane) == Some(&style) {
                continue;
            }
            if self.mux.set_pane_style(&pane, &style) {
                self.state.styles.insert(pane, style);
            }
        }
    }

    /// Kill every tracked pane and restore the host status bar.
    pub fn teardown(&mut self) {
        let dashboard = self.dashboard_pane.clone().unwrap_or_default();
        self.kill_tracked(&dashboard);
        if self.status_bar == Some(false) && !dashboard.is_empty() {
            self.mux.set_status_bar(&dashboard, true);
        }
        self.status_bar = None;
        info!(event = "panes_torn_down");
    }
}
