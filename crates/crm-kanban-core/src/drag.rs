//! Drag Gesture Coordinator.
//!
//! Turns pointer and keyboard drag events into `Board::move_item` calls and
//! reports a single terminal event per gesture.
//!
//! ```text
//!            press                 moved >= threshold
//!   Idle ───────────> Armed ───────────────────────────> Dragging
//!    ^                  │ release (below threshold)         │
//!    │                  └──────────> Click ──> Idle         │ release over target  ──> Dropped ──> Idle
//!    │                                                      │ release over nothing ──> Cancelled ──> Idle
//!    └──────────────────────────────────────────────────────┘ cancel/escape        ──> Cancelled ──> Idle
//! ```
//!
//! Keyboard pick-up skips `Armed`. Whole columns are reordered with
//! `ContainerPickUp`/`ContainerMove`/`ContainerDrop`; that only changes the
//! local arrangement and never reaches the stage policy. While locked (a
//! transition is pending) every event is ignored.

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardSnapshot, ContainerId, ItemId};

/// Minimum pointer travel, in pixels, before a press becomes a drag.
pub const DEFAULT_ACTIVATION_DISTANCE: f64 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// What the pointer or keyboard focus is currently over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    Item(ItemId),
    Container(ContainerId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DragEvent {
    PointerDown {
        item_id: ItemId,
        at: Point,
    },
    PointerMove {
        at: Point,
        #[serde(default)]
        over: Option<DropTarget>,
    },
    PointerUp {
        #[serde(default)]
        over: Option<DropTarget>,
    },
    KeyboardPickUp {
        item_id: ItemId,
    },
    KeyboardMove {
        over: DropTarget,
    },
    KeyboardDrop,
    ContainerPickUp {
        container_id: ContainerId,
    },
    ContainerMove {
        over: ContainerId,
    },
    ContainerDrop,
    Cancel,
}

/// Terminal hand-off to the stage transition policy.
#[derive(Debug, Clone)]
pub struct DropResolution {
    pub item_id: ItemId,
    pub record_id: i64,
    pub source_title: String,
    pub target_title: String,
    /// Board arrangement from before the gesture started.
    pub snapshot: BoardSnapshot,
}

#[derive(Debug, Clone)]
pub enum DragOutcome {
    /// Nothing visible happened.
    None,
    /// The press crossed the activation threshold.
    Started { item_id: ItemId },
    /// Intermediate hover. `changed` is true when the board was rearranged.
    Hovered { changed: bool },
    /// Press and release without a drag: open the record's detail view.
    Click { record_id: i64 },
    Dropped(DropResolution),
    /// The board was restored to the pre-drag snapshot.
    Cancelled,
    ContainerStarted { container_id: ContainerId },
    /// Column drag finished. `changed` is false if the order ended where it began.
    Reordered { changed: bool },
    /// Event arrived while locked or in a state that cannot accept it.
    Ignored,
}

/// Public view of the coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPhase {
    Idle,
    Armed,
    Dragging,
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    item_id: ItemId,
    record_id: i64,
    source_title: String,
    snapshot: BoardSnapshot,
}

#[derive(Debug, Clone)]
enum DragState {
    Idle,
    Armed {
        item_id: ItemId,
        record_id: i64,
        start: Point,
    },
    Dragging(ActiveDrag),
    MovingContainer {
        container_id: ContainerId,
        snapshot: BoardSnapshot,
    },
}

#[derive(Debug, Clone)]
pub struct DragCoordinator {
    state: DragState,
    activation_distance: f64,
    locked: bool,
}

impl Default for DragCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE)
    }
}

impl DragCoordinator {
    pub fn new(activation_distance: f64) -> Self {
        Self {
            state: DragState::Idle,
            activation_distance: activation_distance.max(0.0),
            locked: false,
        }
    }

    pub fn phase(&self) -> DragPhase {
        match self.state {
            DragState::Idle => DragPhase::Idle,
            DragState::Armed { .. } => DragPhase::Armed,
            DragState::Dragging(_) | DragState::MovingContainer { .. } => DragPhase::Dragging,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock or unlock input. Locking is only honoured between gestures.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// The item currently being dragged, if any.
    pub fn active_item(&self) -> Option<&ItemId> {
        match &self.state {
            DragState::Armed { item_id, .. } => Some(item_id),
            DragState::Dragging(drag) => Some(&drag.item_id),
            DragState::Idle | DragState::MovingContainer { .. } => None,
        }
    }

    /// Abandon the gesture in progress without touching the board.
    ///
    /// Used when the board is replaced underneath the gesture, so its
    /// snapshot no longer describes the board. Returns whether a gesture
    /// was dropped.
    pub fn reset(&mut self) -> bool {
        let active = !matches!(self.state, DragState::Idle);
        self.state = DragState::Idle;
        active
    }

    pub fn handle(&mut self, board: &mut Board, event: DragEvent) -> DragOutcome {
        if self.locked {
            tracing::debug!(?event, "drag input ignored while transition pending");
            return DragOutcome::Ignored;
        }

        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match (state, event) {
            (DragState::Idle, DragEvent::PointerDown { at, .. }) if !at.is_finite() => DragOutcome::Ignored,
            (DragState::Idle, DragEvent::PointerDown { item_id, at }) => {
                match board.item(&item_id) {
                    Some(item) => {
                        self.state = DragState::Armed {
                            record_id: item.record_id,
                            item_id,
                            start: at,
                        };
                        DragOutcome::None
                    }
                    None => DragOutcome::Ignored,
                }
            }
            (DragState::Idle, DragEvent::KeyboardPickUp { item_id }) => {
                match self.activate(board, &item_id) {
                    Some(drag) => {
                        self.state = DragState::Dragging(drag);
                        DragOutcome::Started { item_id }
                    }
                    None => DragOutcome::Ignored,
                }
            }
            (DragState::Idle, DragEvent::ContainerPickUp { container_id }) => {
                if board.container(&container_id).is_none() {
                    return DragOutcome::Ignored;
                }
                self.state = DragState::MovingContainer {
                    container_id: container_id.clone(),
                    snapshot: board.snapshot(),
                };
                DragOutcome::ContainerStarted { container_id }
            }
            (state @ DragState::Idle, _) => {
                self.state = state;
                DragOutcome::Ignored
            }

            (
                DragState::Armed {
                    item_id,
                    record_id,
                    start,
                },
                DragEvent::PointerMove { at, over },
            ) => {
                // Non-finite coordinates never count as movement.
                if !at.is_finite() || start.distance_to(&at) < self.activation_distance {
                    self.state = DragState::Armed {
                        item_id,
                        record_id,
                        start,
                    };
                    return DragOutcome::None;
                }
                match self.activate(board, &item_id) {
                    Some(drag) => {
                        if let Some(target) = over {
                            follow(board, &drag.item_id, &target);
                        }
                        self.state = DragState::Dragging(drag);
                        DragOutcome::Started { item_id }
                    }
                    None => DragOutcome::Cancelled,
                }
            }
            (DragState::Armed { record_id, .. }, DragEvent::PointerUp { .. }) => {
                DragOutcome::Click { record_id }
            }
            (DragState::Armed { .. }, DragEvent::Cancel) => DragOutcome::Cancelled,
            (state @ DragState::Armed { .. }, _) => {
                self.state = state;
                DragOutcome::Ignored
            }

            (DragState::Dragging(drag), DragEvent::PointerMove { over, .. }) => {
                let changed = match over {
                    Some(target) => follow(board, &drag.item_id, &target),
                    None => false,
                };
                self.state = DragState::Dragging(drag);
                DragOutcome::Hovered { changed }
            }
            (DragState::Dragging(drag), DragEvent::KeyboardMove { over }) => {
                let changed = follow(board, &drag.item_id, &over);
                self.state = DragState::Dragging(drag);
                DragOutcome::Hovered { changed }
            }
            (DragState::Dragging(drag), DragEvent::PointerUp { over }) => match over {
                Some(target) if accepts(board, &target) => {
                    follow(board, &drag.item_id, &target);
                    resolve(board, drag)
                }
                _ => cancel(board, drag),
            },
            (DragState::Dragging(drag), DragEvent::KeyboardDrop) => resolve(board, drag),
            (DragState::Dragging(drag), DragEvent::Cancel) => cancel(board, drag),
            (state @ DragState::Dragging(_), _) => {
                self.state = state;
                DragOutcome::Ignored
            }

            (
                DragState::MovingContainer {
                    container_id,
                    snapshot,
                },
                DragEvent::ContainerMove { over },
            ) => {
                let changed = match (board.container_index(&container_id), board.container_index(&over)) {
                    (Some(from), Some(to)) => board.move_container(from, to),
                    _ => false,
                };
                self.state = DragState::MovingContainer {
                    container_id,
                    snapshot,
                };
                DragOutcome::Hovered { changed }
            }
            (DragState::MovingContainer { snapshot, .. }, DragEvent::ContainerDrop) => DragOutcome::Reordered {
                changed: !board.matches(&snapshot),
            },
            (DragState::MovingContainer { snapshot, .. }, DragEvent::Cancel) => {
                board.restore(&snapshot);
                DragOutcome::Cancelled
            }
            (state @ DragState::MovingContainer { .. }, _) => {
                self.state = state;
                DragOutcome::Ignored
            }
        }
    }

    fn activate(&self, board: &Board, item_id: &ItemId) -> Option<ActiveDrag> {
        let record_id = board.item(item_id)?.record_id;
        let source_title = board.stage_of(item_id)?.to_string();
        Some(ActiveDrag {
            item_id: item_id.clone(),
            record_id,
            source_title,
            snapshot: board.snapshot(),
        })
    }
}

/// Whether a drop on `target` lands in a container that accepts drops.
fn accepts(board: &Board, target: &DropTarget) -> bool {
    match target {
        DropTarget::Container(id) => board.container(id).is_some_and(|c| c.accepts_drops),
        DropTarget::Item(id) => board
            .locate(id)
            .is_some_and(|(ci, _)| board.containers()[ci].accepts_drops),
    }
}

/// Rearrange the board so the dragged item sits where `target` points.
fn follow(board: &mut Board, item_id: &ItemId, target: &DropTarget) -> bool {
    let Some((from_ci, from_ii)) = board.locate(item_id) else {
        return false;
    };
    let from = board.containers()[from_ci].id.clone();

    let (to, to_index) = match target {
        DropTarget::Item(over) if over == item_id => return false,
        DropTarget::Item(over) => {
            let Some((to_ci, to_ii)) = board.locate(over) else {
                return false;
            };
            (board.containers()[to_ci].id.clone(), to_ii)
        }
        DropTarget::Container(id) => {
            if *id == from {
                return false;
            }
            let Some(container) = board.container(id) else {
                return false;
            };
            (id.clone(), container.items.len())
        }
    };

    board.move_item(item_id, &from, from_ii, &to, to_index)
}

fn resolve(board: &mut Board, drag: ActiveDrag) -> DragOutcome {
    let Some(target_title) = board.stage_of(&drag.item_id).map(String::from) else {
        return cancel(board, drag);
    };
    DragOutcome::Dropped(DropResolution {
        item_id: drag.item_id,
        record_id: drag.record_id,
        source_title: drag.source_title,
        target_title,
        snapshot: drag.snapshot,
    })
}

fn cancel(board: &mut Board, drag: ActiveDrag) -> DragOutcome {
    board.restore(&drag.snapshot);
    DragOutcome::Cancelled
}
