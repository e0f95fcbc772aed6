//! Virtual controller backends and mapping modes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::{ControllerReport, Feedback, VirtualController};
use crate::error::{MapperError, Result};

/// Which virtual controller family mapped devices are exposed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Xbox 360 pads through ViGEmBus.
    #[default]
    #[serde(rename = "vigem")]
    ViGEm,
    /// Generic joysticks through vJoy.
    #[serde(rename = "vjoy")]
    VJoy,
    /// Xbox 360 pads laid out the way RPCS3 expects rock band instruments.
    Rpcs3,
}

impl MappingMode {
    pub const ALL: [MappingMode; 3] = [MappingMode::ViGEm, MappingMode::VJoy, MappingMode::Rpcs3];

    pub fn as_str(self) -> &'static str {
        match self {
            MappingMode::ViGEm => "vigem",
            MappingMode::VJoy => "vjoy",
            MappingMode::Rpcs3 => "rpcs3",
        }
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingMode {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vigem" | "vigembus" => Ok(MappingMode::ViGEm),
            "vjoy" => Ok(MappingMode::VJoy),
            "rpcs3" => Ok(MappingMode::Rpcs3),
            _ => Err(MapperError::UnknownMode(s.to_string())),
        }
    }
}

/// A source of virtual controllers with a fixed number of device slots.
pub trait ControllerBackend {
    /// The mode this backend natively serves.
    fn mode(&self) -> MappingMode;

    /// Whether another device can be created right now.
    fn devices_available(&self) -> bool;

    fn create(&self) -> Result<Box<dyn VirtualController>>;
}

/// The backends a mapper factory draws from.
///
/// RPCS3 mode uses the Xbox pad backend; its instruments differ only in layout.
pub struct BackendSet {
    xbox: Box<dyn ControllerBackend>,
    joystick: Box<dyn ControllerBackend>,
}

impl BackendSet {
    pub fn new(xbox: Box<dyn ControllerBackend>, joystick: Box<dyn ControllerBackend>) -> Self {
        Self { xbox, joystick }
    }

    /// In-memory backends with `capacity` slots each.
    ///
    /// Returns the set plus handles to both backends for inspection.
    pub fn in_memory(capacity: usize) -> (Self, InMemoryBackend, InMemoryBackend) {
        let xbox = InMemoryBackend::new(MappingMode::ViGEm, capacity);
        let joystick = InMemoryBackend::new(MappingMode::VJoy, capacity);
        let set = Self::new(Box::new(xbox.clone()), Box::new(joystick.clone()));
        (set, xbox, joystick)
    }

    pub fn for_mode(&self, mode: MappingMode) -> &dyn ControllerBackend {
        match mode {
            MappingMode::ViGEm | MappingMode::Rpcs3 => self.xbox.as_ref(),
            MappingMode::VJoy => self.joystick.as_ref(),
        }
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSet")
            .field("xbox", &self.xbox.mode())
            .field("joystick", &self.joystick.mode())
            .finish()
    }
}

/// A report as recorded by [`InMemoryBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmittedReport {
    pub controller: u32,
    pub report: ControllerReport,
}

#[derive(Debug, Default)]
struct InMemoryState {
    capacity: usize,
    active: Vec<u32>,
    next_id: u32,
    created: u32,
    report_count: usize,
    latest: Option<SubmittedReport>,
    last_reports: BTreeMap<u32, ControllerReport>,
    feedback: Vec<(u32, Feedback)>,
}

/// Capacity-limited backend that counts submitted reports and keeps the last
/// one per controller.
///
/// Clones share state, so a handle kept by the caller observes devices created
/// through the factory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    mode: MappingMode,
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBackend {
    pub fn new(mode: MappingMode, capacity: usize) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(InMemoryState {
                capacity,
                next_id: 1,
                ..InMemoryState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ids of the controllers currently plugged in.
    pub fn active(&self) -> Vec<u32> {
        self.lock().active.clone()
    }

    /// Total number of controllers ever created.
    pub fn created(&self) -> u32 {
        self.lock().created
    }

    /// Number of reports submitted since creation or the last clear.
    pub fn report_count(&self) -> usize {
        self.lock().report_count
    }

    /// The most recent report from any controller.
    pub fn latest(&self) -> Option<SubmittedReport> {
        self.lock().latest
    }

    /// The most recent report submitted by `controller`.
    pub fn last_report(&self, controller: u32) -> Option<ControllerReport> {
        self.lock().last_reports.get(&controller).copied()
    }

    pub fn clear_reports(&self) {
        let mut state = self.lock();
        state.report_count = 0;
        state.latest = None;
        state.last_reports.clear();
    }

    /// Queue a feedback request for `controller`, as a game would.
    pub fn push_feedback(&self, controller: u32, feedback: Feedback) {
        self.lock().feedback.push((controller, feedback));
    }
}

impl ControllerBackend for InMemoryBackend {
    fn mode(&self) -> MappingMode {
        self.mode
    }

    fn devices_available(&self) -> bool {
        let state = self.lock();
        state.active.len() < state.capacity
    }

    fn create(&self) -> Result<Box<dyn VirtualController>> {
        let mut state = self.lock();
        if state.active.len() >= state.capacity {
            return Err(MapperError::CapacityExhausted { mode: self.mode });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.created += 1;
        state.active.push(id);
        debug!(mode = %self.mode, id, "virtual controller plugged in");

        Ok(Box::new(InMemoryController {
            id,
            mode: self.mode,
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemoryController {
    id: u32,
    mode: MappingMode,
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryController {
    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VirtualController for InMemoryController {
    fn id(&self) -> u32 {
        self.id
    }

    fn submit(&mut self, report: &ControllerReport) -> Result<()> {
        let mut state = self.lock();
        state.report_count += 1;
        state.latest = Some(SubmittedReport {
            controller: self.id,
            report: *report,
        });
        state.last_reports.insert(self.id, *report);
        Ok(())
    }

    fn take_feedback(&mut self) -> Option<Feedback> {
        let mut state = self.lock();
        let index = state.feedback.iter().rposition(|(id, _)| *id == self.id)?;
        let (_, feedback) = state.feedback.remove(index);
        state.feedback.retain(|(id, _)| *id != self.id);
        Some(feedback)
    }
}

impl Drop for InMemoryController {
    fn drop(&mut self) {
        let id = self.id;
        self.lock().active.retain(|active| *active != id);
        debug!(mode = %self.mode, id, "virtual controller unplugged");
    }
}
