/// One accelerometer reading. `t_ms` is a monotonic clock, non-decreasing per source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub t_ms: u64,
}

impl Sample {
    pub const fn new(x: f32, y: f32, z: f32, t_ms: u64) -> Self {
        Self { x, y, z, t_ms }
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    fn same_reading(&self, other: &Sample) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }

    fn has_zero_axis(&self) -> bool {
        self.x == 0.0 || self.y == 0.0 || self.z == 0.0
    }
}

/// Difference between two consecutive raw samples, stamped with the newer one's time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Delta {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    pub t_ms: u64,
}

impl Delta {
    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.dx,
            Axis::Y => self.dy,
            Axis::Z => self.dz,
        }
    }
}

/// Remembers the previous raw sample and turns the next one into a [`Delta`].
///
/// No delta is produced while any axis of the remembered sample is exactly
/// zero (nothing seen yet, or memory was reset after a shake), or when the
/// new reading is identical to the remembered one.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawMemory {
    last: Option<Sample>,
}

impl RawMemory {
    pub const fn new() -> Self {
        Self { last: None }
    }

    pub fn advance(&mut self, sample: Sample) -> Option<Delta> {
        let delta = self
            .last
            .filter(|last| !last.has_zero_axis() && !last.same_reading(&sample))
            .map(|last| Delta {
                dx: last.x - sample.x,
                dy: last.y - sample.y,
                dz: last.z - sample.z,
                t_ms: sample.t_ms,
            });
        self.last = Some(sample);
        delta
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    Oscillation,
    Ratio,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShakeDetail {
    Oscillation {
        axis: Axis,
        positive: u8,
        negative: u8,
    },
    Ratio {
        ratio_milli: i32,
        average_milli: i32,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ShakeEvent {
    pub t_ms: u64,
    pub strategy: StrategyKind,
    pub detail: ShakeDetail,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum HandlerKind {
    WithoutNotifications = 1,
    ScreenOff = 2,
    BatteryOut = 3,
    InactiveTime = 4,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HandlerVote {
    pub active: bool,
}

/// How handler votes combine into the listening decision.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VotePolicy {
    /// Listen while at least one handler votes active.
    #[default]
    Any,
    /// Listen only while every handler votes active.
    All,
}

impl VotePolicy {
    pub fn combine(self, mut votes: impl Iterator<Item = HandlerVote>) -> bool {
        match self {
            VotePolicy::Any => votes.any(|vote| vote.active),
            VotePolicy::All => {
                let mut seen = false;
                for vote in votes {
                    if !vote.active {
                        return false;
                    }
                    seen = true;
                }
                seen
            }
        }
    }
}

/// Proximity patterns that wake the device on their own.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProximityGesture {
    /// Near for longer than the pocket delay, then far.
    Pocket,
    /// Near, far, near, far within the wave time bounds.
    WaveToWake,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WakeTrigger {
    Shake {
        handler: HandlerKind,
        shake: ShakeEvent,
    },
    Proximity(ProximityGesture),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WakeRequest {
    pub t_ms: u64,
    pub trigger: WakeTrigger,
}

impl WakeRequest {
    pub fn shake(&self) -> Option<(HandlerKind, ShakeEvent)> {
        match self.trigger {
            WakeTrigger::Shake { handler, shake } => Some((handler, shake)),
            WakeTrigger::Proximity(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineAction {
    SourceStarted,
    SourceStopped,
    WakeRequested(WakeRequest),
    WakeSuppressed { reason: RejectReason },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionBuffer {
    len: usize,
    slots: [Option<EngineAction>; Self::MAX],
}

impl ActionBuffer {
    pub const MAX: usize = 8;

    pub const fn new() -> Self {
        Self {
            len: 0,
            slots: [None; Self::MAX],
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.slots = [None; Self::MAX];
    }

    pub fn push(&mut self, action: EngineAction) {
        if self.len >= Self::MAX {
            return;
        }
        self.slots[self.len] = Some(action);
        self.len += 1;
    }

    pub fn extend(&mut self, other: &ActionBuffer) {
        for action in other.iter() {
            self.push(*action);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineAction> {
        self.slots[..self.len].iter().filter_map(Option::as_ref)
    }

    pub fn wake_requests(&self) -> impl Iterator<Item = &WakeRequest> {
        self.iter().filter_map(|action| match action {
            EngineAction::WakeRequested(request) => Some(request),
            _ => None,
        })
    }

    pub fn contains_wake_request(&self) -> bool {
        self.wake_requests().next().is_some()
    }

    pub fn contains(&self, action: EngineAction) -> bool {
        self.iter().any(|a| *a == action)
    }
}

impl Default for ActionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum RejectReason {
    #[default]
    None = 0,
    SourceIdle = 1,
    CooldownActive = 2,
    PocketVeto = 3,
    SensorUnavailable = 4,
}

impl RejectReason {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum EngineStateId {
    #[default]
    Idle = 0,
    Listening = 1,
    /// Attached with the motion source parked; see `MotionDuty::OnDemand`.
    Armed = 2,
}

impl EngineStateId {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
