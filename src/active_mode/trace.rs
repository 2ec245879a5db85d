use crate::active_mode::types::{EngineStateId, RejectReason};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EngineTraceSample {
    pub now_ms: u64,
    pub state_id: EngineStateId,
    pub reject_reason: RejectReason,
    pub window_len: u16,
    pub cooldown_active: u8,
    pub active_votes: u8,
    pub pocket_near: u8,
}
