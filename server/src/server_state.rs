use matchday_data_management::DataManager;

use crate::advisor::{fixture::PinnedFixture, TrafficAdvisor};

pub struct ServerState {
    pub data_manager: DataManager,
    pub advisor: TrafficAdvisor,
    /// When set, every advice request is answered for this match.
    pub fixture: Option<PinnedFixture>,
}
