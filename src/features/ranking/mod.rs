pub mod clear_state;
pub mod engine;
pub mod handler;

pub use clear_state::{ClearKind, ClearStates};
pub use engine::{FULL_COMBO_PENALTY, RankedEntry, Ranking, TOP_N, compute_ranking};
pub use handler::create_ranking_router;
