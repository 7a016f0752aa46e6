pub mod stage0_turns;
pub mod stage1_chunk;
pub mod stage2_extract;
pub mod stage3_merge;
pub mod stage4_compress;
pub mod stage5_score;
pub mod stage_index;

pub use stage0_turns::*;
pub use stage1_chunk::*;
pub use stage2_extract::*;
pub use stage3_merge::*;
pub use stage4_compress::*;
pub use stage5_score::*;
pub use stage_index::*;
