// Draft engine: turn order, ban gating, the state machine and its clock.

pub mod order;
pub mod restriction;
pub mod state;
pub mod timer;
