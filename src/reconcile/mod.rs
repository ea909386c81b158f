pub mod allocator;
pub mod completion;
pub mod converter;
pub mod revert;

pub use allocator::{allocate, AllocationCandidate, AllocationOutcome, AllocationRequest, Draw, QUANTITY_EPSILON};
pub use completion::{CompletionInput, CompletionPlan, CompletionPlanner};
pub use converter::{to_pantry_unit, ConvertedQuantity};
pub use revert::{find_revertible, plan_revert, RevertPlan};
