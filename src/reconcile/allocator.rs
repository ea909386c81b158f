use chrono::{DateTime, Utc};

/// Remainders below this are floating-point residue, not a shortage.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// A matched pantry item offered to the allocator.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationCandidate {
    /// Position of the item in the caller's snapshot.
    pub index: usize,
    pub item_id: String,
    /// Current quantity in the item's own unit.
    pub quantity: f64,
    /// Multiplier from the item's unit to the allocation's common unit.
    pub to_common: f64,
    pub acquired_at: DateTime<Utc>,
}

impl AllocationCandidate {
    pub fn available_common(&self) -> f64 {
        self.quantity.max(0.0) * self.to_common
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllocationRequest {
    /// Quantity in the common unit.
    Quantity(f64),
    UseAllAvailable,
}

/// Per-item delta, in the item's own unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub index: usize,
    pub previous_quantity: f64,
    pub used_quantity: f64,
    pub new_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationOutcome {
    pub draws: Vec<Draw>,
    /// Common unit; zero when fully satisfied.
    pub shortage: f64,
    /// Everything the candidates held before allocation, common unit.
    pub available: f64,
}

impl AllocationOutcome {
    pub fn used_common(&self, candidates: &[AllocationCandidate]) -> f64 {
        self.draws
            .iter()
            .filter_map(|draw| {
                candidates
                    .iter()
                    .find(|c| c.index == draw.index)
                    .map(|c| draw.used_quantity * c.to_common)
            })
            .sum()
    }
}

/// Splits a requirement across candidates.
///
/// An explicit quantity is drawn oldest-acquired first until satisfied; what
/// is left over is the shortage. `UseAllAvailable` drains the first
/// non-empty candidate in the order given (the matcher's best match) and
/// nothing else.
pub fn allocate(request: AllocationRequest, candidates: &[AllocationCandidate]) -> AllocationOutcome {
    let available: f64 = candidates.iter().map(AllocationCandidate::available_common).sum();

    match request {
        AllocationRequest::UseAllAvailable => {
            let draws = candidates
                .iter()
                .find(|c| c.quantity > 0.0)
                .map(|c| Draw {
                    index: c.index,
                    previous_quantity: c.quantity,
                    used_quantity: c.quantity,
                    new_quantity: 0.0,
                })
                .into_iter()
                .collect();
            AllocationOutcome { draws, shortage: 0.0, available }
        }
        AllocationRequest::Quantity(required) => {
            let mut ordered: Vec<&AllocationCandidate> = candidates.iter().collect();
            ordered.sort_by(|a, b| {
                a.acquired_at
                    .cmp(&b.acquired_at)
                    .then_with(|| a.item_id.cmp(&b.item_id))
            });

            let mut remaining = required.max(0.0);
            let mut draws = Vec::new();
            for candidate in ordered {
                if remaining <= QUANTITY_EPSILON {
                    break;
                }
                if candidate.quantity <= 0.0 {
                    continue;
                }

                let draw = if remaining >= candidate.available_common() {
                    remaining -= candidate.available_common();
                    Draw {
                        index: candidate.index,
                        previous_quantity: candidate.quantity,
                        used_quantity: candidate.quantity,
                        new_quantity: 0.0,
                    }
                } else {
                    let used = remaining / candidate.to_common;
                    remaining = 0.0;
                    Draw {
                        index: candidate.index,
                        previous_quantity: candidate.quantity,
                        used_quantity: used,
                        new_quantity: (candidate.quantity - used).max(0.0),
                    }
                };
                draws.push(draw);
            }

            let shortage = if remaining > QUANTITY_EPSILON { remaining } else { 0.0 };
            AllocationOutcome { draws, shortage, available }
        }
    }
}
