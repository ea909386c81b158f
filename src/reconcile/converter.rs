use crate::error::ConversionError;
use crate::models::{IngredientRequirement, PantryItem};
use crate::units::{convert_between, format_quantity, UnitRegistry};

/// A requirement expressed in one pantry item's unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertedQuantity {
    Amount {
        quantity: f64,
        /// Empty when the units already matched.
        note: String,
    },
    /// The recipe gave no quantity.
    UseAllAvailable,
}

impl ConvertedQuantity {
    pub fn quantity(&self) -> Option<f64> {
        match self {
            ConvertedQuantity::Amount { quantity, .. } => Some(*quantity),
            ConvertedQuantity::UseAllAvailable => None,
        }
    }
}

pub fn to_pantry_unit(
    registry: &UnitRegistry,
    requirement: &IngredientRequirement,
    item: &PantryItem,
) -> Result<ConvertedQuantity, ConversionError> {
    let Some(quantity) = requirement.quantity else {
        return Ok(ConvertedQuantity::UseAllAvailable);
    };
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(ConversionError::InvalidQuantity(quantity));
    }

    let from = registry.resolve_optional(requirement.unit.as_deref())?;
    let to = registry.resolve(&item.unit)?;
    let converted = convert_between(quantity, from, to)?;

    let note = if from.symbol == to.symbol {
        String::new()
    } else {
        format!(
            "{} {} = {} {}",
            format_quantity(quantity),
            from.symbol,
            format_quantity(converted),
            to.symbol
        )
    };
    Ok(ConvertedQuantity::Amount { quantity: converted, note })
}
