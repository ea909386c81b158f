pub mod registry;
pub mod table;

pub use registry::{
    convert_between, format_quantity, normalize_unit_text, UnitCategory, UnitDefinition, UnitRegistry,
    COUNT_SYMBOL,
};
pub use table::load_unit_table;
