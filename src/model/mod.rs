//! The closed value model: scalar variants, collections, quantities,
//! partial-precision temporals, and opaque FHIR object handles.

mod object;
mod quantity;
mod temporal;
mod value;

pub use object::FhirObject;
pub use quantity::Quantity;
pub use temporal::{PartialDateTime, Precision};
pub use value::{Collection, FhirPathValue};
