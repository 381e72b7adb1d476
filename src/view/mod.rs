pub mod caption;
pub mod controller;
pub mod debounce;

pub use caption::Caption;
pub use controller::{ListView, LookupOutcome, LookupTicket, SortMode, ViewSettings, ViewSnapshot};
