//! Period-impact analysis.
//!
//! - `period`: boundary split and monthly aggregation
//! - `summary`: per-side descriptive statistics
//! - `impact`: a single pre/post comparison with test selection
//! - `grouped`: top-N group comparisons, named groups and group shares
//! - `trend`: monthly trend rows and per-group breakdowns

pub mod grouped;
pub mod impact;
pub mod period;
pub mod summary;
pub mod trend;

pub use grouped::*;
pub use impact::*;
pub use period::*;
pub use summary::*;
pub use trend::*;
