//! Terminal presentation for the CLI

pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, link_diff, success, summary_row, violation, warn};
pub use progress::{index_hooks, Spinner};
pub use table::{fields_table, records_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
