//! Review categorization: extract review bodies, classify each one against
//! a fixed complaint label set, and fold the batch into label frequencies.

pub mod categorizer;
pub mod extract;
pub mod labels;
pub mod report;

pub use categorizer::{Categorized, ReviewCategorizer, categorize_all};
pub use extract::{extract_file, extract_reviews, load_reviews};
pub use labels::{CATEGORIES, CategoryFlags};
pub use report::{CategorizationReport, CategoryFrequencies, ChartRow, Frequencies};
