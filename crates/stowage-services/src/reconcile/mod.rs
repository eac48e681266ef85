pub mod scanner;

pub use scanner::{ReconcileReport, ReconciliationScanner};
