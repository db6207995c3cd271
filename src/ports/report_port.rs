//! Result export port trait.

use crate::domain::error::MelaoError;
use crate::domain::result_table::ResultTable;

pub trait ReportPort {
    fn write(&self, table: &ResultTable, output_path: &str) -> Result<(), MelaoError>;
}
