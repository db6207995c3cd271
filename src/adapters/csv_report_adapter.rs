//! CSV export of a result table.

use crate::domain::error::MelaoError;
use crate::domain::metrics::RESULT_HEADER;
use crate::domain::result_table::ResultTable;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, table: &ResultTable, output_path: &str) -> Result<(), MelaoError> {
        let csv_err = |e: csv::Error| MelaoError::InvalidData {
            reason: format!("failed to write {}: {}", output_path, e),
        };

        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_err)?;
        wtr.write_record(RESULT_HEADER).map_err(csv_err)?;
        for record in table.records() {
            wtr.write_record(&record).map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
