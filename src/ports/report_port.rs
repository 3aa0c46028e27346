//! Output port for computed series and traces.

use std::path::Path;

use crate::domain::chart::ChartLine;
use crate::domain::compute::ComputedSeries;
use crate::domain::error::ShadowfolioError;
use crate::domain::trace::DayTrace;

pub trait ReportPort {
    fn write_series(
        &self,
        lines: &[ChartLine],
        series: &ComputedSeries,
        output_path: &Path,
    ) -> Result<(), ShadowfolioError>;

    fn write_traces(&self, traces: &[DayTrace], output_path: &Path) -> Result<(), ShadowfolioError>;
}
