//! JSON output: pretty series document and JSON Lines traces.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::chart::ChartLine;
use crate::domain::compute::ComputedSeries;
use crate::domain::error::ShadowfolioError;
use crate::domain::trace::DayTrace;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

#[derive(Serialize)]
struct SeriesDocument<'a> {
    lines: &'a [ChartLine],
    #[serde(flatten)]
    series: &'a ComputedSeries,
}

fn report_error(reason: impl std::fmt::Display) -> ShadowfolioError {
    ShadowfolioError::Report {
        reason: format!("JSON write error: {reason}"),
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, ShadowfolioError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ShadowfolioError::Report {
            reason: format!("failed to create {}: {}", path.display(), e),
        })
}

pub fn write_series_json(
    lines: &[ChartLine],
    series: &ComputedSeries,
    mut writer: impl Write,
) -> Result<(), ShadowfolioError> {
    serde_json::to_writer_pretty(&mut writer, &SeriesDocument { lines, series })
        .map_err(report_error)?;
    writeln!(writer).map_err(report_error)?;
    writer.flush().map_err(report_error)
}

/// One JSON object per line, in day order.
pub fn write_traces_jsonl(traces: &[DayTrace], mut writer: impl Write) -> Result<(), ShadowfolioError> {
    for trace in traces {
        serde_json::to_writer(&mut writer, trace).map_err(report_error)?;
        writeln!(writer).map_err(report_error)?;
    }
    writer.flush().map_err(report_error)
}

impl ReportPort for JsonReportAdapter {
    fn write_series(
        &self,
        lines: &[ChartLine],
        series: &ComputedSeries,
        output_path: &Path,
    ) -> Result<(), ShadowfolioError> {
        write_series_json(lines, series, create(output_path)?)
    }

    fn write_traces(&self, traces: &[DayTrace], output_path: &Path) -> Result<(), ShadowfolioError> {
        write_traces_jsonl(traces, create(output_path)?)
    }
}
