// src/stage/mod.rs
//
// Boundary to the loading collaborator: the fixed staging column set as an
// Arrow schema, conversions between `Observation` rows and record batches,
// and the sink seam the warehouse loader plugs into.

use crate::normalize::record::{Dataset, Observation};
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// The staging contract: `{ano, mes, ano_mes, servico, grupo_economico,
/// variavel, valor, arquivo_origem}`. Loaders must not assume any other
/// column exists.
pub fn staging_schema() -> Schema {
    Schema::new(vec![
        Field::new("ano", DataType::Int32, false),
        Field::new("mes", DataType::UInt32, false),
        Field::new("ano_mes", DataType::Utf8, false),
        Field::new("servico", DataType::Utf8, false),
        Field::new("grupo_economico", DataType::Utf8, false),
        Field::new("variavel", DataType::Utf8, false),
        Field::new("valor", DataType::Float64, false),
        Field::new("arquivo_origem", DataType::Utf8, false),
    ])
}

pub fn to_record_batch(rows: &[Observation]) -> Result<RecordBatch> {
    let ano = Int32Array::from_iter_values(rows.iter().map(|r| r.ano));
    let mes = UInt32Array::from_iter_values(rows.iter().map(|r| r.mes));
    let ano_mes = StringArray::from_iter_values(rows.iter().map(|r| r.ano_mes.as_str()));
    let servico = StringArray::from_iter_values(rows.iter().map(|r| r.servico.as_str()));
    let grupo = StringArray::from_iter_values(rows.iter().map(|r| r.grupo_economico.as_str()));
    let variavel = StringArray::from_iter_values(rows.iter().map(|r| r.variavel.as_str()));
    let valor = Float64Array::from_iter_values(rows.iter().map(|r| r.valor));
    let arquivo = StringArray::from_iter_values(rows.iter().map(|r| r.arquivo_origem.as_str()));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(ano),
        Arc::new(mes),
        Arc::new(ano_mes),
        Arc::new(servico),
        Arc::new(grupo),
        Arc::new(variavel),
        Arc::new(valor),
        Arc::new(arquivo),
    ];
    RecordBatch::try_new(Arc::new(staging_schema()), columns).map_err(Into::into)
}

pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Observation>> {
    fn col<'a, T: 'static>(batch: &'a RecordBatch, idx: usize, name: &str) -> Result<&'a T> {
        batch
            .column(idx)
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| anyhow::anyhow!("staging column `{}` has wrong type", name))
    }

    let ano: &Int32Array = col(batch, 0, "ano")?;
    let mes: &UInt32Array = col(batch, 1, "mes")?;
    let ano_mes: &StringArray = col(batch, 2, "ano_mes")?;
    let servico: &StringArray = col(batch, 3, "servico")?;
    let grupo: &StringArray = col(batch, 4, "grupo_economico")?;
    let variavel: &StringArray = col(batch, 5, "variavel")?;
    let valor: &Float64Array = col(batch, 6, "valor")?;
    let arquivo: &StringArray = col(batch, 7, "arquivo_origem")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(Observation {
            ano: ano.value(i),
            mes: mes.value(i),
            ano_mes: ano_mes.value(i).to_string(),
            servico: servico.value(i).to_string(),
            grupo_economico: grupo.value(i).to_string(),
            variavel: variavel.value(i).to_string(),
            valor: valor.value(i),
            arquivo_origem: arquivo.value(i).to_string(),
        });
    }
    Ok(rows)
}

/// Write one batch to a Snappy-compressed Parquet file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating parquet file {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .with_context(|| format!("opening parquet writer for {:?}", path))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Read every row of a Parquet file written by [`write_parquet`].
pub fn read_parquet(path: &Path) -> Result<Vec<Observation>> {
    let file = File::open(path).with_context(|| format!("opening parquet file {:?}", path))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut rows = Vec::new();
    for batch in reader {
        rows.extend(from_record_batch(&batch?)?);
    }
    Ok(rows)
}

/// The seam between the normalizer and the warehouse loader. A file's batch
/// is loaded all-or-nothing; a load error is fatal for the run.
pub trait StagingSink {
    fn load(&mut self, dataset: &Dataset) -> Result<usize>;
}

/// In-tree sink: one consolidated Parquet file the SQL stage picks up.
pub struct ParquetSink {
    path: PathBuf,
}

impl ParquetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ParquetSink { path: path.into() }
    }
}

impl StagingSink for ParquetSink {
    fn load(&mut self, dataset: &Dataset) -> Result<usize> {
        let batch = to_record_batch(&dataset.rows)?;
        write_parquet(&self.path, &batch)?;
        info!(path = %self.path.display(), rows = dataset.len(), "staging parquet written");
        Ok(dataset.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn obs(ano: i32, mes: u32, grupo: &str) -> Observation {
        Observation {
            ano,
            mes,
            ano_mes: format!("{}-{:02}", ano, mes),
            servico: "SCM".into(),
            grupo_economico: grupo.into(),
            variavel: "IDA".into(),
            valor: 87.5,
            arquivo_origem: "SCM2015.ods".into(),
        }
    }

    #[test]
    fn batch_round_trip_preserves_rows() {
        let rows = vec![obs(2015, 1, "ALGAR"), obs(2015, 2, "OI")];
        let batch = to_record_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().fields().len(), 8);
        assert_eq!(from_record_batch(&batch).unwrap(), rows);
    }

    #[test]
    fn parquet_sink_writes_loadable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging_ida.parquet");
        let dataset = Dataset {
            rows: vec![obs(2015, 10, "TIM")],
        };
        let mut sink = ParquetSink::new(&path);
        assert_eq!(sink.load(&dataset).unwrap(), 1);
        assert_eq!(read_parquet(&path).unwrap(), dataset.rows);
    }

    #[test]
    fn empty_batch_is_valid() {
        let batch = to_record_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
